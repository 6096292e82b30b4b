// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shared fixtures: a deterministic backend whose runs finish only when the
//! test says so, and package/instance helpers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tessera_agents::RenderSession;
use tessera_core::backend::{BackendBudget, JobId, RenderBackend, RenderJob, RunFlags};
use tessera_core::pixel::mip_chain_len;
use tessera_core::registry::AssetTable;
use tessera_core::resource::{MemoryTexture, ResourceHandle};
use tessera_core::settings::Settings;
use tessera_data::InstanceKey;
use tessera_io::MemoryBlobStore;
use tessera_core::{
    InputDesc, InputValue, InstanceId, OutputDesc, OutputId, PackageDescriptor, PixelFormat,
    RawResult,
};

#[derive(Debug, Default)]
pub struct FakeState {
    /// Pushed since the last run.
    staged: Vec<RenderJob>,
    /// Every job ever pushed, in order.
    pub pushes: Vec<RenderJob>,
    /// Runs issued, with their flags.
    pub runs: Vec<(JobId, RunFlags)>,
    running: HashMap<JobId, Vec<RenderJob>>,
    results: HashMap<(InstanceId, OutputId), RawResult>,
    /// Outputs this backend never produces.
    pub never_ready: HashSet<OutputId>,
    pub cancel_count: usize,
    pub budget: Option<BackendBudget>,
    next_job: u64,
}

/// A backend that records every call. Asynchronous runs stay pending until
/// [`FakeBackend::finish_all`]; synchronous runs finish immediately.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Finishes every outstanding run, making its results grabbable.
    pub fn finish_all(&self) {
        let mut state = self.state();
        let jobs: Vec<JobId> = state.running.keys().copied().collect();
        for job in jobs {
            finish(&mut state, job);
        }
    }

    pub fn pushed_ids(&self) -> Vec<InstanceId> {
        self.state().pushes.iter().map(|job| job.instance).collect()
    }

    pub fn push_count(&self) -> usize {
        self.state().pushes.len()
    }

    pub fn run_count(&self) -> usize {
        self.state().runs.len()
    }

    /// Results produced but not grabbed yet.
    pub fn result_count(&self) -> usize {
        self.state().results.len()
    }
}

fn finish(state: &mut FakeState, job: JobId) {
    let Some(jobs) = state.running.remove(&job) else {
        return;
    };
    for job in jobs {
        for output in &job.outputs {
            if state.never_ready.contains(&output.id) {
                continue;
            }
            let len = mip_chain_len(output.format, output.width, output.height, output.mip_levels);
            let fill = (job.revision % 251) as u8 + 1;
            state.results.insert(
                (job.instance, output.id.clone()),
                RawResult {
                    format: output.format,
                    width: output.width,
                    height: output.height,
                    mip_count: output.mip_levels.max(1),
                    data: vec![fill; len],
                },
            );
        }
    }
}

impl RenderBackend for FakeBackend {
    fn configure(&mut self, budget: &BackendBudget) {
        self.state().budget = Some(*budget);
    }

    fn push(&mut self, job: RenderJob) {
        let mut state = self.state();
        state.pushes.push(job.clone());
        state.staged.retain(|staged| staged.instance != job.instance);
        state.staged.push(job);
    }

    fn run(&mut self, flags: RunFlags) -> JobId {
        let mut state = self.state();
        state.next_job += 1;
        let job = JobId(state.next_job);
        let staged = std::mem::take(&mut state.staged);
        state.running.insert(job, staged);
        state.runs.push((job, flags));
        if !flags.contains(RunFlags::ASYNCHRONOUS) {
            let outstanding: Vec<JobId> = state.running.keys().copied().collect();
            for job in outstanding {
                finish(&mut state, job);
            }
        }
        job
    }

    fn is_pending(&self, job: JobId) -> bool {
        self.state().running.contains_key(&job)
    }

    fn cancel_all(&mut self) {
        let mut state = self.state();
        state.staged.clear();
        state.running.clear();
        state.results.clear();
        state.cancel_count += 1;
    }

    fn grab_result(&mut self, instance: InstanceId, output: &OutputId) -> Option<RawResult> {
        self.state().results.remove(&(instance, output.clone()))
    }
}

/// A package with one RGBA8 output and one float input.
pub fn tiles_package() -> Arc<PackageDescriptor> {
    package("tiles")
}

pub fn package(name: &str) -> Arc<PackageDescriptor> {
    Arc::new(PackageDescriptor {
        name: name.into(),
        generator: "checker".into(),
        version: 1,
        inputs: vec![InputDesc {
            id: "scale".into(),
            default: InputValue::Float(1.0),
            affects: vec![],
        }],
        outputs: vec![OutputDesc {
            id: OutputId::new("base_color"),
            width: 4,
            height: 4,
            format: PixelFormat::Rgba8,
            mip_levels: 1,
        }],
    })
}

pub fn base_color() -> OutputId {
    OutputId::new("base_color")
}

/// A session over an in-memory cache and `backend`.
pub fn session(backend: &FakeBackend, max_per_tick: usize) -> RenderSession {
    let mut settings = Settings::default();
    settings.scheduler.max_async_instances_per_tick = max_per_tick;
    RenderSession::new(
        &settings,
        Box::new(backend.clone()),
        Box::new(MemoryBlobStore::new()),
        Box::new(AssetTable::default()),
    )
    .unwrap()
}

/// Binds a fresh in-memory texture to the instance's base color output.
pub fn attach(session: &mut RenderSession, key: InstanceKey) -> Arc<Mutex<MemoryTexture>> {
    let texture = Arc::new(Mutex::new(MemoryTexture::new()));
    let handle: ResourceHandle = texture.clone();
    session.attach(key, &base_color(), &handle).unwrap();
    texture
}

/// Creates an instance with an attached texture.
pub fn spawn(session: &mut RenderSession) -> (InstanceKey, Arc<Mutex<MemoryTexture>>) {
    let key = session.create_instance(tiles_package());
    let texture = attach(session, key);
    (key, texture)
}

pub fn refreshes(texture: &Arc<Mutex<MemoryTexture>>) -> u64 {
    texture.lock().unwrap().refresh_count()
}

pub fn is_dirty(session: &RenderSession, key: InstanceKey) -> bool {
    session
        .instance(key)
        .and_then(|instance| instance.output(&base_color()))
        .is_some_and(|slot| slot.is_dirty())
}

/// Reads a counter from the session's metrics.
pub fn counter(session: &RenderSession, namespace: &str, name: &str) -> Option<u64> {
    session
        .metrics()
        .namespace(namespace)
        .iter()
        .find(|metric| metric.id.name == name)
        .and_then(|metric| metric.value.as_counter())
}
