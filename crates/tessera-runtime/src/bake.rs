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

//! Baking: render every instance of a manifest through a session.

use crate::manifest::Manifest;
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tessera_agents::{AgentStatus, RenderSession, TickReport};
use tessera_core::backend::RenderBackend;
use tessera_core::resource::{MemoryTexture, ResourceHandle};
use tessera_core::{OutputId, TextureUpload};
use tessera_io::ContentCache;

/// How to drive the session.
#[derive(Debug, Clone, Copy)]
pub struct BakeOptions {
    /// Use the blocking path instead of the tick loop.
    pub sync: bool,
    /// Give up after this many ticks.
    pub max_ticks: u64,
    /// Sleep between ticks while a batch is running.
    pub tick_interval: Duration,
}

impl Default for BakeOptions {
    fn default() -> Self {
        Self {
            sync: false,
            max_ticks: 10_000,
            tick_interval: Duration::from_millis(1),
        }
    }
}

/// The final state of one output.
#[derive(Debug, Clone)]
pub struct BakedOutput {
    /// Instance name from the manifest.
    pub instance: String,
    /// Output id.
    pub output: OutputId,
    /// Last upload the output's texture received, if any.
    pub upload: Option<TextureUpload>,
}

/// Outcome of a bake.
#[derive(Debug, Clone)]
pub struct BakeReport {
    /// Ticks run (zero for a synchronous bake).
    pub ticks: u64,
    /// Counters summed over every tick.
    pub totals: TickReport,
    /// Whether every request was served before giving up.
    pub completed: bool,
    /// Agent status at the end.
    pub status: AgentStatus,
    /// Every enabled output, in manifest order.
    pub outputs: Vec<BakedOutput>,
}

impl BakeReport {
    /// Outputs that never received a result.
    pub fn missing(&self) -> impl Iterator<Item = &BakedOutput> {
        self.outputs.iter().filter(|output| output.upload.is_none())
    }
}

/// Instantiates every declared instance and renders until the session is
/// idle or `max_ticks` is reached.
pub fn bake(
    manifest: &Manifest,
    backend: Box<dyn RenderBackend>,
    options: &BakeOptions,
) -> Result<BakeReport> {
    let mut session =
        RenderSession::open(&manifest.settings, backend).context("failed to start session")?;

    let mut keys = Vec::new();
    let mut textures: Vec<(String, OutputId, Arc<Mutex<MemoryTexture>>)> = Vec::new();
    for decl in &manifest.instances {
        let package = manifest
            .package_of(decl)
            .with_context(|| format!("unknown package '{}'", decl.package))?;
        let key = session
            .create_instance_with_inputs(decl.id(), Arc::clone(package), decl.inputs.clone())
            .with_context(|| format!("invalid inputs for instance '{}'", decl.name))?;
        for (output, format) in &decl.formats {
            session.set_format_override(key, output, Some(*format))?;
        }
        for output in &decl.disabled {
            session.set_output_enabled(key, output, false)?;
        }
        for desc in &package.outputs {
            if decl.disabled.contains(&desc.id) {
                continue;
            }
            let texture = Arc::new(Mutex::new(MemoryTexture::new()));
            let handle: ResourceHandle = texture.clone();
            session.attach(key, &desc.id, &handle)?;
            textures.push((decl.name.clone(), desc.id.clone(), texture));
        }
        keys.push(key);
    }
    log::info!("Baking {} instance(s)", keys.len());

    let mut totals = TickReport::default();
    let mut ticks = 0;
    if options.sync {
        totals = session.render_sync(&keys)?;
    } else {
        while !session.is_idle() && ticks < options.max_ticks {
            let report = session.tick();
            accumulate(&mut totals, &report);
            ticks += 1;
            if session.agent().running_job().is_some() {
                thread::sleep(options.tick_interval);
            }
        }
    }

    let completed = session.is_idle();
    if !completed {
        log::warn!("Gave up after {ticks} tick(s) with work outstanding");
    }
    let status = session.report_status();
    session.shutdown();

    let outputs = textures
        .into_iter()
        .map(|(instance, output, texture)| BakedOutput {
            instance,
            output,
            upload: texture
                .lock()
                .ok()
                .and_then(|texture| texture.last_upload().cloned()),
        })
        .collect();

    Ok(BakeReport {
        ticks,
        totals,
        completed,
        status,
        outputs,
    })
}

/// Deletes every cache entry under the manifest's cache directory.
pub fn clear_cache(manifest: &Manifest) -> Result<usize> {
    let directory = &manifest.settings.cache.directory;
    let store = tessera_io::FsBlobStore::open(directory)
        .with_context(|| format!("failed to open cache at {}", directory.display()))?;
    let mut cache = ContentCache::new(Box::new(store), &manifest.settings.cache);
    let removed = cache.clear()?;
    cache.shutdown();
    Ok(removed)
}

fn accumulate(totals: &mut TickReport, report: &TickReport) {
    totals.drawn += report.drawn;
    totals.restored_from_cache += report.restored_from_cache;
    totals.dispatched += report.dispatched;
    totals.published += report.published;
    totals.publish_failures += report.publish_failures;
    totals.not_ready += report.not_ready;
    totals.completed_batch |= report.completed_batch;
}
