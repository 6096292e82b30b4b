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

//! State shared with the render thread and the thread's main loop.

use super::render::{output_bytes, render_output, worker_threads};
use crate::generators::GeneratorRegistry;
use crossbeam_channel::Receiver;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tessera_core::backend::{BackendBudget, JobId, RenderJob, RunFlags};
use tessera_core::{InstanceId, OutputId, RawResult};

/// A run handed to the worker.
pub(super) struct RunBatch {
    pub job: JobId,
    pub flags: RunFlags,
    /// Cancel epoch the run was issued in.
    pub epoch: u64,
    /// Jobs with their push sequence numbers.
    pub jobs: Vec<(u64, RenderJob)>,
}

pub(super) enum Command {
    Run(RunBatch),
    Shutdown,
}

#[derive(Default)]
pub(super) struct SharedState {
    /// Incremented by every cancel; work issued in an older epoch is dropped.
    pub epoch: u64,
    pub pending: HashSet<JobId>,
    pub results: HashMap<(InstanceId, OutputId), RawResult>,
    /// Newest run push per instance, dropped once none of its jobs is left.
    pub latest_push: HashMap<InstanceId, PushTrack>,
    pub budget: BackendBudget,
    pub worker_alive: bool,
}

/// The newest push of one instance and how many of its jobs are queued on
/// the worker.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct PushTrack {
    pub latest: u64,
    pub outstanding: usize,
}

/// State guarded by one lock plus a condition variable signalled whenever a
/// run finishes, work is cancelled, or the worker exits.
#[derive(Default)]
pub(super) struct Shared {
    state: Mutex<SharedState>,
    changed: Condvar,
}

impl Shared {
    pub fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn notify(&self) {
        self.changed.notify_all();
    }

    /// Blocks until no run is pending or the worker is gone.
    pub fn wait_drained(&self) {
        let mut state = self.lock();
        while state.worker_alive && !state.pending.is_empty() {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    /// Records that one job of `instance` left the worker. Ignored once a
    /// cancel moved on to a newer epoch, which already dropped the record.
    fn retire(&self, instance: InstanceId, epoch: u64) {
        let mut state = self.lock();
        if state.epoch != epoch {
            return;
        }
        if let Some(track) = state.latest_push.get_mut(&instance) {
            track.outstanding = track.outstanding.saturating_sub(1);
            if track.outstanding == 0 {
                state.latest_push.remove(&instance);
            }
        }
    }

    fn finish(&self, job: JobId) {
        self.lock().pending.remove(&job);
        self.notify();
    }
}

/// Marks the worker dead when its loop exits, including by panic, so that
/// synchronous callers never wait forever.
struct AliveGuard<'a>(&'a Shared);

impl Drop for AliveGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.worker_alive = false;
        state.pending.clear();
        drop(state);
        self.0.notify();
    }
}

/// The render thread's loop: queue incoming runs, always executing
/// `RUN_FIRST` runs before normal ones, one run at a time.
pub(super) fn run(shared: &Shared, generators: &GeneratorRegistry, commands: Receiver<Command>) {
    let _alive = AliveGuard(shared);
    let mut first: VecDeque<RunBatch> = VecDeque::new();
    let mut normal: VecDeque<RunBatch> = VecDeque::new();
    log::info!("Render worker thread started.");

    'outer: loop {
        if first.is_empty() && normal.is_empty() {
            match commands.recv() {
                Ok(Command::Run(batch)) => route(batch, &mut first, &mut normal),
                Ok(Command::Shutdown) | Err(_) => break,
            }
        }
        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Run(batch) => route(batch, &mut first, &mut normal),
                Command::Shutdown => break 'outer,
            }
        }
        if let Some(batch) = first.pop_front().or_else(|| normal.pop_front()) {
            execute(shared, generators, batch);
        }
    }
    log::info!("Render worker thread stopped.");
}

fn route(batch: RunBatch, first: &mut VecDeque<RunBatch>, normal: &mut VecDeque<RunBatch>) {
    if batch.flags.contains(RunFlags::RUN_FIRST) {
        first.push_back(batch);
    } else {
        normal.push_back(batch);
    }
}

fn execute(shared: &Shared, generators: &GeneratorRegistry, batch: RunBatch) {
    let RunBatch {
        job,
        flags,
        epoch,
        jobs,
    } = batch;
    let budget = shared.lock().budget;
    let limits = Limits {
        threads: worker_threads(budget.cpu_cores),
        memory: budget.memory_budget_mb.saturating_mul(1024 * 1024),
    };
    log::debug!("Render worker: running {job} ({} job(s))", jobs.len());

    for (seq, render_job) in jobs {
        if !shared.is_current(epoch) {
            log::debug!("Render worker: {job} was cancelled");
            break;
        }
        render_one(shared, generators, &render_job, seq, flags, epoch, limits);
        shared.retire(render_job.instance, epoch);
    }
    shared.finish(job);
}

/// Per-run budget derived from [`BackendBudget`].
#[derive(Clone, Copy)]
struct Limits {
    threads: usize,
    /// Largest output buffer, in bytes.
    memory: u64,
}

fn render_one(
    shared: &Shared,
    generators: &GeneratorRegistry,
    render_job: &RenderJob,
    seq: u64,
    flags: RunFlags,
    epoch: u64,
    limits: Limits,
) {
    if flags.contains(RunFlags::REPLACE_DEPRECATED) && is_superseded(shared, render_job, seq) {
        log::trace!("Render worker: skipping superseded job for {}", render_job.instance);
        return;
    }
    let Some(generator) = generators.get(&render_job.generator) else {
        log::warn!(
            "Render worker: no generator '{}' for {}",
            render_job.generator,
            render_job.instance
        );
        return;
    };
    if generator.version() != render_job.version {
        log::debug!(
            "Render worker: '{}' is version {}, package expects {}",
            render_job.generator,
            generator.version(),
            render_job.version
        );
    }

    let shader = generator.shader(&render_job.inputs);
    for output in &render_job.outputs {
        let bytes = output_bytes(output);
        if bytes > limits.memory {
            log::warn!(
                "Render worker: {}/{} needs {bytes} bytes, over the memory budget",
                render_job.instance,
                output.id
            );
            continue;
        }
        let result = render_output(&shader, output, limits.threads);
        let mut state = shared.lock();
        if state.epoch != epoch {
            break;
        }
        state
            .results
            .insert((render_job.instance, output.id.clone()), result);
    }
}

fn is_superseded(shared: &Shared, job: &RenderJob, seq: u64) -> bool {
    shared
        .lock()
        .latest_push
        .get(&job.instance)
        .is_some_and(|track| track.latest > seq)
}
