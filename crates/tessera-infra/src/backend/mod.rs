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

//! A reference [`RenderBackend`] that renders on a dedicated CPU thread.

mod render;
mod worker;

use crate::generators::GeneratorRegistry;
use crossbeam_channel::Sender;
use std::io;
use std::sync::Arc;
use std::thread;
use tessera_core::backend::{BackendBudget, JobId, RenderBackend, RenderJob, RunFlags};
use tessera_core::{InstanceId, OutputId, RawResult};
use worker::{Command, RunBatch, Shared};

/// Renders jobs with procedural generators on one worker thread.
///
/// Pushes are staged until `run`, which hands them to the worker as one run.
/// A run flagged [`RunFlags::REPLACE_DEPRECATED`] skips instances that a
/// later run pushed again.
/// Runs flagged [`RunFlags::RUN_FIRST`] overtake runs that have not started.
/// Within a run, rows of each output are split across up to
/// `cpu_cores` scoped threads. Outputs larger than the memory budget are never
/// produced.
pub struct ThreadedBackend {
    shared: Arc<Shared>,
    commands: Sender<Command>,
    staged: Vec<(u64, RenderJob)>,
    next_job: u64,
    next_push: u64,
    worker: Option<thread::JoinHandle<()>>,
}

impl ThreadedBackend {
    /// Spawns the worker thread.
    pub fn new(generators: GeneratorRegistry) -> io::Result<Self> {
        let shared = Arc::new(Shared::default());
        shared.lock().worker_alive = true;
        let (commands, receiver) = crossbeam_channel::unbounded();

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("tessera-render".into())
            .spawn(move || worker::run(&worker_shared, &generators, receiver))?;

        Ok(Self {
            shared,
            commands,
            staged: Vec::new(),
            next_job: 0,
            next_push: 0,
            worker: Some(worker),
        })
    }

    /// A backend with the built-in generators.
    pub fn with_builtins() -> io::Result<Self> {
        Self::new(GeneratorRegistry::with_builtins())
    }

    /// Number of jobs pushed but not yet run.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Number of instances with jobs still queued on the worker.
    pub fn tracked_instances(&self) -> usize {
        self.shared.lock().latest_push.len()
    }

    /// Stops the worker after its current run and joins it. Idempotent.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.cancel_all();
        // A send failure means the worker already exited.
        let _ = self.commands.send(Command::Shutdown);
        if worker.join().is_err() {
            log::error!("Render worker thread panicked");
        }
    }
}

impl RenderBackend for ThreadedBackend {
    fn configure(&mut self, budget: &BackendBudget) {
        log::info!(
            "ThreadedBackend: {} core(s), {} MB per output",
            budget.cpu_cores,
            budget.memory_budget_mb
        );
        self.shared.lock().budget = *budget;
    }

    fn push(&mut self, job: RenderJob) {
        self.next_push += 1;
        let seq = self.next_push;
        self.staged.retain(|(_, staged)| staged.instance != job.instance);
        self.staged.push((seq, job));
    }

    fn run(&mut self, flags: RunFlags) -> JobId {
        self.next_job += 1;
        let job = JobId(self.next_job);
        let epoch = {
            let mut state = self.shared.lock();
            if !state.worker_alive {
                log::error!("ThreadedBackend: worker is gone, {job} will never run");
                self.staged.clear();
                return job;
            }
            state.pending.insert(job);
            for (seq, staged) in &self.staged {
                let track = state.latest_push.entry(staged.instance).or_default();
                track.latest = track.latest.max(*seq);
                track.outstanding += 1;
            }
            state.epoch
        };

        let batch = RunBatch {
            job,
            flags,
            epoch,
            jobs: std::mem::take(&mut self.staged),
        };
        if self.commands.send(Command::Run(batch)).is_err() {
            log::error!("ThreadedBackend: worker channel closed, dropping {job}");
            let mut state = self.shared.lock();
            state.pending.remove(&job);
            state.latest_push.clear();
            return job;
        }

        if !flags.contains(RunFlags::ASYNCHRONOUS) {
            self.shared.wait_drained();
        }
        job
    }

    fn is_pending(&self, job: JobId) -> bool {
        self.shared.lock().pending.contains(&job)
    }

    fn cancel_all(&mut self) {
        self.staged.clear();
        let mut state = self.shared.lock();
        state.epoch += 1;
        state.pending.clear();
        state.results.clear();
        state.latest_push.clear();
        drop(state);
        self.shared.notify();
        log::debug!("ThreadedBackend: cancelled all work");
    }

    fn grab_result(&mut self, instance: InstanceId, output: &OutputId) -> Option<RawResult> {
        self.shared
            .lock()
            .results
            .remove(&(instance, output.clone()))
    }
}

impl Drop for ThreadedBackend {
    fn drop(&mut self) {
        self.stop();
    }
}
