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

//! The narrow interface to the rendering engine that actually computes pixels.
//!
//! The engine is treated as opaque: the scheduler only pushes job
//! descriptions, asks for a run, polls whether the run is still pending, and
//! grabs finished results. Any concrete engine is a plugin behind
//! [`RenderBackend`]; tests use a deterministic fake.

use crate::graph::{GraphInstance, InputValue, InstanceId, OutputId};
use crate::pixel::{PixelFormat, RawResult};
use bitflags::bitflags;
use std::collections::BTreeMap;
use std::fmt;

bitflags! {
    /// Options for [`RenderBackend::run`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RunFlags: u32 {
        /// Return immediately; completion is observed through `is_pending`.
        /// Without it, `run` blocks until the backend has drained every job.
        const ASYNCHRONOUS = 1 << 0;
        /// Pending pushes superseded by a newer push for the same instance
        /// are dropped instead of rendered.
        const REPLACE_DEPRECATED = 1 << 1;
        /// Queue this run ahead of runs that have not started yet.
        const RUN_FIRST = 1 << 2;
        /// Never interrupt a run that is already executing.
        const PRESERVE_CURRENT_RUN = 1 << 3;
    }
}

impl RunFlags {
    /// The flag set used by the per-tick scheduler.
    pub const SCHEDULED: Self = Self::ASYNCHRONOUS
        .union(Self::REPLACE_DEPRECATED)
        .union(Self::RUN_FIRST)
        .union(Self::PRESERVE_CURRENT_RUN);
}

/// Identifier the backend assigns to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// One output the backend must produce for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutput {
    /// Output identifier.
    pub id: OutputId,
    /// Top-level width.
    pub width: u32,
    /// Top-level height.
    pub height: u32,
    /// Requested format (package default or slot override).
    pub format: PixelFormat,
    /// Requested mip levels.
    pub mip_levels: u32,
}

/// A self-contained snapshot of an instance's pending state.
///
/// The backend may run on another thread, so it never sees the live
/// [`GraphInstance`]; it receives a copy of what it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    /// Instance being rendered.
    pub instance: InstanceId,
    /// Generator to run.
    pub generator: String,
    /// Generator version expected by the package.
    pub version: u32,
    /// Input values at push time.
    pub inputs: BTreeMap<String, InputValue>,
    /// Enabled outputs to produce.
    pub outputs: Vec<JobOutput>,
    /// Instance revision at push time.
    pub revision: u64,
}

impl RenderJob {
    /// Snapshots the enabled outputs of an instance.
    pub fn from_instance(instance: &GraphInstance) -> Self {
        let outputs = instance
            .enabled_outputs()
            .map(|slot| JobOutput {
                id: slot.id().clone(),
                width: slot.desc().width,
                height: slot.desc().height,
                format: slot.format(),
                mip_levels: slot.desc().mip_levels,
            })
            .collect();
        Self {
            instance: instance.id(),
            generator: instance.package().generator.clone(),
            version: instance.package().version,
            inputs: instance.inputs().clone(),
            outputs,
            revision: instance.revision(),
        }
    }
}

/// Resource limits handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendBudget {
    /// Maximum worker cores the backend may use. `0` means all available.
    pub cpu_cores: usize,
    /// Memory ceiling for a single output buffer, in megabytes.
    pub memory_budget_mb: u64,
}

impl Default for BackendBudget {
    fn default() -> Self {
        Self {
            cpu_cores: 1,
            memory_budget_mb: 512,
        }
    }
}

/// The contract every rendering engine plugin implements.
///
/// All methods are called from the scheduler's tick thread and must not block,
/// except `run` without [`RunFlags::ASYNCHRONOUS`].
pub trait RenderBackend: Send {
    /// Applies CPU and memory limits. Called once at startup and whenever the
    /// budget changes.
    fn configure(&mut self, _budget: &BackendBudget) {}

    /// Adds a job to the backend's pending list. A later push for the same
    /// instance replaces an earlier one that has not been run yet.
    fn push(&mut self, job: RenderJob);

    /// Starts rendering everything pushed since the last run.
    fn run(&mut self, flags: RunFlags) -> JobId;

    /// Returns `true` while the run has not finished.
    fn is_pending(&self, job: JobId) -> bool;

    /// Drops every pushed, queued, and running job along with any results
    /// not yet grabbed.
    fn cancel_all(&mut self);

    /// Takes the finished result of one output. Results can be grabbed at most
    /// once; `None` means the output is not (or never will be) ready.
    fn grab_result(&mut self, instance: InstanceId, output: &OutputId) -> Option<RawResult>;
}
