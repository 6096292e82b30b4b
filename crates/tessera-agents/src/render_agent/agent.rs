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

//! The asynchronous render coordinator.

use super::metrics::RenderMetrics;
use std::collections::HashMap;
use tessera_core::backend::{JobId, RenderBackend, RenderJob, RunFlags};
use tessera_core::budget::{ResourceBudget, StrategyId};
use tessera_core::registry::AssetRegistry;
use tessera_core::{GraphInstance, InstanceId, OutputId};
use tessera_data::{InstanceKey, InstanceStore, RenderRequestQueue};
use tessera_io::ContentCache;
use tessera_lanes::ResultPublisher;

/// Everything the agent operates on during a tick, borrowed from its owner.
pub struct RenderContext<'a> {
    /// Live instances.
    pub instances: &'a mut InstanceStore,
    /// Pending and in-flight render requests.
    pub queue: &'a mut RenderRequestQueue<InstanceKey>,
    /// Durable output cache.
    pub cache: &'a mut ContentCache,
    /// Host asset database.
    pub registry: &'a mut dyn AssetRegistry,
    /// The rendering engine.
    pub backend: &'a mut dyn RenderBackend,
}

/// Observable phase of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    /// No batch outstanding; the next tick may draw one.
    Idle,
    /// A batch was pushed to the backend but not run yet.
    BatchPushed,
    /// A run is executing; the agent polls it once per tick.
    Running,
}

/// One instance of a pushed batch, as it was when pushed.
#[derive(Debug, Clone)]
struct BatchEntry {
    key: InstanceKey,
    id: InstanceId,
    revision: u64,
    outputs: Vec<OutputId>,
}

#[derive(Debug)]
enum State {
    Idle,
    BatchPushed(Vec<BatchEntry>),
    Running(JobId),
}

/// What one tick (or one synchronous render) did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Instances drawn from the queue.
    pub drawn: usize,
    /// Instances restored from the content cache instead of rendered.
    pub restored_from_cache: usize,
    /// Instances pushed to the backend.
    pub dispatched: usize,
    /// Outputs published successfully.
    pub published: usize,
    /// Outputs whose publish was rejected.
    pub publish_failures: usize,
    /// Outputs the backend did not produce.
    pub not_ready: usize,
    /// Whether a running batch finished during this tick.
    pub completed_batch: bool,
}

/// A snapshot of the agent's health, for hosts and tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStatus {
    /// Current phase.
    pub phase: RenderPhase,
    /// Strategy in effect.
    pub current_strategy: StrategyId,
    /// Per-tick batch limit derived from the strategy.
    pub batch_limit: usize,
    /// Instances waiting in either lane at the end of the last tick.
    pub pending: usize,
    /// Instances in flight at the end of the last tick.
    pub in_flight: usize,
    /// Requests waiting for an in-flight render.
    pub deferred: usize,
    /// 1.0 when nothing is waiting, lower as the backlog grows.
    pub health_score: f32,
    /// Human-readable summary.
    pub message: String,
}

/// The agent that schedules asynchronous renders.
///
/// State machine: `Idle → BatchPushed → Running → Idle`. At most one backend
/// run is outstanding, so a batch is always fully published before the next
/// one is pushed.
pub struct RenderAgent {
    state: State,
    batches: HashMap<JobId, Vec<BatchEntry>>,
    publisher: ResultPublisher,
    metrics: Option<RenderMetrics>,
    configured_batch: usize,
    current_strategy: StrategyId,
    batch_limit: usize,
    last_pending: usize,
    last_in_flight: usize,
    last_deferred: usize,
    tick_count: u64,
}

impl RenderAgent {
    /// Creates an idle agent drawing at most `max_instances_per_tick`
    /// instances per batch under the balanced strategy.
    pub fn new(max_instances_per_tick: usize, publisher: ResultPublisher) -> Self {
        let configured_batch = max_instances_per_tick.max(1);
        Self {
            state: State::Idle,
            batches: HashMap::new(),
            publisher,
            metrics: None,
            configured_batch,
            current_strategy: StrategyId::Balanced,
            batch_limit: StrategyId::Balanced.batch_limit(configured_batch),
            last_pending: 0,
            last_in_flight: 0,
            last_deferred: 0,
            tick_count: 0,
        }
    }

    /// Attaches scheduler metrics.
    pub fn with_metrics(mut self, metrics: RenderMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The current phase.
    pub fn phase(&self) -> RenderPhase {
        match self.state {
            State::Idle => RenderPhase::Idle,
            State::BatchPushed(_) => RenderPhase::BatchPushed,
            State::Running(_) => RenderPhase::Running,
        }
    }

    /// The outstanding backend run, if any.
    pub fn running_job(&self) -> Option<JobId> {
        match self.state {
            State::Running(job) => Some(job),
            _ => None,
        }
    }

    /// Current per-tick batch limit.
    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Returns the current strategy.
    pub fn current_strategy(&self) -> StrategyId {
        self.current_strategy
    }

    /// Number of ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Switches strategy and recomputes the batch limit.
    pub fn apply_budget(&mut self, budget: ResourceBudget) {
        log::info!("RenderAgent: Strategy update to {:?}", budget.strategy_id);
        self.current_strategy = budget.strategy_id;
        self.batch_limit = budget.strategy_id.batch_limit(self.configured_batch);
    }

    /// Advances the state machine by one step. Never blocks.
    ///
    /// A running batch is polled once; if it finished, its results are
    /// published and, in the same tick, the next batch may be drawn. A new
    /// batch is run right after it is pushed but not polled until the next
    /// tick.
    pub fn tick(&mut self, ctx: &mut RenderContext<'_>) -> TickReport {
        let mut report = TickReport::default();

        if let State::Running(job) = self.state {
            if ctx.backend.is_pending(job) {
                log::trace!("RenderAgent: {job} still pending");
            } else {
                self.state = State::Idle;
                self.complete(job, ctx, &mut report);
            }
        }

        if matches!(self.state, State::Idle) {
            self.dispatch(ctx, &mut report);
        }

        if matches!(self.state, State::BatchPushed(_)) {
            self.start_run(ctx);
        }

        self.observe_queue(ctx.queue);
        self.tick_count += 1;
        report
    }

    /// Drops every pending, deferred, and in-flight request and tells the
    /// backend to abandon its work. Abandoned instances are never published.
    pub fn cancel_all(&mut self, ctx: &mut RenderContext<'_>) {
        let abandoned: usize = self.batches.values().map(Vec::len).sum();
        ctx.backend.cancel_all();
        self.batches.clear();
        self.state = State::Idle;
        ctx.queue.clear();
        self.observe_queue(ctx.queue);
        log::info!("RenderAgent: Cancelled all work ({abandoned} in-flight instance(s) abandoned)");
    }

    /// Renders `keys` to completion, blocking on the backend, then publishes
    /// their outputs in order.
    ///
    /// Pending requests for these instances are consumed. Instances already
    /// in flight are skipped; the running batch will publish them.
    pub fn render_sync(
        &mut self,
        ctx: &mut RenderContext<'_>,
        keys: &[InstanceKey],
    ) -> TickReport {
        let mut report = TickReport::default();
        let mut pushed = Vec::new();

        for &key in keys {
            if ctx.queue.is_in_flight(key) {
                log::warn!("RenderAgent: Skipping synchronous render of an in-flight instance");
                continue;
            }
            ctx.queue.remove(key);
            let Some(instance) = ctx.instances.get_mut(key) else {
                continue;
            };
            report.drawn += 1;
            if !instance.needs_render() {
                continue;
            }
            if restore_from_cache(&self.publisher, instance, ctx.cache, ctx.registry, &mut report)
            {
                self.record(|m| m.cache_hit());
                continue;
            }
            pushed.push(self.push(key, instance, ctx.cache, ctx.backend));
        }

        if pushed.is_empty() {
            return report;
        }
        report.dispatched = pushed.len();
        self.record(|m| m.dispatched(pushed.len()));

        let job = ctx.backend.run(RunFlags::RUN_FIRST);
        log::debug!(
            "RenderAgent: Synchronous {job} finished ({} instance(s))",
            pushed.len()
        );
        self.publish_entries(&pushed, ctx, &mut report);
        report
    }

    /// Summarizes the agent's state as of the last tick.
    pub fn report_status(&self) -> AgentStatus {
        let waiting = self.last_pending + self.last_deferred;
        let health_score = if waiting == 0 {
            1.0
        } else if waiting < 4 * self.batch_limit {
            0.8
        } else if waiting < 16 * self.batch_limit {
            0.5
        } else {
            0.2
        };

        AgentStatus {
            phase: self.phase(),
            current_strategy: self.current_strategy,
            batch_limit: self.batch_limit,
            pending: self.last_pending,
            in_flight: self.last_in_flight,
            deferred: self.last_deferred,
            health_score,
            message: format!(
                "phase={:?} pending={} in_flight={} deferred={} ticks={}",
                self.phase(),
                self.last_pending,
                self.last_in_flight,
                self.last_deferred,
                self.tick_count,
            ),
        }
    }

    fn dispatch(&mut self, ctx: &mut RenderContext<'_>, report: &mut TickReport) {
        if ctx.queue.is_empty() {
            return;
        }
        let keys = ctx.queue.draw_batch(self.batch_limit);
        report.drawn = keys.len();

        let mut settled = Vec::new();
        let mut pushed = Vec::new();
        for key in keys {
            let Some(instance) = ctx.instances.get_mut(key) else {
                settled.push(key);
                continue;
            };
            if !instance.needs_render() {
                settled.push(key);
                continue;
            }
            if restore_from_cache(&self.publisher, instance, ctx.cache, ctx.registry, report) {
                self.record(|m| m.cache_hit());
                settled.push(key);
                continue;
            }
            pushed.push(self.push(key, instance, ctx.cache, ctx.backend));
        }
        ctx.queue.complete_batch(&settled);

        if !pushed.is_empty() {
            report.dispatched = pushed.len();
            self.record(|m| m.dispatched(pushed.len()));
            log::debug!("RenderAgent: Pushed a batch of {} instance(s)", pushed.len());
            self.state = State::BatchPushed(pushed);
        }
    }

    fn push(
        &self,
        key: InstanceKey,
        instance: &GraphInstance,
        cache: &ContentCache,
        backend: &mut dyn RenderBackend,
    ) -> BatchEntry {
        if cache.is_enabled() {
            self.record(|m| m.cache_miss());
        }
        let job = RenderJob::from_instance(instance);
        let entry = BatchEntry {
            key,
            id: job.instance,
            revision: job.revision,
            outputs: job.outputs.iter().map(|output| output.id.clone()).collect(),
        };
        backend.push(job);
        entry
    }

    fn start_run(&mut self, ctx: &mut RenderContext<'_>) {
        let State::BatchPushed(batch) = std::mem::replace(&mut self.state, State::Idle) else {
            return;
        };
        let job = ctx.backend.run(RunFlags::SCHEDULED);
        log::debug!("RenderAgent: Started {job}");
        self.batches.insert(job, batch);
        self.state = State::Running(job);
    }

    fn complete(&mut self, job: JobId, ctx: &mut RenderContext<'_>, report: &mut TickReport) {
        let Some(batch) = self.batches.remove(&job) else {
            return;
        };
        report.completed_batch = true;
        log::debug!("RenderAgent: {job} completed ({} instance(s))", batch.len());
        self.publish_entries(&batch, ctx, report);
        let keys: Vec<InstanceKey> = batch.iter().map(|entry| entry.key).collect();
        ctx.queue.complete_batch(&keys);
    }

    /// Grabs and publishes every output of a finished batch.
    ///
    /// An instance whose inputs changed after it was pushed still gets the
    /// finished result published, but its dirty flags and cache
    /// invalidation are kept so the follow-up render is not skipped.
    fn publish_entries(
        &self,
        entries: &[BatchEntry],
        ctx: &mut RenderContext<'_>,
        report: &mut TickReport,
    ) {
        for entry in entries {
            let instance = ctx
                .instances
                .get_mut(entry.key)
                .filter(|instance| instance.id() == entry.id);
            let Some(instance) = instance else {
                // Results nobody will publish must still leave the backend,
                // or a recreated instance with the same id could grab them.
                for output in &entry.outputs {
                    ctx.backend.grab_result(entry.id, output);
                }
                log::debug!("RenderAgent: {} was deleted while rendering", entry.id);
                continue;
            };
            let stale = instance.revision() != entry.revision;
            let still_dirty: Vec<OutputId> = if stale {
                instance
                    .enabled_outputs()
                    .filter(|slot| slot.is_dirty())
                    .map(|slot| slot.id().clone())
                    .collect()
            } else {
                Vec::new()
            };

            for output in &entry.outputs {
                let Some(raw) = ctx.backend.grab_result(entry.id, output) else {
                    report.not_ready += 1;
                    self.record(|m| m.not_ready());
                    log::debug!("RenderAgent: {}/{output} was not produced", entry.id);
                    continue;
                };
                match self
                    .publisher
                    .publish(instance, output, &raw, !stale, ctx.cache, ctx.registry)
                {
                    Ok(()) => report.published += 1,
                    Err(e) => {
                        report.publish_failures += 1;
                        log::warn!("RenderAgent: Failed to publish {}/{output}: {e}", entry.id);
                    }
                }
            }

            if stale {
                for output in &still_dirty {
                    if let Some(slot) = instance.output_mut(output) {
                        slot.set_dirty(true);
                    }
                }
                instance.revoke_cache_eligibility();
                log::debug!(
                    "RenderAgent: Inputs of {} changed during its render, keeping it dirty",
                    entry.id
                );
            }
        }
    }

    fn observe_queue(&mut self, queue: &RenderRequestQueue<InstanceKey>) {
        self.last_pending = queue.pending_len();
        self.last_in_flight = queue.in_flight_len();
        self.last_deferred = queue.deferred_len();
        self.record(|m| m.queue_depth(queue.pending_len()));
    }

    fn record(&self, f: impl FnOnce(&RenderMetrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

/// Publishes every enabled output of `instance` from the cache, if the cache
/// may serve it. Returns `false` on a miss, leaving the instance untouched.
fn restore_from_cache(
    publisher: &ResultPublisher,
    instance: &mut GraphInstance,
    cache: &mut ContentCache,
    registry: &mut dyn AssetRegistry,
    report: &mut TickReport,
) -> bool {
    if !cache.can_read(instance, &*registry) {
        return false;
    }
    let outputs = match cache.read(instance) {
        Ok(outputs) => outputs,
        Err(e) => {
            log::debug!("RenderAgent: Cache miss for {}: {e}", instance.id());
            return false;
        }
    };
    for cached in outputs {
        match publisher.publish(instance, &cached.output, &cached.result, false, cache, registry) {
            Ok(()) => report.published += 1,
            Err(e) => {
                report.publish_failures += 1;
                log::warn!(
                    "RenderAgent: Failed to publish cached {}/{}: {e}",
                    instance.id(),
                    cached.output
                );
            }
        }
    }
    report.restored_from_cache += 1;
    log::debug!("RenderAgent: Restored {} from cache", instance.id());
    true
}
