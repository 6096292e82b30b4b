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

use tessera_telemetry::{CounterHandle, GaugeHandle, MetricsRegistry, MetricsResult};

/// Handles to the scheduler metrics.
#[derive(Debug, Clone)]
pub struct RenderMetrics {
    renders_dispatched: CounterHandle,
    cache_hits: CounterHandle,
    cache_misses: CounterHandle,
    outputs_not_ready: CounterHandle,
    queue_depth: GaugeHandle,
}

impl RenderMetrics {
    /// Registers the scheduler metrics under the `scheduler` namespace.
    pub fn register(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            renders_dispatched: registry.register_counter(
                "scheduler",
                "renders_dispatched",
                "Instances pushed to the backend",
            )?,
            cache_hits: registry.register_counter(
                "scheduler",
                "cache_hits",
                "Instances restored from the content cache",
            )?,
            cache_misses: registry.register_counter(
                "scheduler",
                "cache_misses",
                "Instances rendered while caching was enabled",
            )?,
            outputs_not_ready: registry.register_counter(
                "scheduler",
                "outputs_not_ready",
                "Outputs the backend never produced",
            )?,
            queue_depth: registry.register_gauge(
                "scheduler",
                "queue_depth",
                "Instances waiting in either lane",
                "instances",
            )?,
        })
    }

    pub(crate) fn dispatched(&self, count: usize) {
        log_failure(self.renders_dispatched.increment_by(count as u64));
    }

    pub(crate) fn cache_hit(&self) {
        log_failure(self.cache_hits.increment());
    }

    pub(crate) fn cache_miss(&self) {
        log_failure(self.cache_misses.increment());
    }

    pub(crate) fn not_ready(&self) {
        log_failure(self.outputs_not_ready.increment());
    }

    pub(crate) fn queue_depth(&self, depth: usize) {
        log_failure(self.queue_depth.set(depth as f64));
    }
}

fn log_failure<T>(result: MetricsResult<T>) {
    if let Err(e) = result {
        log::warn!("Failed to record scheduler metric: {e}");
    }
}
