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

use super::convert::{shape_result, to_upload};
use tessera_core::error::PublishError;
use tessera_core::registry::AssetRegistry;
use tessera_core::{GraphInstance, OutputId, RawResult};
use tessera_io::ContentCache;
use tessera_telemetry::{
    CounterHandle, HistogramHandle, MetricsRegistry, MetricsResult, ScopedMetricTimer,
};

/// Handles to the publisher's metrics.
#[derive(Debug, Clone)]
pub struct PublishMetrics {
    published: CounterHandle,
    failures: CounterHandle,
    publish_time: HistogramHandle,
}

impl PublishMetrics {
    /// Registers the publisher metrics under the `publisher` namespace.
    pub fn register(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            published: registry.register_counter(
                "publisher",
                "outputs_published",
                "Outputs handed to their consumer resource",
            )?,
            failures: registry.register_counter(
                "publisher",
                "publish_failures",
                "Publishes rejected (dead target, disabled output, malformed result)",
            )?,
            publish_time: registry.register_histogram(
                "publisher",
                "publish_time",
                "Time spent shaping and uploading one output",
                "ms",
                vec![0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0],
            )?,
        })
    }
}

/// Moves rendered outputs into the resources that consume them.
///
/// Publishing reshapes the raw result into the slot's format and mip count,
/// refreshes the bound resource, optionally writes the shaped result to the
/// content cache, and only then clears the output's dirty flag. A publish
/// that fails leaves the instance untouched.
#[derive(Debug, Default)]
pub struct ResultPublisher {
    metrics: Option<PublishMetrics>,
}

impl ResultPublisher {
    /// Creates a publisher without metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a publisher that records into `metrics`.
    pub fn with_metrics(metrics: PublishMetrics) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }

    /// Publishes one output of `instance`.
    ///
    /// With `should_cache` the shaped result is also written to `cache` when
    /// the owning asset allows caching. A failed cache write is logged and
    /// does not fail the publish.
    pub fn publish(
        &self,
        instance: &mut GraphInstance,
        output: &OutputId,
        raw: &RawResult,
        should_cache: bool,
        cache: &mut ContentCache,
        registry: &mut dyn AssetRegistry,
    ) -> Result<(), PublishError> {
        let _timer = self
            .metrics
            .as_ref()
            .map(|m| ScopedMetricTimer::new(&m.publish_time));

        let result = self.publish_inner(instance, output, raw, should_cache, cache, registry);
        if let Some(metrics) = &self.metrics {
            let counter = if result.is_ok() {
                &metrics.published
            } else {
                &metrics.failures
            };
            if let Err(e) = counter.increment() {
                log::warn!("Failed to record publish metric: {e}");
            }
        }
        result
    }

    fn publish_inner(
        &self,
        instance: &mut GraphInstance,
        output: &OutputId,
        raw: &RawResult,
        should_cache: bool,
        cache: &mut ContentCache,
        registry: &mut dyn AssetRegistry,
    ) -> Result<(), PublishError> {
        let slot = instance
            .output(output)
            .ok_or_else(|| PublishError::UnknownOutput {
                instance: instance.id(),
                output: output.clone(),
            })?;
        if !slot.is_enabled() {
            return Err(PublishError::Disabled(output.clone()));
        }
        let desc = slot.desc();
        if !raw.is_well_formed() || raw.width != desc.width || raw.height != desc.height {
            return Err(PublishError::MalformedResult(output.clone()));
        }
        let resource = slot
            .resource()
            .ok_or_else(|| PublishError::InvalidTarget(output.clone()))?;

        let shaped = shape_result(raw, slot.format(), desc.mip_levels);
        {
            let Ok(mut target) = resource.lock() else {
                return Err(PublishError::InvalidTarget(output.clone()));
            };
            if !target.is_alive() {
                return Err(PublishError::InvalidTarget(output.clone()));
            }
            target.refresh(&to_upload(&shaped));
        }

        let asset = instance.package().asset();
        if should_cache && cache.is_enabled() && registry.is_caching_enabled(asset) {
            if let Err(e) = cache.write(instance, output, &shaped, &*registry) {
                log::warn!(
                    "Skipping cache write for {}/{output}: {e}",
                    instance.id()
                );
            }
        }

        if let Some(slot) = instance.output_mut(output) {
            slot.set_dirty(false);
        }
        if !instance.needs_render() {
            instance.restore_cache_eligibility();
        }
        registry.mark_modified(asset);
        log::debug!("Published {}/{output}", instance.id());
        Ok(())
    }
}
