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

//! Registry for managing metrics.

use crate::metrics::{Metric, MetricId, MetricKind, MetricValue, MetricsError, MetricsResult};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

type Storage = Arc<RwLock<BTreeMap<MetricId, Metric>>>;

/// Central, thread-safe store of every metric.
///
/// Cloning the registry is cheap and shares the storage, so the scheduler and
/// the host can hold it at the same time.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    storage: Storage,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a counter starting at zero, or returns a handle to the
    /// existing counter with the same id.
    pub fn register_counter(
        &self,
        namespace: &str,
        name: &str,
        description: &str,
    ) -> MetricsResult<CounterHandle> {
        let id = self.register(namespace, name, description, "", MetricValue::Counter(0))?;
        Ok(CounterHandle {
            id,
            storage: self.storage.clone(),
        })
    }

    /// Registers a gauge starting at zero.
    pub fn register_gauge(
        &self,
        namespace: &str,
        name: &str,
        description: &str,
        unit: &str,
    ) -> MetricsResult<GaugeHandle> {
        let id = self.register(namespace, name, description, unit, MetricValue::Gauge(0.0))?;
        Ok(GaugeHandle {
            id,
            storage: self.storage.clone(),
        })
    }

    /// Registers a histogram with the given ascending bucket bounds.
    pub fn register_histogram(
        &self,
        namespace: &str,
        name: &str,
        description: &str,
        unit: &str,
        mut bucket_bounds: Vec<f64>,
    ) -> MetricsResult<HistogramHandle> {
        bucket_bounds.sort_by(f64::total_cmp);
        let bucket_counts = vec![0; bucket_bounds.len()];
        let value = MetricValue::Histogram {
            count: 0,
            sum: 0.0,
            bucket_bounds,
            bucket_counts,
        };
        let id = self.register(namespace, name, description, unit, value)?;
        Ok(HistogramHandle {
            id,
            storage: self.storage.clone(),
        })
    }

    /// Looks up a metric.
    pub fn get(&self, id: &MetricId) -> MetricsResult<Metric> {
        let storage = self.storage.read().map_err(|_| MetricsError::Poisoned)?;
        storage
            .get(id)
            .cloned()
            .ok_or_else(|| MetricsError::NotFound(id.clone()))
    }

    /// Every metric of a namespace, ordered by name.
    pub fn namespace(&self, namespace: &str) -> Vec<Metric> {
        self.snapshot()
            .into_iter()
            .filter(|metric| metric.id.namespace == namespace)
            .collect()
    }

    /// A copy of every metric, ordered by id.
    pub fn snapshot(&self) -> Vec<Metric> {
        match self.storage.read() {
            Ok(storage) => storage.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.storage.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(
        &self,
        namespace: &str,
        name: &str,
        description: &str,
        unit: &str,
        initial: MetricValue,
    ) -> MetricsResult<MetricId> {
        let id = MetricId::new(namespace, name);
        let mut storage = self.storage.write().map_err(|_| MetricsError::Poisoned)?;
        if let Some(existing) = storage.get(&id) {
            if existing.value.kind() != initial.kind() {
                return Err(MetricsError::TypeMismatch {
                    id,
                    expected: initial.kind(),
                    found: existing.value.kind(),
                });
            }
            return Ok(id);
        }
        storage.insert(
            id.clone(),
            Metric {
                id: id.clone(),
                description: description.to_owned(),
                unit: unit.to_owned(),
                value: initial,
            },
        );
        Ok(id)
    }
}

fn update<T>(
    storage: &Storage,
    id: &MetricId,
    expected: MetricKind,
    f: impl FnOnce(&mut MetricValue) -> Option<T>,
) -> MetricsResult<T> {
    let mut storage = storage.write().map_err(|_| MetricsError::Poisoned)?;
    let metric = storage
        .get_mut(id)
        .ok_or_else(|| MetricsError::NotFound(id.clone()))?;
    let found = metric.value.kind();
    f(&mut metric.value).ok_or_else(|| MetricsError::TypeMismatch {
        id: id.clone(),
        expected,
        found,
    })
}

/// Handle for counter updates.
#[derive(Debug, Clone)]
pub struct CounterHandle {
    id: MetricId,
    storage: Storage,
}

impl CounterHandle {
    /// Adds one. Returns the new total.
    pub fn increment(&self) -> MetricsResult<u64> {
        self.increment_by(1)
    }

    /// Adds `amount`. Returns the new total.
    pub fn increment_by(&self, amount: u64) -> MetricsResult<u64> {
        update(&self.storage, &self.id, MetricKind::Counter, |value| {
            match value {
                MetricValue::Counter(total) => {
                    *total = total.saturating_add(amount);
                    Some(*total)
                }
                _ => None,
            }
        })
    }

    /// Current total.
    pub fn get(&self) -> MetricsResult<u64> {
        update(&self.storage, &self.id, MetricKind::Counter, |value| {
            value.as_counter()
        })
    }

    /// The metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle for gauge updates.
#[derive(Debug, Clone)]
pub struct GaugeHandle {
    id: MetricId,
    storage: Storage,
}

impl GaugeHandle {
    /// Sets the gauge.
    pub fn set(&self, new_value: f64) -> MetricsResult<()> {
        update(&self.storage, &self.id, MetricKind::Gauge, |value| match value {
            MetricValue::Gauge(current) => {
                *current = new_value;
                Some(())
            }
            _ => None,
        })
    }

    /// Current value.
    pub fn get(&self) -> MetricsResult<f64> {
        update(&self.storage, &self.id, MetricKind::Gauge, |value| {
            value.as_gauge()
        })
    }

    /// The metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle for histogram samples.
#[derive(Debug, Clone)]
pub struct HistogramHandle {
    id: MetricId,
    storage: Storage,
}

impl HistogramHandle {
    /// Records one sample.
    pub fn observe(&self, sample: f64) -> MetricsResult<()> {
        update(&self.storage, &self.id, MetricKind::Histogram, |value| {
            match value {
                MetricValue::Histogram {
                    count,
                    sum,
                    bucket_bounds,
                    bucket_counts,
                } => {
                    *count += 1;
                    *sum += sample;
                    for (bound, bucket) in bucket_bounds.iter().zip(bucket_counts.iter_mut()) {
                        if sample <= *bound {
                            *bucket += 1;
                        }
                    }
                    Some(())
                }
                _ => None,
            }
        })
    }

    /// Current summary.
    pub fn get(&self) -> MetricsResult<MetricValue> {
        update(&self.storage, &self.id, MetricKind::Histogram, |value| {
            Some(value.clone())
        })
    }

    /// The metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}
