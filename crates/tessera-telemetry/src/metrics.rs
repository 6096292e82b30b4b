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

//! Metric identifiers and values.

use std::fmt;
use thiserror::Error;

/// Identifies a metric by namespace and name, e.g. `scheduler:cache_hits`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId {
    /// Broad category (`"scheduler"`, `"publisher"`).
    pub namespace: String,
    /// Metric name within the namespace.
    pub name: String,
}

impl MetricId {
    /// Creates an id.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// The kind of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonic count.
    Counter,
    /// Value that goes up and down.
    Gauge,
    /// Distribution of samples.
    Histogram,
}

/// Current value of a metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Counter total.
    Counter(u64),
    /// Last gauge value.
    Gauge(f64),
    /// Histogram summary. Samples are folded into the buckets, not kept.
    Histogram {
        /// Number of samples.
        count: u64,
        /// Sum of every sample.
        sum: f64,
        /// Upper bounds of the buckets, ascending.
        bucket_bounds: Vec<f64>,
        /// Samples at or below each bound (cumulative).
        bucket_counts: Vec<u64>,
    },
}

impl MetricValue {
    /// The kind of this value.
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Histogram { .. } => MetricKind::Histogram,
        }
    }

    /// Counter total, if this is a counter.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            MetricValue::Counter(v) => Some(*v),
            _ => None,
        }
    }

    /// Gauge value, if this is a gauge.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            MetricValue::Gauge(v) => Some(*v),
            _ => None,
        }
    }

    /// Mean of the recorded samples, if this is a non-empty histogram.
    pub fn mean(&self) -> Option<f64> {
        match self {
            MetricValue::Histogram { count, sum, .. } if *count > 0 => Some(sum / *count as f64),
            _ => None,
        }
    }
}

/// A registered metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Identifier.
    pub id: MetricId,
    /// Human-readable description.
    pub description: String,
    /// Unit of gauge and histogram values (`"ms"`, `"instances"`).
    pub unit: String,
    /// Current value.
    pub value: MetricValue,
}

/// Failure of a metrics operation.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// No metric with this id.
    #[error("metric {0} is not registered")]
    NotFound(MetricId),
    /// The metric exists with another kind.
    #[error("metric {id} is a {found:?}, not a {expected:?}")]
    TypeMismatch {
        /// Offending id.
        id: MetricId,
        /// Kind the operation needs.
        expected: MetricKind,
        /// Kind actually registered.
        found: MetricKind,
    },
    /// A thread panicked while holding the registry lock.
    #[error("metrics storage lock is poisoned")]
    Poisoned,
}

/// Result alias for metric operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_id_display() {
        assert_eq!(
            MetricId::new("scheduler", "cache_hits").to_string(),
            "scheduler:cache_hits"
        );
    }

    #[test]
    fn histogram_mean() {
        let value = MetricValue::Histogram {
            count: 4,
            sum: 10.0,
            bucket_bounds: vec![],
            bucket_counts: vec![],
        };
        assert_eq!(value.mean(), Some(2.5));
        assert_eq!(MetricValue::Counter(3).mean(), None);
    }
}
