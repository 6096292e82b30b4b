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

//! Runtime scheduling budgets.
//!
//! A host can lower or raise how much work the scheduler does per tick
//! without reloading settings, e.g. when the editor loses focus or a bulk
//! rebuild starts.

/// Scheduling strategy presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyId {
    /// A quarter of the configured batch size (at least one).
    LowPower,
    /// The configured batch size.
    Balanced,
    /// Three times the configured batch size.
    HighPerformance,
    /// An explicit batch size, clamped to `1..=64`.
    Custom(u32),
}

const HIGH_PERFORMANCE_MULTIPLIER: usize = 3;
const LOW_POWER_DIVISOR: usize = 4;
const MAX_CUSTOM_BATCH: usize = 64;

impl StrategyId {
    /// Per-tick batch limit this strategy yields for a configured base.
    pub fn batch_limit(self, configured: usize) -> usize {
        let configured = configured.max(1);
        match self {
            StrategyId::LowPower => (configured / LOW_POWER_DIVISOR).max(1),
            StrategyId::Balanced => configured,
            StrategyId::HighPerformance => configured * HIGH_PERFORMANCE_MULTIPLIER,
            StrategyId::Custom(limit) => (limit as usize).clamp(1, MAX_CUSTOM_BATCH),
        }
    }
}

/// A budget issued to the render scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBudget {
    /// The strategy to apply.
    pub strategy_id: StrategyId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_limits_follow_strategy() {
        assert_eq!(StrategyId::Balanced.batch_limit(5), 5);
        assert_eq!(StrategyId::LowPower.batch_limit(5), 1);
        assert_eq!(StrategyId::LowPower.batch_limit(12), 3);
        assert_eq!(StrategyId::HighPerformance.batch_limit(5), 15);
        assert_eq!(StrategyId::Custom(0).batch_limit(5), 1);
        assert_eq!(StrategyId::Custom(1000).batch_limit(5), 64);
    }
}
