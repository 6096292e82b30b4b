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

//! Process-wide settings, loaded from a TOML file.
//!
//! ```toml
//! [backend]
//! cpu_cores_budget = 4
//! memory_budget_mb = 256
//!
//! [scheduler]
//! max_async_instances_per_tick = 5
//!
//! [cache]
//! enabled = true
//! directory = "target/tessera-cache"
//! max_size_mb = 128
//!
//! [assets.bricks]
//! cache_enabled = false
//! ```

use crate::backend::BackendBudget;
use crate::error::SettingsError;
use crate::graph::AssetId;
use crate::registry::{AssetPolicy, AssetTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Limits handed to the rendering backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Maximum cores the backend may use; `0` means all available.
    pub cpu_cores_budget: usize,
    /// Memory ceiling for one output, in megabytes.
    pub memory_budget_mb: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            cpu_cores_budget: 1,
            memory_budget_mb: 512,
        }
    }
}

/// Tick-loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Upper bound on instances drawn into one batch.
    pub max_async_instances_per_tick: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_async_instances_per_tick: 5,
        }
    }
}

/// Content cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Global switch; per-asset settings can only narrow it.
    pub enabled: bool,
    /// Directory holding cache entries.
    pub directory: PathBuf,
    /// Size above which the oldest entries are evicted, in megabytes.
    pub max_size_mb: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("tessera-cache"),
            max_size_mb: 256,
        }
    }
}

impl CacheSettings {
    /// The eviction threshold in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Per-asset overrides, keyed by package name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Whether results of this asset may be cached.
    pub cache_enabled: Option<bool>,
    /// Whether the asset is finalized.
    pub finalized: Option<bool>,
}

/// The root settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend limits.
    pub backend: BackendSettings,
    /// Scheduler limits.
    pub scheduler: SchedulerSettings,
    /// Cache configuration.
    pub cache: CacheSettings,
    /// Per-asset overrides.
    pub assets: BTreeMap<String, AssetSettings>,
}

impl Settings {
    /// Parses and validates settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Settings =
            toml::from_str(text).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses, and validates a settings file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&text)?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Rejects values the scheduler cannot work with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.scheduler.max_async_instances_per_tick == 0 {
            return Err(SettingsError::Invalid {
                key: "scheduler.max_async_instances_per_tick",
                reason: "must be at least 1".into(),
            });
        }
        if self.backend.memory_budget_mb == 0 {
            return Err(SettingsError::Invalid {
                key: "backend.memory_budget_mb",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// The budget handed to the backend.
    pub fn backend_budget(&self) -> BackendBudget {
        BackendBudget {
            cpu_cores: self.backend.cpu_cores_budget,
            memory_budget_mb: self.backend.memory_budget_mb,
        }
    }

    /// Builds the asset registry implied by the cache switch and the per-asset
    /// overrides. Assets not mentioned are finalized and follow the global
    /// cache switch.
    pub fn asset_table(&self) -> AssetTable {
        let default_policy = AssetPolicy {
            finalized: true,
            cache_enabled: self.cache.enabled,
        };
        let mut table = AssetTable::new(default_policy);
        for (name, overrides) in &self.assets {
            table.set_policy(
                AssetId::from_name(name),
                AssetPolicy {
                    finalized: overrides.finalized.unwrap_or(true),
                    cache_enabled: self.cache.enabled && overrides.cache_enabled.unwrap_or(true),
                },
            );
        }
        table
    }
}
