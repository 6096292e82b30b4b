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

//! The host asset registry as seen by the cache and the publisher.

use crate::graph::AssetId;
use std::collections::{HashMap, HashSet};

/// Queries the host's asset database answers for the cache layer.
pub trait AssetRegistry: Send {
    /// Returns `true` once the asset is finalized ("cooked") and its cached
    /// results may be trusted.
    fn is_finalized(&self, asset: AssetId) -> bool;

    /// Returns `true` if results for this asset may be written to and read from
    /// the content cache.
    fn is_caching_enabled(&self, asset: AssetId) -> bool;

    /// Flags the asset as modified so the host persistence layer saves it.
    fn mark_modified(&mut self, asset: AssetId);
}

/// Per-asset policy stored in an [`AssetTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetPolicy {
    /// See [`AssetRegistry::is_finalized`].
    pub finalized: bool,
    /// See [`AssetRegistry::is_caching_enabled`].
    pub cache_enabled: bool,
}

/// An in-memory asset registry with a default policy and per-asset overrides.
#[derive(Debug, Clone)]
pub struct AssetTable {
    default_policy: AssetPolicy,
    overrides: HashMap<AssetId, AssetPolicy>,
    modified: HashSet<AssetId>,
}

impl AssetTable {
    /// Creates a table where every asset follows `default_policy` unless overridden.
    pub fn new(default_policy: AssetPolicy) -> Self {
        Self {
            default_policy,
            overrides: HashMap::new(),
            modified: HashSet::new(),
        }
    }

    /// Overrides the policy of one asset.
    pub fn set_policy(&mut self, asset: AssetId, policy: AssetPolicy) {
        self.overrides.insert(asset, policy);
    }

    /// Effective policy of an asset.
    pub fn policy(&self, asset: AssetId) -> AssetPolicy {
        self.overrides
            .get(&asset)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Returns `true` if the asset was marked modified since the last
    /// [`take_modified`](Self::take_modified).
    pub fn is_modified(&self, asset: AssetId) -> bool {
        self.modified.contains(&asset)
    }

    /// Drains the set of modified assets.
    pub fn take_modified(&mut self) -> Vec<AssetId> {
        self.modified.drain().collect()
    }
}

impl Default for AssetTable {
    fn default() -> Self {
        Self::new(AssetPolicy {
            finalized: true,
            cache_enabled: true,
        })
    }
}

impl AssetRegistry for AssetTable {
    fn is_finalized(&self, asset: AssetId) -> bool {
        self.policy(asset).finalized
    }

    fn is_caching_enabled(&self, asset: AssetId) -> bool {
        self.policy(asset).cache_enabled
    }

    fn mark_modified(&mut self, asset: AssetId) {
        self.modified.insert(asset);
    }
}
