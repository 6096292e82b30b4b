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

//! Typed handle table for graph instances.
//!
//! Instances are addressed inside the scheduler by a generational
//! [`InstanceKey`]. A key whose instance has been removed simply fails to
//! resolve, so stale references held by the queue or by a running job are
//! detected instead of dereferenced.

use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;
use tessera_core::{GraphInstance, InstanceId};

new_key_type! {
    /// Generational handle to an instance in an [`InstanceStore`].
    pub struct InstanceKey;
}

/// Owns every live graph instance.
#[derive(Default)]
pub struct InstanceStore {
    instances: SlotMap<InstanceKey, GraphInstance>,
    by_id: HashMap<InstanceId, InstanceKey>,
}

impl InstanceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an instance and returns its key.
    ///
    /// Inserting an instance whose id is already present replaces the old
    /// instance in place and returns the existing key.
    pub fn insert(&mut self, instance: GraphInstance) -> InstanceKey {
        if let Some(&key) = self.by_id.get(&instance.id()) {
            if let Some(slot) = self.instances.get_mut(key) {
                *slot = instance;
                return key;
            }
        }
        let id = instance.id();
        let key = self.instances.insert(instance);
        self.by_id.insert(id, key);
        key
    }

    /// Removes an instance. Its key becomes permanently invalid.
    pub fn remove(&mut self, key: InstanceKey) -> Option<GraphInstance> {
        let instance = self.instances.remove(key)?;
        self.by_id.remove(&instance.id());
        Some(instance)
    }

    /// Resolves a key.
    pub fn get(&self, key: InstanceKey) -> Option<&GraphInstance> {
        self.instances.get(key)
    }

    /// Resolves a key mutably.
    pub fn get_mut(&mut self, key: InstanceKey) -> Option<&mut GraphInstance> {
        self.instances.get_mut(key)
    }

    /// Finds the key of an instance by its persistent id.
    pub fn key_of(&self, id: InstanceId) -> Option<InstanceKey> {
        self.by_id.get(&id).copied()
    }

    /// Returns `true` if the key still resolves.
    pub fn contains(&self, key: InstanceKey) -> bool {
        self.instances.contains_key(key)
    }

    /// Iterates over all instances.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceKey, &GraphInstance)> {
        self.instances.iter()
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if the store holds no instance.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
