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

//! The content cache: rendered outputs persisted under their instance id so a
//! finalized, unchanged instance can be restored without running its
//! generator.

mod entry;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tessera_core::error::CacheError;
use tessera_core::registry::AssetRegistry;
use tessera_core::settings::CacheSettings;
use tessera_core::storage::BlobStore;
use tessera_core::{
    GraphInstance, InputValue, InstanceId, OutputId, OutputSlot, PixelFormat, RawResult,
};
use uuid::Uuid;

/// One output restored from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedOutput {
    /// The output the result belongs to.
    pub output: OutputId,
    /// The cached pixels.
    pub result: RawResult,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    size: u64,
    /// Monotonic write order, used to pick eviction victims.
    seq: u64,
}

/// Persists rendered outputs through a [`BlobStore`] and keeps an in-memory
/// index of what is stored.
///
/// Reads never mutate anything: every failure (missing blob, I/O error,
/// checksum, stale version) is reported as an error the caller treats as a
/// miss. Writes are atomic per entry and followed by size-bounded eviction of
/// the least recently written entries.
pub struct ContentCache {
    store: Option<Box<dyn BlobStore>>,
    enabled: bool,
    max_bytes: u64,
    index: HashMap<String, IndexEntry>,
    total_bytes: u64,
    next_seq: u64,
}

impl ContentCache {
    /// Opens a cache over `store`, indexing the entries it already holds.
    ///
    /// Only blobs named like entries (`<instance-uuid>/<output>`) are
    /// indexed; anything else in the store is never read, evicted, or
    /// cleared. A store that cannot be listed yields an empty index; the
    /// cache still works, it just starts cold.
    pub fn new(store: Box<dyn BlobStore>, settings: &CacheSettings) -> Self {
        let mut cache = Self {
            store: None,
            enabled: settings.enabled,
            max_bytes: settings.max_size_bytes(),
            index: HashMap::new(),
            total_bytes: 0,
            next_seq: 0,
        };
        match store.list() {
            Ok(blobs) => {
                for blob in blobs {
                    if is_entry_key(&blob.key) {
                        cache.insert_index(blob.key, blob.size);
                    } else {
                        log::trace!("Content cache ignores foreign blob {}", blob.key);
                    }
                }
            }
            Err(e) => log::warn!("Content cache starts empty, listing the store failed: {e}"),
        }
        log::debug!(
            "Content cache opened with {} entries ({} bytes)",
            cache.index.len(),
            cache.total_bytes
        );
        cache.store = Some(store);
        cache
    }

    /// Storage key of one output entry.
    ///
    /// Output ids are sanitized for the file system. Two ids that sanitize to
    /// the same key still never alias: the entry header names its output.
    pub fn entry_key(instance: InstanceId, output: &OutputId) -> String {
        let mut name: String = output
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if name.is_empty() || name.starts_with('.') {
            name.insert(0, '_');
        }
        format!("{instance}/{name}")
    }

    /// Returns `true` if every enabled output of `instance` may be restored
    /// from the cache instead of being rendered.
    ///
    /// That requires the cache to be open and enabled, the owning asset to be
    /// finalized with caching allowed, the instance not to have been
    /// invalidated since its last publish, and an entry for every enabled
    /// output.
    pub fn can_read(&self, instance: &GraphInstance, registry: &dyn AssetRegistry) -> bool {
        if self.store.is_none() || !self.enabled || !instance.is_cache_eligible() {
            return false;
        }
        let asset = instance.package().asset();
        if !registry.is_finalized(asset) || !registry.is_caching_enabled(asset) {
            return false;
        }
        let mut enabled = instance.enabled_outputs().peekable();
        enabled.peek().is_some()
            && enabled.all(|slot| {
                self.index
                    .contains_key(&Self::entry_key(instance.id(), slot.id()))
            })
    }

    /// Loads every enabled output of `instance`.
    ///
    /// All-or-nothing: the first output that cannot be restored fails the
    /// whole read.
    pub fn read(&self, instance: &GraphInstance) -> Result<Vec<CachedOutput>, CacheError> {
        let store = self.store.as_ref().ok_or(CacheError::ShutDown)?;
        if !self.enabled {
            return Err(CacheError::Disabled);
        }
        let version = instance.package().version;
        instance
            .enabled_outputs()
            .map(|slot| {
                let key = Self::entry_key(instance.id(), slot.id());
                let bytes = store.read(&key)?.ok_or_else(|| CacheError::Missing {
                    instance: instance.id(),
                    output: slot.id().clone(),
                })?;
                let digest = inputs_digest(instance, slot)?;
                let result = entry::decode(&bytes, slot.id(), version, &digest)?;
                if !matches_slot(&result, slot) {
                    return Err(CacheError::Incompatible(slot.id().clone()));
                }
                Ok(CachedOutput {
                    output: slot.id().clone(),
                    result,
                })
            })
            .collect()
    }

    /// Stores one output result, replacing any previous entry, then evicts
    /// old entries if the cache grew past its size limit.
    pub fn write(
        &mut self,
        instance: &GraphInstance,
        output: &OutputId,
        result: &RawResult,
        registry: &dyn AssetRegistry,
    ) -> Result<(), CacheError> {
        let store = self.store.as_mut().ok_or(CacheError::ShutDown)?;
        if !self.enabled || !registry.is_caching_enabled(instance.package().asset()) {
            return Err(CacheError::Disabled);
        }
        let slot = instance
            .output(output)
            .ok_or_else(|| CacheError::Incompatible(output.clone()))?;
        let digest = inputs_digest(instance, slot)?;
        let key = Self::entry_key(instance.id(), output);
        let bytes = entry::encode(output, instance.package().version, digest, result)?;
        store.write(&key, &bytes)?;
        log::trace!("Cached {key} ({} bytes)", bytes.len());

        self.insert_index(key.clone(), bytes.len() as u64);
        self.evict(&key);
        Ok(())
    }

    /// Returns `true` if an entry for this output is indexed.
    pub fn contains(&self, instance: InstanceId, output: &OutputId) -> bool {
        self.index.contains_key(&Self::entry_key(instance, output))
    }

    /// Deletes every entry of one instance. Returns how many were removed.
    pub fn remove_instance(&mut self, instance: InstanceId) -> Result<usize, CacheError> {
        let prefix = format!("{instance}/");
        let keys: Vec<String> = self
            .index
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect();
        self.remove_keys(keys)
    }

    /// Deletes every entry. Returns how many were removed.
    pub fn clear(&mut self) -> Result<usize, CacheError> {
        let keys: Vec<String> = self.index.keys().cloned().collect();
        let removed = self.remove_keys(keys)?;
        log::info!("Content cache cleared ({removed} entries)");
        Ok(removed)
    }

    /// Flushes and closes the underlying store. Idempotent; every later read
    /// or write fails with [`CacheError::ShutDown`].
    pub fn shutdown(&mut self) {
        if let Some(mut store) = self.store.take() {
            if let Err(e) = store.flush() {
                log::warn!("Content cache flush failed during shutdown: {e}");
            }
            store.close();
            log::debug!("Content cache shut down");
        }
    }

    /// Returns `false` once [`shutdown`](Self::shutdown) ran.
    pub fn is_open(&self) -> bool {
        self.store.is_some()
    }

    /// Whether caching is globally enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of indexed entries.
    pub fn entry_count(&self) -> usize {
        self.index.len()
    }

    /// Total stored size of indexed entries, in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn insert_index(&mut self, key: String, size: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(old) = self.index.insert(key, IndexEntry { size, seq }) {
            self.total_bytes -= old.size;
        }
        self.total_bytes += size;
    }

    fn forget(&mut self, key: &str) {
        if let Some(old) = self.index.remove(key) {
            self.total_bytes -= old.size;
        }
    }

    fn remove_keys(&mut self, keys: Vec<String>) -> Result<usize, CacheError> {
        let store = self.store.as_mut().ok_or(CacheError::ShutDown)?;
        let mut removed = 0;
        for key in keys {
            if store.remove(&key)? {
                removed += 1;
            }
            if let Some(old) = self.index.remove(&key) {
                self.total_bytes -= old.size;
            }
        }
        Ok(removed)
    }

    /// Evicts the oldest entries until the cache fits its limit. `keep` (the
    /// entry just written) is never evicted, even if it alone is too large.
    fn evict(&mut self, keep: &str) {
        while self.total_bytes > self.max_bytes {
            let victim = self
                .index
                .iter()
                .filter(|(key, _)| key.as_str() != keep)
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(key, _)| key.clone());
            let Some(victim) = victim else {
                break;
            };
            if let Some(store) = self.store.as_mut() {
                if let Err(e) = store.remove(&victim) {
                    log::warn!("Failed to evict cache entry {victim}: {e}");
                }
            }
            self.forget(&victim);
            log::debug!("Evicted cache entry {victim}");
        }
    }
}

/// What a rendered output depends on besides the generator version.
#[derive(Serialize)]
struct RenderInputs<'a> {
    generator: &'a str,
    inputs: BTreeMap<&'a str, &'a InputValue>,
    format: PixelFormat,
    mip_levels: u32,
}

/// BLAKE3 digest of everything that determines one output's pixels. Inputs
/// the output does not depend on are left out.
fn inputs_digest(instance: &GraphInstance, slot: &OutputSlot) -> Result<[u8; 32], CacheError> {
    let package = instance.package();
    let state = RenderInputs {
        generator: &package.generator,
        inputs: instance
            .inputs()
            .iter()
            .filter(|(name, _)| package.input_affects(name, slot.id()))
            .map(|(name, value)| (name.as_str(), value))
            .collect(),
        format: slot.format(),
        mip_levels: slot.desc().mip_levels,
    };
    let bytes = bincode::serde::encode_to_vec(&state, bincode::config::standard())
        .map_err(|e| CacheError::Codec(e.to_string()))?;
    Ok(*blake3::hash(&bytes).as_bytes())
}

/// Whether a store key has the `<instance-uuid>/<output>` shape of an entry.
fn is_entry_key(key: &str) -> bool {
    let mut segments = key.split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(instance), Some(output), None) => {
            !output.is_empty() && Uuid::parse_str(instance).is_ok()
        }
        _ => false,
    }
}

fn matches_slot(result: &RawResult, slot: &OutputSlot) -> bool {
    let desc = slot.desc();
    result.format == slot.format()
        && result.width == desc.width
        && result.height == desc.height
        && result.mip_count == desc.mip_levels.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use std::sync::Arc;
    use tessera_core::registry::AssetTable;
    use tessera_core::{OutputDesc, PackageDescriptor, PixelFormat};

    fn instance(size: u32) -> GraphInstance {
        GraphInstance::new(Arc::new(PackageDescriptor {
            name: "tiles".into(),
            generator: "checker".into(),
            version: 1,
            inputs: vec![],
            outputs: vec![OutputDesc {
                id: OutputId::new("mask"),
                width: size,
                height: size,
                format: PixelFormat::R8,
                mip_levels: 1,
            }],
        }))
    }

    fn result(size: u32) -> RawResult {
        RawResult {
            format: PixelFormat::R8,
            width: size,
            height: size,
            mip_count: 1,
            data: (0..size * size).map(|i| (i * 7 % 251) as u8).collect(),
        }
    }

    fn settings(max_size_mb: u64) -> CacheSettings {
        CacheSettings {
            max_size_mb,
            ..CacheSettings::default()
        }
    }

    #[test]
    fn entry_key_is_filesystem_safe() {
        let id = InstanceId::new_v5("x");
        let key = ContentCache::entry_key(id, &OutputId::new("base color/../x"));
        assert_eq!(key, format!("{id}/base_color_.._x"));
        let hidden = ContentCache::entry_key(id, &OutputId::new(".hidden"));
        assert_eq!(hidden, format!("{id}/_.hidden"));
    }

    #[test]
    fn only_entry_shaped_keys_are_entries() {
        let id = InstanceId::new_v5("x");
        assert!(is_entry_key(&format!("{id}/base_color")));
        assert!(!is_entry_key("Cargo.toml"));
        assert!(!is_entry_key("src/main.rs"));
        assert!(!is_entry_key(&format!("{id}/nested/file")));
        assert!(!is_entry_key(&format!("{id}/")));
    }

    #[test]
    fn evicts_oldest_entries_but_never_the_new_one() {
        // A zero limit forces eviction on every write.
        let mut cache = ContentCache::new(Box::new(MemoryBlobStore::new()), &settings(0));
        let registry = AssetTable::default();
        let (a, b) = (instance(4), instance(4));
        let mask = OutputId::new("mask");

        cache.write(&a, &mask, &result(4), &registry).unwrap();
        assert_eq!(cache.entry_count(), 1);
        cache.write(&b, &mask, &result(4), &registry).unwrap();
        assert_eq!(cache.entry_count(), 1);
        assert!(!cache.contains(a.id(), &mask));
        assert!(cache.contains(b.id(), &mask));
    }

    #[test]
    fn rewriting_an_entry_does_not_double_count() {
        let mut cache = ContentCache::new(Box::new(MemoryBlobStore::new()), &settings(8));
        let registry = AssetTable::default();
        let a = instance(4);
        let mask = OutputId::new("mask");
        cache.write(&a, &mask, &result(4), &registry).unwrap();
        let once = cache.total_bytes();
        cache.write(&a, &mask, &result(4), &registry).unwrap();
        assert_eq!(cache.total_bytes(), once);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn write_failure_leaves_index_untouched() {
        let mut store = MemoryBlobStore::new();
        store.set_read_only(true);
        let mut cache = ContentCache::new(Box::new(store), &settings(8));
        let a = instance(4);
        let err = cache
            .write(&a, &OutputId::new("mask"), &result(4), &AssetTable::default())
            .unwrap_err();
        assert!(matches!(err, CacheError::Store(_)));
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn shutdown_is_idempotent_and_blocks_access() {
        let mut cache = ContentCache::new(Box::new(MemoryBlobStore::new()), &settings(8));
        let a = instance(4);
        cache.shutdown();
        cache.shutdown();
        assert!(!cache.is_open());
        assert!(!cache.can_read(&a, &AssetTable::default()));
        assert!(matches!(cache.read(&a), Err(CacheError::ShutDown)));
    }
}
