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

use anyhow::Result;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;
use tessera_core::error::CacheError;
use tessera_core::registry::{AssetPolicy, AssetTable};
use tessera_core::settings::CacheSettings;
use tessera_core::{
    GraphInstance, InputDesc, InputValue, InstanceId, OutputDesc, OutputId, PackageDescriptor,
    PixelFormat, RawResult,
};
use tessera_io::{ContentCache, FsBlobStore};

// --- Test Setup: a two-output package and matching results ---
fn package(version: u32) -> Arc<PackageDescriptor> {
    Arc::new(PackageDescriptor {
        name: "bricks".into(),
        generator: "checker".into(),
        version,
        inputs: vec![InputDesc {
            id: "mortar".into(),
            default: InputValue::Float(0.1),
            affects: vec![],
        }],
        outputs: vec![
            OutputDesc {
                id: OutputId::new("base_color"),
                width: 8,
                height: 8,
                format: PixelFormat::Rgba8,
                mip_levels: 4,
            },
            OutputDesc {
                id: OutputId::new("height"),
                width: 8,
                height: 8,
                format: PixelFormat::R8,
                mip_levels: 1,
            },
        ],
    })
}

fn result_for(instance: &GraphInstance, output: &str) -> RawResult {
    let desc = instance.package().output(&OutputId::new(output)).unwrap();
    let len = tessera_core::pixel::mip_chain_len(desc.format, desc.width, desc.height, desc.mip_levels);
    RawResult {
        format: desc.format,
        width: desc.width,
        height: desc.height,
        mip_count: desc.mip_levels,
        data: (0..len).map(|i| (i * 31 % 256) as u8).collect(),
    }
}

fn open_cache(dir: &std::path::Path) -> Result<ContentCache> {
    let store = FsBlobStore::open(dir)?;
    Ok(ContentCache::new(Box::new(store), &CacheSettings::default()))
}

fn write_all(cache: &mut ContentCache, instance: &GraphInstance, registry: &AssetTable) -> Result<()> {
    for output in ["base_color", "height"] {
        let raw = result_for(instance, output);
        cache.write(instance, &OutputId::new(output), &raw, registry)?;
    }
    Ok(())
}
// ---

#[test]
fn test_write_then_read_round_trips_bit_for_bit() -> Result<()> {
    let dir = tempdir()?;
    let mut cache = open_cache(dir.path())?;
    let registry = AssetTable::default();
    let instance = GraphInstance::new(package(1));

    assert!(!cache.can_read(&instance, &registry));
    write_all(&mut cache, &instance, &registry)?;
    assert!(cache.can_read(&instance, &registry));

    let restored = cache.read(&instance)?;
    assert_eq!(restored.len(), 2);
    assert_eq!(restored[0].output, OutputId::new("base_color"));
    assert_eq!(restored[0].result, result_for(&instance, "base_color"));
    assert_eq!(restored[1].result, result_for(&instance, "height"));
    Ok(())
}

#[test]
fn test_index_is_rebuilt_when_reopened() -> Result<()> {
    let dir = tempdir()?;
    let registry = AssetTable::default();
    let id = InstanceId::new_v5("persisted");
    {
        let mut cache = open_cache(dir.path())?;
        write_all(&mut cache, &GraphInstance::with_id(id, package(1)), &registry)?;
        cache.shutdown();
    }

    let cache = open_cache(dir.path())?;
    let instance = GraphInstance::with_id(id, package(1));
    assert_eq!(cache.entry_count(), 2);
    assert!(cache.can_read(&instance, &registry));
    assert_eq!(cache.read(&instance)?.len(), 2);
    Ok(())
}

#[test]
fn test_generator_upgrade_turns_entries_into_misses() -> Result<()> {
    let dir = tempdir()?;
    let mut cache = open_cache(dir.path())?;
    let registry = AssetTable::default();
    let id = InstanceId::new();
    write_all(&mut cache, &GraphInstance::with_id(id, package(1)), &registry)?;

    let upgraded = GraphInstance::with_id(id, package(2));
    assert!(matches!(
        cache.read(&upgraded),
        Err(CacheError::VersionMismatch {
            found: 1,
            expected: 2
        })
    ));
    Ok(())
}

#[test]
fn test_corrupted_entry_is_a_miss_not_a_panic() -> Result<()> {
    let dir = tempdir()?;
    let mut cache = open_cache(dir.path())?;
    let registry = AssetTable::default();
    let instance = GraphInstance::new(package(1));
    write_all(&mut cache, &instance, &registry)?;

    let key = ContentCache::entry_key(instance.id(), &OutputId::new("height"));
    let path = dir.path().join(key);
    let mut bytes = fs::read(&path)?;
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xa5;
    fs::write(&path, bytes)?;

    assert!(cache.read(&instance).is_err());
    Ok(())
}

#[test]
fn test_format_override_invalidates_entry() -> Result<()> {
    let dir = tempdir()?;
    let mut cache = open_cache(dir.path())?;
    let registry = AssetTable::default();
    let mut instance = GraphInstance::new(package(1));
    write_all(&mut cache, &instance, &registry)?;

    instance
        .output_mut(&OutputId::new("height"))
        .unwrap()
        .set_format_override(Some(PixelFormat::Rgba32F));
    assert!(matches!(
        cache.read(&instance),
        Err(CacheError::InputsChanged(_))
    ));
    Ok(())
}

#[test]
fn test_entries_rendered_from_other_inputs_are_misses() -> Result<()> {
    let dir = tempdir()?;
    let mut cache = open_cache(dir.path())?;
    let registry = AssetTable::default();
    let mut instance = GraphInstance::with_id(InstanceId::new_v5("wall"), package(1));
    write_all(&mut cache, &instance, &registry)?;

    // Same id, same inputs: a later session may restore it.
    let reopened = GraphInstance::with_id(instance.id(), package(1));
    assert!(cache.read(&reopened).is_ok());

    // Same id, other inputs: the stored pixels no longer apply.
    let mut changed = GraphInstance::with_id(instance.id(), package(1));
    changed.set_input("mortar", InputValue::Float(0.5))?;
    assert!(matches!(
        cache.read(&changed),
        Err(CacheError::InputsChanged(_))
    ));

    instance.set_input("mortar", InputValue::Float(0.5))?;
    assert!(cache.read(&instance).is_err());
    Ok(())
}

#[test]
fn test_files_the_cache_did_not_write_are_left_alone() -> Result<()> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("src"))?;
    fs::write(dir.path().join("src/main.rs"), "fn main() {}")?;
    fs::write(dir.path().join("Cargo.toml"), "[package]")?;

    let mut cache = open_cache(dir.path())?;
    assert_eq!(cache.entry_count(), 0);

    let registry = AssetTable::default();
    let instance = GraphInstance::new(package(1));
    write_all(&mut cache, &instance, &registry)?;
    assert_eq!(cache.clear()?, 2);

    assert!(dir.path().join("src/main.rs").exists());
    assert!(dir.path().join("Cargo.toml").exists());

    let reopened = open_cache(dir.path())?;
    assert_eq!(reopened.entry_count(), 0);
    Ok(())
}

#[test]
fn test_read_eligibility_rules() -> Result<()> {
    let dir = tempdir()?;
    let mut cache = open_cache(dir.path())?;
    let mut registry = AssetTable::default();
    let mut instance = GraphInstance::new(package(1));
    write_all(&mut cache, &instance, &registry)?;
    assert!(cache.can_read(&instance, &registry));

    // --- Unfinalized asset ---
    registry.set_policy(
        instance.package().asset(),
        AssetPolicy {
            finalized: false,
            cache_enabled: true,
        },
    );
    assert!(!cache.can_read(&instance, &registry));
    registry = AssetTable::default();

    // --- Invalidated instance ---
    instance.revoke_cache_eligibility();
    assert!(!cache.can_read(&instance, &registry));
    instance.restore_cache_eligibility();

    // --- A missing output entry blocks the whole instance ---
    cache.remove_instance(instance.id())?;
    cache.write(
        &instance,
        &OutputId::new("height"),
        &result_for(&instance, "height"),
        &registry,
    )?;
    assert!(!cache.can_read(&instance, &registry));

    // --- Disabling an output drops it from the requirement ---
    instance.output_mut(&OutputId::new("base_color")).unwrap().disable();
    assert!(cache.can_read(&instance, &registry));
    Ok(())
}

#[test]
fn test_writes_refused_when_asset_disables_caching() -> Result<()> {
    let dir = tempdir()?;
    let mut cache = open_cache(dir.path())?;
    let instance = GraphInstance::new(package(1));
    let mut registry = AssetTable::default();
    registry.set_policy(
        instance.package().asset(),
        AssetPolicy {
            finalized: true,
            cache_enabled: false,
        },
    );

    let raw = result_for(&instance, "height");
    let err = cache
        .write(&instance, &OutputId::new("height"), &raw, &registry)
        .unwrap_err();
    assert!(matches!(err, CacheError::Disabled));
    assert_eq!(cache.entry_count(), 0);
    Ok(())
}

#[test]
fn test_clear_and_remove_instance() -> Result<()> {
    let dir = tempdir()?;
    let mut cache = open_cache(dir.path())?;
    let registry = AssetTable::default();
    let (a, b) = (GraphInstance::new(package(1)), GraphInstance::new(package(1)));
    write_all(&mut cache, &a, &registry)?;
    write_all(&mut cache, &b, &registry)?;

    assert_eq!(cache.remove_instance(a.id())?, 2);
    assert!(!cache.can_read(&a, &registry));
    assert!(cache.can_read(&b, &registry));

    assert_eq!(cache.clear()?, 2);
    assert_eq!(cache.entry_count(), 0);
    assert_eq!(cache.total_bytes(), 0);
    Ok(())
}
