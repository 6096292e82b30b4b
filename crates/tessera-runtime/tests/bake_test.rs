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
use std::path::Path;
use tessera_core::PixelFormat;
use tessera_infra::ThreadedBackend;
use tessera_runtime::{bake, clear_cache, BakeOptions, Manifest};

// --- Test Setup ---
fn manifest(cache_dir: &Path) -> Result<Manifest> {
    let text = format!(
        r#"
        [backend]
        cpu_cores_budget = 2

        [scheduler]
        max_async_instances_per_tick = 2

        [cache]
        directory = '{}'

        [[packages]]
        name = "tiles"
        generator = "checker"
        [[packages.inputs]]
        id = "scale"
        default = {{ float = 4.0 }}
        [[packages.outputs]]
        id = "base_color"
        width = 16
        height = 16
        format = "rgba8"
        mip_levels = 3

        [[packages]]
        name = "clouds"
        generator = "noise"
        [[packages.inputs]]
        id = "seed"
        default = {{ int = 1 }}
        [[packages.outputs]]
        id = "mask"
        width = 8
        height = 8
        format = "r8"
        [[packages.outputs]]
        id = "preview"
        width = 8
        height = 8
        format = "rgba8"

        [[instances]]
        name = "floor"
        package = "tiles"
        inputs = {{ scale = {{ float = 8.0 }} }}

        [[instances]]
        name = "wall"
        package = "tiles"
        formats = {{ base_color = "rgba16f" }}

        [[instances]]
        name = "sky"
        package = "clouds"
        inputs = {{ seed = {{ int = 7 }} }}
        disabled = ["preview"]
        "#,
        cache_dir.display()
    );
    Manifest::from_toml_str(&text)
}

fn backend() -> Result<Box<ThreadedBackend>> {
    Ok(Box::new(ThreadedBackend::with_builtins()?))
}
// ---

#[test]
fn test_bake_renders_every_enabled_output() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let manifest = manifest(dir.path())?;

    let report = bake(&manifest, backend()?, &BakeOptions::default())?;
    assert!(report.completed);
    assert_eq!(report.outputs.len(), 3);
    assert_eq!(report.missing().count(), 0);
    assert_eq!(report.totals.published, 3);
    assert_eq!(report.totals.dispatched, 3);

    let wall = report
        .outputs
        .iter()
        .find(|output| output.instance == "wall")
        .and_then(|output| output.upload.as_ref())
        .expect("wall was baked");
    assert_eq!(wall.format, PixelFormat::Rgba16F);
    assert_eq!(wall.mip_count(), 3);
    Ok(())
}

#[test]
fn test_second_bake_is_served_from_cache() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let manifest = manifest(dir.path())?;

    bake(&manifest, backend()?, &BakeOptions::default())?;
    let report = bake(&manifest, backend()?, &BakeOptions::default())?;
    assert!(report.completed);
    assert_eq!(report.totals.restored_from_cache, 3);
    assert_eq!(report.totals.dispatched, 0);
    assert_eq!(report.missing().count(), 0);

    assert_eq!(clear_cache(&manifest)?, 3);
    let report = bake(&manifest, backend()?, &BakeOptions::default())?;
    assert_eq!(report.totals.dispatched, 3);
    Ok(())
}

#[test]
fn test_synchronous_bake() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let manifest = manifest(dir.path())?;
    let options = BakeOptions {
        sync: true,
        ..BakeOptions::default()
    };

    let report = bake(&manifest, backend()?, &options)?;
    assert!(report.completed);
    assert_eq!(report.ticks, 0);
    assert_eq!(report.totals.published, 3);
    assert_eq!(report.missing().count(), 0);
    Ok(())
}

#[test]
fn test_tick_limit_reports_incomplete_bake() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let manifest = manifest(dir.path())?;
    let options = BakeOptions {
        max_ticks: 1,
        ..BakeOptions::default()
    };

    let report = bake(&manifest, backend()?, &options)?;
    assert_eq!(report.ticks, 1);
    assert!(!report.completed);
    Ok(())
}
