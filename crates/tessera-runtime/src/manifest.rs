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

//! The bake manifest: settings plus the packages and instances to render.
//!
//! ```toml
//! [scheduler]
//! max_async_instances_per_tick = 4
//!
//! [cache]
//! directory = "target/tessera-cache"
//!
//! [[packages]]
//! name = "tiles"
//! generator = "checker"
//! [[packages.outputs]]
//! id = "base_color"
//! width = 64
//! height = 64
//! format = "rgba8"
//! mip_levels = 4
//!
//! [[instances]]
//! name = "floor"
//! package = "tiles"
//! inputs = { scale = { float = 16.0 } }
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tessera_core::settings::Settings;
use tessera_core::{InputValue, InstanceId, OutputId, PackageDescriptor, PixelFormat};

/// One instance to bake.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstanceDecl {
    /// Stable name. The instance id is derived from it and the declared
    /// inputs, so cached results survive between runs until an input changes.
    pub name: String,
    /// Name of the package to instantiate.
    pub package: String,
    /// Input values overriding the package defaults.
    #[serde(default)]
    pub inputs: BTreeMap<String, InputValue>,
    /// Per-output pixel format overrides.
    #[serde(default)]
    pub formats: BTreeMap<OutputId, PixelFormat>,
    /// Outputs not to render.
    #[serde(default)]
    pub disabled: Vec<OutputId>,
}

impl InstanceDecl {
    /// The persistent id of this instance.
    pub fn id(&self) -> InstanceId {
        InstanceId::new_v5(&format!("{}|{:?}", self.name, self.inputs))
    }
}

#[derive(Debug, Default, Deserialize)]
struct Declarations {
    #[serde(default)]
    packages: Vec<PackageDescriptor>,
    #[serde(default)]
    instances: Vec<InstanceDecl>,
}

/// A parsed and cross-checked manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Session settings.
    pub settings: Settings,
    /// Packages by name.
    pub packages: HashMap<String, Arc<PackageDescriptor>>,
    /// Instances in declaration order.
    pub instances: Vec<InstanceDecl>,
}

impl Manifest {
    /// Parses manifest text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings = Settings::from_toml_str(text).context("invalid settings")?;
        let decls: Declarations = toml::from_str(text).context("invalid package or instance")?;

        let mut packages = HashMap::new();
        for package in decls.packages {
            let name = package.name.clone();
            if packages.insert(name.clone(), Arc::new(package)).is_some() {
                bail!("package '{name}' is declared twice");
            }
        }

        let mut names = HashMap::new();
        for instance in &decls.instances {
            let Some(package) = packages.get(&instance.package) else {
                bail!(
                    "instance '{}' uses unknown package '{}'",
                    instance.name,
                    instance.package
                );
            };
            if names.insert(instance.name.as_str(), ()).is_some() {
                bail!("instance '{}' is declared twice", instance.name);
            }
            for output in instance.formats.keys().chain(&instance.disabled) {
                if package.output(output).is_none() {
                    bail!(
                        "instance '{}' names unknown output '{output}'",
                        instance.name
                    );
                }
            }
        }

        Ok(Self {
            settings,
            packages,
            instances: decls.instances,
        })
    }

    /// Reads and parses a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in manifest {}", path.display()))
    }

    /// Looks up the package of an instance.
    pub fn package_of(&self, instance: &InstanceDecl) -> Option<&Arc<PackageDescriptor>> {
        self.packages.get(&instance.package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
        [scheduler]
        max_async_instances_per_tick = 2

        [[packages]]
        name = "tiles"
        generator = "checker"
        [[packages.inputs]]
        id = "scale"
        default = { float = 8.0 }
        [[packages.outputs]]
        id = "base_color"
        width = 16
        height = 16
        format = "rgba8"

        [[instances]]
        name = "floor"
        package = "tiles"
        inputs = { scale = { float = 2.0 } }
        formats = { base_color = "rgba16f" }
    "#;

    #[test]
    fn parses_settings_packages_and_instances() {
        let manifest = Manifest::from_toml_str(MANIFEST).unwrap();
        assert_eq!(manifest.settings.scheduler.max_async_instances_per_tick, 2);
        assert!(manifest.packages.contains_key("tiles"));
        let floor = &manifest.instances[0];
        assert_eq!(floor.inputs["scale"], InputValue::Float(2.0));
        assert_eq!(
            floor.formats[&OutputId::new("base_color")],
            PixelFormat::Rgba16F
        );

        let mut edited = floor.clone();
        assert_eq!(edited.id(), floor.id());
        edited.inputs.insert("scale".into(), InputValue::Float(3.0));
        assert_ne!(edited.id(), floor.id());
    }

    #[test]
    fn unknown_package_is_rejected() {
        let text = MANIFEST.replace("package = \"tiles\"", "package = \"bricks\"");
        let err = Manifest::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("unknown package 'bricks'"));
    }

    #[test]
    fn unknown_output_is_rejected() {
        let text = MANIFEST.replace("formats = { base_color", "formats = { roughness");
        assert!(Manifest::from_toml_str(&text).is_err());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let text = MANIFEST.replace("= 2", "= 0");
        assert!(Manifest::from_toml_str(&text).is_err());
    }
}
