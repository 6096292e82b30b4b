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

use super::{AssetId, InputValue, OutputId};
use crate::pixel::PixelFormat;
use serde::{Deserialize, Serialize};

/// Declaration of one generator input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDesc {
    /// Name of the input, unique within the package.
    pub id: String,
    /// Value a fresh instance starts with.
    pub default: InputValue,
    /// Outputs whose result changes when this input changes.
    /// An empty list means "every output".
    #[serde(default)]
    pub affects: Vec<OutputId>,
}

/// Declaration of one renderable output channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDesc {
    /// Identifier, unique within the package.
    pub id: OutputId,
    /// Width of the top mip level, in pixels.
    pub width: u32,
    /// Height of the top mip level, in pixels.
    pub height: u32,
    /// Format the generator produces by default.
    pub format: PixelFormat,
    /// Number of mip levels, including the top one.
    #[serde(default = "default_mip_levels")]
    pub mip_levels: u32,
}

fn default_mip_levels() -> u32 {
    1
}

/// Metadata for a procedural-texture package.
///
/// Shared by all instances of the package. The input → output dependency
/// map lives here so it is computed once per package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Stable package name.
    pub name: String,
    /// Name of the generator the backend runs for this package.
    pub generator: String,
    /// Generator version. Cached results stamped with another version are ignored.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Declared inputs.
    #[serde(default)]
    pub inputs: Vec<InputDesc>,
    /// Declared outputs.
    pub outputs: Vec<OutputDesc>,
}

fn default_version() -> u32 {
    1
}

impl PackageDescriptor {
    /// The asset that owns instances of this package.
    pub fn asset(&self) -> AssetId {
        AssetId::from_name(&self.name)
    }

    /// Looks up an input declaration by name.
    pub fn input(&self, id: &str) -> Option<&InputDesc> {
        self.inputs.iter().find(|input| input.id == id)
    }

    /// Looks up an output declaration by id.
    pub fn output(&self, id: &OutputId) -> Option<&OutputDesc> {
        self.outputs.iter().find(|output| &output.id == id)
    }

    /// Returns `true` if changing `input` alters `output`.
    ///
    /// Unknown inputs conservatively affect everything.
    pub fn input_affects(&self, input: &str, output: &OutputId) -> bool {
        match self.input(input) {
            Some(desc) => desc.affects.is_empty() || desc.affects.contains(output),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> PackageDescriptor {
        PackageDescriptor {
            name: "bricks".into(),
            generator: "checker".into(),
            version: 1,
            inputs: vec![
                InputDesc {
                    id: "tint".into(),
                    default: InputValue::Float4([1.0; 4]),
                    affects: vec![OutputId::new("base_color")],
                },
                InputDesc {
                    id: "scale".into(),
                    default: InputValue::Float(4.0),
                    affects: vec![],
                },
            ],
            outputs: vec![
                OutputDesc {
                    id: OutputId::new("base_color"),
                    width: 8,
                    height: 8,
                    format: PixelFormat::Rgba8,
                    mip_levels: 1,
                },
                OutputDesc {
                    id: OutputId::new("height"),
                    width: 8,
                    height: 8,
                    format: PixelFormat::R8,
                    mip_levels: 1,
                },
            ],
        }
    }

    #[test]
    fn explicit_affects_limits_dependencies() {
        let pkg = package();
        assert!(pkg.input_affects("tint", &OutputId::new("base_color")));
        assert!(!pkg.input_affects("tint", &OutputId::new("height")));
    }

    #[test]
    fn empty_affects_and_unknown_inputs_affect_everything() {
        let pkg = package();
        assert!(pkg.input_affects("scale", &OutputId::new("height")));
        assert!(pkg.input_affects("nonexistent", &OutputId::new("height")));
    }

    #[test]
    fn deserializes_from_toml() {
        let text = r#"
            name = "noise"
            generator = "noise"

            [[inputs]]
            id = "seed"
            default = { int = 7 }

            [[outputs]]
            id = "mask"
            width = 16
            height = 16
            format = "r8"
        "#;
        let pkg: PackageDescriptor = toml::from_str(text).unwrap();
        assert_eq!(pkg.version, 1);
        assert_eq!(pkg.inputs[0].default, InputValue::Int(7));
        assert_eq!(pkg.outputs[0].mip_levels, 1);
        assert_eq!(pkg.outputs[0].format, PixelFormat::R8);
    }
}
