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

use super::AssetId;
use serde::{Deserialize, Serialize};

/// A value bound to one input of a graph instance.
///
/// In a manifest these are written externally tagged, e.g.
/// `scale = { float = 4.0 }` or `tint = { float4 = [1.0, 0.5, 0.5, 1.0] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputValue {
    /// A single float.
    Float(f32),
    /// A two-component float vector.
    Float2([f32; 2]),
    /// A three-component float vector.
    Float3([f32; 3]),
    /// A four-component float vector (usually a color).
    Float4([f32; 4]),
    /// A single integer (seeds, counts, enum selectors).
    Int(i32),
    /// A two-component integer vector.
    Int2([i32; 2]),
    /// Free text.
    String(String),
    /// A reference to an image asset fed into the generator.
    Image(AssetId),
}

impl InputValue {
    /// Returns the value as a float when it is numeric and scalar.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            InputValue::Float(v) => Some(*v),
            InputValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Returns the value as an integer when it is an integer scalar.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            InputValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as an RGBA color, widening smaller vectors.
    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            InputValue::Float(v) => Some([*v, *v, *v, 1.0]),
            InputValue::Float3([r, g, b]) => Some([*r, *g, *b, 1.0]),
            InputValue::Float4(c) => Some(*c),
            _ => None,
        }
    }

    /// Returns `true` if both values carry the same variant.
    pub fn same_kind(&self, other: &InputValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}
