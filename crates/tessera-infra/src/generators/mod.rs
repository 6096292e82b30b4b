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

//! Procedural generators run by the reference backend.
//!
//! A generator turns a set of input values into a [`Shader`]: a pure function
//! of normalized texture coordinates returning linear RGBA. The backend
//! evaluates it once per texel and encodes the result into the requested
//! pixel format.

mod checker;
mod gradient;
mod noise;

pub use checker::Checker;
pub use gradient::Gradient;
pub use noise::Noise;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tessera_core::InputValue;

/// Input values of a job, by name.
pub type Inputs = BTreeMap<String, InputValue>;

/// Per-texel evaluation function. `u` and `v` are in `[0, 1)`.
pub type Shader = Box<dyn Fn(f32, f32) -> [f32; 4] + Send + Sync>;

/// A named procedural texture generator.
pub trait Generator: Send + Sync {
    /// Name packages refer to.
    fn name(&self) -> &str;

    /// Version of the algorithm. Bump when its output changes.
    fn version(&self) -> u32 {
        1
    }

    /// Builds the shader for a set of inputs. Missing or mistyped inputs fall
    /// back to the generator's defaults.
    fn shader(&self, inputs: &Inputs) -> Shader;
}

/// Generators available to a backend, by name.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn Generator>>,
}

impl GeneratorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `checker`, `gradient`, and `noise`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Checker);
        registry.register(Gradient);
        registry.register(Noise);
        registry
    }

    /// Adds a generator, replacing any previous one with the same name.
    pub fn register<G: Generator + 'static>(&mut self, generator: G) {
        let name = generator.name().to_owned();
        if self.generators.insert(name.clone(), Arc::new(generator)).is_some() {
            log::debug!("Replaced generator '{name}'");
        }
    }

    /// Looks up a generator.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Generator>> {
        self.generators.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.generators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("generators", &self.names())
            .finish()
    }
}

pub(crate) fn float(inputs: &Inputs, name: &str, default: f32) -> f32 {
    inputs.get(name).and_then(InputValue::as_f32).unwrap_or(default)
}

pub(crate) fn int(inputs: &Inputs, name: &str, default: i32) -> i32 {
    inputs.get(name).and_then(InputValue::as_i32).unwrap_or(default)
}

pub(crate) fn color(inputs: &Inputs, name: &str, default: [f32; 4]) -> [f32; 4] {
    inputs.get(name).and_then(InputValue::as_color).unwrap_or(default)
}

pub(crate) fn lerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}
