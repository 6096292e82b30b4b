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

use super::{InputValue, InstanceId, OutputId, OutputSlot, PackageDescriptor};
use crate::error::InputError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One instantiated procedural-texture generator.
///
/// Holds its own input values and output slots. Its id is assigned at
/// creation and never changes.
#[derive(Debug, Clone)]
pub struct GraphInstance {
    id: InstanceId,
    package: Arc<PackageDescriptor>,
    inputs: BTreeMap<String, InputValue>,
    outputs: Vec<OutputSlot>,
    /// Bumped on every input mutation so that a result computed from older
    /// inputs can be told apart from a current one.
    revision: u64,
    cache_eligible: bool,
}

impl GraphInstance {
    /// Instantiates a package with a fresh random id.
    pub fn new(package: Arc<PackageDescriptor>) -> Self {
        Self::with_id(InstanceId::new(), package)
    }

    /// Instantiates a package under a known, persistent id.
    ///
    /// All outputs start enabled and dirty; inputs start at their defaults.
    pub fn with_id(id: InstanceId, package: Arc<PackageDescriptor>) -> Self {
        let inputs = package
            .inputs
            .iter()
            .map(|input| (input.id.clone(), input.default.clone()))
            .collect();
        let outputs = package.outputs.iter().cloned().map(OutputSlot::new).collect();
        Self {
            id,
            package,
            inputs,
            outputs,
            revision: 0,
            cache_eligible: true,
        }
    }

    /// The instance's persistent id.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The package this instance was created from.
    pub fn package(&self) -> &Arc<PackageDescriptor> {
        &self.package
    }

    /// Current value of an input.
    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs.get(name)
    }

    /// All input values, ordered by name.
    pub fn inputs(&self) -> &BTreeMap<String, InputValue> {
        &self.inputs
    }

    /// Assigns an input value.
    ///
    /// Returns `Ok(false)` when the value is unchanged, in which case nothing
    /// needs to be re-rendered. This does not touch dirty flags; callers pair
    /// it with the dirty tracker.
    pub fn set_input(&mut self, name: &str, value: InputValue) -> Result<bool, InputError> {
        let desc = self
            .package
            .input(name)
            .ok_or_else(|| InputError::UnknownInput(name.to_owned()))?;
        if !desc.default.same_kind(&value) {
            return Err(InputError::TypeMismatch {
                input: name.to_owned(),
            });
        }
        if self.inputs.get(name) == Some(&value) {
            return Ok(false);
        }
        self.inputs.insert(name.to_owned(), value);
        self.revision += 1;
        Ok(true)
    }

    /// Records an out-of-band change (e.g. a referenced image was reimported)
    /// that makes any in-flight result stale.
    pub fn bump_revision(&mut self) {
        self.revision += 1;
    }

    /// The current input revision.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All output slots.
    pub fn outputs(&self) -> &[OutputSlot] {
        &self.outputs
    }

    /// Looks up an output slot.
    pub fn output(&self, id: &OutputId) -> Option<&OutputSlot> {
        self.outputs.iter().find(|slot| slot.id() == id)
    }

    /// Looks up an output slot mutably.
    pub fn output_mut(&mut self, id: &OutputId) -> Option<&mut OutputSlot> {
        self.outputs.iter_mut().find(|slot| slot.id() == id)
    }

    /// Mutable access to every slot.
    pub fn outputs_mut(&mut self) -> impl Iterator<Item = &mut OutputSlot> {
        self.outputs.iter_mut()
    }

    /// Enabled slots only.
    pub fn enabled_outputs(&self) -> impl Iterator<Item = &OutputSlot> {
        self.outputs.iter().filter(|slot| slot.is_enabled())
    }

    /// Returns `true` if any enabled output is dirty.
    pub fn needs_render(&self) -> bool {
        self.enabled_outputs().any(OutputSlot::is_dirty)
    }

    /// Whether a cached result may still be trusted for this instance.
    pub fn is_cache_eligible(&self) -> bool {
        self.cache_eligible
    }

    /// Forbids cache reads until the next successful publish.
    pub fn revoke_cache_eligibility(&mut self) {
        self.cache_eligible = false;
    }

    /// Allows cache reads again after a successful publish.
    pub fn restore_cache_eligibility(&mut self) {
        self.cache_eligible = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InputDesc, OutputDesc};
    use crate::pixel::PixelFormat;

    fn package() -> Arc<PackageDescriptor> {
        Arc::new(PackageDescriptor {
            name: "tiles".into(),
            generator: "checker".into(),
            version: 1,
            inputs: vec![InputDesc {
                id: "scale".into(),
                default: InputValue::Float(2.0),
                affects: vec![],
            }],
            outputs: vec![OutputDesc {
                id: OutputId::new("base_color"),
                width: 4,
                height: 4,
                format: PixelFormat::Rgba8,
                mip_levels: 1,
            }],
        })
    }

    #[test]
    fn new_instance_starts_dirty_with_defaults() {
        let instance = GraphInstance::new(package());
        assert_eq!(instance.input("scale"), Some(&InputValue::Float(2.0)));
        assert!(instance.outputs().iter().all(OutputSlot::is_dirty));
        assert!(instance.needs_render());
        assert!(instance.is_cache_eligible());
    }

    #[test]
    fn set_input_bumps_revision_only_on_change() {
        let mut instance = GraphInstance::new(package());
        assert!(!instance.set_input("scale", InputValue::Float(2.0)).unwrap());
        assert_eq!(instance.revision(), 0);
        assert!(instance.set_input("scale", InputValue::Float(3.0)).unwrap());
        assert_eq!(instance.revision(), 1);
    }

    #[test]
    fn set_input_rejects_unknown_and_mistyped_inputs() {
        let mut instance = GraphInstance::new(package());
        assert!(matches!(
            instance.set_input("missing", InputValue::Float(1.0)),
            Err(InputError::UnknownInput(_))
        ));
        assert!(matches!(
            instance.set_input("scale", InputValue::Int(1)),
            Err(InputError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn disabling_an_output_removes_it_from_enabled_set() {
        let mut instance = GraphInstance::new(package());
        let id = OutputId::new("base_color");
        instance.output_mut(&id).unwrap().disable();
        assert_eq!(instance.enabled_outputs().count(), 0);
        assert!(!instance.needs_render());
        instance.output_mut(&id).unwrap().enable();
        assert!(instance.needs_render());
    }
}
