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

use super::{OutputDesc, OutputId};
use crate::pixel::PixelFormat;
use crate::resource::{ResourceHandle, WeakResource};
use std::sync::Arc;

/// One renderable channel of a [`GraphInstance`](super::GraphInstance).
///
/// The slot owns its flags; the texture resource it fills is only referenced
/// weakly, because the resource's lifetime belongs to its consumer.
#[derive(Debug, Clone)]
pub struct OutputSlot {
    desc: OutputDesc,
    enabled: bool,
    dirty: bool,
    format_override: Option<PixelFormat>,
    resource: Option<WeakResource>,
}

impl OutputSlot {
    /// Creates an enabled, dirty slot for the given declaration.
    pub fn new(desc: OutputDesc) -> Self {
        Self {
            desc,
            enabled: true,
            dirty: true,
            format_override: None,
            resource: None,
        }
    }

    /// The slot's identifier.
    pub fn id(&self) -> &OutputId {
        &self.desc.id
    }

    /// The package declaration behind this slot.
    pub fn desc(&self) -> &OutputDesc {
        &self.desc
    }

    /// Whether the slot is currently rendered.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the last published result is stale.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Sets or clears the dirty flag.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// The format the consumer expects: the override if set, otherwise the
    /// package default.
    pub fn format(&self) -> PixelFormat {
        self.format_override.unwrap_or(self.desc.format)
    }

    /// The optional format override.
    pub fn format_override(&self) -> Option<PixelFormat> {
        self.format_override
    }

    /// Overrides the output format. Marks the slot dirty when it changes.
    pub fn set_format_override(&mut self, format: Option<PixelFormat>) {
        if self.format_override != format {
            self.format_override = format;
            self.dirty = true;
        }
    }

    /// Binds the resource this slot publishes into.
    pub fn attach(&mut self, resource: &ResourceHandle) {
        self.resource = Some(Arc::downgrade(resource));
    }

    /// Drops the binding to the resource.
    pub fn detach(&mut self) {
        self.resource = None;
    }

    /// Returns the bound resource if it is still alive.
    pub fn resource(&self) -> Option<ResourceHandle> {
        self.resource.as_ref().and_then(|weak| weak.upgrade())
    }

    /// Disables the slot and detaches it from its resource.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.detach();
    }

    /// Re-enables the slot. It is considered dirty until rendered again.
    pub fn enable(&mut self) {
        if !self.enabled {
            self.enabled = true;
            self.dirty = true;
        }
    }
}
