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

//! The contract between published results and the textures that consume them.

use crate::pixel::TextureUpload;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// A texture-like object that receives published render results.
///
/// Implementations are responsible for uploading the pixels to their runtime
/// representation (GPU texture, preview image, file, ...).
pub trait ConsumerResource: Send {
    /// Replaces the resource contents with a freshly published result.
    fn refresh(&mut self, upload: &TextureUpload);

    /// Returns `false` once the resource has been torn down by its owner but is
    /// still referenced somewhere. Publishing into a dead resource is a no-op.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Shared ownership of a consumer resource.
pub type ResourceHandle = Arc<Mutex<dyn ConsumerResource>>;

/// Non-owning reference held by output slots.
pub type WeakResource = Weak<Mutex<dyn ConsumerResource>>;

/// Wraps a concrete resource into a [`ResourceHandle`].
pub fn share<R: ConsumerResource + 'static>(resource: R) -> ResourceHandle {
    Arc::new(Mutex::new(resource))
}

/// A resource that simply keeps the last upload in memory.
///
/// Used by tools that only need the pixels (baking to disk, previews) and by
/// tests.
#[derive(Default)]
pub struct MemoryTexture {
    last: Option<TextureUpload>,
    refresh_count: u64,
}

impl MemoryTexture {
    /// Creates an empty texture.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last upload received, if any.
    pub fn last_upload(&self) -> Option<&TextureUpload> {
        self.last.as_ref()
    }

    /// How many times the texture has been refreshed.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }
}

impl fmt::Debug for MemoryTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTexture")
            .field("has_upload", &self.last.is_some())
            .field("refresh_count", &self.refresh_count)
            .finish()
    }
}

impl ConsumerResource for MemoryTexture {
    fn refresh(&mut self, upload: &TextureUpload) {
        self.last = Some(upload.clone());
        self.refresh_count += 1;
    }
}
