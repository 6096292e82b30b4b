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

//! # Tessera Core
//!
//! Foundational crate containing the model types, traits, and interface
//! contracts shared by the render scheduling and caching layers.
//!
//! Nothing in here knows how a texture is actually computed or where a cached
//! blob physically lives: those concerns sit behind [`backend::RenderBackend`]
//! and [`storage::BlobStore`] and are provided by other crates.

#![warn(missing_docs)]

pub mod backend;
pub mod budget;
pub mod error;
pub mod graph;
pub mod pixel;
pub mod registry;
pub mod resource;
pub mod settings;
pub mod storage;

pub use graph::{
    AssetId, GraphInstance, InputDesc, InputValue, InstanceId, OutputDesc, OutputId, OutputSlot,
    PackageDescriptor,
};
pub use pixel::{MipLevel, PixelFormat, RawResult, TextureUpload};
