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

//! # Tessera IO
//!
//! Durable storage for rendered outputs: the [`ContentCache`] that lets the
//! scheduler skip re-rendering, and the [`BlobStore`](tessera_core::storage::BlobStore)
//! implementations it persists through.

#![warn(missing_docs)]

pub mod cache;
pub mod store;

pub use cache::{CachedOutput, ContentCache};
pub use store::{FsBlobStore, MemoryBlobStore};
