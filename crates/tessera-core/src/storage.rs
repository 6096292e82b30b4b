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

//! Durable storage of named blobs.
//!
//! The content cache only speaks to a [`BlobStore`]. Where the bytes end up
//! (a per-user cache directory, memory, a host editor's persistence layer) is
//! decided by the implementation.

use crate::error::StoreError;

/// Size information about one stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    /// The blob's key.
    pub key: String,
    /// Stored size in bytes.
    pub size: u64,
}

/// A key → bytes store.
///
/// Keys are `/`-separated relative names such as `"<instance>/<output>"`.
pub trait BlobStore: Send {
    /// Reads a blob. `Ok(None)` means the key does not exist.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes a blob, replacing any previous one. Readers must never observe a
    /// partially written blob.
    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Removes a blob. Returns `false` if it did not exist.
    fn remove(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Lists every stored blob.
    fn list(&self) -> Result<Vec<BlobInfo>, StoreError>;

    /// Forces pending writes to durable storage.
    fn flush(&mut self) -> Result<(), StoreError>;

    /// Releases any handles held by the store. Further calls fail with
    /// [`StoreError::Closed`]. Must be idempotent.
    fn close(&mut self);
}
