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

use super::key_segments;
use std::collections::BTreeMap;
use std::io;
use tessera_core::error::StoreError;
use tessera_core::storage::{BlobInfo, BlobStore};

/// A blob store that lives entirely in memory.
///
/// Useful for hosts that persist through their own layer, and for tests. It
/// can be switched read-only to exercise write-failure paths.
#[derive(Debug)]
pub struct MemoryBlobStore {
    blobs: BTreeMap<String, Vec<u8>>,
    read_only: bool,
    open: bool,
}

impl MemoryBlobStore {
    /// Creates an empty, writable store.
    pub fn new() -> Self {
        Self {
            blobs: BTreeMap::new(),
            read_only: false,
            open: true,
        }
    }

    /// Makes every subsequent write and remove fail.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Overwrites a blob without validation. Lets tests plant corrupt data.
    pub fn insert_raw(&mut self, key: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.insert(key.into(), bytes);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if !self.open {
            return Err(StoreError::Closed);
        }
        if self.read_only {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "memory blob store is read-only",
            )));
        }
        Ok(())
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if !self.open {
            return Err(StoreError::Closed);
        }
        key_segments(key)?;
        Ok(self.blobs.get(key).cloned())
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        key_segments(key)?;
        self.blobs.insert(key.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(self.blobs.remove(key).is_some())
    }

    fn list(&self) -> Result<Vec<BlobInfo>, StoreError> {
        if !self.open {
            return Err(StoreError::Closed);
        }
        Ok(self
            .blobs
            .iter()
            .map(|(key, bytes)| BlobInfo {
                key: key.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }
}
