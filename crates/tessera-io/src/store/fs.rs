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
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tessera_core::error::StoreError;
use tessera_core::storage::{BlobInfo, BlobStore};
use walkdir::WalkDir;

/// A blob store backed by a directory tree.
///
/// Every write lands in a temporary file next to its destination and is then
/// renamed over it, so a concurrent reader sees either the old blob or the new
/// one, never a torn write.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    open: bool,
}

impl FsBlobStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        log::debug!("Opened blob store at {}", root.display());
        Ok(Self { root, open: true })
    }

    /// The directory holding the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !self.open {
            return Err(StoreError::Closed);
        }
        let mut path = self.root.clone();
        path.extend(key_segments(key)?);
        Ok(path)
    }
}

impl BlobStore for FsBlobStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(parent)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_data()?;
        temp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<BlobInfo>, StoreError> {
        if !self.open {
            return Err(StoreError::Closed);
        }
        let mut blobs = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            // Leftover temp files from an interrupted write are not blobs.
            if key_segments(&key).is_err() {
                continue;
            }
            let size = entry.metadata().map_err(|e| StoreError::Io(e.into()))?.len();
            blobs.push(BlobInfo { key, size });
        }
        Ok(blobs)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.open {
            return Err(StoreError::Closed);
        }
        // Writes are synced before they are renamed into place.
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            log::debug!("Closed blob store at {}", self.root.display());
        }
        self.open = false;
    }
}
