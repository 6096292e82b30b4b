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

//! [`BlobStore`](tessera_core::storage::BlobStore) implementations.

mod fs;
mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use tessera_core::error::StoreError;

/// Splits a key into validated path components.
///
/// Keys are relative, `/`-separated, and made of `[A-Za-z0-9._-]` segments.
/// `.`/`..` segments and leading dots are refused so a key can never escape
/// the store root or collide with in-progress temp files.
pub(crate) fn key_segments(key: &str) -> Result<Vec<&str>, StoreError> {
    let segments: Vec<&str> = key.split('/').collect();
    let valid = !key.is_empty()
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && !segment.starts_with('.')
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        });
    if valid {
        Ok(segments)
    } else {
        Err(StoreError::InvalidKey(key.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_keys() {
        assert_eq!(key_segments("a/b.bin").unwrap(), vec!["a", "b.bin"]);
    }

    #[test]
    fn rejects_escaping_and_malformed_keys() {
        for key in ["", "../x", "a//b", "/abs", "a/.hidden", "sp ace", "a\\b"] {
            assert!(key_segments(key).is_err(), "{key:?} should be rejected");
        }
    }
}
