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

//! Error types shared across the scheduling, caching, and publishing layers.
//!
//! None of these ever escape the tick loop: the scheduler logs them and
//! degrades to "try again later". They exist so that the individual layers
//! can report precisely what went wrong.

use crate::graph::{InstanceId, OutputId};
use thiserror::Error;

/// Rejected input mutation.
#[derive(Debug, Error)]
pub enum InputError {
    /// The package declares no input with this name.
    #[error("unknown input '{0}'")]
    UnknownInput(String),
    /// The value's kind does not match the input declaration.
    #[error("value kind does not match the declaration of input '{input}'")]
    TypeMismatch {
        /// The offending input.
        input: String,
    },
}

/// Failure of the durable blob storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key cannot be mapped to a storage location.
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
    /// The store was shut down.
    #[error("blob store is closed")]
    Closed,
    /// An underlying I/O error.
    #[error("blob store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to read or write a cache entry.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Caching is disabled globally or for the owning asset.
    #[error("caching is disabled for this asset")]
    Disabled,
    /// No entry for this output.
    #[error("no cache entry for {instance}/{output}")]
    Missing {
        /// Instance GUID.
        instance: InstanceId,
        /// Output id.
        output: OutputId,
    },
    /// The entry was written by a different generator version.
    #[error("cache entry is stale (written by version {found}, expected {expected})")]
    VersionMismatch {
        /// Version stamped in the entry.
        found: u32,
        /// Version of the package now.
        expected: u32,
    },
    /// The entry was rendered from different input values.
    #[error("cache entry for '{0}' was rendered from other inputs")]
    InputsChanged(OutputId),
    /// The entry's format or dimensions no longer match the output slot.
    #[error("cache entry does not match output '{0}'")]
    Incompatible(OutputId),
    /// The entry was written in an unknown layout.
    #[error("unrecognized cache entry layout")]
    BadHeader,
    /// The payload does not match its checksum.
    #[error("cache entry checksum mismatch")]
    Corrupted,
    /// Serialization or compression failed.
    #[error("cache entry codec failed: {0}")]
    Codec(String),
    /// The cache was shut down.
    #[error("content cache is shut down")]
    ShutDown,
    /// The storage layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure to move a result into its consumer resource.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The output is not declared by the instance.
    #[error("instance {instance} has no output '{output}'")]
    UnknownOutput {
        /// Instance GUID.
        instance: InstanceId,
        /// Output id.
        output: OutputId,
    },
    /// The output was disabled before the result arrived.
    #[error("output '{0}' is disabled")]
    Disabled(OutputId),
    /// The destination resource was dropped or torn down.
    #[error("output '{0}' has no live resource to publish into")]
    InvalidTarget(OutputId),
    /// The raw buffer does not match its own metadata.
    #[error("malformed result for output '{0}'")]
    MalformedResult(OutputId),
}

/// Invalid configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading the configuration file failed.
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for the settings schema.
    #[error("failed to parse settings: {0}")]
    Parse(String),
    /// A value is out of range.
    #[error("invalid setting '{key}': {reason}")]
    Invalid {
        /// Dotted key of the offending setting.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn cache_error_wraps_store_error() {
        let store = StoreError::InvalidKey("../x".into());
        let err: CacheError = store.into();
        assert_eq!(format!("{err}"), "invalid storage key '../x'");
    }

    #[test]
    fn store_io_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StoreError = io.into();
        assert!(err.source().is_some());
        assert_eq!(format!("{err}"), "blob store I/O failed: denied");
    }
}
