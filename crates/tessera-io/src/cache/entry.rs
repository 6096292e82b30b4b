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

//! On-disk layout of one cache entry.
//!
//! An entry is a bincode-encoded [`EntryBlob`]: a header carrying everything
//! needed to rebuild the texture without the generator (format, size, mip
//! count), a digest of the inputs the pixels were rendered from, a BLAKE3
//! hash of the uncompressed pixels, and the LZ4-compressed pixels themselves.

use serde::{Deserialize, Serialize};
use tessera_core::error::CacheError;
use tessera_core::{OutputId, PixelFormat, RawResult};

const MAGIC: [u8; 4] = *b"TSRC";
const LAYOUT_VERSION: u16 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    magic: [u8; 4],
    layout: u16,
    generator_version: u32,
    inputs_digest: [u8; 32],
    output: String,
    format: PixelFormat,
    width: u32,
    height: u32,
    mip_count: u32,
    raw_len: u64,
    checksum: [u8; 32],
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryBlob {
    header: EntryHeader,
    payload: Vec<u8>,
}

/// Serializes a result into an entry blob.
pub(crate) fn encode(
    output: &OutputId,
    generator_version: u32,
    inputs_digest: [u8; 32],
    raw: &RawResult,
) -> Result<Vec<u8>, CacheError> {
    let blob = EntryBlob {
        header: EntryHeader {
            magic: MAGIC,
            layout: LAYOUT_VERSION,
            generator_version,
            inputs_digest,
            output: output.as_str().to_owned(),
            format: raw.format,
            width: raw.width,
            height: raw.height,
            mip_count: raw.mip_count,
            raw_len: raw.data.len() as u64,
            checksum: *blake3::hash(&raw.data).as_bytes(),
        },
        payload: lz4_flex::compress_prepend_size(&raw.data),
    };
    bincode::serde::encode_to_vec(&blob, bincode::config::standard())
        .map_err(|e| CacheError::Codec(e.to_string()))
}

/// Parses an entry blob back into a result. The entry must belong to
/// `output`, carry `expected_version` and `expected_digest`, and be intact.
pub(crate) fn decode(
    bytes: &[u8],
    output: &OutputId,
    expected_version: u32,
    expected_digest: &[u8; 32],
) -> Result<RawResult, CacheError> {
    let (blob, _): (EntryBlob, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| CacheError::Codec(e.to_string()))?;
    let header = blob.header;

    if header.magic != MAGIC || header.layout != LAYOUT_VERSION {
        return Err(CacheError::BadHeader);
    }
    if header.generator_version != expected_version {
        return Err(CacheError::VersionMismatch {
            found: header.generator_version,
            expected: expected_version,
        });
    }
    if header.output != output.as_str() {
        return Err(CacheError::Incompatible(output.clone()));
    }
    if header.inputs_digest != *expected_digest {
        return Err(CacheError::InputsChanged(output.clone()));
    }

    let data = lz4_flex::decompress_size_prepended(&blob.payload)
        .map_err(|e| CacheError::Codec(e.to_string()))?;
    if data.len() as u64 != header.raw_len || *blake3::hash(&data).as_bytes() != header.checksum {
        return Err(CacheError::Corrupted);
    }

    let raw = RawResult {
        format: header.format,
        width: header.width,
        height: header.height,
        mip_count: header.mip_count,
        data,
    };
    if !raw.is_well_formed() {
        return Err(CacheError::Corrupted);
    }
    Ok(raw)
}
