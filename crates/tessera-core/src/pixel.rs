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

//! Pixel formats and the raw buffers exchanged with the backend and consumers.

use serde::{Deserialize, Serialize};

/// Pixel layout of a rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit single channel (masks, heights).
    R8,
    /// 8-bit RGBA.
    Rgba8,
    /// 16-bit float RGBA.
    Rgba16F,
    /// 32-bit float RGBA.
    Rgba32F,
}

impl PixelFormat {
    /// Size of one pixel, in bytes.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgba16F => 8,
            PixelFormat::Rgba32F => 16,
        }
    }

    /// Number of channels.
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::R8 => 1,
            _ => 4,
        }
    }
}

/// Placement of one mip level inside a packed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MipLevel {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Byte offset of the level in the packed buffer.
    pub offset: usize,
    /// Byte length of the level.
    pub len: usize,
}

/// Computes the packed layout of a mip chain, top level first.
///
/// Each level halves both dimensions, clamped to 1.
pub fn mip_chain_layout(format: PixelFormat, width: u32, height: u32, count: u32) -> Vec<MipLevel> {
    let mut levels = Vec::with_capacity(count as usize);
    let mut offset = 0;
    for level in 0..count.max(1) {
        let w = (width >> level).max(1);
        let h = (height >> level).max(1);
        let len = w as usize * h as usize * format.bytes_per_pixel();
        levels.push(MipLevel {
            width: w,
            height: h,
            offset,
            len,
        });
        offset += len;
    }
    levels
}

/// Total byte size of a packed mip chain.
pub fn mip_chain_len(format: PixelFormat, width: u32, height: u32, count: u32) -> usize {
    mip_chain_layout(format, width, height, count)
        .iter()
        .map(|level| level.len)
        .sum()
}

/// A result as it comes out of the rendering backend: one packed buffer
/// holding every mip level, top level first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResult {
    /// Format of `data`.
    pub format: PixelFormat,
    /// Width of the top level.
    pub width: u32,
    /// Height of the top level.
    pub height: u32,
    /// Number of packed mip levels.
    pub mip_count: u32,
    /// Packed pixel data.
    pub data: Vec<u8>,
}

impl RawResult {
    /// Layout of the packed levels.
    pub fn mip_layout(&self) -> Vec<MipLevel> {
        mip_chain_layout(self.format, self.width, self.height, self.mip_count)
    }

    /// Returns `true` if `data` holds exactly the advertised mip chain.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.mip_count > 0
            && self.data.len() == mip_chain_len(self.format, self.width, self.height, self.mip_count)
    }
}

/// What a consumer resource receives on refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureUpload {
    /// Format of `pixels`.
    pub format: PixelFormat,
    /// Width of the top level.
    pub width: u32,
    /// Height of the top level.
    pub height: u32,
    /// Per-level placement in `pixels`.
    pub mips: Vec<MipLevel>,
    /// Packed pixels for all levels.
    pub pixels: Vec<u8>,
}

impl TextureUpload {
    /// Number of mip levels.
    pub fn mip_count(&self) -> u32 {
        self.mips.len() as u32
    }

    /// Bytes of one mip level.
    pub fn level(&self, index: usize) -> Option<&[u8]> {
        let level = self.mips.get(index)?;
        self.pixels.get(level.offset..level.offset + level.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_halves_and_clamps() {
        let levels = mip_chain_layout(PixelFormat::Rgba8, 8, 2, 4);
        let dims: Vec<_> = levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(dims, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
        assert_eq!(levels[1].offset, 8 * 2 * 4);
        assert_eq!(mip_chain_len(PixelFormat::Rgba8, 8, 2, 4), (16 + 4 + 2 + 1) * 4);
    }

    #[test]
    fn well_formed_checks_buffer_length() {
        let mut raw = RawResult {
            format: PixelFormat::R8,
            width: 4,
            height: 4,
            mip_count: 1,
            data: vec![0; 16],
        };
        assert!(raw.is_well_formed());
        raw.data.pop();
        assert!(!raw.is_well_formed());
    }
}
