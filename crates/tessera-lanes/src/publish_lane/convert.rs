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

//! Pixel format translation and mip-chain shaping.
//!
//! Everything goes through a linear `[f32; 4]` intermediate: single-channel
//! formats expand to grey with opaque alpha, and narrowing to a single channel
//! keeps red.

use half::f16;
use tessera_core::pixel::mip_chain_layout;
use tessera_core::{PixelFormat, RawResult, TextureUpload};

/// Decodes one pixel.
pub fn decode_pixel(format: PixelFormat, bytes: &[u8]) -> [f32; 4] {
    match format {
        PixelFormat::R8 => {
            let v = unorm8(bytes[0]);
            [v, v, v, 1.0]
        }
        PixelFormat::Rgba8 => [
            unorm8(bytes[0]),
            unorm8(bytes[1]),
            unorm8(bytes[2]),
            unorm8(bytes[3]),
        ],
        PixelFormat::Rgba16F => {
            let mut px = [0.0; 4];
            for (c, chunk) in px.iter_mut().zip(bytes.chunks_exact(2)) {
                *c = f16::from_le_bytes([chunk[0], chunk[1]]).to_f32();
            }
            px
        }
        PixelFormat::Rgba32F => {
            let mut px = [0.0; 4];
            for (c, chunk) in px.iter_mut().zip(bytes.chunks_exact(4)) {
                *c = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
            px
        }
    }
}

/// Appends one encoded pixel to `out`.
pub fn encode_pixel(format: PixelFormat, px: [f32; 4], out: &mut Vec<u8>) {
    match format {
        PixelFormat::R8 => out.push(to_unorm8(px[0])),
        PixelFormat::Rgba8 => out.extend(px.iter().map(|c| to_unorm8(*c))),
        PixelFormat::Rgba16F => {
            for c in px {
                out.extend_from_slice(&f16::from_f32(c).to_le_bytes());
            }
        }
        PixelFormat::Rgba32F => {
            for c in px {
                out.extend_from_slice(&c.to_le_bytes());
            }
        }
    }
}

/// Re-encodes a tightly packed run of pixels into another format.
pub fn convert_pixels(from: PixelFormat, bytes: &[u8], to: PixelFormat) -> Vec<u8> {
    if from == to {
        return bytes.to_vec();
    }
    let count = bytes.len() / from.bytes_per_pixel();
    let mut out = Vec::with_capacity(count * to.bytes_per_pixel());
    for px in bytes.chunks_exact(from.bytes_per_pixel()) {
        encode_pixel(to, decode_pixel(from, px), &mut out);
    }
    out
}

/// Box-filters one level down to the next, halving each dimension (clamped
/// to 1). Odd edges reuse the last row or column.
pub fn downsample(format: PixelFormat, src: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let (dw, dh) = ((w >> 1).max(1), (h >> 1).max(1));
    let bpp = format.bytes_per_pixel();
    let at = |x: usize, y: usize| {
        let i = (y.min(h - 1) * w + x.min(w - 1)) * bpp;
        decode_pixel(format, &src[i..i + bpp])
    };

    let mut out = Vec::with_capacity(dw * dh * bpp);
    for y in 0..dh {
        for x in 0..dw {
            let mut acc = [0.0f32; 4];
            for (sx, sy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let px = at(x * 2 + sx, y * 2 + sy);
                for (a, c) in acc.iter_mut().zip(px) {
                    *a += c;
                }
            }
            encode_pixel(format, acc.map(|a| a * 0.25), &mut out);
        }
    }
    out
}

/// Extends a packed chain that holds `have` levels up to `want` levels by
/// repeatedly box-filtering its last level.
pub fn extend_mip_chain(
    format: PixelFormat,
    mut packed: Vec<u8>,
    width: u32,
    height: u32,
    have: u32,
    want: u32,
) -> Vec<u8> {
    let layout = mip_chain_layout(format, width, height, want.max(have));
    let missing = want.saturating_sub(have) as usize;
    for pair in layout.windows(2).skip(have.max(1) as usize - 1).take(missing) {
        let src = &pair[0];
        let level = packed[src.offset..src.offset + src.len].to_vec();
        packed.extend(downsample(format, &level, src.width, src.height));
    }
    packed
}

/// Reshapes a backend result into `format` with exactly `mip_count` levels.
///
/// Surplus levels are dropped and missing ones are generated from the
/// smallest level available.
pub fn shape_result(raw: &RawResult, format: PixelFormat, mip_count: u32) -> RawResult {
    let mip_count = mip_count.max(1);
    let keep = raw.mip_count.min(mip_count);
    let mut packed = Vec::new();
    for level in raw.mip_layout().iter().take(keep as usize) {
        let bytes = &raw.data[level.offset..level.offset + level.len];
        packed.extend(convert_pixels(raw.format, bytes, format));
    }
    let data = extend_mip_chain(format, packed, raw.width, raw.height, keep, mip_count);
    RawResult {
        format,
        width: raw.width,
        height: raw.height,
        mip_count,
        data,
    }
}

/// Splits a packed result into the per-level description consumers receive.
pub fn to_upload(raw: &RawResult) -> TextureUpload {
    TextureUpload {
        format: raw.format,
        width: raw.width,
        height: raw.height,
        mips: raw.mip_layout(),
        pixels: raw.data.clone(),
    }
}

fn unorm8(v: u8) -> f32 {
    f32::from(v) / 255.0
}

fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
