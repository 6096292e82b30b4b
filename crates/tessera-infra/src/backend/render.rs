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

//! Texel evaluation for one job output.

use crate::generators::Shader;
use std::num::NonZeroUsize;
use std::thread;
use tessera_core::backend::JobOutput;
use tessera_core::pixel::mip_chain_len;
use tessera_core::RawResult;
use tessera_lanes::publish_lane::convert::{encode_pixel, extend_mip_chain};

/// Resolves a core budget, where `0` means every available core.
pub(crate) fn worker_threads(cpu_cores: usize) -> usize {
    if cpu_cores > 0 {
        return cpu_cores;
    }
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Bytes the full mip chain of `output` occupies.
pub(crate) fn output_bytes(output: &JobOutput) -> u64 {
    mip_chain_len(output.format, output.width, output.height, output.mip_levels) as u64
}

/// Renders the top level on up to `threads` scoped threads, one band of rows
/// each, then box-filters the remaining mip levels.
pub(crate) fn render_output(shader: &Shader, output: &JobOutput, threads: usize) -> RawResult {
    let (width, height) = (output.width.max(1), output.height.max(1));
    let threads = threads.clamp(1, height as usize);
    let rows_per_band = (height as usize).div_ceil(threads);

    let bands: Vec<Vec<u8>> = if threads == 1 {
        vec![render_rows(shader, output, 0..height)]
    } else {
        thread::scope(|scope| {
            let handles: Vec<_> = (0..height)
                .step_by(rows_per_band)
                .map(|start| {
                    let end = (start + rows_per_band as u32).min(height);
                    scope.spawn(move || render_rows(shader, output, start..end))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_default())
                .collect()
        })
    };

    let top = bands.concat();
    let mip_count = output.mip_levels.max(1);
    RawResult {
        format: output.format,
        width,
        height,
        mip_count,
        data: extend_mip_chain(output.format, top, width, height, 1, mip_count),
    }
}

fn render_rows(shader: &Shader, output: &JobOutput, rows: std::ops::Range<u32>) -> Vec<u8> {
    let (width, height) = (output.width.max(1), output.height.max(1));
    let mut out =
        Vec::with_capacity(rows.len() * width as usize * output.format.bytes_per_pixel());
    for y in rows {
        let v = (y as f32 + 0.5) / height as f32;
        for x in 0..width {
            let u = (x as f32 + 0.5) / width as f32;
            encode_pixel(output.format, shader(u, v), &mut out);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{OutputId, PixelFormat};

    fn output(format: PixelFormat, mip_levels: u32) -> JobOutput {
        JobOutput {
            id: OutputId::new("mask"),
            width: 8,
            height: 6,
            format,
            mip_levels,
        }
    }

    #[test]
    fn banded_render_matches_single_threaded() {
        let shader: Shader = Box::new(|u, v| [u, v, 0.5, 1.0]);
        let out = output(PixelFormat::Rgba8, 3);
        let single = render_output(&shader, &out, 1);
        let banded = render_output(&shader, &out, 4);
        assert_eq!(single, banded);
        assert!(single.is_well_formed());
        assert_eq!(single.mip_count, 3);
    }

    #[test]
    fn more_threads_than_rows_is_fine() {
        let shader: Shader = Box::new(|_, _| [1.0; 4]);
        let result = render_output(&shader, &output(PixelFormat::R8, 1), 64);
        assert_eq!(result.data, vec![255; 48]);
    }

    #[test]
    fn zero_cores_means_all_available() {
        assert!(worker_threads(0) >= 1);
        assert_eq!(worker_threads(3), 3);
    }
}
