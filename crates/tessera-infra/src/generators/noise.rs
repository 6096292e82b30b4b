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

use super::{color, float, int, lerp, Generator, Inputs, Shader};

const MAX_OCTAVES: i32 = 8;

/// Fractal value noise blended between two colors.
///
/// Inputs: `seed`, `scale` (lattice cells per side, default 8), `octaves`
/// (default 4, at most 8), `low`, `high`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noise;

impl Generator for Noise {
    fn name(&self) -> &str {
        "noise"
    }

    fn shader(&self, inputs: &Inputs) -> Shader {
        let seed = int(inputs, "seed", 0) as u32;
        let scale = float(inputs, "scale", 8.0).max(1.0);
        let octaves = int(inputs, "octaves", 4).clamp(1, MAX_OCTAVES);
        let low = color(inputs, "low", [0.0, 0.0, 0.0, 1.0]);
        let high = color(inputs, "high", [1.0, 1.0, 1.0, 1.0]);
        Box::new(move |u, v| lerp(low, high, fbm(seed, u * scale, v * scale, octaves)))
    }
}

/// Sum of `octaves` value-noise layers, normalized to `[0, 1]`.
fn fbm(seed: u32, x: f32, y: f32, octaves: i32) -> f32 {
    let mut sum = 0.0;
    let mut norm = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    for octave in 0..octaves {
        sum += amplitude * value_noise(seed.wrapping_add(octave as u32), x * frequency, y * frequency);
        norm += amplitude;
        amplitude *= 0.5;
        frequency *= 2.0;
    }
    sum / norm
}

fn value_noise(seed: u32, x: f32, y: f32) -> f32 {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (smoothstep(x - x0), smoothstep(y - y0));
    let (ix, iy) = (x0 as i32, y0 as i32);
    let top = mix(lattice(seed, ix, iy), lattice(seed, ix + 1, iy), fx);
    let bottom = mix(lattice(seed, ix, iy + 1), lattice(seed, ix + 1, iy + 1), fx);
    mix(top, bottom, fy)
}

/// Deterministic pseudo-random value in `[0, 1]` for a lattice point.
fn lattice(seed: u32, x: i32, y: i32) -> f32 {
    let mut h = seed
        ^ (x as u32).wrapping_mul(0x27d4_eb2d)
        ^ (y as u32).wrapping_mul(0x1656_67b1);
    h ^= h >> 15;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    (h & 0x00ff_ffff) as f32 / 0x00ff_ffff as f32
}

fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::InputValue;

    #[test]
    fn same_seed_same_texture() {
        let mut inputs = Inputs::new();
        inputs.insert("seed".into(), InputValue::Int(42));
        let a = Noise.shader(&inputs);
        let b = Noise.shader(&inputs);
        for (u, v) in [(0.1, 0.2), (0.5, 0.5), (0.93, 0.07)] {
            assert_eq!(a(u, v), b(u, v));
        }
    }

    #[test]
    fn values_stay_in_range() {
        for i in 0..64 {
            let n = fbm(7, i as f32 * 0.37, i as f32 * 0.11, 5);
            assert!((0.0..=1.0).contains(&n), "{n} out of range");
        }
    }

    #[test]
    fn lattice_points_are_exact() {
        assert_eq!(value_noise(3, 2.0, 5.0), lattice(3, 2, 5));
    }
}
