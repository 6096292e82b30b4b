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

use super::{color, float, lerp, Generator, Inputs, Shader};

/// A linear blend between two colors.
///
/// Inputs: `start`, `end`, and `angle` in degrees (0 runs left to right).
#[derive(Debug, Clone, Copy, Default)]
pub struct Gradient;

impl Generator for Gradient {
    fn name(&self) -> &str {
        "gradient"
    }

    fn shader(&self, inputs: &Inputs) -> Shader {
        let start = color(inputs, "start", [0.0, 0.0, 0.0, 1.0]);
        let end = color(inputs, "end", [1.0, 1.0, 1.0, 1.0]);
        let (sin, cos) = float(inputs, "angle", 0.0).to_radians().sin_cos();
        // Project the unit square's corners to normalize t into [0, 1].
        let corners = [0.0, cos, sin, cos + sin];
        let lo = corners.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = corners.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let span = (hi - lo).max(f32::EPSILON);
        Box::new(move |u, v| {
            let t = ((u * cos + v * sin - lo) / span).clamp(0.0, 1.0);
            lerp(start, end, t)
        })
    }
}
