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

use super::{color, float, Generator, Inputs, Shader};

/// Alternating tiles of two colors.
///
/// Inputs: `scale` (tiles per side, default 8), `color_a`, `color_b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checker;

impl Generator for Checker {
    fn name(&self) -> &str {
        "checker"
    }

    fn shader(&self, inputs: &Inputs) -> Shader {
        let scale = float(inputs, "scale", 8.0).max(1.0);
        let a = color(inputs, "color_a", [1.0, 1.0, 1.0, 1.0]);
        let b = color(inputs, "color_b", [0.0, 0.0, 0.0, 1.0]);
        Box::new(move |u, v| {
            let cell = (u * scale).floor() as i64 + (v * scale).floor() as i64;
            if cell.rem_euclid(2) == 0 {
                a
            } else {
                b
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::InputValue;

    #[test]
    fn neighbouring_tiles_alternate() {
        let mut inputs = Inputs::new();
        inputs.insert("scale".into(), InputValue::Float(2.0));
        let shader = Checker.shader(&inputs);
        assert_eq!(shader(0.1, 0.1), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(shader(0.6, 0.1), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(shader(0.6, 0.6), [1.0, 1.0, 1.0, 1.0]);
    }
}
