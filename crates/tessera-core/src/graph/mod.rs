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

//! Graph instances, their inputs, and their renderable output slots.
//!
//! A [`PackageDescriptor`] describes what a procedural generator accepts and
//! produces. It is shared (behind an `Arc`) by every [`GraphInstance`] created
//! from it, so dependency information between inputs and outputs is computed
//! once per package rather than per instance.

mod ids;
mod input;
mod instance;
mod output;
mod package;

pub use ids::*;
pub use input::*;
pub use instance::*;
pub use output::*;
pub use package::*;
