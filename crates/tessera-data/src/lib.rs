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

//! # Tessera Data
//!
//! In-memory data layouts of the render scheduler: the typed instance store,
//! dirty-flag tracking, and the lane-based render request queue.
//!
//! Everything here is single-writer. It is mutated from the scheduler's tick
//! thread only and carries no internal synchronization.

#![warn(missing_docs)]

pub mod dirty;
pub mod instances;
pub mod queue;

pub use instances::{InstanceKey, InstanceStore};
pub use queue::{EnqueueOutcome, Lane, RenderRequestQueue};
