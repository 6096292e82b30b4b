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

//! Acts as the agent for asynchronous rendering.
//!
//! Each tick it decides which queued instances to handle, restores what it can
//! from the content cache, hands the rest to the backend as one batch, and
//! publishes the batch once the backend reports it finished. It never blocks
//! on the backend except through the explicit synchronous path.

mod agent;
mod metrics;

pub use agent::*;
pub use metrics::RenderMetrics;
