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

//! # Tessera Agents
//!
//! The decision-making layer of the scheduler. The [`RenderAgent`] owns the
//! per-tick state machine that turns queued render requests into backend runs
//! and cache restores; the [`RenderSession`] is the explicit context object a
//! host constructs at startup that owns every piece of state the agent works
//! on.

#![warn(missing_docs)]

pub mod render_agent;
pub mod session;

pub use render_agent::{AgentStatus, RenderAgent, RenderContext, RenderPhase, TickReport};
pub use session::{RenderSession, SessionError};
