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

//! # Tessera Infra
//!
//! Concrete implementations of the contracts in `tessera-core`: a reference
//! CPU render backend, the procedural generators it runs, and the logger
//! bootstrap shared by binaries.

#![warn(missing_docs)]

pub mod backend;
pub mod generators;
pub mod logging;

pub use backend::ThreadedBackend;
pub use generators::{Generator, GeneratorRegistry};
pub use logging::init_logging;
