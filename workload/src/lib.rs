// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Workload model: the pre-compiled per-tile behavior traces the simulator
//! executes. A task is a list of tile behaviors; each behavior is an ordered
//! list of dependencies (wait/output/drop chunk sets plus a latency). Traces
//! are validated once at load time so the engine can assume they are
//! well-formed.

#![deny(unsafe_code, clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod behavior;
mod chunk;
mod errors;

pub use behavior::{
    Dependency, TaskBehavior, TileBehavior, flatten_tasks, load_task_file, validate_task,
};
pub use chunk::{DataChunk, total_size_bits};
pub use errors::WorkloadError;

/// Sentinel tile id marking a pipeline boundary in source/target lists.
pub const BOUNDARY_TILE_ID: i32 = -1;
