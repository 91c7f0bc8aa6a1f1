// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The behavior-driven execution engine: tiles consume and produce data
//! chunks at latency-bound events, communications move chunks over reserved
//! wire paths, the scheduler decides which ready transfer starts with what
//! path, and the array drives everything over a discrete event clock to a
//! fixed point.
//!
//! The engine is strictly single-threaded and deterministic. Within one
//! tick all completions are committed before any dispatch is considered,
//! tiles are re-evaluated before communications are scheduled, and the
//! scheduler's priority order decides contention for wires.

#![deny(unsafe_code, clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

mod array;
mod buffer;
mod communication;
mod errors;
mod mapping;
mod schedule;
mod tile;

pub use array::{Array, SimSummary};
pub use buffer::{InputBuffer, MultiInputBuffer, MultiOutputBuffer, OutputBuffer};
pub use communication::Communication;
pub use errors::SimError;
pub use mapping::position_list;
pub use schedule::Scheduler;
pub use tile::Tile;
