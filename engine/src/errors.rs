// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The error results of the execution engine. All of them are fatal: the
//! simulator is deterministic and non-interactive, so every failure is a
//! modeling or trace-compilation bug.

use flow::FlowError;
use routing::{NodePos, RoutingError};
use thiserror::Error;
use workload::DataChunk;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Routing failure: {0}")]
    Routing(#[from] RoutingError),

    #[error("Flow planning failure: {0}")]
    Flow(#[from] FlowError),

    #[error("Input buffer has no source '{source_id}' (chunk {chunk:?})")]
    UnknownSource {
        source_id: i32,
        chunk: Option<DataChunk>,
    },

    #[error("Output buffer has no target '{target}'")]
    UnknownTarget { target: i32 },

    #[error("Chunk {chunk:?} is not in flight in the input buffer")]
    ChunkNotInFlight { chunk: DataChunk },

    #[error("Chunk {chunk:?} is not present in the buffer")]
    ChunkNotPresent { chunk: DataChunk },

    #[error("Buffer has no configured endpoints")]
    EmptyEndpoints,

    #[error("Mapping placed {placed} tiles but the task list has {expected}")]
    MappingLengthMismatch { placed: usize, expected: usize },

    #[error("Mapping strategy cannot place {tiles} tiles on a {rows}x{cols} grid")]
    GridTooSmall {
        tiles: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Mapping placed two tiles at {0}")]
    DuplicatePosition(NodePos),

    #[error("Communication '{id}' is already running")]
    CommunicationAlreadyRunning { id: String },

    #[error("Communication '{id}' was started without a transfer path")]
    EmptyTransferPath { id: String },

    #[error("Communication '{id}' has no pending chunk to transfer")]
    NoPendingChunk { id: String },

    #[error("Communication '{id}' finished with {done}/{total} transfers")]
    CommunicationIncomplete {
        id: String,
        done: usize,
        total: usize,
    },

    #[error("Tile {tile_id} is still running at the end of the simulation")]
    TileStillRunning { tile_id: i32 },

    #[error("Tile {tile_id} finished {done}/{total} dependencies")]
    TileIncomplete {
        tile_id: i32,
        done: usize,
        total: usize,
    },

    #[error("Tile {tile_id}: {buffer} buffer is not drained at the end of the simulation")]
    BufferNotDrained { tile_id: i32, buffer: &'static str },

    #[error("Deadlock: no event advances the clock past {now}")]
    Deadlock { now: f64 },
}
