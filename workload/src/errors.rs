// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Trace loading and consistency failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("Failed to read task trace '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse task trace '{}'", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("Tile {tile_id}: empty dependence list")]
    EmptyDependence { tile_id: i32 },

    #[error("Tile {tile_id}, dependency {index}: latency {latency} is not positive")]
    NonPositiveLatency {
        tile_id: i32,
        index: usize,
        latency: f64,
    },

    #[error("Tile {tile_id}, dependency {index}: drop set is not a subset of the wait set")]
    DropNotInWait { tile_id: i32, index: usize },

    #[error("Tile {tile_id}, dependency {index}: {reason}")]
    BadChunk {
        tile_id: i32,
        index: usize,
        reason: &'static str,
    },

    #[error("Tile {tile_id}: duplicate tile id within task")]
    DuplicateTileId { tile_id: i32 },

    #[error("Tile {tile_id}: target tile {target} does not exist in the task")]
    NoSuchTarget { tile_id: i32, target: i32 },

    #[error("Tile {tile_id}: source tile {source_id} does not exist in the task")]
    NoSuchSource { tile_id: i32, source_id: i32 },

    #[error("Tile {tile_id}: the -1 boundary sentinel must be the sole entry of its list")]
    MixedSentinel { tile_id: i32 },

    #[error("Tile {tile_id}: empty {list} list")]
    EmptyEndpointList { tile_id: i32, list: &'static str },
}
