// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The reasons why we may reject a run configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown NoC topology '{0}'")]
    UnknownTopology(String),

    #[error("Unknown mapping strategy '{0}'")]
    UnknownMapping(String),

    #[error("Unknown schedule strategy '{0}'")]
    UnknownSchedule(String),

    #[error("Unknown path generator '{0}'")]
    UnknownPathGenerator(String),

    #[error("Unknown flow solver '{0}'")]
    UnknownFlowSolver(String),

    #[error("Bad flow solver config '{0}': {1}")]
    BadSolverConfig(String, &'static str),

    #[error("Grid dimensions must be positive, got {rows}x{cols}")]
    BadGridShape { rows: usize, cols: usize },

    #[error("{0} must be positive")]
    NonPositive(&'static str),

    #[error("Schedule strategy '{schedule}' needs an occupancy-aware path generator, got '{generator}'")]
    PathGeneratorMismatch { schedule: String, generator: String },

    #[error("No task trace files configured")]
    NoTasks,

    #[error("Failed to read config file '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}'", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
