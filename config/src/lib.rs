// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration model for the NoC simulator. A run is fully described by a
//! [`RunConfig`]: grid shape and topology, buffer and link parameters, the
//! strategy names for mapping, scheduling and path generation, and the list
//! of task trace files. Strategy names are parsed into typed enums at load
//! time so that unsupported names are rejected before anything is built.

#![deny(unsafe_code, clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod errors;
mod runconfig;
mod strategy;

pub use errors::{ConfigError, ConfigResult};
pub use runconfig::RunConfig;
pub use strategy::{
    FlowSolver, FlowSolverConfig, MappingKind, NocTopology, ObjectiveTarget, PathGenerator,
    PathStrategy, ScheduleKind, VariableDomain,
};
