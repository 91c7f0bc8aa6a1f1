// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Run artifacts: the per-run latency line file and the JSON post-mortem
//! report consumed by the visualization tooling.

#![deny(unsafe_code, clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod report;
mod writer;

pub use report::{CommOccupancy, CommunicationInfo, RunReport, WireRange};
pub use writer::{StatsError, append_output_info, output_info_name, write_json_report};
