// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Post-mortem report model.

use routing::NodePos;
use serde::Serialize;

/// One communication channel: endpoints, delivered volume, and every
/// transfer interval with the path of the last one.
#[derive(Debug, Clone, Serialize)]
pub struct CommunicationInfo {
    pub id: String,
    pub source: NodePos,
    pub target: NodePos,
    pub amount_bits: u64,
    pub intervals: Vec<(f64, f64)>,
    pub path: Vec<NodePos>,
}

/// Occupancy of one wire by one communication.
#[derive(Debug, Clone, Serialize)]
pub struct CommOccupancy {
    pub id: String,
    pub intervals: Vec<(f64, f64)>,
}

/// One wire: endpoints, per-communication occupancy, utilization.
#[derive(Debug, Clone, Serialize)]
pub struct WireRange {
    pub a: NodePos,
    pub b: NodePos,
    pub occupancy: Vec<CommOccupancy>,
    pub running_rate: f64,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub label: String,
    pub mapping: String,
    pub schedule: String,
    pub path_generator: String,
    pub image_num: usize,
    pub transparent: bool,
    pub wall_seconds: f64,
    pub latency_ns: f64,
    pub latency_ms: f64,
    pub communication_info_list: Vec<CommunicationInfo>,
    pub wire_range_list: Vec<WireRange>,
}
