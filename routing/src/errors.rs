// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The error results used by the wire layer.

use crate::pos::NodePos;
use crate::wire::WireKey;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RoutingError {
    #[error("Grid of {rows}x{cols} tiles is not routable")]
    BadGridShape { rows: usize, cols: usize },

    #[error("Node {0} is outside the grid")]
    NodeOutsideGrid(NodePos),

    #[error("No wire between {a} and {b}")]
    NoSuchWire { a: NodePos, b: NodePos },

    #[error("Wire {wire} is already held (communication '{comm_id}')")]
    WireAlreadyBusy { wire: WireKey, comm_id: String },

    #[error("Wire {wire} is not held by communication '{comm_id}'")]
    WireNotHeld { wire: WireKey, comm_id: String },

    #[error("Wire {wire} is still busy at the end of the simulation")]
    WireStillBusy { wire: WireKey },

    #[error("Path endpoints {src} and {dst} are the same node")]
    DegeneratePath { src: NodePos, dst: NodePos },

    #[error("Path of {0} nodes is too short to route over")]
    PathTooShort(usize),
}
