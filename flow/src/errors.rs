// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Failures of the flow formulation, solve, and plan extraction. Every one
//! of them is fatal at scheduler-construction time.

use routing::NodePos;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    #[error("The wire network has no routable nodes")]
    EmptyNetwork,

    #[error("Demand endpoint {0} is not a node of the wire network")]
    UnknownNode(NodePos),

    #[error("Wire {0} does not map to exactly two directed edges")]
    WireNotTwoEdges(String),

    #[error("The flow problem is not solvable: solver finished with status {0}")]
    Infeasible(String),

    #[error("Commodity {commodity}: solution carries negative flow")]
    NegativeFlow { commodity: usize },

    #[error("Commodity {commodity}: solution violates flow conservation")]
    Unbalanced { commodity: usize },

    #[error("Commodity {commodity}: flow decomposition found a loop")]
    LoopInPath { commodity: usize },

    #[error("Commodity {commodity}: flow decomposition stalled before the sink")]
    ExtractionStalled { commodity: usize },

    #[error("Commodity {commodity}: residual flow left after decomposition")]
    ResidualNotDrained { commodity: usize },

    #[error("Commodity {commodity}: extracted paths do not carry the demand")]
    DemandMismatch { commodity: usize },

    #[error("No flow plan for the pair {src} -> {dst}")]
    NoPlanForPair { src: NodePos, dst: NodePos },
}
