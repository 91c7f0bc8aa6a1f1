// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Pre-planned flow scheduling: a min-cost multi-commodity flow over the
//! directed multigraph induced by the wire network, solved once at scheduler
//! construction and decomposed into per-communication path plans that real
//! transfers consume as they fire.

#![deny(unsafe_code, clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

mod errors;
mod plan;
mod planner;

pub use errors::FlowError;
pub use plan::{FlowPlans, PlannedFlow};
pub use planner::{CommodityDemand, FlowPlanner};
