// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The wire layer of the simulator: physical links between adjacent tiles,
//! the network that owns them, and the path finders that route transfers
//! over it.
//!
//! The network keeps two views of connectivity. The *origin adjacency* is
//! the full topology and never changes; the *residual adjacency* drops both
//! directions of every wire currently held by a running transfer and is the
//! view the occupancy-aware path finders search. The residual view is a
//! derived index: it contains an edge iff the wire is free (or transparent).

#![deny(unsafe_code, clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

mod errors;
mod net;
mod path;
mod pos;
mod wire;

pub use errors::RoutingError;
pub use net::WireNet;
pub use path::XyOrder;
pub use pos::NodePos;
pub use wire::{Wire, WireKey};
