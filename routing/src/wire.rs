// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A single physical link between two adjacent grid nodes.

use crate::errors::RoutingError;
use crate::pos::NodePos;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use workload::{DataChunk, total_size_bits};

/// Normalized wire endpoints: `a` always lexicographically precedes `b`, so
/// the key is direction-agnostic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WireKey {
    pub a: NodePos,
    pub b: NodePos,
}

impl WireKey {
    #[must_use]
    pub fn new(x: NodePos, y: NodePos) -> Self {
        if x <= y { Self { a: x, b: y } } else { Self { a: y, b: x } }
    }
}

impl fmt::Display for WireKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}

/// One wire: configured bandwidth, an exclusive-hold bit, and the record of
/// which communication occupied it when.
///
/// In transparent mode the exclusion invariant is disabled: any number of
/// communications may hold the wire at once, occupancy is still recorded per
/// communication, and no busy time accrues (the wire reports as idle).
#[derive(Debug)]
pub struct Wire {
    key: WireKey,
    band_width: f64,
    busy: bool,
    transparent: bool,
    busy_time: f64,
    open: AHashMap<String, f64>,
    occupancy: AHashMap<String, Vec<(f64, f64)>>,
}

impl Wire {
    #[must_use]
    pub fn new(x: NodePos, y: NodePos, band_width: f64) -> Self {
        Self {
            key: WireKey::new(x, y),
            band_width,
            busy: false,
            transparent: false,
            busy_time: 0.0,
            open: AHashMap::new(),
            occupancy: AHashMap::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> WireKey {
        self.key
    }

    /// True while a communication exclusively holds the wire. Always false
    /// in transparent mode.
    #[must_use]
    pub fn state(&self) -> bool {
        self.busy
    }

    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn set_transparent(&mut self, transparent: bool) {
        self.transparent = transparent;
    }

    /// Time to push a data list over this wire.
    #[must_use]
    pub fn transfer_time(&self, data: &[DataChunk]) -> f64 {
        total_size_bits(data) as f64 / self.band_width
    }

    /// Acquire or release the wire for `comm_id` at `now`, recording the
    /// occupancy interval. Acquiring a held non-transparent wire is an
    /// invariant violation.
    pub fn set_state(
        &mut self,
        busy: bool,
        comm_id: &str,
        now: f64,
    ) -> Result<(), RoutingError> {
        if busy {
            if !self.transparent {
                if self.busy {
                    return Err(RoutingError::WireAlreadyBusy {
                        wire: self.key,
                        comm_id: comm_id.to_string(),
                    });
                }
                self.busy = true;
            }
            self.open.insert(comm_id.to_string(), now);
        } else {
            let start = self.open.remove(comm_id).ok_or_else(|| RoutingError::WireNotHeld {
                wire: self.key,
                comm_id: comm_id.to_string(),
            })?;
            self.occupancy
                .entry(comm_id.to_string())
                .or_default()
                .push((start, now));
            if !self.transparent {
                self.busy = false;
                self.busy_time += now - start;
            }
        }
        Ok(())
    }

    /// Fraction of `[0, end_time]` this wire spent exclusively held.
    #[must_use]
    pub fn running_rate(&self, end_time: f64) -> f64 {
        if end_time > 0.0 { self.busy_time / end_time } else { 0.0 }
    }

    /// Closed occupancy intervals per communication, in a deterministic
    /// order.
    #[must_use]
    pub fn occupancy(&self) -> Vec<(String, Vec<(f64, f64)>)> {
        let mut records: Vec<(String, Vec<(f64, f64)>)> = self
            .occupancy
            .iter()
            .map(|(comm_id, intervals)| (comm_id.clone(), intervals.clone()))
            .collect();
        records.sort_by(|left, right| left.0.cmp(&right.0));
        records
    }

    pub fn check_finish(&self) -> Result<(), RoutingError> {
        if self.busy || !self.open.is_empty() {
            return Err(RoutingError::WireStillBusy { wire: self.key });
        }
        Ok(())
    }
}
