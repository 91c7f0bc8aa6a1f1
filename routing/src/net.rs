// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The wire network: owns every wire of the grid and keeps the residual
//! adjacency in lockstep with wire occupancy.

use crate::errors::RoutingError;
use crate::pos::NodePos;
use crate::wire::{Wire, WireKey};
use ahash::AHashMap;
use config::NocTopology;
use tracing::debug;
use workload::DataChunk;

pub(crate) type Adjacency = AHashMap<NodePos, Vec<NodePos>>;

/// All wires of a mesh or torus grid plus the derived connectivity indexes.
#[derive(Debug)]
pub struct WireNet {
    rows: u16,
    cols: u16,
    topology: NocTopology,
    wires: Vec<Wire>,
    wires_map: AHashMap<WireKey, usize>,
    /// Connectivity through currently-free wires.
    adjacency: Adjacency,
    /// Full connectivity of the topology; never mutated after construction.
    origin_adjacency: Adjacency,
    transparent: bool,
    pub(crate) xy_cache: AHashMap<(NodePos, NodePos, crate::path::XyOrder), Vec<NodePos>>,
    pub(crate) adaptive_cache: AHashMap<(NodePos, NodePos), Vec<NodePos>>,
}

impl WireNet {
    pub fn new(
        rows: usize,
        cols: usize,
        band_width: f64,
        topology: NocTopology,
    ) -> Result<Self, RoutingError> {
        if rows == 0 || cols == 0 || rows.saturating_mul(cols) < 2 {
            return Err(RoutingError::BadGridShape { rows, cols });
        }
        let (Ok(rows), Ok(cols)) = (u16::try_from(rows), u16::try_from(cols)) else {
            return Err(RoutingError::BadGridShape { rows, cols });
        };
        let mut net = Self {
            rows,
            cols,
            topology,
            wires: Vec::new(),
            wires_map: AHashMap::new(),
            adjacency: AHashMap::new(),
            origin_adjacency: AHashMap::new(),
            transparent: false,
            xy_cache: AHashMap::new(),
            adaptive_cache: AHashMap::new(),
        };
        // horizontal wires
        for i in 0..rows {
            for j in 0..cols.saturating_sub(1) {
                net.add_wire(NodePos::new(i, j), NodePos::new(i, j + 1), band_width);
            }
        }
        // vertical wires
        for j in 0..cols {
            for i in 0..rows.saturating_sub(1) {
                net.add_wire(NodePos::new(i, j), NodePos::new(i + 1, j), band_width);
            }
        }
        // torus wrap-around wires; a wrap over a 2-long axis would duplicate
        // an existing wire
        if topology == NocTopology::Torus {
            if cols >= 3 {
                for i in 0..rows {
                    net.add_wire(NodePos::new(i, cols - 1), NodePos::new(i, 0), band_width);
                }
            }
            if rows >= 3 {
                for j in 0..cols {
                    net.add_wire(NodePos::new(rows - 1, j), NodePos::new(0, j), band_width);
                }
            }
        }
        net.origin_adjacency = net.adjacency.clone();
        debug!(
            "Built {} wire net {}x{} with {} wires",
            topology,
            rows,
            cols,
            net.wires.len()
        );
        Ok(net)
    }

    fn add_wire(&mut self, a: NodePos, b: NodePos, band_width: f64) {
        let wire = Wire::new(a, b, band_width);
        let key = wire.key();
        let index = self.wires.len();
        self.wires.push(wire);
        self.wires_map.insert(key, index);
        self.adjacency.entry(a).or_default().push(b);
        self.adjacency.entry(b).or_default().push(a);
    }

    #[must_use]
    pub fn shape(&self) -> (u16, u16) {
        (self.rows, self.cols)
    }

    #[must_use]
    pub fn topology(&self) -> NocTopology {
        self.topology
    }

    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn set_transparent(&mut self, transparent: bool) {
        for wire in &mut self.wires {
            wire.set_transparent(transparent);
        }
        self.transparent = transparent;
    }

    #[must_use]
    pub fn contains(&self, node: NodePos) -> bool {
        node.row < self.rows && node.col < self.cols
    }

    pub(crate) fn wire_index(&self, a: NodePos, b: NodePos) -> Result<usize, RoutingError> {
        self.wires_map
            .get(&WireKey::new(a, b))
            .copied()
            .ok_or(RoutingError::NoSuchWire { a, b })
    }

    pub fn wire_between(&self, a: NodePos, b: NodePos) -> Result<&Wire, RoutingError> {
        self.wire_index(a, b).map(|index| &self.wires[index])
    }

    /// True iff the wire between `a` and `b` is currently held.
    pub(crate) fn wire_busy(&self, a: NodePos, b: NodePos) -> Result<bool, RoutingError> {
        self.wire_between(a, b).map(Wire::state)
    }

    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.wires.iter()
    }

    pub(crate) fn residual_neighbors(&self, node: NodePos) -> &[NodePos] {
        self.adjacency.get(&node).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn origin_neighbors(&self, node: NodePos) -> &[NodePos] {
        self.origin_adjacency.get(&node).map_or(&[], Vec::as_slice)
    }

    /// The residual adjacency as `(node, neighbors)` pairs in row-major node
    /// order. This is the connectivity the flow planner builds its directed
    /// edge set from.
    #[must_use]
    pub fn residual_adjacency(&self) -> Vec<(NodePos, Vec<NodePos>)> {
        let mut nodes: Vec<NodePos> = self.adjacency.keys().copied().collect();
        nodes.sort_unstable();
        nodes
            .into_iter()
            .map(|node| (node, self.adjacency[&node].clone()))
            .collect()
    }

    /// Hop heuristic between two nodes; wrap-aware on a torus.
    #[must_use]
    pub fn heuristic(&self, a: NodePos, b: NodePos) -> u32 {
        match self.topology {
            NocTopology::Mesh => a.manhattan(b),
            NocTopology::Torus => a.torus_distance(b, self.rows, self.cols),
        }
    }

    /// True iff any wire along `path` is busy.
    pub fn data_path_busy(&self, path: &[NodePos]) -> Result<bool, RoutingError> {
        if path.len() < 2 {
            return Err(RoutingError::PathTooShort(path.len()));
        }
        for pair in path.windows(2) {
            if self.wire_busy(pair[0], pair[1])? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Flip every wire along `path` and mirror the change into the residual
    /// adjacency. Transparent wires record occupancy but never leave the
    /// adjacency.
    pub fn set_data_path_state(
        &mut self,
        path: &[NodePos],
        busy: bool,
        comm_id: &str,
        now: f64,
    ) -> Result<(), RoutingError> {
        if path.len() < 2 {
            return Err(RoutingError::PathTooShort(path.len()));
        }
        for pair in path.windows(2) {
            let index = self.wire_index(pair[0], pair[1])?;
            self.wires[index].set_state(busy, comm_id, now)?;
            if !self.wires[index].is_transparent() {
                self.update_adjacency(pair[0], pair[1], busy);
            }
        }
        Ok(())
    }

    fn update_adjacency(&mut self, a: NodePos, b: NodePos, busy: bool) {
        for (from, to) in [(a, b), (b, a)] {
            let neighbors = self.adjacency.entry(from).or_default();
            if busy {
                if let Some(position) = neighbors.iter().position(|&n| n == to) {
                    neighbors.remove(position);
                }
            } else {
                neighbors.push(to);
            }
        }
    }

    /// Time to move `data` over `path`: the sum of the per-wire transfer
    /// times.
    pub fn transfer_time(
        &self,
        path: &[NodePos],
        data: &[DataChunk],
    ) -> Result<f64, RoutingError> {
        if path.len() < 2 {
            return Err(RoutingError::PathTooShort(path.len()));
        }
        let mut total = 0.0;
        for pair in path.windows(2) {
            total += self.wire_between(pair[0], pair[1])?.transfer_time(data);
        }
        Ok(total)
    }

    /// Per-wire utilization over `[0, end_time]`, split into the horizontal
    /// (`rows` x `cols-1`) and vertical (`rows-1` x `cols`) wire groups.
    /// Torus wrap wires are not part of either group.
    #[must_use]
    pub fn running_rates(&self, end_time: f64) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let mut horizontal = vec![vec![0.0; usize::from(self.cols) - 1]; usize::from(self.rows)];
        let mut vertical = vec![vec![0.0; usize::from(self.cols)]; usize::from(self.rows) - 1];
        for wire in &self.wires {
            let key = wire.key();
            if key.a.row == key.b.row && key.b.col == key.a.col + 1 {
                horizontal[usize::from(key.a.row)][usize::from(key.a.col)] =
                    wire.running_rate(end_time);
            } else if key.a.col == key.b.col && key.b.row == key.a.row + 1 {
                vertical[usize::from(key.a.row)][usize::from(key.a.col)] =
                    wire.running_rate(end_time);
            }
        }
        (horizontal, vertical)
    }

    /// Verify every residual edge corresponds to a free (or transparent)
    /// wire and vice versa. The residual adjacency is a derived index; this
    /// is its consistency predicate.
    pub fn check_adjacency_consistency(&self) -> bool {
        for wire in &self.wires {
            let key = wire.key();
            let expected = !wire.state() || wire.is_transparent();
            let forward = self
                .adjacency
                .get(&key.a)
                .is_some_and(|neighbors| neighbors.contains(&key.b));
            let backward = self
                .adjacency
                .get(&key.b)
                .is_some_and(|neighbors| neighbors.contains(&key.a));
            if forward != expected || backward != expected {
                return false;
            }
        }
        true
    }

    pub fn check_finish(&self) -> Result<(), RoutingError> {
        for wire in &self.wires {
            wire.check_finish()?;
        }
        Ok(())
    }

    /// Drop the X-Y and adaptive path caches. Both only depend on the
    /// immutable topology, so recomputation returns identical answers.
    pub fn clear_path_caches(&mut self) {
        self.xy_cache.clear();
        self.adaptive_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mesh_3x3() -> WireNet {
        WireNet::new(3, 3, 1.0, NocTopology::Mesh).unwrap()
    }

    #[test]
    fn mesh_wire_count() {
        // 3 rows * 2 + 3 cols * 2
        assert_eq!(mesh_3x3().wires().count(), 12);
    }

    #[test]
    fn torus_adds_wrap_wires() {
        let net = WireNet::new(3, 3, 1.0, NocTopology::Torus).unwrap();
        assert_eq!(net.wires().count(), 18);
        assert!(
            net.wire_between(NodePos::new(0, 2), NodePos::new(0, 0))
                .is_ok()
        );
        assert!(
            net.wire_between(NodePos::new(2, 1), NodePos::new(0, 1))
                .is_ok()
        );
    }

    #[test]
    fn two_wide_torus_has_no_duplicate_wraps() {
        let net = WireNet::new(2, 2, 1.0, NocTopology::Torus).unwrap();
        assert_eq!(net.wires().count(), 4);
    }

    #[test]
    fn rejects_degenerate_grids() {
        assert!(WireNet::new(0, 3, 1.0, NocTopology::Mesh).is_err());
        assert!(WireNet::new(1, 1, 1.0, NocTopology::Mesh).is_err());
    }

    #[test]
    fn path_state_flips_wires_and_adjacency() {
        let mut net = mesh_3x3();
        let path = [NodePos::new(0, 0), NodePos::new(0, 1), NodePos::new(1, 1)];
        assert!(!net.data_path_busy(&path).unwrap());
        net.set_data_path_state(&path, true, "c0", 0.0).unwrap();
        assert!(net.data_path_busy(&path).unwrap());
        assert!(
            !net.residual_neighbors(NodePos::new(0, 0))
                .contains(&NodePos::new(0, 1))
        );
        assert!(net.check_adjacency_consistency());
        net.set_data_path_state(&path, false, "c0", 3.0).unwrap();
        assert!(!net.data_path_busy(&path).unwrap());
        assert!(
            net.residual_neighbors(NodePos::new(0, 0))
                .contains(&NodePos::new(0, 1))
        );
        assert!(net.check_adjacency_consistency());
        net.check_finish().unwrap();
    }

    #[test]
    fn double_reserve_is_rejected() {
        let mut net = mesh_3x3();
        let path = [NodePos::new(0, 0), NodePos::new(0, 1)];
        net.set_data_path_state(&path, true, "c0", 0.0).unwrap();
        assert!(matches!(
            net.set_data_path_state(&path, true, "c1", 0.0),
            Err(RoutingError::WireAlreadyBusy { .. })
        ));
    }

    #[test]
    fn transparent_wires_stay_in_adjacency() {
        let mut net = mesh_3x3();
        net.set_transparent(true);
        let path = [NodePos::new(0, 0), NodePos::new(0, 1)];
        net.set_data_path_state(&path, true, "c0", 0.0).unwrap();
        net.set_data_path_state(&path, true, "c1", 0.0).unwrap();
        assert!(!net.data_path_busy(&path).unwrap());
        assert!(net.check_adjacency_consistency());
        net.set_data_path_state(&path, false, "c0", 1.0).unwrap();
        net.set_data_path_state(&path, false, "c1", 2.0).unwrap();
        net.check_finish().unwrap();
    }

    #[test]
    fn transfer_time_sums_over_hops() {
        let net = mesh_3x3();
        let chunk = DataChunk {
            x: 0,
            y: 0,
            start: 0,
            end: 27,
            bit_width: 1,
            total: 27,
            image_id: 0,
            layer_id: 0,
            in_id: 0,
            tile_id: 0,
        };
        let path = [NodePos::new(0, 0), NodePos::new(0, 1), NodePos::new(0, 2)];
        assert_eq!(net.transfer_time(&path, &[chunk]).unwrap(), 54.0);
    }
}
