// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Path finders over the wire network.
//!
//! Every finder returns an ordered vertex list from source to destination,
//! or `None` when no path can be found under its discipline. The X-Y and
//! adaptive finders ignore occupancy (their answers depend only on the
//! immutable topology, so they are cached); the turn-model finders step
//! around busy wires; greedy, dijkstra and astar search the residual
//! adjacency directly.

use crate::errors::RoutingError;
use crate::net::WireNet;
use crate::pos::NodePos;
use ahash::{AHashMap, AHashSet};
use config::PathStrategy;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

/// Which axis the X-Y route advances first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XyOrder {
    /// Advance the row coordinate first.
    Row,
    /// Advance the column coordinate first.
    Col,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Row,
    Col,
}

impl Axis {
    fn other(self) -> Axis {
        match self {
            Axis::Row => Axis::Col,
            Axis::Col => Axis::Row,
        }
    }
}

/// One mesh step from `from` toward the coordinate of `to` along `axis`;
/// `None` when that coordinate already matches. Never wraps.
fn step_toward(from: NodePos, to: NodePos, axis: Axis) -> Option<NodePos> {
    match axis {
        Axis::Row => match from.row.cmp(&to.row) {
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Less => Some(NodePos::new(from.row + 1, from.col)),
            std::cmp::Ordering::Greater => Some(NodePos::new(from.row - 1, from.col)),
        },
        Axis::Col => match from.col.cmp(&to.col) {
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Less => Some(NodePos::new(from.row, from.col + 1)),
            std::cmp::Ordering::Greater => Some(NodePos::new(from.row, from.col - 1)),
        },
    }
}

fn rebuild_path(
    parents: &AHashMap<NodePos, NodePos>,
    src: NodePos,
    dst: NodePos,
) -> Vec<NodePos> {
    let mut path = vec![dst];
    let mut cursor = dst;
    while cursor != src {
        if let Some(&previous) = parents.get(&cursor) {
            path.push(previous);
            cursor = previous;
        } else {
            break;
        }
    }
    path.reverse();
    path
}

impl WireNet {
    /// Dispatch on the configured path strategy.
    pub fn find_path(
        &mut self,
        src: NodePos,
        dst: NodePos,
        strategy: PathStrategy,
    ) -> Result<Option<Vec<NodePos>>, RoutingError> {
        if !self.contains(src) {
            return Err(RoutingError::NodeOutsideGrid(src));
        }
        if !self.contains(dst) {
            return Err(RoutingError::NodeOutsideGrid(dst));
        }
        if src == dst {
            return Err(RoutingError::DegeneratePath { src, dst });
        }
        match strategy {
            PathStrategy::Naive => Ok(Some(self.xy_path(src, dst, XyOrder::Col))),
            PathStrategy::WestFirst | PathStrategy::NorthLast | PathStrategy::NegativeFirst => {
                self.turn_model_path(src, dst, strategy)
            }
            PathStrategy::Adaptive => Ok(self.adaptive_path(src, dst)),
            PathStrategy::Greedy => Ok(self.greedy_path(src, dst)),
            PathStrategy::Dijkstra => Ok(self.bfs_path(src, dst, false)),
            PathStrategy::Astar => Ok(self.astar_path(src, dst)),
        }
    }

    /// Deterministic X-Y route: advance one axis to the destination
    /// coordinate, then the other. Ignores occupancy and torus wrap wires.
    pub fn xy_path(&mut self, src: NodePos, dst: NodePos, order: XyOrder) -> Vec<NodePos> {
        if let Some(cached) = self.xy_cache.get(&(src, dst, order)) {
            return cached.clone();
        }
        let (first, second) = match order {
            XyOrder::Row => (Axis::Row, Axis::Col),
            XyOrder::Col => (Axis::Col, Axis::Row),
        };
        let mut path = vec![src];
        let mut cursor = src;
        for axis in [first, second] {
            while let Some(next) = step_toward(cursor, dst, axis) {
                path.push(next);
                cursor = next;
            }
        }
        self.xy_cache.insert((src, dst, order), path.clone());
        path
    }

    /// Minimum-hop route over the full topology (wrap-aware on a torus),
    /// ignoring occupancy. Breadth-first, cached.
    pub fn adaptive_path(&mut self, src: NodePos, dst: NodePos) -> Option<Vec<NodePos>> {
        if let Some(cached) = self.adaptive_cache.get(&(src, dst)) {
            return Some(cached.clone());
        }
        let path = self.bfs_path(src, dst, true)?;
        self.adaptive_cache.insert((src, dst), path.clone());
        Some(path)
    }

    /// Turn-model route. When the destination lies in the variant's
    /// restricted quadrant the route is forced and equals X-Y; otherwise the
    /// route winds: walk the current axis while its wires are free, swap
    /// axes, and give up after three consecutive zero-advance rounds.
    fn turn_model_path(
        &mut self,
        src: NodePos,
        dst: NodePos,
        strategy: PathStrategy,
    ) -> Result<Option<Vec<NodePos>>, RoutingError> {
        let row_delta = i32::from(dst.row) - i32::from(src.row);
        let col_delta = i32::from(dst.col) - i32::from(src.col);
        let (forced, order) = match strategy {
            PathStrategy::WestFirst => (col_delta <= 0, XyOrder::Col),
            PathStrategy::NorthLast => (row_delta <= 0, XyOrder::Col),
            PathStrategy::NegativeFirst => {
                let order = if row_delta < 0 && col_delta >= 0 {
                    XyOrder::Row
                } else {
                    XyOrder::Col
                };
                (row_delta <= 0 || col_delta <= 0, order)
            }
            _ => unreachable!("not a turn-model strategy"),
        };
        if forced {
            return Ok(Some(self.xy_path(src, dst, order)));
        }
        self.winding_path(src, dst)
    }

    fn winding_path(
        &self,
        src: NodePos,
        dst: NodePos,
    ) -> Result<Option<Vec<NodePos>>, RoutingError> {
        let mut path = vec![src];
        let mut cursor = src;
        let mut axis = Axis::Col;
        let mut zero_advance_rounds = 0;
        while cursor != dst {
            if zero_advance_rounds >= 3 {
                return Ok(None);
            }
            let mut advanced = 0;
            while let Some(next) = step_toward(cursor, dst, axis) {
                if self.wire_busy(cursor, next)? {
                    break;
                }
                path.push(next);
                cursor = next;
                advanced += 1;
            }
            if advanced == 0 {
                zero_advance_rounds += 1;
            } else {
                zero_advance_rounds = 0;
            }
            axis = axis.other();
        }
        Ok(Some(path))
    }

    /// Breadth-first search with unit edge weights; `origin` selects the
    /// full topology, otherwise the residual adjacency.
    fn bfs_path(&self, src: NodePos, dst: NodePos, origin: bool) -> Option<Vec<NodePos>> {
        let mut parents: AHashMap<NodePos, NodePos> = AHashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(src);
        parents.insert(src, src);
        while let Some(node) = queue.pop_front() {
            if node == dst {
                return Some(rebuild_path(&parents, src, dst));
            }
            let neighbors = if origin {
                self.origin_neighbors(node)
            } else {
                self.residual_neighbors(node)
            };
            for &next in neighbors {
                if !parents.contains_key(&next) {
                    parents.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Best-first search guided by the heuristic alone, over the residual
    /// adjacency. No cost accumulation, so the result is not necessarily
    /// shortest.
    fn greedy_path(&self, src: NodePos, dst: NodePos) -> Option<Vec<NodePos>> {
        let capacity = 3 * usize::from(self.shape().0) * usize::from(self.shape().1);
        let mut open: BinaryHeap<Reverse<(u32, u32, NodePos)>> =
            BinaryHeap::with_capacity(capacity);
        let mut parents: AHashMap<NodePos, NodePos> = AHashMap::new();
        let mut sequence = 0;
        parents.insert(src, src);
        open.push(Reverse((self.heuristic(src, dst), sequence, src)));
        while let Some(Reverse((_, _, node))) = open.pop() {
            if node == dst {
                return Some(rebuild_path(&parents, src, dst));
            }
            for &next in self.residual_neighbors(node) {
                if !parents.contains_key(&next) {
                    parents.insert(next, node);
                    sequence += 1;
                    open.push(Reverse((self.heuristic(next, dst), sequence, next)));
                }
            }
        }
        None
    }

    /// A* over the residual adjacency, `f = g + h`, ties broken by
    /// insertion order.
    fn astar_path(&self, src: NodePos, dst: NodePos) -> Option<Vec<NodePos>> {
        let capacity = 3 * usize::from(self.shape().0) * usize::from(self.shape().1);
        let mut open: BinaryHeap<Reverse<(u32, u32, NodePos)>> =
            BinaryHeap::with_capacity(capacity);
        let mut parents: AHashMap<NodePos, NodePos> = AHashMap::new();
        let mut best_cost: AHashMap<NodePos, u32> = AHashMap::new();
        let mut closed: AHashSet<NodePos> = AHashSet::new();
        let mut sequence = 0;
        parents.insert(src, src);
        best_cost.insert(src, 0);
        open.push(Reverse((self.heuristic(src, dst), sequence, src)));
        while let Some(Reverse((_, _, node))) = open.pop() {
            if node == dst {
                return Some(rebuild_path(&parents, src, dst));
            }
            if !closed.insert(node) {
                continue;
            }
            let cost = best_cost.get(&node).copied().unwrap_or(u32::MAX);
            for &next in self.residual_neighbors(node) {
                let tentative = cost + 1;
                if tentative < best_cost.get(&next).copied().unwrap_or(u32::MAX) {
                    best_cost.insert(next, tentative);
                    parents.insert(next, node);
                    sequence += 1;
                    open.push(Reverse((
                        tentative + self.heuristic(next, dst),
                        sequence,
                        next,
                    )));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::NocTopology;
    use pretty_assertions::assert_eq;

    fn pos(row: u16, col: u16) -> NodePos {
        NodePos::new(row, col)
    }

    fn mesh(rows: usize, cols: usize) -> WireNet {
        WireNet::new(rows, cols, 1.0, NocTopology::Mesh).unwrap()
    }

    fn assert_walkable(net: &WireNet, path: &[NodePos]) {
        assert!(path.len() >= 2);
        for pair in path.windows(2) {
            assert!(
                net.wire_between(pair[0], pair[1]).is_ok(),
                "no wire between {} and {}",
                pair[0],
                pair[1]
            );
        }
        let mut seen = path.to_vec();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), path.len(), "path revisits a node");
    }

    #[test]
    fn xy_advances_column_then_row() {
        let mut net = mesh(3, 3);
        let path = net
            .find_path(pos(2, 0), pos(0, 2), PathStrategy::Naive)
            .unwrap()
            .unwrap();
        assert_eq!(
            path,
            vec![pos(2, 0), pos(2, 1), pos(2, 2), pos(1, 2), pos(0, 2)]
        );
        let row_first = net.xy_path(pos(2, 0), pos(0, 2), XyOrder::Row);
        assert_eq!(
            row_first,
            vec![pos(2, 0), pos(1, 0), pos(0, 0), pos(0, 1), pos(0, 2)]
        );
    }

    #[test]
    fn xy_cache_matches_recomputation() {
        let mut net = mesh(4, 4);
        let first = net.xy_path(pos(0, 0), pos(3, 3), XyOrder::Col);
        let cached = net.xy_path(pos(0, 0), pos(3, 3), XyOrder::Col);
        net.clear_path_caches();
        let fresh = net.xy_path(pos(0, 0), pos(3, 3), XyOrder::Col);
        assert_eq!(first, cached);
        assert_eq!(first, fresh);
    }

    #[test]
    fn adaptive_cache_matches_recomputation() {
        let mut net = mesh(4, 4);
        let first = net.adaptive_path(pos(0, 0), pos(3, 2)).unwrap();
        net.clear_path_caches();
        let fresh = net.adaptive_path(pos(0, 0), pos(3, 2)).unwrap();
        assert_eq!(first, fresh);
    }

    #[test]
    fn west_first_in_legal_quadrant_is_xy() {
        let mut net = mesh(5, 5);
        let turn = net
            .find_path(pos(2, 2), pos(0, 0), PathStrategy::WestFirst)
            .unwrap()
            .unwrap();
        let xy = net.xy_path(pos(2, 2), pos(0, 0), XyOrder::Col);
        assert_eq!(turn, xy);
    }

    #[test]
    fn west_first_winds_around_busy_wires() {
        let mut net = mesh(5, 5);
        // block the eastward wire out of (2,2) so the first column round
        // cannot advance
        net.set_data_path_state(&[pos(2, 2), pos(2, 3)], true, "blocker", 0.0)
            .unwrap();
        let path = net
            .find_path(pos(2, 2), pos(4, 4), PathStrategy::WestFirst)
            .unwrap()
            .unwrap();
        assert_walkable(&net, &path);
        assert_eq!(path.first(), Some(&pos(2, 2)));
        assert_eq!(path.last(), Some(&pos(4, 4)));
        // winding must start on the row axis since the column is blocked
        assert_eq!(path[1], pos(3, 2));
    }

    #[test]
    fn winding_fails_when_fenced_in() {
        let mut net = mesh(5, 5);
        // fence off (2,2) toward the south-east quadrant
        for (a, b) in [
            (pos(2, 2), pos(2, 3)),
            (pos(2, 2), pos(3, 2)),
        ] {
            net.set_data_path_state(&[a, b], true, "blocker", 0.0).unwrap();
        }
        let path = net
            .find_path(pos(2, 2), pos(4, 4), PathStrategy::WestFirst)
            .unwrap();
        assert_eq!(path, None);
    }

    #[test]
    fn north_last_and_negative_first_dispatch() {
        let mut net = mesh(5, 5);
        // north destination: forced X-Y for north_last
        let north = net
            .find_path(pos(2, 2), pos(0, 3), PathStrategy::NorthLast)
            .unwrap()
            .unwrap();
        assert_eq!(north, net.xy_path(pos(2, 2), pos(0, 3), XyOrder::Col));
        // north-east destination: negative_first goes north before east
        let mixed = net
            .find_path(pos(2, 2), pos(0, 4), PathStrategy::NegativeFirst)
            .unwrap()
            .unwrap();
        assert_eq!(mixed, net.xy_path(pos(2, 2), pos(0, 4), XyOrder::Row));
        // all-positive destination winds
        let wound = net
            .find_path(pos(2, 2), pos(4, 4), PathStrategy::NegativeFirst)
            .unwrap()
            .unwrap();
        assert_walkable(&net, &wound);
    }

    #[test]
    fn residual_searches_route_around_occupancy() {
        let mut net = mesh(3, 3);
        net.set_data_path_state(&[pos(0, 0), pos(0, 1), pos(0, 2)], true, "c0", 0.0)
            .unwrap();
        for strategy in [PathStrategy::Dijkstra, PathStrategy::Astar, PathStrategy::Greedy] {
            let path = net
                .find_path(pos(0, 0), pos(0, 2), strategy)
                .unwrap()
                .unwrap_or_else(|| panic!("{strategy} found no path"));
            assert_walkable(&net, &path);
            assert!(!net.data_path_busy(&path).unwrap(), "{strategy} used a busy wire");
        }
        // dijkstra detours through the middle row: 4 hops
        let detour = net
            .find_path(pos(0, 0), pos(0, 2), PathStrategy::Dijkstra)
            .unwrap()
            .unwrap();
        assert_eq!(detour.len(), 5);
    }

    #[test]
    fn residual_searches_report_disconnection() {
        let mut net = mesh(2, 2);
        net.set_data_path_state(&[pos(0, 0), pos(0, 1)], true, "c0", 0.0)
            .unwrap();
        net.set_data_path_state(&[pos(0, 0), pos(1, 0)], true, "c1", 0.0)
            .unwrap();
        for strategy in [PathStrategy::Dijkstra, PathStrategy::Astar, PathStrategy::Greedy] {
            assert_eq!(net.find_path(pos(0, 0), pos(1, 1), strategy).unwrap(), None);
        }
    }

    #[test]
    fn astar_finds_shortest_on_open_mesh() {
        let mut net = mesh(4, 4);
        let path = net
            .find_path(pos(0, 0), pos(3, 3), PathStrategy::Astar)
            .unwrap()
            .unwrap();
        assert_eq!(path.len(), 7);
        assert_walkable(&net, &path);
    }

    #[test]
    fn torus_adaptive_uses_wrap_wires() {
        let mut net = WireNet::new(3, 3, 1.0, NocTopology::Torus).unwrap();
        // ring around (1,1) busy plus one long edge, as in the fixture
        for (a, b) in [
            (pos(1, 1), pos(0, 1)),
            (pos(1, 1), pos(2, 1)),
            (pos(1, 1), pos(1, 0)),
            (pos(1, 1), pos(1, 2)),
            (pos(2, 0), pos(2, 1)),
        ] {
            net.set_data_path_state(&[a, b], true, "blocker", 0.0).unwrap();
        }
        let adaptive = net.adaptive_path(pos(0, 2), pos(1, 0)).unwrap();
        assert_eq!(adaptive.len(), 3, "wrap-around path must take 2 hops");
        let residual = net
            .find_path(pos(0, 2), pos(1, 0), PathStrategy::Dijkstra)
            .unwrap()
            .unwrap();
        assert_eq!(residual.len(), 3);
        assert!(!net.data_path_busy(&residual).unwrap());
        // naive stays on the non-wrap X-Y route
        let naive = net
            .find_path(pos(0, 2), pos(1, 0), PathStrategy::Naive)
            .unwrap()
            .unwrap();
        assert_eq!(naive, vec![pos(0, 2), pos(0, 1), pos(0, 0), pos(1, 0)]);
    }

    #[test]
    fn degenerate_and_out_of_grid_requests_error() {
        let mut net = mesh(3, 3);
        assert!(matches!(
            net.find_path(pos(1, 1), pos(1, 1), PathStrategy::Naive),
            Err(RoutingError::DegeneratePath { .. })
        ));
        assert!(matches!(
            net.find_path(pos(0, 0), pos(5, 5), PathStrategy::Naive),
            Err(RoutingError::NodeOutsideGrid(_))
        ));
    }
}
