// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-tick transfer dispatch.
//!
//! Each tick the scheduler filters the flagged communications down to the
//! ready ones, orders them by the configured priority, and walks them in
//! order: find a path, check it against current occupancy, and start the
//! transfer. A started transfer reserves its wires immediately, so later
//! candidates in the same tick see the blocked edges; priority order is
//! what decides contention.

use crate::communication::Communication;
use crate::errors::SimError;
use crate::tile::Tile;
use config::{PathGenerator, ScheduleKind};
use flow::{CommodityDemand, FlowPlanner, FlowPlans};
use routing::{NodePos, WireNet};
use tracing::{debug, info};

const MAX_LEN_RATIO: f64 = 1.8;
const BRANCH_PRESET: usize = 2;

/// Path selection and task dispatch for every communication of the array.
#[derive(Debug)]
pub struct Scheduler {
    kind: ScheduleKind,
    generator: PathGenerator,
    flow_plans: Option<FlowPlans>,
}

impl Scheduler {
    /// Build the scheduler; the flow-backed path generator solves its
    /// multi-commodity plan here, once.
    pub fn new(
        kind: ScheduleKind,
        generator: PathGenerator,
        communications: &[Communication],
        tiles: &[Tile],
        net: &WireNet,
    ) -> Result<Self, SimError> {
        if kind.dynamic_path() {
            info!(
                "Dynamic-path scheduling: length ratio {MAX_LEN_RATIO}, branch preset {BRANCH_PRESET}"
            );
        }
        let flow_plans = match &generator {
            PathGenerator::Geometric(_) => None,
            PathGenerator::Flow(solver_config) => {
                let demands: Vec<CommodityDemand> = communications
                    .iter()
                    .map(|communication| {
                        let source = &tiles[communication.src_index()];
                        CommodityDemand {
                            src: communication.src_pos(),
                            dst: communication.dst_pos(),
                            amount_bits: (source.image_num() as u64
                                * source.output_bits_per_image())
                                as f64,
                        }
                    })
                    .collect();
                let planner = FlowPlanner::new(net, demands, solver_config.clone())?;
                Some(planner.build_plans()?)
            }
        };
        Ok(Self {
            kind,
            generator,
            flow_plans,
        })
    }

    /// One scheduling pass. Returns the indices of the communications that
    /// started at this tick.
    pub fn schedule(
        &mut self,
        now: f64,
        flags: &[bool],
        communications: &mut [Communication],
        net: &mut WireNet,
    ) -> Result<Vec<usize>, SimError> {
        let mut ready = vec![false; communications.len()];
        for (index, communication) in communications.iter_mut().enumerate() {
            if flags[index] {
                ready[index] = communication.check_ready()?;
            }
        }
        let mut order: Vec<usize> = (0..communications.len()).collect();
        if self.kind.dynamic_priority() {
            order.sort_by(|&left, &right| {
                communications[left]
                    .done_rate()
                    .total_cmp(&communications[right].done_rate())
            });
        }
        let mut started = Vec::new();
        for index in order {
            if !ready[index] {
                continue;
            }
            let communication = &communications[index];
            let Some(path) = self.find_path(communication, net)? else {
                continue;
            };
            if net.data_path_busy(&path)? {
                continue;
            }
            if self.kind.dynamic_path() && !self.path_length_acceptable(communication, &path, net)?
            {
                continue;
            }
            let chunk =
                communications[index]
                    .pending_chunk()
                    .ok_or_else(|| SimError::NoPendingChunk {
                        id: communications[index].id().to_string(),
                    })?;
            let duration = net.transfer_time(&path, &[chunk])?;
            let (src, dst) = (
                communications[index].src_pos(),
                communications[index].dst_pos(),
            );
            communications[index].set_task(now, path, duration, net)?;
            if let Some(plans) = &mut self.flow_plans {
                plans.consume(src, dst, chunk.size_bits() as f64)?;
            }
            debug!(
                "t={now}: started communication {}",
                communications[index].id()
            );
            started.push(index);
        }
        Ok(started)
    }

    fn find_path(
        &self,
        communication: &Communication,
        net: &mut WireNet,
    ) -> Result<Option<Vec<NodePos>>, SimError> {
        let (src, dst) = (communication.src_pos(), communication.dst_pos());
        match &self.generator {
            PathGenerator::Geometric(strategy) => Ok(net.find_path(src, dst, *strategy)?),
            PathGenerator::Flow(_) => Ok(self
                .flow_plans
                .as_ref()
                .and_then(|plans| plans.next_path(src, dst))
                .map(<[NodePos]>::to_vec)),
        }
    }

    /// The dynamic-path gate: reject reroutes much longer than the
    /// minimum-hop baseline.
    fn path_length_acceptable(
        &self,
        communication: &Communication,
        path: &[NodePos],
        net: &mut WireNet,
    ) -> Result<bool, SimError> {
        let Some(baseline) = net.adaptive_path(communication.src_pos(), communication.dst_pos())
        else {
            return Ok(false);
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_len = (MAX_LEN_RATIO * baseline.len() as f64)
            .max((baseline.len() + BRANCH_PRESET) as f64)
            .floor() as usize;
        Ok(path.len() <= max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{NocTopology, PathStrategy};
    use pretty_assertions::assert_eq;
    use workload::{DataChunk, Dependency, TileBehavior};

    fn chunk(in_id: i32, tile_id: i32) -> DataChunk {
        DataChunk {
            x: 0,
            y: 0,
            start: 0,
            end: 3,
            bit_width: 9,
            total: 3,
            image_id: 0,
            layer_id: 0,
            in_id,
            tile_id,
        }
    }

    /// Two producers feeding one sink on a 1x3 row; both transfers contend
    /// for the wire into the sink.
    fn contention_fixture() -> (Vec<Tile>, Vec<Communication>, WireNet) {
        let producer_a = TileBehavior {
            tile_id: 0,
            layer_id: 0,
            task_id: 0,
            target_tile_id: vec![2],
            source_tile_id: vec![-1],
            dependence: vec![Dependency {
                wait: vec![chunk(0, -1)],
                output: vec![chunk(0, 0)],
                drop: vec![chunk(0, -1)],
                latency: 1.0,
            }],
        };
        let producer_b = TileBehavior {
            tile_id: 1,
            layer_id: 0,
            task_id: 0,
            target_tile_id: vec![2],
            source_tile_id: vec![-1],
            dependence: vec![Dependency {
                wait: vec![chunk(1, -1)],
                output: vec![chunk(1, 1)],
                drop: vec![chunk(1, -1)],
                latency: 1.0,
            }],
        };
        let sink = TileBehavior {
            tile_id: 2,
            layer_id: 1,
            task_id: 0,
            target_tile_id: vec![-1],
            source_tile_id: vec![0, 1],
            dependence: vec![Dependency {
                wait: vec![chunk(0, 0), chunk(1, 1)],
                output: vec![chunk(0, 2)],
                drop: vec![chunk(0, 0), chunk(1, 1)],
                latency: 1.0,
            }],
        };
        let tiles = vec![
            Tile::new(NodePos::new(0, 0), 1, 1024, 1024, &producer_a).unwrap(),
            Tile::new(NodePos::new(0, 1), 1, 1024, 1024, &producer_b).unwrap(),
            Tile::new(NodePos::new(0, 2), 1, 1024, 1024, &sink).unwrap(),
        ];
        let communications = vec![
            Communication::new(0, 2, &tiles[0], &tiles[2]),
            Communication::new(1, 2, &tiles[1], &tiles[2]),
        ];
        let net = WireNet::new(1, 3, 1.0, NocTopology::Mesh).unwrap();
        (tiles, communications, net)
    }

    #[test]
    fn priority_order_decides_wire_contention() {
        let (mut tiles, mut communications, mut net) = contention_fixture();
        let mut scheduler = Scheduler::new(
            ScheduleKind::Naive,
            PathGenerator::Geometric(PathStrategy::Naive),
            &communications,
            &tiles,
            &net,
        )
        .unwrap();
        for tile in &mut tiles {
            tile.update(0.0).unwrap();
            tile.update(1.0).unwrap();
        }
        let started = scheduler
            .schedule(1.0, &[true, true], &mut communications, &mut net)
            .unwrap();
        // the lower index wins the shared wire into the sink
        assert_eq!(started, vec![0]);
        assert!(communications[0].is_running());
        assert!(!communications[1].is_running());
        // two hops at 27 bits each: the winner holds the wires until t=55
        assert_eq!(communications[0].communication_end_time(), 55.0);
        communications[0].update(55.0, &mut net).unwrap();
        let started = scheduler
            .schedule(55.0, &[true, true], &mut communications, &mut net)
            .unwrap();
        assert_eq!(started, vec![1]);
    }

    #[test]
    fn nothing_ready_starts_nothing() {
        let (tiles, mut communications, mut net) = contention_fixture();
        let mut scheduler = Scheduler::new(
            ScheduleKind::Naive,
            PathGenerator::Geometric(PathStrategy::Naive),
            &communications,
            &tiles,
            &net,
        )
        .unwrap();
        let started = scheduler
            .schedule(0.0, &[true, true], &mut communications, &mut net)
            .unwrap();
        assert!(started.is_empty());
        let started = scheduler
            .schedule(0.0, &[false, false], &mut communications, &mut net)
            .unwrap();
        assert!(started.is_empty());
    }
}
