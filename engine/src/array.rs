// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The array: every tile, communication and wire of one run, advanced over
//! a discrete event clock to a fixed point.
//!
//! The event-driven driver keeps per-module completion times, dirty flags,
//! and a sorted list of future event times. Within one tick it processes
//! communication completions, then tile completions, then re-evaluates the
//! flagged tiles, and only then lets the scheduler dispatch transfers; this
//! serialization is what makes the produced latencies deterministic and
//! reproducible. A dense reference driver walks the precomputed update
//! order every tick instead and must produce the same fixed point.

use crate::communication::Communication;
use crate::errors::SimError;
use crate::mapping::position_list;
use crate::schedule::Scheduler;
use crate::tile::Tile;
use config::RunConfig;
use routing::WireNet;
use tracing::{debug, info};
use workload::{BOUNDARY_TILE_ID, TileBehavior};

/// Result of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimSummary {
    /// Simulated end-to-end latency in nanoseconds.
    pub latency: f64,
    /// Number of distinct event times the clock visited.
    pub event_count: usize,
}

#[derive(Debug, Clone, Copy)]
enum UpdateStep {
    Tile(usize),
    Comm(usize),
}

/// One fully built simulation instance.
#[derive(Debug)]
pub struct Array {
    tiles: Vec<Tile>,
    communications: Vec<Communication>,
    net: WireNet,
    scheduler: Scheduler,
    /// Per tile, the communications delivering into it.
    tile_preds: Vec<Vec<usize>>,
    /// Per tile, the communications draining it.
    tile_succs: Vec<Vec<usize>>,
    update_order: Vec<UpdateStep>,
    time_points: Vec<f64>,
}

impl Array {
    /// Map the flattened behaviors onto the grid and wire everything up.
    pub fn build(config: &RunConfig, behaviors: &[TileBehavior]) -> Result<Self, SimError> {
        let (rows, cols) = config.grid_shape();
        log_behavior_summary(behaviors);
        let positions = position_list(config.mapping_strategy, behaviors, rows, cols)?;
        let mut net = WireNet::new(rows, cols, config.band_width, config.noc_topology)?;
        net.set_transparent(config.transparent_flag);

        let mut tiles = Vec::with_capacity(behaviors.len());
        for (behavior, &position) in behaviors.iter().zip(&positions) {
            tiles.push(Tile::new(
                position,
                config.image_num,
                config.input_buffer_size,
                config.output_buffer_size,
                behavior,
            )?);
        }

        let mut communications = Vec::new();
        for src_index in 0..tiles.len() {
            for &target in tiles[src_index].target_ids() {
                if target == BOUNDARY_TILE_ID {
                    continue;
                }
                let dst_index = tiles
                    .iter()
                    .position(|tile| {
                        tile.task_id() == tiles[src_index].task_id() && tile.tile_id() == target
                    })
                    .ok_or(SimError::UnknownTarget { target })?;
                communications.push(Communication::new(
                    src_index,
                    dst_index,
                    &tiles[src_index],
                    &tiles[dst_index],
                ));
            }
        }

        let mut tile_preds = vec![Vec::new(); tiles.len()];
        let mut tile_succs = vec![Vec::new(); tiles.len()];
        for (index, communication) in communications.iter().enumerate() {
            tile_preds[communication.dst_index()].push(index);
            tile_succs[communication.src_index()].push(index);
        }

        let mut update_order = Vec::with_capacity(tiles.len() + communications.len());
        let mut ordered = vec![false; communications.len()];
        for tile_index in 0..tiles.len() {
            for &comm_index in &tile_preds[tile_index] {
                if !ordered[comm_index] {
                    ordered[comm_index] = true;
                    update_order.push(UpdateStep::Comm(comm_index));
                }
            }
            update_order.push(UpdateStep::Tile(tile_index));
            for &comm_index in &tile_succs[tile_index] {
                if !ordered[comm_index] {
                    ordered[comm_index] = true;
                    update_order.push(UpdateStep::Comm(comm_index));
                }
            }
        }

        let scheduler = Scheduler::new(
            config.schedule_strategy,
            config.path_generator.clone(),
            &communications,
            &tiles,
            &net,
        )?;
        info!(
            "Array ready: {} tiles, {} communications, transparent={}",
            tiles.len(),
            communications.len(),
            config.transparent_flag
        );
        Ok(Self {
            tiles,
            communications,
            net,
            scheduler,
            tile_preds,
            tile_succs,
            update_order,
            time_points: Vec::new(),
        })
    }

    /// Event-driven driver.
    pub fn run(&mut self) -> Result<SimSummary, SimError> {
        let tile_count = self.tiles.len();
        let comm_count = self.communications.len();
        let mut tile_end = vec![f64::INFINITY; tile_count];
        let mut comm_end = vec![f64::INFINITY; comm_count];
        // every tile gets an initial evaluation; the pipeline-start ones are
        // the ones that can actually begin computing
        let mut tile_flag = vec![true; tile_count];
        let mut comm_flag = vec![false; comm_count];
        let mut events: Vec<f64> = Vec::new();
        let mut now = 0.0;

        loop {
            // drain the event times that brought us here
            while let Some(&head) = events.first() {
                if head <= now {
                    events.remove(0);
                } else {
                    break;
                }
            }
            // 1. communication completions re-arm their destination tiles;
            // the channel itself goes back to the scheduler in case it has
            // a backlog of chunks to move
            for comm_index in 0..comm_count {
                if comm_end[comm_index] <= now {
                    self.communications[comm_index].update(now, &mut self.net)?;
                    comm_end[comm_index] = f64::INFINITY;
                    tile_flag[self.communications[comm_index].dst_index()] = true;
                    comm_flag[comm_index] = true;
                }
            }
            // 2. tile completions wake the adjacent communications
            for tile_index in 0..tile_count {
                if tile_end[tile_index] <= now {
                    tile_flag[tile_index] = true;
                    for &comm_index in &self.tile_preds[tile_index] {
                        comm_flag[comm_index] = true;
                    }
                    for &comm_index in &self.tile_succs[tile_index] {
                        comm_flag[comm_index] = true;
                    }
                }
            }
            // 3. re-evaluate the flagged tiles
            for tile_index in 0..tile_count {
                if !tile_flag[tile_index] {
                    continue;
                }
                self.tiles[tile_index].update(now)?;
                tile_flag[tile_index] = false;
                let end = self.tiles[tile_index].computation_end_time();
                if end != tile_end[tile_index] {
                    tile_end[tile_index] = end;
                    if end.is_finite() {
                        insort(&mut events, end);
                    }
                }
            }
            // 4. dispatch transfers; a started transfer frees output-buffer
            // space, so its source tile is re-evaluated at the next event
            let started = self.scheduler.schedule(
                now,
                &comm_flag,
                &mut self.communications,
                &mut self.net,
            )?;
            for comm_index in started {
                let end = self.communications[comm_index].communication_end_time();
                comm_end[comm_index] = end;
                insort(&mut events, end);
                tile_flag[self.communications[comm_index].src_index()] = true;
            }
            // 5. running or exhausted communications need no rescheduling
            for (comm_index, communication) in self.communications.iter().enumerate() {
                if communication.is_running() || communication.is_done() {
                    comm_flag[comm_index] = false;
                }
            }
            // 6. advance the clock
            let next = events.first().copied().unwrap_or(f64::INFINITY);
            if next <= now {
                return Err(SimError::Deadlock { now });
            }
            now = next;
            if now.is_infinite() {
                break;
            }
            self.time_points.push(now);
        }
        self.check_finish()?;
        let latency = self.time_points.last().copied().unwrap_or(0.0);
        debug!(
            "Event-driven run finished: latency {latency} over {} events",
            self.time_points.len()
        );
        Ok(SimSummary {
            latency,
            event_count: self.time_points.len(),
        })
    }

    /// Dense reference driver: every module is updated at every time point,
    /// in the precomputed order. Slower than the event-driven driver but
    /// trivially correct; the two must agree.
    pub fn run_dense(&mut self) -> Result<SimSummary, SimError> {
        let mut now = 0.0;
        loop {
            for &step in &self.update_order {
                match step {
                    UpdateStep::Tile(index) => self.tiles[index].update(now)?,
                    UpdateStep::Comm(index) => {
                        self.communications[index].update(now, &mut self.net)?;
                    }
                }
            }
            let flags = vec![true; self.communications.len()];
            self.scheduler
                .schedule(now, &flags, &mut self.communications, &mut self.net)?;
            let next_tile = self
                .tiles
                .iter()
                .map(Tile::computation_end_time)
                .fold(f64::INFINITY, f64::min);
            let next_comm = self
                .communications
                .iter()
                .map(Communication::communication_end_time)
                .fold(f64::INFINITY, f64::min);
            let next = next_tile.min(next_comm);
            if next <= now {
                return Err(SimError::Deadlock { now });
            }
            now = next;
            if now.is_infinite() {
                break;
            }
            self.time_points.push(now);
        }
        self.check_finish()?;
        let latency = self.time_points.last().copied().unwrap_or(0.0);
        Ok(SimSummary {
            latency,
            event_count: self.time_points.len(),
        })
    }

    /// Every tile ran its whole trace, every communication delivered every
    /// chunk, every wire is idle.
    pub fn check_finish(&self) -> Result<(), SimError> {
        for tile in &self.tiles {
            tile.check_finish()?;
        }
        for communication in &self.communications {
            communication.check_finish()?;
        }
        self.net.check_finish()?;
        Ok(())
    }

    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    #[must_use]
    pub fn communications(&self) -> &[Communication] {
        &self.communications
    }

    #[must_use]
    pub fn net(&self) -> &WireNet {
        &self.net
    }

    #[must_use]
    pub fn time_points(&self) -> &[f64] {
        &self.time_points
    }
}

fn insort(events: &mut Vec<f64>, time: f64) {
    let index = events.partition_point(|&existing| existing <= time);
    events.insert(index, time);
}

fn log_behavior_summary(behaviors: &[TileBehavior]) {
    let tile_count = behaviors.len();
    let mut communication_count = 0;
    let mut behavior_count = 0;
    for behavior in behaviors {
        let mut repeated = 1;
        if !behavior.is_pipeline_end() {
            communication_count += behavior.target_tile_id.len();
            repeated += behavior.target_tile_id.len();
        }
        behavior_count += behavior.dependence.len() * repeated;
    }
    info!(
        "In total, {tile_count} tiles, {communication_count} communications, {behavior_count} behaviors"
    );
}
