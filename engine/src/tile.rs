// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The tile state machine: a compute unit at one grid coordinate cycling
//! idle <-> running, driven by buffer contents, dependency wait sets, and
//! output space.

use crate::buffer::{MultiInputBuffer, MultiOutputBuffer};
use crate::errors::SimError;
use routing::NodePos;
use std::cell::RefCell;
use std::rc::Rc;
use workload::{DataChunk, Dependency, TileBehavior};

/// One tile executing its behavior trace `image_num` times over.
///
/// The per-image expansion of the trace is materialized lazily: only the
/// dependency at the current step is ever instantiated, with every chunk
/// re-stamped for the step's image.
#[derive(Debug)]
pub struct Tile {
    position: NodePos,
    task_id: usize,
    tile_id: i32,
    layer_id: i32,
    target_ids: Vec<i32>,
    source_ids: Vec<i32>,
    image_num: usize,
    dependencies: Vec<Dependency>,
    input: Rc<RefCell<MultiInputBuffer>>,
    output: Rc<RefCell<MultiOutputBuffer>>,
    running: bool,
    step: usize,
    current: Option<Dependency>,
    end_time: f64,
    history: Vec<(f64, f64)>,
}

fn stamp(chunks: &[DataChunk], image_id: u32) -> Vec<DataChunk> {
    chunks.iter().map(|chunk| chunk.with_image(image_id)).collect()
}

impl Tile {
    pub fn new(
        position: NodePos,
        image_num: usize,
        input_capacity: u64,
        output_capacity: u64,
        behavior: &TileBehavior,
    ) -> Result<Self, SimError> {
        let input = MultiInputBuffer::new(input_capacity, &behavior.source_tile_id)?;
        let output = MultiOutputBuffer::new(output_capacity, &behavior.target_tile_id)?;
        Ok(Self {
            position,
            task_id: behavior.task_id,
            tile_id: behavior.tile_id,
            layer_id: behavior.layer_id,
            target_ids: behavior.target_tile_id.clone(),
            source_ids: behavior.source_tile_id.clone(),
            image_num,
            dependencies: behavior.dependence.clone(),
            input: Rc::new(RefCell::new(input)),
            output: Rc::new(RefCell::new(output)),
            running: false,
            step: 0,
            current: None,
            end_time: f64::INFINITY,
            history: Vec::new(),
        })
    }

    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.image_num * self.dependencies.len()
    }

    /// The dependency for the current step, chunks stamped with the step's
    /// image id.
    fn current_dependency(&mut self) -> Dependency {
        if let Some(current) = &self.current {
            return current.clone();
        }
        #[allow(clippy::cast_possible_truncation)]
        let image_id = (self.step / self.dependencies.len()) as u32;
        let base = &self.dependencies[self.step % self.dependencies.len()];
        let materialized = Dependency {
            wait: stamp(&base.wait, image_id),
            output: stamp(&base.output, image_id),
            drop: stamp(&base.drop, image_id),
            latency: base.latency,
        };
        self.current = Some(materialized.clone());
        materialized
    }

    /// The only mutator. Completion phase first: a running dependency whose
    /// end has been reached retires its drop set, publishes its outputs, and
    /// advances the trace. Dispatch phase second: the next dependency starts
    /// iff its wait set is committed and the output buffer has room;
    /// otherwise the tile blocks with an infinite end time.
    pub fn update(&mut self, now: f64) -> Result<(), SimError> {
        if self.running {
            if now < self.end_time {
                return Ok(());
            }
            let finished = self.current_dependency();
            self.input.borrow_mut().remove(&finished.drop)?;
            self.output.borrow_mut().push_all(&finished.output);
            self.running = false;
            self.step += 1;
            self.current = None;
        }
        if self.step >= self.total_steps() {
            self.end_time = f64::INFINITY;
            return Ok(());
        }
        let next = self.current_dependency();
        let inputs_ready = self.input.borrow_mut().contains_all(&next.wait)?;
        let output_fits = self.output.borrow().has_space(&next.output);
        if inputs_ready && output_fits {
            self.running = true;
            self.end_time = now + next.latency;
            self.history.push((now, self.end_time));
        } else {
            self.end_time = f64::INFINITY;
        }
        Ok(())
    }

    /// The exact future completion time of the running dependency, or
    /// infinity when idle, blocked, or done.
    #[must_use]
    pub fn computation_end_time(&self) -> f64 {
        if self.running {
            self.end_time
        } else {
            f64::INFINITY
        }
    }

    pub fn check_finish(&self) -> Result<(), SimError> {
        if self.running {
            return Err(SimError::TileStillRunning {
                tile_id: self.tile_id,
            });
        }
        if self.step < self.total_steps() {
            return Err(SimError::TileIncomplete {
                tile_id: self.tile_id,
                done: self.step,
                total: self.total_steps(),
            });
        }
        if !self.input.borrow().is_drained() {
            return Err(SimError::BufferNotDrained {
                tile_id: self.tile_id,
                buffer: "input",
            });
        }
        if !self.output.borrow().is_drained() {
            return Err(SimError::BufferNotDrained {
                tile_id: self.tile_id,
                buffer: "output",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn position(&self) -> NodePos {
        self.position
    }

    #[must_use]
    pub fn task_id(&self) -> usize {
        self.task_id
    }

    #[must_use]
    pub fn tile_id(&self) -> i32 {
        self.tile_id
    }

    #[must_use]
    pub fn layer_id(&self) -> i32 {
        self.layer_id
    }

    #[must_use]
    pub fn target_ids(&self) -> &[i32] {
        &self.target_ids
    }

    #[must_use]
    pub fn source_ids(&self) -> &[i32] {
        &self.source_ids
    }

    #[must_use]
    pub fn image_num(&self) -> usize {
        self.image_num
    }

    #[must_use]
    pub fn trace_len(&self) -> usize {
        self.dependencies.len()
    }

    /// Bits produced by one image worth of this tile's trace.
    #[must_use]
    pub fn output_bits_per_image(&self) -> u64 {
        self.dependencies
            .iter()
            .flat_map(|dependency| dependency.output.iter())
            .map(DataChunk::size_bits)
            .sum()
    }

    #[must_use]
    pub fn is_pipeline_start(&self) -> bool {
        self.input.borrow().is_start()
    }

    #[must_use]
    pub fn input(&self) -> Rc<RefCell<MultiInputBuffer>> {
        Rc::clone(&self.input)
    }

    #[must_use]
    pub fn output(&self) -> Rc<RefCell<MultiOutputBuffer>> {
        Rc::clone(&self.output)
    }

    /// Compute intervals in dispatch order, one per finished dependency.
    #[must_use]
    pub fn compute_history(&self) -> &[(f64, f64)] {
        &self.history
    }
}
