// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The communication state machine: a directed channel between two tiles
//! that moves one chunk at a time over a scheduler-granted wire path.

use crate::buffer::{MultiInputBuffer, MultiOutputBuffer};
use crate::errors::SimError;
use crate::tile::Tile;
use routing::{NodePos, WireNet};
use std::cell::RefCell;
use std::rc::Rc;
use workload::DataChunk;

/// A per-(source tile, target tile) data channel.
///
/// Tiles are addressed by index into the array's tile list; the endpoint
/// buffers are shared with (and owned by) the tiles. The wire network is
/// passed into each operation rather than stored, so the channel holds no
/// cyclic references.
#[derive(Debug)]
pub struct Communication {
    id: String,
    src_index: usize,
    dst_index: usize,
    src_tile_id: i32,
    dst_tile_id: i32,
    src_pos: NodePos,
    dst_pos: NodePos,
    /// The source tile's output buffer.
    output: Rc<RefCell<MultiOutputBuffer>>,
    /// The destination tile's input buffer.
    input: Rc<RefCell<MultiInputBuffer>>,
    running: bool,
    end_time: f64,
    pending: Option<DataChunk>,
    active_path: Option<Vec<NodePos>>,
    last_path: Vec<NodePos>,
    intervals: Vec<(f64, f64)>,
    done: usize,
    total: usize,
    amount_bits: u64,
}

impl Communication {
    #[must_use]
    pub fn new(src_index: usize, dst_index: usize, src_tile: &Tile, dst_tile: &Tile) -> Self {
        let id = format!(
            "{},{}->{},{}",
            src_tile.task_id(),
            src_tile.tile_id(),
            dst_tile.task_id(),
            dst_tile.tile_id()
        );
        Self {
            id,
            src_index,
            dst_index,
            src_tile_id: src_tile.tile_id(),
            dst_tile_id: dst_tile.tile_id(),
            src_pos: src_tile.position(),
            dst_pos: dst_tile.position(),
            output: src_tile.output(),
            input: dst_tile.input(),
            running: false,
            end_time: f64::INFINITY,
            pending: None,
            active_path: None,
            last_path: Vec::new(),
            intervals: Vec::new(),
            done: 0,
            total: src_tile.image_num() * src_tile.trace_len(),
            amount_bits: 0,
        }
    }

    /// Completion only: commit the in-flight chunk into the destination,
    /// release the wire path, and count the transfer done.
    pub fn update(&mut self, now: f64, net: &mut WireNet) -> Result<(), SimError> {
        if !self.running || now < self.end_time {
            return Ok(());
        }
        let chunk = self
            .pending
            .take()
            .ok_or_else(|| SimError::NoPendingChunk {
                id: self.id.clone(),
            })?;
        self.input
            .borrow_mut()
            .commit(&[chunk], self.src_tile_id)?;
        let path = self
            .active_path
            .take()
            .ok_or_else(|| SimError::EmptyTransferPath {
                id: self.id.clone(),
            })?;
        net.set_data_path_state(&path, false, &self.id, now)?;
        self.running = false;
        self.end_time = f64::INFINITY;
        self.done += 1;
        self.amount_bits += chunk.size_bits();
        Ok(())
    }

    /// True iff idle, the source has an unsent chunk for this target, and
    /// the destination has room for it. Caches the chunk to be transferred.
    pub fn check_ready(&mut self) -> Result<bool, SimError> {
        if self.running {
            return Ok(false);
        }
        let Some(chunk) = self.output.borrow().next_transfer(self.dst_tile_id)? else {
            return Ok(false);
        };
        let fits = self
            .input
            .borrow()
            .has_space(&[chunk], self.src_tile_id)?;
        if fits {
            self.pending = Some(chunk);
        }
        Ok(fits)
    }

    /// Start the transfer: move the chunk from the source's committed pool
    /// into the destination's in-flight pool, reserve the path, and arm the
    /// end time.
    pub fn set_task(
        &mut self,
        now: f64,
        path: Vec<NodePos>,
        duration: f64,
        net: &mut WireNet,
    ) -> Result<(), SimError> {
        if self.running {
            return Err(SimError::CommunicationAlreadyRunning {
                id: self.id.clone(),
            });
        }
        if path.len() < 2 {
            return Err(SimError::EmptyTransferPath {
                id: self.id.clone(),
            });
        }
        let chunk = self.pending.ok_or_else(|| SimError::NoPendingChunk {
            id: self.id.clone(),
        })?;
        self.input
            .borrow_mut()
            .reserve(&[chunk], self.src_tile_id)?;
        self.output.borrow_mut().remove(&[chunk], self.dst_tile_id)?;
        net.set_data_path_state(&path, true, &self.id, now)?;
        self.running = true;
        self.end_time = now + duration;
        self.intervals.push((now, self.end_time));
        self.last_path.clone_from(&path);
        self.active_path = Some(path);
        Ok(())
    }

    #[must_use]
    pub fn communication_end_time(&self) -> f64 {
        if self.running {
            self.end_time
        } else {
            f64::INFINITY
        }
    }

    /// Fraction of this channel's transfers already completed.
    #[must_use]
    pub fn done_rate(&self) -> f64 {
        self.done as f64 / self.total as f64
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done == self.total
    }

    pub fn check_finish(&self) -> Result<(), SimError> {
        if self.running || self.done != self.total {
            return Err(SimError::CommunicationIncomplete {
                id: self.id.clone(),
                done: self.done,
                total: self.total,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn src_index(&self) -> usize {
        self.src_index
    }

    #[must_use]
    pub fn dst_index(&self) -> usize {
        self.dst_index
    }

    #[must_use]
    pub fn src_pos(&self) -> NodePos {
        self.src_pos
    }

    #[must_use]
    pub fn dst_pos(&self) -> NodePos {
        self.dst_pos
    }

    #[must_use]
    pub fn pending_chunk(&self) -> Option<DataChunk> {
        self.pending
    }

    /// Transfer intervals in dispatch order.
    #[must_use]
    pub fn intervals(&self) -> &[(f64, f64)] {
        &self.intervals
    }

    /// The wire path of the most recent transfer.
    #[must_use]
    pub fn last_path(&self) -> &[NodePos] {
        &self.last_path
    }

    /// Bits delivered so far.
    #[must_use]
    pub fn amount_bits(&self) -> u64 {
        self.amount_bits
    }

    #[must_use]
    pub fn total_transfers(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::NocTopology;
    use pretty_assertions::assert_eq;
    use workload::{Dependency, TileBehavior};

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

    fn linked_pair() -> (Tile, Tile) {
        let producer = TileBehavior {
            tile_id: 0,
            layer_id: 0,
            task_id: 0,
            target_tile_id: vec![1],
            source_tile_id: vec![-1],
            dependence: vec![Dependency {
                wait: vec![chunk(0, -1)],
                output: vec![chunk(0, 0)],
                drop: vec![chunk(0, -1)],
                latency: 4.0,
            }],
        };
        let consumer = TileBehavior {
            tile_id: 1,
            layer_id: 1,
            task_id: 0,
            target_tile_id: vec![-1],
            source_tile_id: vec![0],
            dependence: vec![Dependency {
                wait: vec![chunk(0, 0)],
                output: vec![chunk(0, 1)],
                drop: vec![chunk(0, 0)],
                latency: 2.0,
            }],
        };
        (
            Tile::new(NodePos::new(0, 0), 1, 1024, 1024, &producer).unwrap(),
            Tile::new(NodePos::new(0, 1), 1, 1024, 1024, &consumer).unwrap(),
        )
    }

    #[test]
    fn transfer_lifecycle_moves_one_chunk() {
        let (mut src, dst) = linked_pair();
        let mut net = WireNet::new(1, 2, 1.0, NocTopology::Mesh).unwrap();
        let mut comm = Communication::new(0, 1, &src, &dst);
        assert_eq!(comm.id(), "0,0->0,1");
        assert_eq!(comm.total_transfers(), 1);

        // nothing to send yet
        assert!(!comm.check_ready().unwrap());

        // producer runs and publishes its chunk
        src.update(0.0).unwrap();
        src.update(4.0).unwrap();
        assert!(comm.check_ready().unwrap());

        let path = vec![NodePos::new(0, 0), NodePos::new(0, 1)];
        comm.set_task(4.0, path.clone(), 27.0, &mut net).unwrap();
        assert!(comm.is_running());
        assert_eq!(comm.communication_end_time(), 31.0);
        assert!(net.data_path_busy(&path).unwrap());
        // double start is an invariant violation
        assert!(matches!(
            comm.set_task(4.0, path.clone(), 27.0, &mut net),
            Err(SimError::CommunicationAlreadyRunning { .. })
        ));

        // an early update is a no-op
        comm.update(10.0, &mut net).unwrap();
        assert!(comm.is_running());

        comm.update(31.0, &mut net).unwrap();
        assert!(!comm.is_running());
        assert!(comm.is_done());
        assert_eq!(comm.done_rate(), 1.0);
        assert_eq!(comm.amount_bits(), 27);
        assert!(!net.data_path_busy(&path).unwrap());
        // the chunk is now committed downstream
        assert!(
            dst.input()
                .borrow_mut()
                .contains_all(&[chunk(0, 0)])
                .unwrap()
        );
        comm.check_finish().unwrap();
        assert_eq!(comm.intervals(), &[(4.0, 31.0)]);
        assert_eq!(comm.last_path(), path.as_slice());
    }

    #[test]
    fn readiness_respects_destination_space() {
        let (mut src, _full_dst) = linked_pair();
        // consumer input sized below one chunk
        let cramped = TileBehavior {
            tile_id: 1,
            layer_id: 1,
            task_id: 0,
            target_tile_id: vec![-1],
            source_tile_id: vec![0],
            dependence: vec![Dependency {
                wait: vec![chunk(0, 0)],
                output: vec![chunk(0, 1)],
                drop: vec![chunk(0, 0)],
                latency: 2.0,
            }],
        };
        let dst_small = Tile::new(NodePos::new(0, 1), 1, 20, 1024, &cramped).unwrap();
        let mut comm = Communication::new(0, 1, &src, &dst_small);
        src.update(0.0).unwrap();
        src.update(4.0).unwrap();
        assert!(!comm.check_ready().unwrap());
    }
}
