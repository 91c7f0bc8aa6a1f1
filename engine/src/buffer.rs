// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Bounded byte-accounting stores between tiles and communications.
//!
//! Input buffers keep two pools: *committed* chunks a tile may consume, and
//! *in-flight* reservations for transfers that have started but not yet
//! completed. Output buffers are a single FIFO pool. The multi-source and
//! multi-target variants split and mirror over per-endpoint sub-buffers so
//! fan-in consumers and fan-out producers drain independently.
//!
//! A buffer flagged as a pipeline start never blocks: presence and space
//! checks always pass and nothing is ever stored or deleted. A buffer
//! flagged as a pipeline end swallows pushes and reports infinite room.

use crate::errors::SimError;
use workload::{BOUNDARY_TILE_ID, DataChunk, total_size_bits};

/// Input-side store with committed and in-flight accounting.
#[derive(Debug)]
pub struct InputBuffer {
    capacity: u64,
    start: bool,
    data: Vec<DataChunk>,
    used: u64,
    in_flight: Vec<DataChunk>,
    in_flight_size: u64,
    /// Memoizes the last presence query; any commit or delete invalidates.
    presence_cache: Option<(Vec<DataChunk>, bool)>,
}

impl InputBuffer {
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            start: false,
            data: Vec::new(),
            used: 0,
            in_flight: Vec::new(),
            in_flight_size: 0,
            presence_cache: None,
        }
    }

    pub fn set_start(&mut self) {
        self.start = true;
    }

    #[must_use]
    pub fn is_start(&self) -> bool {
        self.start
    }

    /// Free space, accounting for in-flight reservations.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        if self.start {
            u64::MAX
        } else {
            self.capacity
                .saturating_sub(self.used)
                .saturating_sub(self.in_flight_size)
        }
    }

    #[must_use]
    pub fn has_space(&self, chunks: &[DataChunk]) -> bool {
        self.start || total_size_bits(chunks) <= self.remaining()
    }

    /// Reserve in-flight space for a transfer that just started.
    pub fn reserve(&mut self, chunks: &[DataChunk]) {
        if self.start {
            return;
        }
        for chunk in chunks {
            self.in_flight.push(*chunk);
            self.in_flight_size += chunk.size_bits();
        }
    }

    /// Flip an in-flight reservation into committed, consumable data.
    pub fn commit(&mut self, chunks: &[DataChunk]) -> Result<(), SimError> {
        if self.start {
            return Ok(());
        }
        for chunk in chunks {
            let position = self
                .in_flight
                .iter()
                .position(|candidate| candidate == chunk)
                .ok_or(SimError::ChunkNotInFlight { chunk: *chunk })?;
            self.in_flight.remove(position);
            self.in_flight_size -= chunk.size_bits();
            self.data.push(*chunk);
            self.used += chunk.size_bits();
        }
        self.presence_cache = None;
        Ok(())
    }

    /// Are all of `chunks` committed? Structural comparison.
    pub fn contains_all(&mut self, chunks: &[DataChunk]) -> bool {
        if self.start {
            return true;
        }
        if let Some((cached_query, cached_answer)) = &self.presence_cache {
            if cached_query == chunks {
                return *cached_answer;
            }
        }
        let answer = chunks
            .iter()
            .all(|chunk| self.data.contains(chunk));
        self.presence_cache = Some((chunks.to_vec(), answer));
        answer
    }

    /// Retire committed chunks (a tile finishing a dependency drops them).
    pub fn remove(&mut self, chunks: &[DataChunk]) -> Result<(), SimError> {
        if self.start {
            return Ok(());
        }
        for chunk in chunks {
            let position = self
                .data
                .iter()
                .position(|candidate| candidate == chunk)
                .ok_or(SimError::ChunkNotPresent { chunk: *chunk })?;
            self.data.remove(position);
            self.used -= chunk.size_bits();
        }
        self.presence_cache = None;
        Ok(())
    }

    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.data.is_empty() && self.in_flight.is_empty()
    }
}

/// Output-side FIFO store.
#[derive(Debug)]
pub struct OutputBuffer {
    capacity: u64,
    end: bool,
    data: Vec<DataChunk>,
    used: u64,
}

impl OutputBuffer {
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            end: false,
            data: Vec::new(),
            used: 0,
        }
    }

    pub fn set_end(&mut self) {
        self.end = true;
    }

    #[must_use]
    pub fn is_end(&self) -> bool {
        self.end
    }

    #[must_use]
    pub fn remaining(&self) -> u64 {
        if self.end {
            u64::MAX
        } else {
            self.capacity.saturating_sub(self.used)
        }
    }

    #[must_use]
    pub fn has_space(&self, chunks: &[DataChunk]) -> bool {
        self.end || total_size_bits(chunks) <= self.remaining()
    }

    /// Store produced chunks. A pipeline-end buffer treats the chunks as
    /// delivered and drops them.
    pub fn push_all(&mut self, chunks: &[DataChunk]) {
        if self.end {
            return;
        }
        for chunk in chunks {
            self.data.push(*chunk);
            self.used += chunk.size_bits();
        }
    }

    /// The oldest unsent chunk, if any.
    #[must_use]
    pub fn next_transfer(&self) -> Option<DataChunk> {
        if self.end {
            None
        } else {
            self.data.first().copied()
        }
    }

    pub fn remove(&mut self, chunks: &[DataChunk]) -> Result<(), SimError> {
        for chunk in chunks {
            let position = self
                .data
                .iter()
                .position(|candidate| candidate == chunk)
                .ok_or(SimError::ChunkNotPresent { chunk: *chunk })?;
            self.data.remove(position);
            self.used -= chunk.size_bits();
        }
        Ok(())
    }

    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.data.is_empty()
    }
}

/// One input buffer per source tile, each with `capacity / fanin`. Presence
/// queries over a heterogeneous wait set split by producer and query each
/// sub-buffer conjunctively.
#[derive(Debug)]
pub struct MultiInputBuffer {
    buffers: Vec<(i32, InputBuffer)>,
    start: bool,
}

impl MultiInputBuffer {
    pub fn new(capacity: u64, sources: &[i32]) -> Result<Self, SimError> {
        if sources.is_empty() {
            return Err(SimError::EmptyEndpoints);
        }
        let share = capacity / sources.len() as u64;
        let buffers = sources
            .iter()
            .map(|&source| (source, InputBuffer::new(share)))
            .collect();
        let mut multi = Self {
            buffers,
            start: false,
        };
        if sources == [BOUNDARY_TILE_ID] {
            multi.set_start();
        }
        Ok(multi)
    }

    pub fn set_start(&mut self) {
        self.start = true;
        for (_, buffer) in &mut self.buffers {
            buffer.set_start();
        }
    }

    #[must_use]
    pub fn is_start(&self) -> bool {
        self.start
    }

    fn buffer_mut(&mut self, source: i32) -> Result<&mut InputBuffer, SimError> {
        self.buffers
            .iter_mut()
            .find(|(id, _)| *id == source)
            .map(|(_, buffer)| buffer)
            .ok_or(SimError::UnknownSource {
                source_id: source,
                chunk: None,
            })
    }

    fn buffer(&self, source: i32) -> Result<&InputBuffer, SimError> {
        self.buffers
            .iter()
            .find(|(id, _)| *id == source)
            .map(|(_, buffer)| buffer)
            .ok_or(SimError::UnknownSource {
                source_id: source,
                chunk: None,
            })
    }

    pub fn has_space(&self, chunks: &[DataChunk], source: i32) -> Result<bool, SimError> {
        Ok(self.buffer(source)?.has_space(chunks))
    }

    pub fn reserve(&mut self, chunks: &[DataChunk], source: i32) -> Result<(), SimError> {
        self.buffer_mut(source)?.reserve(chunks);
        Ok(())
    }

    pub fn commit(&mut self, chunks: &[DataChunk], source: i32) -> Result<(), SimError> {
        self.buffer_mut(source)?.commit(chunks)
    }

    /// Split `chunks` by producing tile and ask every involved sub-buffer.
    pub fn contains_all(&mut self, chunks: &[DataChunk]) -> Result<bool, SimError> {
        if self.start {
            return Ok(true);
        }
        for chunk in chunks {
            let producer = chunk.producer();
            let buffer = self
                .buffers
                .iter_mut()
                .find(|(id, _)| *id == producer)
                .map(|(_, buffer)| buffer)
                .ok_or(SimError::UnknownSource {
                    source_id: producer,
                    chunk: Some(*chunk),
                })?;
            if !buffer.contains_all(std::slice::from_ref(chunk)) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn remove(&mut self, chunks: &[DataChunk]) -> Result<(), SimError> {
        if self.start {
            return Ok(());
        }
        for chunk in chunks {
            let producer = chunk.producer();
            self.buffer_mut(producer)
                .map_err(|_| SimError::UnknownSource {
                    source_id: producer,
                    chunk: Some(*chunk),
                })?
                .remove(std::slice::from_ref(chunk))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.buffers.iter().all(|(_, buffer)| buffer.is_drained())
    }
}

/// Mirrors committed data into one sub-buffer per target so that different
/// consumers drain independently.
#[derive(Debug)]
pub struct MultiOutputBuffer {
    buffers: Vec<(i32, OutputBuffer)>,
    end: bool,
}

impl MultiOutputBuffer {
    pub fn new(capacity: u64, targets: &[i32]) -> Result<Self, SimError> {
        if targets.is_empty() {
            return Err(SimError::EmptyEndpoints);
        }
        let buffers = targets
            .iter()
            .map(|&target| (target, OutputBuffer::new(capacity)))
            .collect();
        let mut multi = Self {
            buffers,
            end: false,
        };
        if targets == [BOUNDARY_TILE_ID] {
            multi.set_end();
        }
        Ok(multi)
    }

    pub fn set_end(&mut self) {
        self.end = true;
        for (_, buffer) in &mut self.buffers {
            buffer.set_end();
        }
    }

    #[must_use]
    pub fn is_end(&self) -> bool {
        self.end
    }

    fn buffer_mut(&mut self, target: i32) -> Result<&mut OutputBuffer, SimError> {
        self.buffers
            .iter_mut()
            .find(|(id, _)| *id == target)
            .map(|(_, buffer)| buffer)
            .ok_or(SimError::UnknownTarget { target })
    }

    /// Room for the producing tile: every target's mirror must fit.
    #[must_use]
    pub fn has_space(&self, chunks: &[DataChunk]) -> bool {
        self.buffers
            .iter()
            .all(|(_, buffer)| buffer.has_space(chunks))
    }

    /// Mirror-write into every target sub-buffer. Atomic with respect to
    /// any subsequent readiness query: no intermediate state is observable.
    pub fn push_all(&mut self, chunks: &[DataChunk]) {
        for (_, buffer) in &mut self.buffers {
            buffer.push_all(chunks);
        }
    }

    pub fn next_transfer(&self, target: i32) -> Result<Option<DataChunk>, SimError> {
        self.buffers
            .iter()
            .find(|(id, _)| *id == target)
            .map(|(_, buffer)| buffer.next_transfer())
            .ok_or(SimError::UnknownTarget { target })
    }

    pub fn remove(&mut self, chunks: &[DataChunk], target: i32) -> Result<(), SimError> {
        self.buffer_mut(target)?.remove(chunks)
    }

    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.buffers.iter().all(|(_, buffer)| buffer.is_drained())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(in_id: i32, tile_id: i32, bits: u32) -> DataChunk {
        DataChunk {
            x: 0,
            y: 0,
            start: 0,
            end: bits,
            bit_width: 1,
            total: bits,
            image_id: 0,
            layer_id: 0,
            in_id,
            tile_id,
        }
    }

    #[test]
    fn input_buffer_accounts_in_flight_reservations() {
        let mut buffer = InputBuffer::new(100);
        let first = chunk(0, 0, 60);
        let second = chunk(1, 0, 60);
        assert!(buffer.has_space(&[first]));
        buffer.reserve(&[first]);
        assert_eq!(buffer.remaining(), 40);
        // the second chunk no longer fits next to the reservation
        assert!(!buffer.has_space(&[second]));
        assert!(!buffer.contains_all(&[first]));
        buffer.commit(&[first]).unwrap();
        assert_eq!(buffer.remaining(), 40);
        assert!(buffer.contains_all(&[first]));
        buffer.remove(&[first]).unwrap();
        assert_eq!(buffer.remaining(), 100);
        assert!(buffer.is_drained());
    }

    #[test]
    fn commit_without_reservation_is_an_error() {
        let mut buffer = InputBuffer::new(100);
        assert!(matches!(
            buffer.commit(&[chunk(0, 0, 10)]),
            Err(SimError::ChunkNotInFlight { .. })
        ));
    }

    #[test]
    fn presence_cache_is_invalidated_by_commits() {
        let mut buffer = InputBuffer::new(100);
        let wanted = chunk(0, 0, 10);
        assert!(!buffer.contains_all(&[wanted]));
        // cached answer must not survive the commit
        buffer.reserve(&[wanted]);
        buffer.commit(&[wanted]).unwrap();
        assert!(buffer.contains_all(&[wanted]));
        buffer.remove(&[wanted]).unwrap();
        assert!(!buffer.contains_all(&[wanted]));
    }

    #[test]
    fn start_buffer_never_blocks_and_never_stores() {
        let mut buffer = InputBuffer::new(1);
        buffer.set_start();
        let big = chunk(0, 0, 1000);
        assert!(buffer.has_space(&[big]));
        assert!(buffer.contains_all(&[big]));
        buffer.reserve(&[big]);
        buffer.commit(&[big]).unwrap();
        buffer.remove(&[big]).unwrap();
        assert!(buffer.is_drained());
    }

    #[test]
    fn output_buffer_is_fifo_per_target() {
        let mut buffer = OutputBuffer::new(100);
        let first = chunk(0, 0, 10);
        let second = chunk(1, 0, 10);
        buffer.push_all(&[first, second]);
        assert_eq!(buffer.next_transfer(), Some(first));
        buffer.remove(&[first]).unwrap();
        assert_eq!(buffer.next_transfer(), Some(second));
    }

    #[test]
    fn end_buffer_swallows_pushes() {
        let mut buffer = OutputBuffer::new(10);
        buffer.set_end();
        buffer.push_all(&[chunk(0, 0, 1000)]);
        assert_eq!(buffer.next_transfer(), None);
        assert_eq!(buffer.remaining(), u64::MAX);
        assert!(buffer.is_drained());
    }

    #[test]
    fn multi_input_splits_capacity_and_wait_sets() {
        let mut buffer = MultiInputBuffer::new(100, &[3, 7]).unwrap();
        let from_three = chunk(0, 3, 30);
        let from_seven = chunk(0, 7, 30);
        // each sub-buffer holds capacity / fanin = 50
        assert!(buffer.has_space(&[from_three], 3).unwrap());
        assert!(!buffer.has_space(&[chunk(0, 3, 60)], 3).unwrap());
        buffer.reserve(&[from_three], 3).unwrap();
        buffer.commit(&[from_three], 3).unwrap();
        assert!(!buffer.contains_all(&[from_three, from_seven]).unwrap());
        buffer.reserve(&[from_seven], 7).unwrap();
        buffer.commit(&[from_seven], 7).unwrap();
        assert!(buffer.contains_all(&[from_three, from_seven]).unwrap());
        buffer.remove(&[from_three, from_seven]).unwrap();
        assert!(buffer.is_drained());
    }

    #[test]
    fn multi_input_with_boundary_sentinel_is_a_start() {
        let buffer = MultiInputBuffer::new(100, &[BOUNDARY_TILE_ID]).unwrap();
        assert!(buffer.is_start());
    }

    #[test]
    fn unknown_source_is_reported() {
        let mut buffer = MultiInputBuffer::new(100, &[3]).unwrap();
        assert!(matches!(
            buffer.contains_all(&[chunk(0, 9, 10)]),
            Err(SimError::UnknownSource { source_id: 9, .. })
        ));
    }

    #[test]
    fn multi_output_mirrors_to_every_target() {
        let mut buffer = MultiOutputBuffer::new(100, &[1, 2]).unwrap();
        let produced = chunk(0, 0, 10);
        buffer.push_all(&[produced]);
        // both consumers see the chunk until they individually drain it
        assert_eq!(buffer.next_transfer(1).unwrap(), Some(produced));
        assert_eq!(buffer.next_transfer(2).unwrap(), Some(produced));
        buffer.remove(&[produced], 1).unwrap();
        assert_eq!(buffer.next_transfer(1).unwrap(), None);
        assert_eq!(buffer.next_transfer(2).unwrap(), Some(produced));
    }

    #[test]
    fn multi_output_space_needs_room_in_every_mirror() {
        let mut buffer = MultiOutputBuffer::new(20, &[1, 2]).unwrap();
        let produced = chunk(0, 0, 15);
        buffer.push_all(&[produced]);
        buffer.remove(&[produced], 1).unwrap();
        // target 2 still holds the mirror, so a new chunk does not fit
        assert!(!buffer.has_space(&[chunk(1, 0, 10)]));
    }

    #[test]
    fn multi_output_with_boundary_sentinel_is_an_end() {
        let buffer = MultiOutputBuffer::new(10, &[BOUNDARY_TILE_ID]).unwrap();
        assert!(buffer.is_end());
        assert!(buffer.has_space(&[chunk(0, 0, 1000)]));
    }
}
