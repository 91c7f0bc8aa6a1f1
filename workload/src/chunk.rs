// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The unit of data the simulator moves around. Chunks are value objects:
//! buffers and wait sets compare them by structural identity, never by
//! address.

use serde::{Deserialize, Serialize};

/// One slice of a feature map, as referenced by dependency wait/output/drop
/// sets and carried by communications.
///
/// `tile_id` identifies the producing tile; a consuming multi-source input
/// buffer routes the chunk to the right sub-buffer with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataChunk {
    pub x: i32,
    pub y: i32,
    pub start: u32,
    pub end: u32,
    pub bit_width: u32,
    pub total: u32,
    #[serde(default)]
    pub image_id: u32,
    pub layer_id: i32,
    pub in_id: i32,
    pub tile_id: i32,
}

impl DataChunk {
    /// Size of the chunk in bits.
    #[must_use]
    pub fn size_bits(&self) -> u64 {
        u64::from(self.end.saturating_sub(self.start)) * u64::from(self.bit_width)
    }

    /// The same chunk re-stamped for another image of a pipelined batch.
    #[must_use]
    pub fn with_image(mut self, image_id: u32) -> Self {
        self.image_id = image_id;
        self
    }

    /// Id of the tile that produces this chunk.
    #[must_use]
    pub fn producer(&self) -> i32 {
        self.tile_id
    }
}

/// Total size of a chunk list in bits.
#[must_use]
pub fn total_size_bits(chunks: &[DataChunk]) -> u64 {
    chunks.iter().map(DataChunk::size_bits).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn chunk(start: u32, end: u32, bit_width: u32, tile_id: i32) -> DataChunk {
        DataChunk {
            x: 0,
            y: 0,
            start,
            end,
            bit_width,
            total: end,
            image_id: 0,
            layer_id: 0,
            in_id: 0,
            tile_id,
        }
    }

    #[test]
    fn size_is_span_times_width() {
        assert_eq!(chunk(0, 3, 9, 0).size_bits(), 27);
        assert_eq!(chunk(5, 5, 8, 0).size_bits(), 0);
        assert_eq!(total_size_bits(&[chunk(0, 2, 8, 0), chunk(2, 4, 8, 0)]), 32);
    }

    #[test]
    fn equality_is_structural() {
        let a = chunk(0, 3, 9, 1);
        let b = chunk(0, 3, 9, 1);
        assert_eq!(a, b);
        assert_ne!(a, b.with_image(1));
        assert_ne!(a, chunk(0, 3, 9, 2));
    }
}
