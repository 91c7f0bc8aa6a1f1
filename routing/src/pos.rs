// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed grid coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a tile (or router node) inside the grid, `(row, col)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct NodePos {
    pub row: u16,
    pub col: u16,
}

impl NodePos {
    #[must_use]
    pub fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// Hop distance on a plain mesh.
    #[must_use]
    pub fn manhattan(self, other: NodePos) -> u32 {
        u32::from(self.row.abs_diff(other.row)) + u32::from(self.col.abs_diff(other.col))
    }

    /// Hop distance when both axes may wrap around a `rows` x `cols` torus.
    #[must_use]
    pub fn torus_distance(self, other: NodePos, rows: u16, cols: u16) -> u32 {
        let row_delta = u32::from(self.row.abs_diff(other.row));
        let col_delta = u32::from(self.col.abs_diff(other.col));
        let row_wrap = u32::from(rows) - row_delta;
        let col_wrap = u32::from(cols) - col_delta;
        row_delta.min(row_wrap) + col_delta.min(col_wrap)
    }
}

impl fmt::Display for NodePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(u16, u16)> for NodePos {
    fn from((row, col): (u16, u16)) -> Self {
        Self { row, col }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances() {
        let a = NodePos::new(0, 2);
        let b = NodePos::new(1, 0);
        assert_eq!(a.manhattan(b), 3);
        // wrapping the column axis of a 3x3 torus saves one hop
        assert_eq!(a.torus_distance(b, 3, 3), 2);
        assert_eq!(a.torus_distance(a, 3, 3), 0);
    }

    #[test]
    fn ordering_is_row_major() {
        assert!(NodePos::new(0, 2) < NodePos::new(1, 0));
        assert!(NodePos::new(1, 0) < NodePos::new(1, 1));
    }
}
