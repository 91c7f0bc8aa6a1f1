// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tile placement. The engine only requires that a mapping produce one
//! in-grid position per tile behavior; the closed-form strategies here are
//! the ones a run can select by name.

use crate::errors::SimError;
use ahash::AHashSet;
use config::MappingKind;
use routing::NodePos;
use workload::TileBehavior;

/// Place the flattened tile list onto the grid with the selected strategy.
pub fn position_list(
    strategy: MappingKind,
    behaviors: &[TileBehavior],
    rows: usize,
    cols: usize,
) -> Result<Vec<NodePos>, SimError> {
    let count = behaviors.len();
    let positions = match strategy {
        MappingKind::Naive => naive_positions(count, cols),
        MappingKind::Snake => snake_positions(count, rows, cols),
        MappingKind::Impact => impact_positions(count, rows, cols),
    };
    check_position_list(&positions, count, rows, cols)?;
    Ok(positions)
}

/// Row-major fill.
fn naive_positions(count: usize, cols: usize) -> Vec<NodePos> {
    (0..count)
        .map(|index| grid_pos(index / cols, index % cols))
        .collect()
}

/// L-shaped diagonal fill:
/// ```text
/// 0 1 8
/// 3 2 7
/// 4 5 6
/// ```
fn snake_positions(count: usize, rows: usize, cols: usize) -> Vec<NodePos> {
    let mut positions = Vec::new();
    for i in 0..rows.min(cols) {
        let mut line: Vec<NodePos> = Vec::new();
        for j in 0..i {
            line.push(grid_pos(i, j));
        }
        line.push(grid_pos(i, i));
        for j in (0..i).rev() {
            line.push(grid_pos(j, i));
        }
        if i % 2 == 1 {
            line.reverse();
        }
        positions.extend(line);
    }
    positions.truncate(count);
    positions
}

/// Boustrophedon rows:
/// ```text
/// 0 1 2
/// 5 4 3
/// 6 7 8
/// ```
fn impact_positions(count: usize, rows: usize, cols: usize) -> Vec<NodePos> {
    let mut positions = Vec::new();
    for i in 0..rows {
        let mut row: Vec<NodePos> = (0..cols).map(|j| grid_pos(i, j)).collect();
        if i % 2 == 1 {
            row.reverse();
        }
        positions.extend(row);
    }
    positions.truncate(count);
    positions
}

#[allow(clippy::cast_possible_truncation)]
fn grid_pos(row: usize, col: usize) -> NodePos {
    NodePos::new(row as u16, col as u16)
}

/// Every behavior must land on a distinct in-grid position.
fn check_position_list(
    positions: &[NodePos],
    expected: usize,
    rows: usize,
    cols: usize,
) -> Result<(), SimError> {
    if positions.len() != expected {
        return Err(SimError::GridTooSmall {
            tiles: expected,
            rows,
            cols,
        });
    }
    let mut seen: AHashSet<NodePos> = AHashSet::new();
    for &position in positions {
        if usize::from(position.row) >= rows || usize::from(position.col) >= cols {
            return Err(SimError::GridTooSmall {
                tiles: expected,
                rows,
                cols,
            });
        }
        if !seen.insert(position) {
            return Err(SimError::DuplicatePosition(position));
        }
    }
    Ok(())
}
