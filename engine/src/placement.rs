//! Pure placement, clear detection and scoring rules.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::grid::{CellState, Grid};
use crate::piece::Shape;

pub const POINTS_PER_LINE: u64 = 10;
pub const POINTS_PER_BOX: u64 = 30;

pub fn can_place(grid: &Grid, shape: &Shape, row: usize, col: usize) -> bool {
    if row + shape.height() > grid.size() || col + shape.width() > grid.size() {
        return false;
    }
    shape
        .occupied()
        .all(|(dr, dc)| grid.is_open(row + dr, col + dc))
}

/// Returns a copy of `grid` with the shape's cells filled. Gem markers under
/// the shape are overwritten.
pub fn place(grid: &Grid, shape: &Shape, row: usize, col: usize) -> EngineResult<Grid> {
    if !can_place(grid, shape, row, col) {
        return Err(EngineError::InvalidPlacement { row, col });
    }
    let mut next = grid.clone();
    for (dr, dc) in shape.occupied() {
        next.set(row + dr, col + dc, CellState::Filled)?;
    }
    Ok(next)
}

pub fn can_place_anywhere(grid: &Grid, shape: &Shape) -> bool {
    (0..grid.size()).any(|row| (0..grid.size()).any(|col| can_place(grid, shape, row, col)))
}

/// Complete rows, columns and boxes found on one grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearSet {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub boxes: Vec<usize>,
}

impl ClearSet {
    pub fn total(&self) -> usize {
        self.rows.len() + self.cols.len() + self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn lines(&self) -> usize {
        self.rows.len() + self.cols.len()
    }

    pub fn is_combo(&self) -> bool {
        self.total() > 1
    }

    /// Union of every cleared cell. Cells shared by a row and a column
    /// appear once.
    pub fn cells(&self, grid: &Grid) -> BTreeSet<(usize, usize)> {
        let size = grid.size();
        let mut out = BTreeSet::new();
        for &row in &self.rows {
            out.extend((0..size).map(|col| (row, col)));
        }
        for &col in &self.cols {
            out.extend((0..size).map(|row| (row, col)));
        }
        for &index in &self.boxes {
            out.extend(grid.box_cells(index));
        }
        out
    }
}

pub fn detect_clears(grid: &Grid) -> ClearSet {
    let size = grid.size();
    let rows = (0..size)
        .filter(|&r| (0..size).all(|c| grid.is_filled(r, c)))
        .collect();
    let cols = (0..size)
        .filter(|&c| (0..size).all(|r| grid.is_filled(r, c)))
        .collect();
    let boxes = (0..grid.box_count())
        .filter(|&index| grid.box_cells(index).all(|(r, c)| grid.is_filled(r, c)))
        .collect();
    ClearSet { rows, cols, boxes }
}

pub fn apply_clears(grid: &Grid, clears: &ClearSet) -> EngineResult<Grid> {
    let mut next = grid.clone();
    for (row, col) in clears.cells(grid) {
        next.set(row, col, CellState::Empty)?;
    }
    Ok(next)
}

pub fn combo_multiplier(total_clears: usize) -> u64 {
    if total_clears > 1 {
        total_clears as u64
    } else {
        1
    }
}

/// `floor((rows*10 + cols*10 + boxes*30) * combo * score_multiplier)`.
pub fn score_for(clears: &ClearSet, score_multiplier: f64) -> u64 {
    let base = clears.lines() as u64 * POINTS_PER_LINE + clears.boxes.len() as u64 * POINTS_PER_BOX;
    let raw = (base * combo_multiplier(clears.total())) as f64 * score_multiplier;
    raw.floor().max(0.0) as u64
}
