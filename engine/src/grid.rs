use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_GRID_SIZE: usize = 9;
pub const SUPPORTED_GRID_SIZES: [usize; 3] = [6, 7, 9];
/// Edge length of a clearable box. Boxes only exist on 9x9 grids.
pub const BOX_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellState {
    #[default]
    Empty,
    Filled,
    /// Collectible marker. Counts as open for placement.
    Gem,
}

impl CellState {
    pub fn is_open(self) -> bool {
        !matches!(self, CellState::Filled)
    }

    pub fn as_u8(self) -> u8 {
        match self {
            CellState::Empty => 0,
            CellState::Filled => 1,
            CellState::Gem => 2,
        }
    }
}

pub fn is_supported_size(size: usize) -> bool {
    SUPPORTED_GRID_SIZES.contains(&size)
}

/// Square board of cells, `cells[row][col]` with row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    size: usize,
    cells: Vec<Vec<CellState>>,
}

impl Grid {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![vec![CellState::Empty; size]; size],
        }
    }

    /// Builds a grid from rows of `0` (empty), `1` (filled) and `2` (gem).
    /// Any other value is treated as filled.
    pub fn from_rows(rows: &[Vec<u8>]) -> Self {
        let size = rows.len();
        let cells = rows
            .iter()
            .map(|row| {
                (0..size)
                    .map(|col| match row.get(col).copied().unwrap_or(0) {
                        0 => CellState::Empty,
                        2 => CellState::Gem,
                        _ => CellState::Filled,
                    })
                    .collect()
            })
            .collect();
        Self { size, cells }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.size && col < self.size
    }

    pub fn occupancy_at(&self, row: usize, col: usize) -> EngineResult<CellState> {
        if !self.in_bounds(row, col) {
            return Err(self.out_of_bounds(row, col));
        }
        Ok(self.cells[row][col])
    }

    pub fn set(&mut self, row: usize, col: usize, state: CellState) -> EngineResult<()> {
        if !self.in_bounds(row, col) {
            return Err(self.out_of_bounds(row, col));
        }
        self.cells[row][col] = state;
        Ok(())
    }

    pub fn is_open(&self, row: usize, col: usize) -> bool {
        self.in_bounds(row, col) && self.cells[row][col].is_open()
    }

    pub fn is_filled(&self, row: usize, col: usize) -> bool {
        self.in_bounds(row, col) && self.cells[row][col] == CellState::Filled
    }

    pub fn rows(&self) -> &[Vec<CellState>] {
        &self.cells
    }

    pub fn to_u8_rows(&self) -> Vec<Vec<u8>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|cell| cell.as_u8()).collect())
            .collect()
    }

    /// Number of 3x3 boxes that can clear on this grid.
    pub fn box_count(&self) -> usize {
        if self.size == 9 { 9 } else { 0 }
    }

    /// Cells of box `index`, numbered row-major from the top-left box.
    pub fn box_cells(&self, index: usize) -> impl Iterator<Item = (usize, usize)> {
        let start_row = (index / BOX_SIZE) * BOX_SIZE;
        let start_col = (index % BOX_SIZE) * BOX_SIZE;
        (0..BOX_SIZE).flat_map(move |dr| (0..BOX_SIZE).map(move |dc| (start_row + dr, start_col + dc)))
    }

    pub fn cells_with(&self, state: CellState) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (r, row) in self.cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if *cell == state {
                    out.push((r, c));
                }
            }
        }
        out
    }

    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        self.cells_with(CellState::Empty)
    }

    pub fn filled_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| **cell == CellState::Filled)
            .count()
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> EngineError {
        EngineError::OutOfBounds {
            row,
            col,
            size: self.size,
        }
    }
}
