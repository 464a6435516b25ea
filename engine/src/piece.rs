use serde::{Deserialize, Serialize};

/// Per-instance identifier handed out by the session when a piece is dealt.
pub type PieceId = u64;

/// Rectangular occupancy matrix, `cells[row][col]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    cells: Vec<Vec<bool>>,
}

impl Shape {
    pub fn from_rows(rows: &[&[u8]]) -> Self {
        Self {
            cells: rows
                .iter()
                .map(|row| row.iter().map(|&v| v != 0).collect())
                .collect(),
        }
    }

    pub fn single() -> Self {
        Self::from_rows(&[&[1]])
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    pub fn width(&self) -> usize {
        self.cells.first().map(Vec::len).unwrap_or(0)
    }

    pub fn rows(&self) -> &[Vec<bool>] {
        &self.cells
    }

    pub fn is_occupied(&self, row: usize, col: usize) -> bool {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(false)
    }

    /// Offsets of occupied cells relative to the top-left of the bounding box.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, occupied)| **occupied)
                .map(move |(c, _)| (r, c))
        })
    }

    pub fn cell_count(&self) -> usize {
        self.occupied().count()
    }

    /// 90 degrees clockwise: an R x C shape becomes C x R with
    /// `new[c][R - 1 - r] = old[r][c]`.
    pub fn rotated_cw(&self) -> Shape {
        let height = self.height();
        let width = self.width();
        let mut cells = vec![vec![false; height]; width];
        for r in 0..height {
            for c in 0..width {
                cells[c][height - 1 - r] = self.cells[r][c];
            }
        }
        Shape { cells }
    }

    /// Horizontal reflection (columns reversed).
    pub fn mirrored(&self) -> Shape {
        Shape {
            cells: self
                .cells
                .iter()
                .map(|row| row.iter().rev().copied().collect())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceKind {
    Single,
    DominoI,
    TrominoI,
    TrominoL,
    TetrominoI,
    TetrominoO,
    TetrominoT,
    TetrominoL,
    TetrominoS,
    PentominoI,
    PentominoL,
    PentominoP,
    PentominoU,
    PentominoW,
    PentominoPlus,
    #[serde(rename = "corner_3x3")]
    Corner3x3,
    #[serde(rename = "t_shape_3x3")]
    TShape3x3,
    #[serde(rename = "cross_3x3")]
    Cross3x3,
}

impl PieceKind {
    /// Catalog order. Item ids for piece unlocks follow this order.
    pub const ALL: [PieceKind; 18] = [
        PieceKind::Single,
        PieceKind::DominoI,
        PieceKind::TrominoI,
        PieceKind::TrominoL,
        PieceKind::TetrominoI,
        PieceKind::TetrominoO,
        PieceKind::TetrominoT,
        PieceKind::TetrominoL,
        PieceKind::TetrominoS,
        PieceKind::PentominoI,
        PieceKind::PentominoL,
        PieceKind::PentominoP,
        PieceKind::PentominoU,
        PieceKind::PentominoW,
        PieceKind::PentominoPlus,
        PieceKind::Corner3x3,
        PieceKind::TShape3x3,
        PieceKind::Cross3x3,
    ];

    /// Always unlocked in randomizer games.
    pub const STARTERS: [PieceKind; 3] = [
        PieceKind::TrominoL,
        PieceKind::TetrominoT,
        PieceKind::TetrominoL,
    ];

    pub fn all() -> Vec<PieceKind> {
        Self::ALL.to_vec()
    }

    pub fn id(self) -> &'static str {
        match self {
            PieceKind::Single => "single",
            PieceKind::DominoI => "domino_i",
            PieceKind::TrominoI => "tromino_i",
            PieceKind::TrominoL => "tromino_l",
            PieceKind::TetrominoI => "tetromino_i",
            PieceKind::TetrominoO => "tetromino_o",
            PieceKind::TetrominoT => "tetromino_t",
            PieceKind::TetrominoL => "tetromino_l",
            PieceKind::TetrominoS => "tetromino_s",
            PieceKind::PentominoI => "pentomino_i",
            PieceKind::PentominoL => "pentomino_l",
            PieceKind::PentominoP => "pentomino_p",
            PieceKind::PentominoU => "pentomino_u",
            PieceKind::PentominoW => "pentomino_w",
            PieceKind::PentominoPlus => "pentomino_plus",
            PieceKind::Corner3x3 => "corner_3x3",
            PieceKind::TShape3x3 => "t_shape_3x3",
            PieceKind::Cross3x3 => "cross_3x3",
        }
    }

    pub fn from_id(id: &str) -> Option<PieceKind> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            PieceKind::Single => "Single Block",
            PieceKind::DominoI => "Domino I",
            PieceKind::TrominoI => "Tromino I",
            PieceKind::TrominoL => "Tromino L",
            PieceKind::TetrominoI => "Tetromino I",
            PieceKind::TetrominoO => "Tetromino O",
            PieceKind::TetrominoT => "Tetromino T",
            PieceKind::TetrominoL => "Tetromino L",
            PieceKind::TetrominoS => "Tetromino S",
            PieceKind::PentominoI => "Pentomino I",
            PieceKind::PentominoL => "Pentomino L",
            PieceKind::PentominoP => "Pentomino P",
            PieceKind::PentominoU => "Pentomino U",
            PieceKind::PentominoW => "Pentomino W",
            PieceKind::PentominoPlus => "Pentomino Plus",
            PieceKind::Corner3x3 => "3x3 Corner",
            PieceKind::TShape3x3 => "3x3 T-Shape",
            PieceKind::Cross3x3 => "3x3 Cross",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            PieceKind::Single => "#ef4444",
            PieceKind::DominoI => "#f97316",
            PieceKind::TrominoI => "#f59e0b",
            PieceKind::TrominoL => "#eab308",
            PieceKind::TetrominoI => "#84cc16",
            PieceKind::TetrominoO => "#22c55e",
            PieceKind::TetrominoT => "#10b981",
            PieceKind::TetrominoL => "#14b8a6",
            PieceKind::TetrominoS => "#06b6d4",
            PieceKind::PentominoI => "#0ea5e9",
            PieceKind::PentominoL => "#3b82f6",
            PieceKind::PentominoP => "#6366f1",
            PieceKind::PentominoU => "#8b5cf6",
            PieceKind::PentominoW => "#a855f7",
            PieceKind::PentominoPlus => "#d946ef",
            PieceKind::Corner3x3 => "#f43f5e",
            PieceKind::TShape3x3 => "#ef4444",
            PieceKind::Cross3x3 => "#dc2626",
        }
    }

    pub fn base_shape(self) -> Shape {
        match self {
            PieceKind::Single => Shape::from_rows(&[&[1]]),
            PieceKind::DominoI => Shape::from_rows(&[&[1, 1]]),
            PieceKind::TrominoI => Shape::from_rows(&[&[1, 1, 1]]),
            PieceKind::TrominoL => Shape::from_rows(&[&[1, 0], &[1, 1]]),
            PieceKind::TetrominoI => Shape::from_rows(&[&[1, 1, 1, 1]]),
            PieceKind::TetrominoO => Shape::from_rows(&[&[1, 1], &[1, 1]]),
            PieceKind::TetrominoT => Shape::from_rows(&[&[1, 1, 1], &[0, 1, 0]]),
            PieceKind::TetrominoL => Shape::from_rows(&[&[1, 0], &[1, 0], &[1, 1]]),
            PieceKind::TetrominoS => Shape::from_rows(&[&[0, 1, 1], &[1, 1, 0]]),
            PieceKind::PentominoI => Shape::from_rows(&[&[1, 1, 1, 1, 1]]),
            PieceKind::PentominoL => Shape::from_rows(&[&[1, 0], &[1, 0], &[1, 0], &[1, 1]]),
            PieceKind::PentominoP => Shape::from_rows(&[&[1, 1], &[1, 1], &[1, 0]]),
            PieceKind::PentominoU => Shape::from_rows(&[&[1, 0, 1], &[1, 1, 1]]),
            PieceKind::PentominoW => Shape::from_rows(&[&[1, 0, 0], &[1, 1, 0], &[0, 1, 1]]),
            PieceKind::PentominoPlus => Shape::from_rows(&[&[0, 1, 0], &[1, 1, 1], &[0, 1, 0]]),
            PieceKind::Corner3x3 => Shape::from_rows(&[&[1, 1, 1], &[1, 0, 0], &[1, 0, 0]]),
            PieceKind::TShape3x3 => Shape::from_rows(&[&[1, 1, 1], &[0, 1, 0], &[0, 1, 0]]),
            PieceKind::Cross3x3 => Shape::from_rows(&[&[0, 1, 0], &[1, 1, 1], &[0, 1, 0]]),
        }
    }

    pub fn cell_count(self) -> usize {
        self.base_shape().cell_count()
    }
}

/// A dealt piece. Two dealt pieces of the same kind are distinct instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    pub instance_id: PieceId,
    pub kind: PieceKind,
    pub color: String,
    pub shape: Shape,
    #[serde(default)]
    pub has_been_rotated: bool,
    #[serde(default)]
    pub has_been_mirrored: bool,
}

impl Piece {
    pub fn new(instance_id: PieceId, kind: PieceKind) -> Self {
        Self {
            instance_id,
            kind,
            color: kind.color().to_string(),
            shape: kind.base_shape(),
            has_been_rotated: false,
            has_been_mirrored: false,
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn rotate_cw(&mut self) {
        self.shape = self.shape.rotated_cw();
        self.has_been_rotated = true;
    }

    pub fn mirror(&mut self) {
        self.shape = self.shape.mirrored();
        self.has_been_mirrored = true;
    }

    /// Collapses the piece to a single cell. The color is kept.
    pub fn shrink(&mut self) {
        self.kind = PieceKind::Single;
        self.shape = Shape::single();
    }
}
