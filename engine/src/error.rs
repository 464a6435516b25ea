use thiserror::Error;

use crate::progression::AbilityKind;

/// Recoverable failures reported by rules and session operations.
///
/// Every operation that returns one of these leaves the state it was called
/// on untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("piece does not fit at row {row}, col {col}")]
    InvalidPlacement { row: usize, col: usize },
    #[error("no {0:?} charges left")]
    InsufficientAbilityCharge(AbilityKind),
    #[error("not enough gems to use {0:?}")]
    InsufficientCurrency(AbilityKind),
    #[error("{0:?} is disabled for this game")]
    AbilityDisabled(AbilityKind),
    #[error("cell ({row}, {col}) is outside a {size}x{size} grid")]
    OutOfBounds { row: usize, col: usize, size: usize },
    #[error("no pieces are available to deal")]
    NoPiecesAvailable,
    #[error("a randomizer connection is required")]
    ConnectionRequired,
    #[error("piece {0} is not in play")]
    PieceNotFound(u64),
    #[error("a line clear is still pending")]
    ClearPending,
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("cell ({row}, {col}) is already empty")]
    CellAlreadyEmpty { row: usize, col: usize },
    #[error("the game is over")]
    GameOver,
    #[error("grid size {0} is not supported")]
    GridSizeUnsupported(usize),
}

pub type EngineResult<T> = Result<T, EngineError>;
