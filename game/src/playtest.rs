use serde::{Deserialize, Serialize};

use engine::GameLogic;
use engine::piece::PieceId;
use engine::placement;
use engine::progression::GameMode;

use crate::blockfit_core::BlockfitCore;
use crate::randomizer::{ConnectionState, ItemDelivery};
use crate::settings::EngineConfig;

/// One recorded player or client event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InputAction {
    Noop,
    Place {
        piece_id: PieceId,
        row: usize,
        col: usize,
    },
    /// Places the first current piece that fits at its first open anchor.
    AutoPlace,
    Tick {
        ms: u32,
    },
    Rotate {
        piece_id: PieceId,
    },
    Mirror {
        piece_id: PieceId,
    },
    Shrink {
        piece_id: PieceId,
    },
    Hold {
        piece_id: PieceId,
    },
    Undo,
    RemoveBlock {
        row: usize,
        col: usize,
    },
    Connection {
        state: ConnectionState,
    },
    ReceiveItems {
        items: Vec<ItemDelivery>,
        #[serde(default)]
        starting_index: u64,
    },
    Resync {
        items: Vec<ItemDelivery>,
    },
    SetMode {
        mode: GameMode,
    },
    SetGridSize {
        size: usize,
    },
    /// Empties the outbound queue after a bridge has forwarded it.
    DrainOutbound,
    NewGame,
    ResetAll,
}

#[derive(Debug, Clone)]
pub struct BlockfitLogic {
    seed: u64,
    config: EngineConfig,
    mode: GameMode,
}

impl BlockfitLogic {
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, EngineConfig::default())
    }

    pub fn with_config(seed: u64, config: EngineConfig) -> Self {
        Self {
            seed,
            config,
            mode: GameMode::FreePlay,
        }
    }

    pub fn with_mode(mut self, mode: GameMode) -> Self {
        self.mode = mode;
        self
    }
}

impl GameLogic for BlockfitLogic {
    type State = BlockfitCore;
    type Input = InputAction;

    fn initial_state(&self) -> Self::State {
        let mut core = BlockfitCore::with_config(self.seed, self.config.clone());
        if self.mode == GameMode::FreePlay {
            core.initialize_game();
        } else {
            core.set_mode(self.mode);
        }
        core
    }

    fn step(&self, state: &Self::State, input: Self::Input) -> Self::State {
        let mut next = state.clone();
        apply_action(&mut next, input);
        next
    }
}

/// Applies one action. Rejected actions leave the session unchanged and are
/// only logged, so a recorded timeline always replays frame for frame.
pub fn apply_action(core: &mut BlockfitCore, action: InputAction) {
    let result = match action {
        InputAction::Noop => Ok(()),
        InputAction::Place { piece_id, row, col } => core.place_piece(piece_id, row, col).map(drop),
        InputAction::AutoPlace => match first_fit(core) {
            Some((piece_id, row, col)) => core.place_piece(piece_id, row, col).map(drop),
            None => Ok(()),
        },
        InputAction::Tick { ms } => core.tick(ms).map(drop),
        InputAction::Rotate { piece_id } => core.rotate_piece(piece_id),
        InputAction::Mirror { piece_id } => core.mirror_piece(piece_id),
        InputAction::Shrink { piece_id } => core.shrink_piece(piece_id),
        InputAction::Hold { piece_id } => core.hold_piece(piece_id),
        InputAction::Undo => core.undo(),
        InputAction::RemoveBlock { row, col } => core.remove_block(row, col),
        InputAction::Connection { state } => {
            core.connection_state_changed(state);
            Ok(())
        }
        InputAction::ReceiveItems {
            items,
            starting_index,
        } => {
            core.items_received(&items, starting_index);
            Ok(())
        }
        InputAction::Resync { items } => core.resync(&items).map(drop),
        InputAction::SetMode { mode } => {
            core.set_mode(mode);
            Ok(())
        }
        InputAction::SetGridSize { size } => core.set_grid_size(size),
        InputAction::DrainOutbound => {
            core.drain_outbound();
            Ok(())
        }
        InputAction::NewGame => {
            core.reset_stats();
            Ok(())
        }
        InputAction::ResetAll => {
            core.reset_all_progress();
            Ok(())
        }
    };
    if let Err(err) = result {
        log::debug!("action rejected: {err}");
    }
}

/// Scans current pieces in order and anchors row-major.
pub fn first_fit(core: &BlockfitCore) -> Option<(PieceId, usize, usize)> {
    let size = core.grid().size();
    core.current_pieces().iter().find_map(|piece| {
        (0..size)
            .flat_map(|row| (0..size).map(move |col| (row, col)))
            .find(|&(row, col)| placement::can_place(core.grid(), &piece.shape, row, col))
            .map(|(row, col)| (piece.instance_id, row, col))
    })
}
