//! Headless session driven over JSON by tooling and randomizer bridges.

use serde::{Deserialize, Serialize};

use engine::agent::{AgentCommand, AgentHost, AgentResponse};
use engine::piece::Piece;

use crate::blockfit_core::BlockfitCore;
use crate::playtest::{BlockfitLogic, InputAction};
use crate::randomizer::OutboundEvent;
use crate::settings::EngineConfig;

#[derive(Debug, thiserror::Error)]
pub enum AgentApiError {
    #[error("unexpected agent response for {0}")]
    UnexpectedResponse(&'static str),
    #[error("session state is not serializable: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStat {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PieceView {
    pub id: u64,
    pub kind: String,
    pub color: String,
    pub cells: Vec<Vec<u8>>,
    pub held: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub frame: usize,
    pub stats: Vec<SessionStat>,
    /// `cells[row][col]`: 0 empty, 1 filled, 2 gem.
    pub grid: Vec<Vec<u8>>,
    pub clearing: Vec<(usize, usize)>,
    pub pieces: Vec<PieceView>,
    pub state: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionTimeline {
    pub frame: usize,
    pub history_len: usize,
    pub can_rewind: bool,
    pub can_forward: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FramesRequest {
    pub frames: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeekRequest {
    pub frame: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DigestView {
    pub frame: usize,
    pub sha256: String,
}

pub struct AgentSession {
    host: AgentHost<BlockfitLogic>,
}

impl AgentSession {
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, EngineConfig::default())
    }

    pub fn with_config(seed: u64, config: EngineConfig) -> Self {
        Self::with_logic(BlockfitLogic::with_config(seed, config))
    }

    pub fn with_logic(logic: BlockfitLogic) -> Self {
        Self {
            host: AgentHost::new(logic),
        }
    }

    pub fn core(&self) -> &BlockfitCore {
        self.host.runner().state()
    }

    pub fn timeline(&self) -> SessionTimeline {
        let runner = self.host.runner();
        let tm = runner.timemachine();
        SessionTimeline {
            frame: runner.frame(),
            history_len: runner.history().len(),
            can_rewind: tm.can_rewind(),
            can_forward: tm.can_forward(),
        }
    }

    pub fn state(&mut self) -> Result<SessionSnapshot, AgentApiError> {
        snapshot_from_response(self.host.handle(AgentCommand::GetState))
    }

    pub fn step(&mut self, action: InputAction) -> Result<SessionSnapshot, AgentApiError> {
        snapshot_from_response(self.host.handle(AgentCommand::Step(action)))
    }

    pub fn rewind(&mut self, frames: usize) -> Result<SessionSnapshot, AgentApiError> {
        snapshot_from_response(self.host.handle(AgentCommand::Rewind { frames }))
    }

    pub fn forward(&mut self, frames: usize) -> Result<SessionSnapshot, AgentApiError> {
        snapshot_from_response(self.host.handle(AgentCommand::Forward { frames }))
    }

    pub fn seek(&mut self, frame: usize) -> Result<SessionSnapshot, AgentApiError> {
        snapshot_from_response(self.host.handle(AgentCommand::Seek { frame }))
    }

    pub fn reset(&mut self) -> Result<SessionSnapshot, AgentApiError> {
        snapshot_from_response(self.host.handle(AgentCommand::Reset))
    }

    pub fn digest(&mut self) -> Result<DigestView, AgentApiError> {
        match self.host.handle(AgentCommand::Digest) {
            AgentResponse::Digest { frame, sha256 } => Ok(DigestView { frame, sha256 }),
            _ => Err(AgentApiError::UnexpectedResponse("digest")),
        }
    }

    /// Returns the queued outbound events and records a frame with the
    /// queue emptied, so past frames keep what they had queued.
    pub fn drain_outbound(&mut self) -> Vec<OutboundEvent> {
        let events = self.core().pending_outbound().to_vec();
        if !events.is_empty() {
            self.host.handle(AgentCommand::Step(InputAction::DrainOutbound));
        }
        events
    }
}

fn snapshot_from_response(
    response: AgentResponse<BlockfitCore>,
) -> Result<SessionSnapshot, AgentApiError> {
    match response {
        AgentResponse::State { frame, state } => snapshot_from_state(frame, &state),
        AgentResponse::History { .. } => Err(AgentApiError::UnexpectedResponse("history")),
        AgentResponse::Digest { .. } => Err(AgentApiError::UnexpectedResponse("digest")),
    }
}

pub fn snapshot_from_state(frame: usize, core: &BlockfitCore) -> Result<SessionSnapshot, AgentApiError> {
    let stats = core.stats();
    let stats = vec![
        stat("mode", format!("{:?}", core.mode())),
        stat("score", stats.total_score),
        stat("multiplier", format!("{:.2}", core.score_multiplier())),
        stat("linesCleared", stats.lines_cleared),
        stat("boxesCleared", stats.boxes_cleared),
        stat("combos", stats.combos),
        stat("piecesPlaced", stats.pieces_placed),
        stat("gemsCollected", stats.gems_collected),
        stat("gemBalance", core.gem_balance()),
        stat("pieceSlots", core.max_piece_slots()),
        stat("itemsReceived", core.received_items().len()),
        stat("checksEarned", core.location_checks().len()),
        stat("goalCompleted", core.goal_completed()),
        stat("gameOver", core.is_game_over()),
    ];

    let pieces = core
        .current_pieces()
        .iter()
        .map(|piece| piece_view(piece, false))
        .chain(core.held_piece().map(|piece| piece_view(piece, true)))
        .collect();

    Ok(SessionSnapshot {
        frame,
        stats,
        grid: core.grid().to_u8_rows(),
        clearing: core.pending_clear_cells().to_vec(),
        pieces,
        state: serde_json::to_value(core)?,
    })
}

fn piece_view(piece: &Piece, held: bool) -> PieceView {
    PieceView {
        id: piece.instance_id,
        kind: piece.kind.id().to_string(),
        color: piece.color.clone(),
        cells: piece
            .shape
            .rows()
            .iter()
            .map(|row| row.iter().map(|&on| u8::from(on)).collect())
            .collect(),
        held,
    }
}

fn stat(label: impl Into<String>, value: impl ToString) -> SessionStat {
    SessionStat {
        label: label.into(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat_value<'a>(snapshot: &'a SessionSnapshot, label: &str) -> &'a str {
        snapshot
            .stats
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.value.as_str())
            .unwrap_or("")
    }

    #[test]
    fn step_advances_frame() {
        let mut session = AgentSession::new(0);
        let initial = session.state().unwrap();
        let stepped = session.step(InputAction::AutoPlace).unwrap();
        assert_eq!(stepped.frame, initial.frame + 1);
        assert_eq!(stat_value(&stepped, "piecesPlaced"), "1");
    }

    #[test]
    fn timeline_reports_history_len() {
        let mut session = AgentSession::new(0);
        assert_eq!(session.timeline().history_len, 1);

        session.step(InputAction::Noop).unwrap();
        session.step(InputAction::Noop).unwrap();

        let timeline = session.timeline();
        assert_eq!(timeline.frame, 2);
        assert_eq!(timeline.history_len, 3);
        assert!(timeline.can_rewind);
        assert!(!timeline.can_forward);
    }

    #[test]
    fn snapshot_lists_pieces_and_grid() {
        let mut session = AgentSession::new(0);
        let snapshot = session.state().unwrap();
        assert_eq!(snapshot.grid.len(), 9);
        assert_eq!(snapshot.pieces.len(), 3);
        assert!(!snapshot.state.is_null());
    }

    #[test]
    fn rewind_then_seek_moves_cursor() {
        let mut session = AgentSession::new(0);
        session.step(InputAction::AutoPlace).unwrap();
        session.step(InputAction::AutoPlace).unwrap();
        let rewound = session.rewind(1).unwrap();
        assert_eq!(rewound.frame, 1);
        assert!(session.timeline().can_forward);

        let snapshot = session.seek(0).unwrap();
        assert_eq!(snapshot.frame, 0);
        assert_eq!(stat_value(&snapshot, "piecesPlaced"), "0");
    }

    #[test]
    fn drain_outbound_records_a_frame() {
        let mut session = AgentSession::new(0);
        assert!(session.drain_outbound().is_empty());
        assert_eq!(session.timeline().frame, 0);

        session
            .step(InputAction::SetMode {
                mode: engine::progression::GameMode::Randomizer,
            })
            .unwrap();
        for _ in 0..12 {
            session.step(InputAction::AutoPlace).unwrap();
            session.step(InputAction::Tick { ms: 1_000 }).unwrap();
        }
        let events = session.drain_outbound();
        assert!(!events.is_empty());
        assert!(session.core().pending_outbound().is_empty());
        assert!(session.drain_outbound().is_empty());
    }

    #[test]
    fn digest_matches_frame() {
        let mut session = AgentSession::new(0);
        session.step(InputAction::Noop).unwrap();
        let digest = session.digest().unwrap();
        assert_eq!(digest.frame, 1);
        assert_eq!(digest.sha256.len(), 64);
    }
}
