use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use engine::error::{EngineError, EngineResult};
use engine::generator::deal;
use engine::grid::{CellState, Grid, is_supported_size};
use engine::items::Entitlements;
use engine::ledger::{LocationCheckLedger, ReceivedItemLedger};
use engine::milestones::{LocationId, MilestoneProgress, check_milestones, gem_location_id};
use engine::piece::{Piece, PieceId, PieceKind, Shape};
use engine::placement::{self, ClearSet};
use engine::progression::{
    AbilityCharges, AbilityKind, AbilityPayment, AbilityWallet, GameMode, effective_score_multiplier,
};
use engine::rng::Rng;

use crate::randomizer::{ConnectionState, ItemDelivery, OutboundEvent, RandomizerLink, deliver};
use crate::settings::{EngineConfig, SlotData};

/// First internal id handed to a spawned gem.
pub const GEM_CHECK_ID_BASE: u64 = 10_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_score: u64,
    /// Rows plus columns.
    pub lines_cleared: u64,
    pub boxes_cleared: u64,
    pub combos: u64,
    pub pieces_placed: u64,
    pub gems_collected: u32,
}

impl Statistics {
    pub fn milestone_progress(&self) -> MilestoneProgress {
        MilestoneProgress {
            score: self.total_score,
            lines_cleared: self.lines_cleared,
            boxes_cleared: self.boxes_cleared,
            combos: self.combos,
            pieces_placed: self.pieces_placed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GemCell {
    pub row: usize,
    pub col: usize,
    pub check_id: u64,
}

/// State before the most recent placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoSnapshot {
    pub grid: Grid,
    pub current_pieces: Vec<Piece>,
    pub held_piece: Option<Piece>,
    pub gems: Vec<GemCell>,
    pub total_score: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
enum ClearPhase {
    #[default]
    Idle,
    Delay {
        clears: ClearSet,
        cells: Vec<(usize, usize)>,
        elapsed_ms: u32,
        duration_ms: u32,
        grid_epoch: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementOutcome {
    pub piece_id: PieceId,
    pub clears: ClearSet,
    /// Cells that will empty once the clear delay has elapsed.
    pub clearing_cells: Vec<(usize, usize)>,
}

impl PlacementOutcome {
    pub fn clear_pending(&self) -> bool {
        !self.clears.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClearReport {
    pub clears: ClearSet,
    pub points: u64,
    pub combo: bool,
    pub gems_collected: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Idle,
    Pending { remaining_ms: u32 },
    Committed(ClearReport),
    /// The grid was replaced after the clear was scheduled.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PieceSlot {
    Current(usize),
    Held,
}

fn default_gem_check_id() -> u64 {
    GEM_CHECK_ID_BASE
}

/// One save: grid, pieces, statistics, entitlements and randomizer ledgers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockfitCore {
    #[serde(default)]
    config: EngineConfig,
    #[serde(default)]
    mode: GameMode,
    grid: Grid,
    #[serde(default)]
    grid_epoch: u64,
    #[serde(default)]
    current_pieces: Vec<Piece>,
    #[serde(default)]
    held_piece: Option<Piece>,
    #[serde(default)]
    next_piece_id: PieceId,
    #[serde(default)]
    undo: Option<UndoSnapshot>,
    #[serde(default)]
    stats: Statistics,
    #[serde(default)]
    gems: Vec<GemCell>,
    #[serde(default = "default_gem_check_id")]
    next_gem_check_id: u64,
    #[serde(default)]
    gem_balance: u32,
    #[serde(default)]
    entitlements: Entitlements,
    #[serde(default)]
    spent: AbilityCharges,
    #[serde(default)]
    received: ReceivedItemLedger,
    #[serde(default)]
    checks: LocationCheckLedger,
    #[serde(default)]
    outbox: Vec<OutboundEvent>,
    #[serde(default)]
    goal_completed: bool,
    #[serde(default)]
    clear_phase: ClearPhase,
    #[serde(default)]
    game_over: bool,
    rng: Rng,
    #[serde(skip)]
    connection: ConnectionState,
}

impl BlockfitCore {
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, EngineConfig::default())
    }

    pub fn with_config(seed: u64, config: EngineConfig) -> Self {
        let config = config.sanitized();
        Self {
            grid: Grid::new(config.grid_size),
            entitlements: Entitlements::starting(config.base_piece_slots),
            config,
            mode: GameMode::FreePlay,
            grid_epoch: 0,
            current_pieces: Vec::new(),
            held_piece: None,
            next_piece_id: 0,
            undo: None,
            stats: Statistics::default(),
            gems: Vec::new(),
            next_gem_check_id: GEM_CHECK_ID_BASE,
            gem_balance: 0,
            spent: AbilityCharges::default(),
            received: ReceivedItemLedger::default(),
            checks: LocationCheckLedger::default(),
            outbox: Vec::new(),
            goal_completed: false,
            clear_phase: ClearPhase::Idle,
            game_over: false,
            rng: Rng::new(seed),
            connection: ConnectionState::Disconnected,
        }
    }

    /// Fresh grid and a fresh batch of pieces. Statistics are untouched.
    pub fn initialize_game(&mut self) {
        self.replace_grid(Grid::new(self.config.grid_size));
        self.current_pieces.clear();
        self.held_piece = None;
        self.undo = None;
        self.gems.clear();
        self.game_over = false;
        self.deal_if_empty();
        self.refresh_game_over();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Clamps a config read from an older or hand-edited save. The grid size
    /// follows the stored grid.
    pub(crate) fn sanitize_loaded_config(&mut self) {
        self.config = std::mem::take(&mut self.config).sanitized();
        self.config.grid_size = self.grid.size();
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn current_pieces(&self) -> &[Piece] {
        &self.current_pieces
    }

    pub fn held_piece(&self) -> Option<&Piece> {
        self.held_piece.as_ref()
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn score(&self) -> u64 {
        self.stats.total_score
    }

    pub fn gems(&self) -> &[GemCell] {
        &self.gems
    }

    pub fn gem_balance(&self) -> u32 {
        self.gem_balance
    }

    pub fn entitlements(&self) -> &Entitlements {
        &self.entitlements
    }

    pub fn received_items(&self) -> &ReceivedItemLedger {
        &self.received
    }

    pub fn location_checks(&self) -> &LocationCheckLedger {
        &self.checks
    }

    pub fn pending_outbound(&self) -> &[OutboundEvent] {
        &self.outbox
    }

    pub fn goal_completed(&self) -> bool {
        self.goal_completed
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn can_undo(&self) -> bool {
        self.undo.is_some()
    }

    pub fn grid_epoch(&self) -> u64 {
        self.grid_epoch
    }

    pub fn score_multiplier(&self) -> f64 {
        effective_score_multiplier(
            self.entitlements.base_score_multiplier,
            self.stats.combos,
            self.config.combo_multiplier_increment,
        )
    }

    pub fn max_piece_slots(&self) -> usize {
        self.entitlements.max_piece_slots
    }

    pub fn available_pieces(&self) -> Vec<PieceKind> {
        match self.mode {
            GameMode::FreePlay => self.config.free_play_pieces(),
            GameMode::Randomizer => self.entitlements.unlocked_list(),
        }
    }

    /// Charges left this game (granted by items minus spent).
    pub fn available_charges(&self) -> AbilityCharges {
        self.entitlements.granted.remaining_after(&self.spent)
    }

    pub fn can_use_ability(&self, kind: AbilityKind) -> bool {
        self.wallet().can_use(kind)
    }

    pub fn is_clear_pending(&self) -> bool {
        matches!(
            &self.clear_phase,
            ClearPhase::Delay { grid_epoch, .. } if *grid_epoch == self.grid_epoch
        )
    }

    pub fn pending_clear_cells(&self) -> &[(usize, usize)] {
        match &self.clear_phase {
            ClearPhase::Delay {
                cells, grid_epoch, ..
            } if *grid_epoch == self.grid_epoch => cells,
            _ => &[],
        }
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.locate(id).map(|slot| self.piece_at(slot))
    }

    pub fn place_piece(&mut self, id: PieceId, row: usize, col: usize) -> EngineResult<PlacementOutcome> {
        self.ensure_no_pending_clear()?;
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        let slot = self.locate(id).ok_or(EngineError::PieceNotFound(id))?;
        let next_grid = placement::place(&self.grid, &self.piece_at(slot).shape, row, col)?;

        self.undo = Some(self.snapshot());
        self.grid = next_grid;
        match slot {
            PieceSlot::Current(index) => {
                self.current_pieces.remove(index);
            }
            PieceSlot::Held => self.held_piece = None,
        }
        self.stats.pieces_placed += 1;

        let clears = placement::detect_clears(&self.grid);
        let clearing_cells: Vec<_> = clears.cells(&self.grid).into_iter().collect();
        if clears.is_empty() {
            self.finish_turn();
        } else {
            log::debug!(
                "piece {id} completes rows {:?} cols {:?} boxes {:?}",
                clears.rows,
                clears.cols,
                clears.boxes
            );
            self.clear_phase = ClearPhase::Delay {
                clears: clears.clone(),
                cells: clearing_cells.clone(),
                elapsed_ms: 0,
                duration_ms: self.config.clear_delay_ms(),
                grid_epoch: self.grid_epoch,
            };
            self.record_progress();
        }

        Ok(PlacementOutcome {
            piece_id: id,
            clears,
            clearing_cells,
        })
    }

    /// Advances the pending clear by `dt_ms` and commits it once the delay
    /// has elapsed.
    pub fn tick(&mut self, dt_ms: u32) -> EngineResult<TickOutcome> {
        let clears = match &mut self.clear_phase {
            ClearPhase::Idle => return Ok(TickOutcome::Idle),
            ClearPhase::Delay {
                clears,
                elapsed_ms,
                duration_ms,
                grid_epoch,
                ..
            } => {
                if *grid_epoch != self.grid_epoch {
                    log::warn!(
                        "discarding clear scheduled against grid {} (current grid {})",
                        grid_epoch,
                        self.grid_epoch
                    );
                    self.clear_phase = ClearPhase::Idle;
                    return Ok(TickOutcome::Discarded);
                }
                *elapsed_ms = elapsed_ms.saturating_add(dt_ms);
                if *elapsed_ms < *duration_ms {
                    return Ok(TickOutcome::Pending {
                        remaining_ms: *duration_ms - *elapsed_ms,
                    });
                }
                clears.clone()
            }
        };

        self.clear_phase = ClearPhase::Idle;
        self.commit_clear(clears).map(TickOutcome::Committed)
    }

    /// Runs the pending clear to completion regardless of elapsed time.
    pub fn flush_pending_clear(&mut self) -> EngineResult<TickOutcome> {
        self.tick(u32::MAX)
    }

    fn commit_clear(&mut self, clears: ClearSet) -> EngineResult<ClearReport> {
        let cells: BTreeSet<(usize, usize)> = clears.cells(&self.grid);
        self.grid = placement::apply_clears(&self.grid, &clears)?;

        let (collected, kept): (Vec<GemCell>, Vec<GemCell>) = std::mem::take(&mut self.gems)
            .into_iter()
            .partition(|gem| cells.contains(&(gem.row, gem.col)));
        self.gems = kept;
        for gem in &collected {
            self.collect_gem(gem);
        }

        self.stats.lines_cleared += clears.lines() as u64;
        self.stats.boxes_cleared += clears.boxes.len() as u64;
        let combo = clears.is_combo();
        if combo {
            self.stats.combos += 1;
        }
        let points = placement::score_for(&clears, self.score_multiplier());
        self.stats.total_score += points;
        log::debug!(
            "cleared {} lines and {} boxes for {points} points (combo: {combo})",
            clears.lines(),
            clears.boxes.len()
        );

        self.finish_turn();
        Ok(ClearReport {
            clears,
            points,
            combo,
            gems_collected: collected.len() as u32,
        })
    }

    fn collect_gem(&mut self, gem: &GemCell) {
        self.stats.gems_collected += 1;
        self.gem_balance += 1;
        log::debug!("collected gem {} at ({}, {})", gem.check_id, gem.row, gem.col);
        if self.mode != GameMode::Randomizer
            || self.stats.gems_collected > self.config.max_gem_checks
        {
            return;
        }
        if let Some(id) = gem_location_id(self.stats.gems_collected) {
            self.earn([id]);
        }
    }

    fn finish_turn(&mut self) {
        self.deal_if_empty();
        self.refresh_game_over();
        self.record_progress();
    }

    fn deal_if_empty(&mut self) {
        if !self.current_pieces.is_empty() {
            return;
        }
        let available = self.available_pieces();
        let count = self.max_piece_slots();
        match deal(
            &mut self.rng,
            &available,
            count,
            self.config.piece_size_ratio,
            &mut self.next_piece_id,
        ) {
            Ok(batch) => self.current_pieces = batch,
            Err(err) => {
                log::warn!("skipping deal: {err}");
                return;
            }
        }
        self.maybe_spawn_gem();
    }

    fn maybe_spawn_gem(&mut self) {
        if !self.config.gem_economy_enabled || !self.rng.chance(self.config.gem_spawn_ratio) {
            return;
        }
        let empty = self.grid.empty_cells();
        if empty.is_empty() {
            return;
        }
        let (row, col) = empty[self.rng.below(empty.len() as u32) as usize];
        self.place_gem(row, col);
    }

    fn place_gem(&mut self, row: usize, col: usize) {
        if self.grid.set(row, col, CellState::Gem).is_err() {
            return;
        }
        self.gems.push(GemCell {
            row,
            col,
            check_id: self.next_gem_check_id,
        });
        self.next_gem_check_id += 1;
    }

    fn refresh_game_over(&mut self) {
        self.game_over = self.evaluate_game_over();
        if self.game_over {
            log::info!("game over at {} points", self.stats.total_score);
        }
    }

    /// Optimistic check over the current pieces: an undo or remove-block
    /// that could be paid for always keeps the game alive, and a payable
    /// rotate keeps it alive when one clockwise turn of some piece fits.
    fn evaluate_game_over(&self) -> bool {
        if self.current_pieces.is_empty() {
            return false;
        }
        let fits = |shape: &Shape| placement::can_place_anywhere(&self.grid, shape);
        if self.current_pieces.iter().any(|piece| fits(&piece.shape)) {
            return false;
        }
        let wallet = self.wallet();
        if wallet.can_use(AbilityKind::Undo) || wallet.can_use(AbilityKind::RemoveBlock) {
            return false;
        }
        !(wallet.can_use(AbilityKind::Rotate)
            && self
                .current_pieces
                .iter()
                .any(|piece| fits(&piece.shape.rotated_cw())))
    }

    fn wallet(&self) -> AbilityWallet<'_> {
        AbilityWallet {
            mode: self.mode,
            enabled: &self.config.enabled_abilities,
            free: match self.mode {
                GameMode::FreePlay => self.config.free_abilities,
                GameMode::Randomizer => self.entitlements.permanent_free,
            },
            gem_balance: self.gem_balance,
            charges: self.available_charges(),
        }
    }

    /// Pays for one use of `kind`. Nothing changes when payment fails.
    pub fn consume_ability(&mut self, kind: AbilityKind) -> EngineResult<AbilityPayment> {
        let payment = self.wallet().payment_for(kind)?;
        match payment {
            AbilityPayment::Free => {}
            AbilityPayment::Gem => self.gem_balance -= 1,
            AbilityPayment::Charge => *self.spent.get_mut(kind) += 1,
        }
        log::debug!("used {} ({payment:?})", kind.label());
        Ok(payment)
    }

    /// Rotates clockwise. Only the first rotation of a piece is paid for.
    pub fn rotate_piece(&mut self, id: PieceId) -> EngineResult<()> {
        self.ensure_no_pending_clear()?;
        let slot = self.locate(id).ok_or(EngineError::PieceNotFound(id))?;
        if !self.piece_at(slot).has_been_rotated {
            self.consume_ability(AbilityKind::Rotate)?;
        }
        self.piece_at_mut(slot).rotate_cw();
        self.refresh_game_over();
        Ok(())
    }

    /// Mirrors horizontally. Only the first mirror of a piece is paid for.
    pub fn mirror_piece(&mut self, id: PieceId) -> EngineResult<()> {
        self.ensure_no_pending_clear()?;
        let slot = self.locate(id).ok_or(EngineError::PieceNotFound(id))?;
        if !self.piece_at(slot).has_been_mirrored {
            self.consume_ability(AbilityKind::Mirror)?;
        }
        self.piece_at_mut(slot).mirror();
        self.refresh_game_over();
        Ok(())
    }

    pub fn shrink_piece(&mut self, id: PieceId) -> EngineResult<()> {
        self.ensure_no_pending_clear()?;
        let slot = self.locate(id).ok_or(EngineError::PieceNotFound(id))?;
        self.consume_ability(AbilityKind::Shrink)?;
        self.piece_at_mut(slot).shrink();
        self.refresh_game_over();
        Ok(())
    }

    /// Moves a current piece into the hold slot. A previously held piece
    /// rejoins the current pieces.
    pub fn hold_piece(&mut self, id: PieceId) -> EngineResult<()> {
        self.ensure_no_pending_clear()?;
        let Some(PieceSlot::Current(index)) = self.locate(id) else {
            return Err(EngineError::PieceNotFound(id));
        };
        self.consume_ability(AbilityKind::Hold)?;
        let piece = self.current_pieces.remove(index);
        if let Some(previous) = self.held_piece.replace(piece) {
            self.current_pieces.push(previous);
        }
        self.deal_if_empty();
        self.refresh_game_over();
        Ok(())
    }

    pub fn undo(&mut self) -> EngineResult<()> {
        self.ensure_no_pending_clear()?;
        if self.undo.is_none() {
            return Err(EngineError::NothingToUndo);
        }
        self.consume_ability(AbilityKind::Undo)?;
        let Some(snapshot) = self.undo.take() else {
            return Err(EngineError::NothingToUndo);
        };
        // Gems collected since the snapshot stay collected.
        let (gems, spent): (Vec<GemCell>, Vec<GemCell>) =
            snapshot.gems.into_iter().partition(|gem| {
                self.gems
                    .iter()
                    .any(|live| live.check_id == gem.check_id)
            });
        let mut grid = snapshot.grid;
        for gem in &spent {
            if grid.occupancy_at(gem.row, gem.col)? == CellState::Gem {
                grid.set(gem.row, gem.col, CellState::Empty)?;
            }
        }
        self.replace_grid(grid);
        self.current_pieces = snapshot.current_pieces;
        self.held_piece = snapshot.held_piece;
        self.gems = gems;
        self.stats.total_score = snapshot.total_score;
        self.game_over = false;
        Ok(())
    }

    pub fn remove_block(&mut self, row: usize, col: usize) -> EngineResult<()> {
        self.ensure_no_pending_clear()?;
        let cell = self.grid.occupancy_at(row, col)?;
        if cell == CellState::Empty {
            return Err(EngineError::CellAlreadyEmpty { row, col });
        }
        self.consume_ability(AbilityKind::RemoveBlock)?;
        self.grid.set(row, col, CellState::Empty)?;
        // Covered gems go with the block.
        self.gems.retain(|gem| (gem.row, gem.col) != (row, col));
        self.refresh_game_over();
        Ok(())
    }

    pub fn set_mode(&mut self, mode: GameMode) {
        log::info!("switching to {mode:?}");
        self.mode = mode;
        self.reset_stats();
    }

    /// Starts a new game: statistics, gems and per-game spending are
    /// cleared and entitlements are rebuilt for the current mode.
    pub fn reset_stats(&mut self) {
        self.stats = Statistics::default();
        self.gem_balance = 0;
        self.spent = AbilityCharges::default();
        self.recompute_entitlements();
        self.initialize_game();
    }

    /// Forgets every item, check and statistic and returns to FreePlay.
    pub fn reset_all_progress(&mut self) {
        log::info!("resetting all progress");
        self.mode = GameMode::FreePlay;
        self.received.clear();
        self.checks.clear();
        self.outbox.clear();
        self.goal_completed = false;
        self.next_gem_check_id = GEM_CHECK_ID_BASE;
        self.reset_stats();
    }

    pub fn set_grid_size(&mut self, size: usize) -> EngineResult<()> {
        if !is_supported_size(size) {
            return Err(EngineError::GridSizeUnsupported(size));
        }
        self.config.grid_size = size;
        self.reset_stats();
        Ok(())
    }

    pub fn apply_slot_data(&mut self, slot: &SlotData) {
        slot.apply_to(&mut self.config);
        self.recompute_entitlements();
        self.record_progress();
    }

    pub fn connection_state_changed(&mut self, state: ConnectionState) {
        log::info!("randomizer connection: {:?} -> {state:?}", self.connection);
        self.connection = state;
    }

    /// Records a batch of deliveries. Items at or below the watermark are
    /// skipped. Returns how many were new.
    pub fn items_received(&mut self, items: &[ItemDelivery], starting_index: u64) -> usize {
        let applied = items
            .iter()
            .enumerate()
            .filter(|(offset, item)| {
                let index = starting_index.saturating_add(*offset as u64);
                self.received.apply((*item).clone().into_received(index))
            })
            .count();
        if applied > 0 {
            log::info!("applied {applied} new item(s); watermark {:?}", self.received.watermark());
            self.recompute_entitlements();
        }
        applied
    }

    /// Rewinds the watermark and replays every delivered item.
    pub fn resync(&mut self, items: &[ItemDelivery]) -> EngineResult<usize> {
        if !self.connection.is_connected() {
            return Err(EngineError::ConnectionRequired);
        }
        let replayed = self.received.resync(
            items
                .iter()
                .enumerate()
                .map(|(index, item)| item.clone().into_received(index as u64)),
        );
        log::info!("resynced {replayed} item(s)");
        self.recompute_entitlements();
        Ok(replayed)
    }

    fn recompute_entitlements(&mut self) {
        self.entitlements = match self.mode {
            GameMode::FreePlay => Entitlements::starting(self.config.base_piece_slots),
            GameMode::Randomizer => {
                Entitlements::recompute(self.received.item_ids(), self.config.base_piece_slots)
            }
        };
    }

    fn record_progress(&mut self) {
        if self.mode != GameMode::Randomizer {
            return;
        }
        let reached = check_milestones(
            &self.config.milestones,
            &self.stats.milestone_progress(),
            self.config.combo_checks_enabled,
            &self.checks,
        );
        self.earn(reached);

        if !self.goal_completed && self.stats.total_score >= self.config.goal_score {
            log::info!("goal reached at {} points", self.stats.total_score);
            self.goal_completed = true;
            self.outbox.push(OutboundEvent::GoalComplete);
        }
    }

    fn earn<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = LocationId>,
    {
        let fresh: Vec<LocationId> = ids.into_iter().filter(|id| self.checks.insert(*id)).collect();
        if !fresh.is_empty() {
            log::debug!("earned location checks {fresh:?}");
            self.outbox.push(OutboundEvent::LocationChecks { ids: fresh });
        }
    }

    /// Sends queued reports while connected. Returns how many were sent;
    /// nothing is sent or dropped while disconnected.
    pub fn flush_outbound(&mut self, link: &mut dyn RandomizerLink) -> usize {
        if !self.connection.is_connected() {
            return 0;
        }
        let events = std::mem::take(&mut self.outbox);
        for event in &events {
            deliver(event, link);
        }
        events.len()
    }

    pub fn drain_outbound(&mut self) -> Vec<OutboundEvent> {
        std::mem::take(&mut self.outbox)
    }

    fn ensure_no_pending_clear(&self) -> EngineResult<()> {
        if self.is_clear_pending() {
            return Err(EngineError::ClearPending);
        }
        Ok(())
    }

    fn replace_grid(&mut self, grid: Grid) {
        self.grid = grid;
        self.grid_epoch = self.grid_epoch.wrapping_add(1);
    }

    fn snapshot(&self) -> UndoSnapshot {
        UndoSnapshot {
            grid: self.grid.clone(),
            current_pieces: self.current_pieces.clone(),
            held_piece: self.held_piece.clone(),
            gems: self.gems.clone(),
            total_score: self.stats.total_score,
        }
    }

    fn locate(&self, id: PieceId) -> Option<PieceSlot> {
        if let Some(index) = self.current_pieces.iter().position(|p| p.instance_id == id) {
            return Some(PieceSlot::Current(index));
        }
        self.held_piece
            .as_ref()
            .filter(|p| p.instance_id == id)
            .map(|_| PieceSlot::Held)
    }

    fn piece_at(&self, slot: PieceSlot) -> &Piece {
        match slot {
            PieceSlot::Current(index) => &self.current_pieces[index],
            PieceSlot::Held => self
                .held_piece
                .as_ref()
                .unwrap_or_else(|| unreachable!("held slot located without a held piece")),
        }
    }

    fn piece_at_mut(&mut self, slot: PieceSlot) -> &mut Piece {
        match slot {
            PieceSlot::Current(index) => &mut self.current_pieces[index],
            PieceSlot::Held => self
                .held_piece
                .as_mut()
                .unwrap_or_else(|| unreachable!("held slot located without a held piece")),
        }
    }

    #[doc(hidden)]
    pub fn set_grid_for_test(&mut self, grid: Grid) {
        self.gems.retain(|gem| grid.occupancy_at(gem.row, gem.col) == Ok(CellState::Gem));
        self.grid = grid;
    }

    #[doc(hidden)]
    pub fn set_pieces_for_test(&mut self, kinds: &[PieceKind]) -> Vec<PieceId> {
        self.current_pieces = kinds
            .iter()
            .map(|&kind| {
                let id = self.next_piece_id;
                self.next_piece_id += 1;
                Piece::new(id, kind)
            })
            .collect();
        self.refresh_game_over();
        self.current_pieces.iter().map(|p| p.instance_id).collect()
    }

    #[doc(hidden)]
    pub fn place_gem_for_test(&mut self, row: usize, col: usize) {
        self.place_gem(row, col);
    }

    #[doc(hidden)]
    pub fn set_gem_balance_for_test(&mut self, balance: u32) {
        self.gem_balance = balance;
        self.refresh_game_over();
    }
}
