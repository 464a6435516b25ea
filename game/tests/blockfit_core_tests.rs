use engine::error::EngineError;
use engine::grid::{CellState, Grid};
use engine::items::{HOLD_ABILITY, ROTATE_ABILITY};
use engine::piece::PieceKind;
use engine::progression::{AbilityKind, AbilityPayment, FreeAbilities, GameMode};
use game::blockfit_core::{BlockfitCore, TickOutcome};
use game::randomizer::ItemDelivery;
use game::settings::EngineConfig;

fn quiet_config() -> EngineConfig {
    EngineConfig {
        gem_economy_enabled: false,
        ..EngineConfig::default()
    }
}

fn core_with(config: EngineConfig) -> BlockfitCore {
    let mut core = BlockfitCore::with_config(42, config);
    core.initialize_game();
    core
}

fn grid_from(filled: &[(usize, usize)]) -> Grid {
    let mut grid = Grid::new(9);
    for &(row, col) in filled {
        grid.set(row, col, CellState::Filled).expect("in bounds");
    }
    grid
}

/// A 9x9 grid filled everywhere except `open`.
fn grid_open_at(open: &[(usize, usize)]) -> Grid {
    let filled: Vec<_> = (0..9)
        .flat_map(|row| (0..9).map(move |col| (row, col)))
        .filter(|cell| !open.contains(cell))
        .collect();
    grid_from(&filled)
}

fn row_cells(row: usize, cols: std::ops::Range<usize>) -> Vec<(usize, usize)> {
    cols.map(|col| (row, col)).collect()
}

fn commit(core: &mut BlockfitCore) -> game::blockfit_core::ClearReport {
    match core.flush_pending_clear().expect("flush") {
        TickOutcome::Committed(report) => report,
        other => panic!("expected a committed clear, got {other:?}"),
    }
}

#[test]
fn single_row_clear_waits_for_the_delay() {
    let mut core = core_with(quiet_config());
    core.set_grid_for_test(grid_from(&row_cells(0, 0..8)));
    let ids = core.set_pieces_for_test(&[PieceKind::Single, PieceKind::Single]);

    let outcome = core.place_piece(ids[0], 0, 8).expect("placement");
    assert_eq!(outcome.clears.total(), 1);
    assert_eq!(outcome.clearing_cells.len(), 9);
    assert!(core.grid().is_filled(0, 4));
    assert_eq!(core.pending_clear_cells().len(), 9);

    assert_eq!(core.tick(100).unwrap(), TickOutcome::Pending { remaining_ms: 200 });
    let report = match core.tick(200).unwrap() {
        TickOutcome::Committed(report) => report,
        other => panic!("expected commit, got {other:?}"),
    };
    assert_eq!(report.points, 10);
    assert!(!report.combo);
    assert_eq!(core.score(), 10);
    assert_eq!(core.stats().lines_cleared, 1);
    assert_eq!(core.stats().combos, 0);
    assert!((0..9).all(|col| core.grid().occupancy_at(0, col) == Ok(CellState::Empty)));
    assert_eq!(core.current_pieces().len(), 1);
}

#[test]
fn two_rows_and_a_column_score_as_a_combo() {
    let config = EngineConfig {
        free_abilities: FreeAbilities {
            rotate: true,
            ..FreeAbilities::default()
        },
        ..quiet_config()
    };
    let mut core = core_with(config);
    let mut filled = row_cells(0, 0..8);
    filled.extend(row_cells(1, 0..8));
    filled.extend((2..9).map(|row| (row, 8)));
    core.set_grid_for_test(grid_from(&filled));
    let ids = core.set_pieces_for_test(&[PieceKind::DominoI, PieceKind::Single]);
    core.rotate_piece(ids[0]).expect("rotate is free");

    let outcome = core.place_piece(ids[0], 0, 8).expect("vertical domino fits");
    assert_eq!(outcome.clears.rows, vec![0, 1]);
    assert_eq!(outcome.clears.cols, vec![8]);
    assert!(outcome.clears.boxes.is_empty());

    let report = commit(&mut core);
    assert!(report.combo);
    // 30 base points, x3 combo, x1.02 after the combo is counted.
    assert_eq!(report.points, 91);
    assert_eq!(core.stats().combos, 1);
    assert_eq!(core.stats().lines_cleared, 3);
    assert!((core.score_multiplier() - 1.02).abs() < 1e-9);
}

#[test]
fn placement_is_rejected_while_a_clear_is_pending() {
    let mut core = core_with(quiet_config());
    core.set_grid_for_test(grid_from(&row_cells(4, 0..8)));
    let ids = core.set_pieces_for_test(&[PieceKind::Single, PieceKind::Single]);
    core.place_piece(ids[0], 4, 8).unwrap();

    assert_eq!(core.place_piece(ids[1], 8, 8), Err(EngineError::ClearPending));
    commit(&mut core);
    assert!(core.place_piece(ids[1], 8, 8).is_ok());
}

#[test]
fn invalid_placements_leave_state_unchanged() {
    let mut core = core_with(quiet_config());
    core.set_grid_for_test(grid_from(&[(0, 1)]));
    let ids = core.set_pieces_for_test(&[PieceKind::DominoI]);
    let before = core.grid().clone();

    assert_eq!(
        core.place_piece(ids[0], 0, 0),
        Err(EngineError::InvalidPlacement { row: 0, col: 0 })
    );
    assert_eq!(
        core.place_piece(ids[0], 0, 8),
        Err(EngineError::InvalidPlacement { row: 0, col: 8 })
    );
    assert_eq!(core.place_piece(77, 3, 3), Err(EngineError::PieceNotFound(77)));
    assert_eq!(core.grid(), &before);
    assert_eq!(core.current_pieces().len(), 1);
    assert_eq!(core.stats().pieces_placed, 0);
}

#[test]
fn gem_survives_cover_until_its_row_clears() {
    let mut core = core_with(quiet_config());
    let filled: Vec<_> = (0..9)
        .filter(|col| *col != 2 && *col != 5)
        .map(|col| (2, col))
        .collect();
    core.set_grid_for_test(grid_from(&filled));
    core.place_gem_for_test(2, 2);
    assert_eq!(core.grid().occupancy_at(2, 2), Ok(CellState::Gem));
    let ids = core.set_pieces_for_test(&[PieceKind::Single, PieceKind::Single, PieceKind::Single]);

    let cover = core.place_piece(ids[0], 2, 2).expect("gem cells are open");
    assert!(!cover.clear_pending());
    assert_eq!(core.gems().len(), 1);
    assert_eq!(core.stats().gems_collected, 0);

    core.place_piece(ids[1], 2, 5).expect("completes row 2");
    let report = commit(&mut core);
    assert_eq!(report.gems_collected, 1);
    assert!(core.gems().is_empty());
    assert_eq!(core.stats().gems_collected, 1);
    assert_eq!(core.gem_balance(), 1);
}

#[test]
fn gem_outside_the_cleared_lines_stays() {
    let mut core = core_with(quiet_config());
    core.set_grid_for_test(grid_from(&row_cells(0, 0..8)));
    core.place_gem_for_test(5, 5);
    let ids = core.set_pieces_for_test(&[PieceKind::Single, PieceKind::Single]);
    core.place_piece(ids[0], 0, 8).unwrap();
    let report = commit(&mut core);
    assert_eq!(report.gems_collected, 0);
    assert_eq!(core.gems().len(), 1);
    assert_eq!(core.grid().occupancy_at(5, 5), Ok(CellState::Gem));
}

#[test]
fn gem_is_collected_when_its_column_clears() {
    let mut core = core_with(quiet_config());
    let column: Vec<_> = (0..9)
        .filter(|row| *row != 2 && *row != 5)
        .map(|row| (row, 2))
        .collect();
    core.set_grid_for_test(grid_from(&column));
    core.place_gem_for_test(2, 2);
    let ids = core.set_pieces_for_test(&[PieceKind::Single, PieceKind::Single, PieceKind::Single]);

    core.place_piece(ids[0], 2, 2).expect("cover the gem");
    assert_eq!(core.gems().len(), 1);
    core.place_piece(ids[1], 5, 2).expect("completes column 2");
    let report = commit(&mut core);
    assert_eq!(report.clears.cols, vec![2]);
    assert!(report.clears.rows.is_empty());
    assert_eq!(report.gems_collected, 1);
    assert_eq!(core.stats().gems_collected, 1);
}

#[test]
fn gem_is_collected_when_its_box_clears() {
    let mut core = core_with(quiet_config());
    let box_zero: Vec<_> = (0..3)
        .flat_map(|row| (0..3).map(move |col| (row, col)))
        .filter(|&cell| cell != (2, 2))
        .collect();
    core.set_grid_for_test(grid_from(&box_zero));
    core.place_gem_for_test(2, 2);
    let ids = core.set_pieces_for_test(&[PieceKind::Single, PieceKind::Single]);

    core.place_piece(ids[0], 2, 2).expect("the gem cell completes box 0");
    let report = commit(&mut core);
    assert_eq!(report.clears.boxes, vec![0]);
    assert_eq!(report.clears.lines(), 0);
    assert_eq!(report.gems_collected, 1);
    assert!(core.gems().is_empty());
    assert_eq!(core.grid().occupancy_at(2, 2), Ok(CellState::Empty));
}

#[test]
fn free_play_abilities_cost_gems_and_rotation_is_paid_once() {
    let mut core = core_with(quiet_config());
    let ids = core.set_pieces_for_test(&[PieceKind::DominoI, PieceKind::TetrominoT]);
    core.set_gem_balance_for_test(1);

    core.rotate_piece(ids[0]).expect("one gem pays for the first rotation");
    assert_eq!(core.gem_balance(), 0);
    core.rotate_piece(ids[0]).expect("further rotations of the same piece are free");
    assert_eq!(core.piece(ids[0]).map(|p| p.shape.width()), Some(2));

    let shape_before = core.piece(ids[1]).map(|p| p.shape.clone());
    assert_eq!(
        core.mirror_piece(ids[1]),
        Err(EngineError::InsufficientCurrency(AbilityKind::Mirror))
    );
    assert_eq!(core.piece(ids[1]).map(|p| p.shape.clone()), shape_before);
}

#[test]
fn consume_ability_prefers_free_flags() {
    let config = EngineConfig {
        free_abilities: FreeAbilities {
            shrink: true,
            ..FreeAbilities::default()
        },
        ..quiet_config()
    };
    let mut core = core_with(config);
    core.set_gem_balance_for_test(2);
    assert_eq!(core.consume_ability(AbilityKind::Shrink), Ok(AbilityPayment::Free));
    assert_eq!(core.consume_ability(AbilityKind::Hold), Ok(AbilityPayment::Gem));
    assert_eq!(core.gem_balance(), 1);
}

#[test]
fn disabled_abilities_are_refused() {
    let config = EngineConfig {
        enabled_abilities: vec![AbilityKind::Rotate],
        ..quiet_config()
    };
    let mut core = core_with(config);
    core.set_gem_balance_for_test(5);
    assert_eq!(
        core.consume_ability(AbilityKind::Undo),
        Err(EngineError::AbilityDisabled(AbilityKind::Undo))
    );
    assert_eq!(core.gem_balance(), 5);
}

#[test]
fn shrink_turns_a_piece_into_a_single() {
    let mut core = core_with(quiet_config());
    let ids = core.set_pieces_for_test(&[PieceKind::Cross3x3]);
    core.set_gem_balance_for_test(1);
    core.shrink_piece(ids[0]).unwrap();
    let piece = core.piece(ids[0]).expect("same instance");
    assert_eq!(piece.kind, PieceKind::Single);
    assert_eq!(piece.shape.cell_count(), 1);
    assert_eq!(piece.color, PieceKind::Cross3x3.color());
}

#[test]
fn held_piece_can_be_placed_directly() {
    let config = EngineConfig {
        free_abilities: FreeAbilities {
            hold: true,
            ..FreeAbilities::default()
        },
        ..quiet_config()
    };
    let mut core = core_with(config);
    let ids = core.set_pieces_for_test(&[PieceKind::TetrominoO, PieceKind::Single]);
    core.hold_piece(ids[0]).unwrap();
    core.place_piece(ids[0], 4, 4).expect("held pieces are in play");
    assert!(core.held_piece().is_none());
    assert!(core.grid().is_filled(5, 5));
}

#[test]
fn undo_restores_grid_pieces_and_score() {
    let config = EngineConfig {
        free_abilities: FreeAbilities {
            undo: true,
            ..FreeAbilities::default()
        },
        ..quiet_config()
    };
    let mut core = core_with(config);
    let start = grid_from(&row_cells(0, 0..8));
    core.set_grid_for_test(start.clone());
    let ids = core.set_pieces_for_test(&[PieceKind::Single, PieceKind::Single]);

    core.place_piece(ids[0], 0, 8).unwrap();
    commit(&mut core);
    assert_eq!(core.score(), 10);
    assert!(core.can_undo());

    core.undo().unwrap();
    assert_eq!(core.grid(), &start);
    assert_eq!(core.score(), 0);
    assert_eq!(core.current_pieces().len(), 2);
    assert!(!core.can_undo());
    assert_eq!(core.undo(), Err(EngineError::NothingToUndo));
}

#[test]
fn remove_block_validates_before_charging() {
    let mut core = core_with(quiet_config());
    core.set_grid_for_test(grid_from(&[(3, 3)]));
    core.set_gem_balance_for_test(1);

    assert_eq!(
        core.remove_block(0, 0),
        Err(EngineError::CellAlreadyEmpty { row: 0, col: 0 })
    );
    assert!(matches!(core.remove_block(9, 0), Err(EngineError::OutOfBounds { .. })));
    assert_eq!(core.gem_balance(), 1);

    core.remove_block(3, 3).unwrap();
    assert_eq!(core.grid().occupancy_at(3, 3), Ok(CellState::Empty));
    assert_eq!(core.gem_balance(), 0);
}

#[test]
fn removing_a_gem_drops_it_uncollected() {
    let mut core = core_with(quiet_config());
    core.place_gem_for_test(1, 1);
    core.set_gem_balance_for_test(1);
    core.remove_block(1, 1).unwrap();
    assert!(core.gems().is_empty());
    assert_eq!(core.stats().gems_collected, 0);
}

#[test]
fn game_over_is_optimistic_about_payable_abilities() {
    let mut core = core_with(quiet_config());
    let all: Vec<_> = (0..9)
        .flat_map(|row| (0..9).map(move |col| (row, col)))
        .filter(|&cell| cell != (0, 0))
        .collect();
    core.set_grid_for_test(grid_from(&all));
    let ids = core.set_pieces_for_test(&[PieceKind::DominoI]);
    assert!(core.is_game_over());
    assert_eq!(core.place_piece(ids[0], 0, 0), Err(EngineError::GameOver));

    // A gem would pay for undo or remove-block, so the game is still alive.
    core.set_gem_balance_for_test(1);
    assert!(!core.is_game_over());
}

fn randomizer_core(rotate_charges: usize) -> BlockfitCore {
    let mut core = BlockfitCore::with_config(42, quiet_config());
    core.set_mode(GameMode::Randomizer);
    let items = vec![ItemDelivery::new(ROTATE_ABILITY); rotate_charges];
    core.items_received(&items, 0);
    core
}

#[test]
fn payable_rotate_keeps_the_game_alive_when_a_turn_fits() {
    let mut core = randomizer_core(1);
    core.set_grid_for_test(grid_open_at(&[(0, 0), (1, 0)]));
    core.set_pieces_for_test(&[PieceKind::DominoI]);
    assert_eq!(core.available_charges().rotate, 1);
    assert!(!core.is_game_over());
}

#[test]
fn a_fitting_turn_needs_a_rotate_charge() {
    let mut core = randomizer_core(0);
    core.set_grid_for_test(grid_open_at(&[(0, 0), (1, 0)]));
    core.set_pieces_for_test(&[PieceKind::DominoI]);
    assert!(core.is_game_over());
}

#[test]
fn game_over_looks_one_clockwise_turn_ahead() {
    let mut core = randomizer_core(1);
    // Only an upside-down T fits here, two turns away from the base shape.
    core.set_grid_for_test(grid_open_at(&[(0, 1), (1, 0), (1, 1), (1, 2)]));
    core.set_pieces_for_test(&[PieceKind::TetrominoT]);
    assert!(core.is_game_over());
}

#[test]
fn held_piece_does_not_count_toward_staying_alive() {
    let mut core = randomizer_core(0);
    core.items_received(&[ItemDelivery::new(HOLD_ABILITY)], 0);
    core.set_grid_for_test(grid_open_at(&[(0, 0)]));
    let ids = core.set_pieces_for_test(&[PieceKind::Single, PieceKind::DominoI]);
    assert!(!core.is_game_over());

    core.hold_piece(ids[0]).expect("one hold charge");
    assert_eq!(core.held_piece().map(|piece| piece.kind), Some(PieceKind::Single));
    assert!(core.is_game_over());
}

#[test]
fn reset_stats_starts_a_new_game() {
    let mut core = core_with(quiet_config());
    core.set_grid_for_test(grid_from(&row_cells(0, 0..8)));
    let ids = core.set_pieces_for_test(&[PieceKind::Single]);
    core.place_piece(ids[0], 0, 8).unwrap();
    commit(&mut core);
    assert!(core.score() > 0);

    core.reset_stats();
    assert_eq!(core.score(), 0);
    assert_eq!(core.stats().pieces_placed, 0);
    assert_eq!(core.grid().filled_count(), 0);
    assert_eq!(core.current_pieces().len(), 3);
    assert!(!core.can_undo());
}

#[test]
fn grid_size_changes_restart_and_validate() {
    let mut core = core_with(quiet_config());
    core.set_grid_size(7).unwrap();
    assert_eq!(core.grid().size(), 7);
    assert_eq!(core.grid().box_count(), 0);
    assert_eq!(core.config().grid_size, 7);

    assert_eq!(core.set_grid_size(8), Err(EngineError::GridSizeUnsupported(8)));
    assert_eq!(core.grid().size(), 7);
}

#[test]
fn seven_wide_grids_clear_lines_without_boxes() {
    let config = EngineConfig {
        grid_size: 7,
        ..quiet_config()
    };
    let mut core = core_with(config);
    let mut grid = Grid::new(7);
    for col in 0..6 {
        grid.set(6, col, CellState::Filled).unwrap();
    }
    core.set_grid_for_test(grid);
    let ids = core.set_pieces_for_test(&[PieceKind::Single, PieceKind::Single]);
    core.place_piece(ids[0], 6, 6).unwrap();
    let report = commit(&mut core);
    assert_eq!(report.clears.rows, vec![6]);
    assert!(report.clears.boxes.is_empty());
}

#[test]
fn dealing_respects_slot_count_and_disabled_shapes() {
    let config = EngineConfig {
        base_piece_slots: 5,
        disabled_shapes: PieceKind::ALL
            .iter()
            .filter(|kind| **kind != PieceKind::TetrominoO)
            .map(|kind| kind.id().to_string())
            .collect(),
        ..quiet_config()
    };
    let core = core_with(config);
    assert_eq!(core.current_pieces().len(), 5);
    assert!(core
        .current_pieces()
        .iter()
        .all(|piece| piece.kind == PieceKind::TetrominoO));
    let mut ids: Vec<_> = core.current_pieces().iter().map(|p| p.instance_id).collect();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}
