use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use engine::GameLogic;
use engine::generator::deal;
use engine::grid::Grid;
use engine::piece::PieceKind;
use engine::placement::{apply_clears, can_place, detect_clears, place};
use engine::replay::{DigestGolden, assert_or_update_golden_json, record_then_replay_and_compare};
use engine::rng::Rng;
use serde::{Deserialize, Serialize};

fn unique_temp_dir() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("blockfit_engine_replay_harness_{nanos}"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DealState {
    grid: Grid,
    rng: Rng,
    next_id: u64,
    placed: u32,
}

/// Each input deals one random piece and drops it at the first spot that
/// fits, scanning from the given row.
#[derive(Debug, Clone)]
struct SeededDrops {
    seed: u64,
}

impl GameLogic for SeededDrops {
    type State = DealState;
    type Input = usize;

    fn initial_state(&self) -> Self::State {
        DealState {
            grid: Grid::new(9),
            rng: Rng::new(self.seed),
            next_id: 0,
            placed: 0,
        }
    }

    fn step(&self, state: &Self::State, start_row: Self::Input) -> Self::State {
        let mut next = state.clone();
        let Ok(batch) = deal(&mut next.rng, &PieceKind::ALL, 1, 0.5, &mut next.next_id) else {
            return next;
        };
        let shape = &batch[0].shape;
        let size = next.grid.size();
        let spot = (0..size)
            .map(|r| (r + start_row) % size)
            .flat_map(|r| (0..size).map(move |c| (r, c)))
            .find(|&(r, c)| can_place(&next.grid, shape, r, c));
        if let Some((r, c)) = spot {
            if let Ok(grid) = place(&next.grid, shape, r, c) {
                let clears = detect_clears(&grid);
                next.grid = apply_clears(&grid, &clears).unwrap_or(grid);
                next.placed += 1;
            }
        }
        next
    }
}

#[test]
fn seeded_session_replays_identically() {
    let out_dir = unique_temp_dir();
    let inputs: Vec<usize> = (0..40).map(|i| i % 9).collect();

    let artifacts = record_then_replay_and_compare(
        "seeded drops",
        &out_dir,
        SeededDrops { seed: 1234 },
        inputs,
    )
    .expect("replay should match the recording");

    assert_eq!(artifacts.digests.len(), 41);
    assert!(artifacts.timeline_json.exists());

    let golden_path = out_dir.join("golden.json");
    let golden = DigestGolden::new("seeded drops", artifacts.digests.clone());
    assert_or_update_golden_json(&golden_path, &golden, false).expect("first call writes golden");
    assert_or_update_golden_json(&golden_path, &golden, false).expect("second call compares");

    let mut tampered = golden.clone();
    tampered.digests[3] = "0".repeat(64);
    assert!(assert_or_update_golden_json(&golden_path, &tampered, false).is_err());

    let _ = fs::remove_dir_all(out_dir);
}

#[test]
fn different_seeds_diverge() {
    let a = SeededDrops { seed: 1 };
    let b = SeededDrops { seed: 2 };
    let mut sa = a.initial_state();
    let mut sb = b.initial_state();
    for row in 0..10 {
        sa = a.step(&sa, row);
        sb = b.step(&sb, row);
    }
    assert_ne!(
        engine::replay::state_sha256_hex(&sa),
        engine::replay::state_sha256_hex(&sb)
    );
}
