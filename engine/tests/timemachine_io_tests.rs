use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use engine::TimeMachine;
use engine::grid::{CellState, Grid};

fn unique_temp_json_path() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("blockfit_engine_test_timemachine_{nanos}.json"))
}

fn grid_with(cells: &[(usize, usize)]) -> Grid {
    let mut grid = Grid::new(9);
    for &(row, col) in cells {
        grid.set(row, col, CellState::Filled).expect("cell in bounds");
    }
    grid
}

#[test]
fn timemachine_save_and_load_roundtrips_grid_history_and_frame() {
    let mut tm = TimeMachine::new(Grid::new(9));
    tm.record(grid_with(&[(0, 0)]));
    tm.record(grid_with(&[(0, 0), (0, 1)]));

    // Branch after a rewind so the truncated history is what gets saved.
    tm.rewind(1);
    tm.record(grid_with(&[(0, 0), (8, 8)]));
    assert_eq!(tm.frame(), 2);
    assert_eq!(tm.len(), 3);

    let out = unique_temp_json_path();
    tm.save_json_file(&out).expect("save timemachine json");

    let loaded = TimeMachine::<Grid>::load_json_file(&out).expect("load timemachine json");
    assert_eq!(loaded.frame(), tm.frame());
    assert_eq!(loaded.history(), tm.history());
    assert_eq!(
        loaded.state().occupancy_at(8, 8),
        Ok(CellState::Filled),
        "branched state should survive the round trip"
    );

    let _ = fs::remove_file(out);
}

#[test]
fn loading_a_timeline_with_a_dangling_cursor_fails() {
    let out = unique_temp_json_path();
    fs::write(&out, r#"{"states":[1,2],"frame":5}"#).expect("write fixture");

    let err = TimeMachine::<i32>::load_json_file(&out).expect_err("frame 5 does not exist");
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

    let _ = fs::remove_file(out);
}
