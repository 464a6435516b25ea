//! Milestone thresholds and the location ids they unlock.

use serde::{Deserialize, Serialize};

use crate::ledger::LocationCheckLedger;

pub type LocationId = i64;

pub const SCORE_LOCATION_BASE: LocationId = 9_000_000;
pub const LINE_CLEAR_LOCATION_BASE: LocationId = 9_001_000;
pub const BOX_CLEAR_LOCATION_BASE: LocationId = 9_002_000;
pub const COMBO_LOCATION_BASE: LocationId = 9_003_000;
pub const PIECES_LOCATION_BASE: LocationId = 9_004_000;
pub const GEM_LOCATION_BASE: LocationId = 9_005_000;
pub const MAX_GEM_CHECKS: u32 = 100;

pub const SCORE_MILESTONES: [u64; 20] = [
    500, 1000, 2000, 3000, 4000, 5000, 6000, 7000, 8000, 9000, 10000, 12500, 15000, 17500, 20000,
    25000, 30000, 35000, 40000, 50000,
];
pub const LINE_CLEAR_MILESTONES: [u64; 30] = [
    1, 3, 5, 10, 15, 20, 25, 30, 40, 50, 60, 75, 90, 100, 125, 150, 175, 200, 250, 300, 350, 400,
    450, 500, 600, 700, 800, 900, 1000, 1250,
];
pub const BOX_CLEAR_MILESTONES: [u64; 20] = [
    1, 3, 5, 10, 15, 20, 25, 30, 40, 50, 60, 75, 90, 100, 125, 150, 175, 200, 250, 300,
];
pub const COMBO_MILESTONES: [u64; 10] = [1, 3, 5, 10, 15, 20, 25, 30, 40, 50];
pub const PIECES_MILESTONES: [u64; 25] = [
    10, 25, 50, 75, 100, 150, 200, 250, 300, 400, 500, 600, 700, 800, 900, 1000, 1250, 1500, 1750,
    2000, 2500, 3000, 3500, 4000, 5000,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MilestoneCategory {
    Score,
    LinesCleared,
    BoxesCleared,
    Combos,
    PiecesPlaced,
}

impl MilestoneCategory {
    pub const ALL: [MilestoneCategory; 5] = [
        MilestoneCategory::Score,
        MilestoneCategory::LinesCleared,
        MilestoneCategory::BoxesCleared,
        MilestoneCategory::Combos,
        MilestoneCategory::PiecesPlaced,
    ];

    pub fn location_base(self) -> LocationId {
        match self {
            MilestoneCategory::Score => SCORE_LOCATION_BASE,
            MilestoneCategory::LinesCleared => LINE_CLEAR_LOCATION_BASE,
            MilestoneCategory::BoxesCleared => BOX_CLEAR_LOCATION_BASE,
            MilestoneCategory::Combos => COMBO_LOCATION_BASE,
            MilestoneCategory::PiecesPlaced => PIECES_LOCATION_BASE,
        }
    }
}

/// Location id for the `index`-th (0-based) threshold of a category.
pub fn location_id(category: MilestoneCategory, index: usize) -> LocationId {
    category.location_base() + index as LocationId + 1
}

/// Location id for the `n`-th collected gem (1-based).
pub fn gem_location_id(n: u32) -> Option<LocationId> {
    (1..=MAX_GEM_CHECKS)
        .contains(&n)
        .then(|| GEM_LOCATION_BASE + n as LocationId)
}

/// Ordered threshold tables, one per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneTables {
    #[serde(default = "default_score")]
    pub score: Vec<u64>,
    #[serde(default = "default_lines")]
    pub lines_cleared: Vec<u64>,
    #[serde(default = "default_boxes")]
    pub boxes_cleared: Vec<u64>,
    #[serde(default = "default_combos")]
    pub combos: Vec<u64>,
    #[serde(default = "default_pieces")]
    pub pieces_placed: Vec<u64>,
}

fn default_score() -> Vec<u64> {
    SCORE_MILESTONES.to_vec()
}

fn default_lines() -> Vec<u64> {
    LINE_CLEAR_MILESTONES.to_vec()
}

fn default_boxes() -> Vec<u64> {
    BOX_CLEAR_MILESTONES.to_vec()
}

fn default_combos() -> Vec<u64> {
    COMBO_MILESTONES.to_vec()
}

fn default_pieces() -> Vec<u64> {
    PIECES_MILESTONES.to_vec()
}

impl Default for MilestoneTables {
    fn default() -> Self {
        Self {
            score: default_score(),
            lines_cleared: default_lines(),
            boxes_cleared: default_boxes(),
            combos: default_combos(),
            pieces_placed: default_pieces(),
        }
    }
}

impl MilestoneTables {
    pub fn thresholds(&self, category: MilestoneCategory) -> &[u64] {
        match category {
            MilestoneCategory::Score => &self.score,
            MilestoneCategory::LinesCleared => &self.lines_cleared,
            MilestoneCategory::BoxesCleared => &self.boxes_cleared,
            MilestoneCategory::Combos => &self.combos,
            MilestoneCategory::PiecesPlaced => &self.pieces_placed,
        }
    }

    /// Every location whose threshold is at or below `value`, including
    /// thresholds jumped over in a single update.
    pub fn reached(&self, category: MilestoneCategory, value: u64) -> Vec<LocationId> {
        self.thresholds(category)
            .iter()
            .enumerate()
            .filter(|(_, threshold)| **threshold <= value)
            .map(|(index, _)| location_id(category, index))
            .collect()
    }
}

/// Counter values the milestone tables are compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MilestoneProgress {
    pub score: u64,
    pub lines_cleared: u64,
    pub boxes_cleared: u64,
    pub combos: u64,
    pub pieces_placed: u64,
}

impl MilestoneProgress {
    pub fn value(&self, category: MilestoneCategory) -> u64 {
        match category {
            MilestoneCategory::Score => self.score,
            MilestoneCategory::LinesCleared => self.lines_cleared,
            MilestoneCategory::BoxesCleared => self.boxes_cleared,
            MilestoneCategory::Combos => self.combos,
            MilestoneCategory::PiecesPlaced => self.pieces_placed,
        }
    }
}

/// Locations reached by `progress` that are not yet in `earned`, in
/// category then threshold order.
pub fn check_milestones(
    tables: &MilestoneTables,
    progress: &MilestoneProgress,
    include_combos: bool,
    earned: &LocationCheckLedger,
) -> Vec<LocationId> {
    MilestoneCategory::ALL
        .into_iter()
        .filter(|category| include_combos || *category != MilestoneCategory::Combos)
        .flat_map(|category| tables.reached(category, progress.value(category)))
        .filter(|id| !earned.contains(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_ids_are_base_plus_one_based_index() {
        assert_eq!(location_id(MilestoneCategory::Score, 0), 9_000_001);
        assert_eq!(location_id(MilestoneCategory::PiecesPlaced, 24), 9_004_025);
        assert_eq!(gem_location_id(1), Some(9_005_001));
        assert_eq!(gem_location_id(100), Some(9_005_100));
        assert_eq!(gem_location_id(101), None);
        assert_eq!(gem_location_id(0), None);
    }

    #[test]
    fn jumping_over_thresholds_reports_all_of_them() {
        let tables = MilestoneTables::default();
        let reached = tables.reached(MilestoneCategory::Score, 2_100);
        assert_eq!(reached, vec![9_000_001, 9_000_002, 9_000_003]);
    }

    #[test]
    fn already_earned_locations_are_skipped() {
        let tables = MilestoneTables::default();
        let mut earned = LocationCheckLedger::default();
        earned.insert(9_001_001);
        let progress = MilestoneProgress {
            lines_cleared: 3,
            combos: 1,
            ..MilestoneProgress::default()
        };
        assert_eq!(
            check_milestones(&tables, &progress, true, &earned),
            vec![9_001_002, 9_003_001]
        );
        assert_eq!(
            check_milestones(&tables, &progress, false, &earned),
            vec![9_001_002]
        );
    }

    #[test]
    fn missing_tables_fall_back_to_defaults() {
        let tables: MilestoneTables = serde_json::from_str(r#"{"score":[5]}"#).unwrap();
        assert_eq!(tables.score, vec![5]);
        assert_eq!(tables.combos, COMBO_MILESTONES.to_vec());
    }
}
