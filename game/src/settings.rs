use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use engine::grid::{DEFAULT_GRID_SIZE, is_supported_size};
use engine::items::{DEFAULT_PIECE_SLOTS, MAX_PIECE_SLOTS, MIN_PIECE_SLOTS};
use engine::milestones::{MAX_GEM_CHECKS, MilestoneTables};
use engine::piece::PieceKind;
use engine::progression::{AbilityKind, COMBO_MULTIPLIER_INCREMENT, FreeAbilities};

pub const DEFAULT_GEM_SPAWN_RATIO: f64 = 0.3;
pub const DEFAULT_CLEAR_DELAY: Duration = Duration::from_millis(300);
pub const DEFAULT_GOAL_SCORE: u64 = 10_000;

/// Tunables for one save. Every field has a default so older or partial
/// files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,
    #[serde(default = "default_piece_slots")]
    pub base_piece_slots: usize,
    #[serde(default = "default_gem_economy")]
    pub gem_economy_enabled: bool,
    #[serde(default = "default_gem_spawn_ratio")]
    pub gem_spawn_ratio: f64,
    #[serde(default = "default_piece_size_ratio")]
    pub piece_size_ratio: f64,
    /// Catalog ids excluded from FreePlay dealing.
    #[serde(default)]
    pub disabled_shapes: Vec<String>,
    #[serde(default)]
    pub free_abilities: FreeAbilities,
    #[serde(default = "default_enabled_abilities")]
    pub enabled_abilities: Vec<AbilityKind>,
    #[serde(default)]
    pub milestones: MilestoneTables,
    #[serde(default = "default_combo_checks")]
    pub combo_checks_enabled: bool,
    #[serde(default = "default_clear_delay", with = "crate::serde_duration")]
    pub clear_delay: Duration,
    #[serde(default = "default_combo_increment")]
    pub combo_multiplier_increment: f64,
    #[serde(default = "default_max_gem_checks")]
    pub max_gem_checks: u32,
    #[serde(default = "default_goal_score")]
    pub goal_score: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            grid_size: default_grid_size(),
            base_piece_slots: default_piece_slots(),
            gem_economy_enabled: default_gem_economy(),
            gem_spawn_ratio: default_gem_spawn_ratio(),
            piece_size_ratio: default_piece_size_ratio(),
            disabled_shapes: Vec::new(),
            free_abilities: FreeAbilities::default(),
            enabled_abilities: default_enabled_abilities(),
            milestones: MilestoneTables::default(),
            combo_checks_enabled: default_combo_checks(),
            clear_delay: default_clear_delay(),
            combo_multiplier_increment: default_combo_increment(),
            max_gem_checks: default_max_gem_checks(),
            goal_score: default_goal_score(),
        }
    }
}

impl EngineConfig {
    pub fn sanitized(mut self) -> Self {
        self.version = default_version();
        if !is_supported_size(self.grid_size) {
            self.grid_size = default_grid_size();
        }
        self.base_piece_slots = self.base_piece_slots.clamp(MIN_PIECE_SLOTS, MAX_PIECE_SLOTS);
        self.gem_spawn_ratio = clamp_unit(self.gem_spawn_ratio, DEFAULT_GEM_SPAWN_RATIO);
        self.piece_size_ratio = clamp_unit(self.piece_size_ratio, default_piece_size_ratio());
        self.disabled_shapes
            .retain(|id| PieceKind::from_id(id).is_some());
        self.enabled_abilities.sort();
        self.enabled_abilities.dedup();
        if self.clear_delay.is_zero() {
            self.clear_delay = default_clear_delay();
        }
        if !self.combo_multiplier_increment.is_finite() || self.combo_multiplier_increment < 0.0 {
            self.combo_multiplier_increment = default_combo_increment();
        }
        self.max_gem_checks = self.max_gem_checks.min(MAX_GEM_CHECKS);
        self
    }

    pub fn clear_delay_ms(&self) -> u32 {
        self.clear_delay.as_millis().min(u32::MAX as u128) as u32
    }

    pub fn is_shape_disabled(&self, kind: PieceKind) -> bool {
        self.disabled_shapes.iter().any(|id| id == kind.id())
    }

    /// FreePlay dealing pool: the whole catalog minus disabled shapes.
    pub fn free_play_pieces(&self) -> Vec<PieceKind> {
        PieceKind::ALL
            .into_iter()
            .filter(|kind| !self.is_shape_disabled(*kind))
            .collect()
    }
}

fn clamp_unit(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

fn default_version() -> u32 {
    1
}

fn default_grid_size() -> usize {
    DEFAULT_GRID_SIZE
}

fn default_piece_slots() -> usize {
    DEFAULT_PIECE_SLOTS
}

fn default_gem_economy() -> bool {
    true
}

fn default_gem_spawn_ratio() -> f64 {
    DEFAULT_GEM_SPAWN_RATIO
}

fn default_piece_size_ratio() -> f64 {
    engine::generator::DEFAULT_PIECE_SIZE_RATIO
}

fn default_enabled_abilities() -> Vec<AbilityKind> {
    AbilityKind::ALL.to_vec()
}

fn default_combo_checks() -> bool {
    true
}

fn default_clear_delay() -> Duration {
    DEFAULT_CLEAR_DELAY
}

fn default_combo_increment() -> f64 {
    COMBO_MULTIPLIER_INCREMENT
}

fn default_max_gem_checks() -> u32 {
    MAX_GEM_CHECKS
}

fn default_goal_score() -> u64 {
    DEFAULT_GOAL_SCORE
}

/// Options handed over by the randomizer when a slot connects.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlotData {
    #[serde(default)]
    pub goal_score: Option<u64>,
    #[serde(default)]
    pub starting_piece_slots: Option<usize>,
}

impl SlotData {
    pub fn apply_to(&self, config: &mut EngineConfig) {
        if let Some(goal) = self.goal_score {
            config.goal_score = goal;
        }
        if let Some(slots) = self.starting_piece_slots {
            config.base_piece_slots = slots.clamp(MIN_PIECE_SLOTS, MAX_PIECE_SLOTS);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Self {
        if let Some(explicit) = std::env::var_os("BLOCKFIT_CONFIG_PATH") {
            return Self::new(explicit);
        }

        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| {
                    let mut p = PathBuf::from(home);
                    p.push(".config");
                    p
                })
            })
            .unwrap_or_else(|| PathBuf::from("."));

        let mut path = base;
        path.push("blockfit");
        path.push("config.json");
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn load(&self) -> EngineConfig {
        let Ok(bytes) = fs::read(&self.path) else {
            return EngineConfig::default();
        };
        match serde_json::from_slice::<EngineConfig>(&bytes) {
            Ok(config) => config.sanitized(),
            Err(err) => {
                log::warn!("ignoring invalid config {}: {err}", self.path.display());
                EngineConfig::default()
            }
        }
    }

    pub fn save(&self, config: &EngineConfig) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_vec_pretty(config)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        crate::persistence::atomic_write(&self.path, &text)
    }
}
