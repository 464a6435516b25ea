use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_SCORE_MULTIPLIER: f64 = 1.0;
pub const COMBO_MULTIPLIER_INCREMENT: f64 = 0.02;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameMode {
    #[default]
    FreePlay,
    Randomizer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbilityKind {
    Rotate,
    Undo,
    RemoveBlock,
    Hold,
    Mirror,
    Shrink,
}

impl AbilityKind {
    pub const ALL: [AbilityKind; 6] = [
        AbilityKind::Rotate,
        AbilityKind::Undo,
        AbilityKind::RemoveBlock,
        AbilityKind::Hold,
        AbilityKind::Mirror,
        AbilityKind::Shrink,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AbilityKind::Rotate => "rotate",
            AbilityKind::Undo => "undo",
            AbilityKind::RemoveBlock => "removeBlock",
            AbilityKind::Hold => "hold",
            AbilityKind::Mirror => "mirror",
            AbilityKind::Shrink => "shrink",
        }
    }

}

/// One counter per ability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityCharges {
    #[serde(default)]
    pub rotate: u32,
    #[serde(default)]
    pub undo: u32,
    #[serde(default)]
    pub remove_block: u32,
    #[serde(default)]
    pub hold: u32,
    #[serde(default)]
    pub mirror: u32,
    #[serde(default)]
    pub shrink: u32,
}

impl AbilityCharges {
    pub fn get(&self, kind: AbilityKind) -> u32 {
        match kind {
            AbilityKind::Rotate => self.rotate,
            AbilityKind::Undo => self.undo,
            AbilityKind::RemoveBlock => self.remove_block,
            AbilityKind::Hold => self.hold,
            AbilityKind::Mirror => self.mirror,
            AbilityKind::Shrink => self.shrink,
        }
    }

    pub fn get_mut(&mut self, kind: AbilityKind) -> &mut u32 {
        match kind {
            AbilityKind::Rotate => &mut self.rotate,
            AbilityKind::Undo => &mut self.undo,
            AbilityKind::RemoveBlock => &mut self.remove_block,
            AbilityKind::Hold => &mut self.hold,
            AbilityKind::Mirror => &mut self.mirror,
            AbilityKind::Shrink => &mut self.shrink,
        }
    }

    /// `self - spent`, saturating at zero per ability.
    pub fn remaining_after(&self, spent: &AbilityCharges) -> AbilityCharges {
        let mut out = AbilityCharges::default();
        for kind in AbilityKind::ALL {
            *out.get_mut(kind) = self.get(kind).saturating_sub(spent.get(kind));
        }
        out
    }
}

/// Abilities that cost nothing to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeAbilities {
    #[serde(default)]
    pub rotate: bool,
    #[serde(default)]
    pub undo: bool,
    #[serde(default)]
    pub remove_block: bool,
    #[serde(default)]
    pub hold: bool,
    #[serde(default)]
    pub mirror: bool,
    #[serde(default)]
    pub shrink: bool,
}

impl FreeAbilities {
    pub fn is_free(&self, kind: AbilityKind) -> bool {
        match kind {
            AbilityKind::Rotate => self.rotate,
            AbilityKind::Undo => self.undo,
            AbilityKind::RemoveBlock => self.remove_block,
            AbilityKind::Hold => self.hold,
            AbilityKind::Mirror => self.mirror,
            AbilityKind::Shrink => self.shrink,
        }
    }

    pub fn set(&mut self, kind: AbilityKind, free: bool) {
        match kind {
            AbilityKind::Rotate => self.rotate = free,
            AbilityKind::Undo => self.undo = free,
            AbilityKind::RemoveBlock => self.remove_block = free,
            AbilityKind::Hold => self.hold = free,
            AbilityKind::Mirror => self.mirror = free,
            AbilityKind::Shrink => self.shrink = free,
        }
    }
}

/// How a use of an ability is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityPayment {
    Free,
    Gem,
    Charge,
}

/// Everything needed to decide whether an ability can be used right now.
#[derive(Debug, Clone, Copy)]
pub struct AbilityWallet<'a> {
    pub mode: GameMode,
    pub enabled: &'a [AbilityKind],
    /// FreePlay free flags, or permanent items in randomizer games.
    pub free: FreeAbilities,
    pub gem_balance: u32,
    /// Granted minus spent, randomizer games only.
    pub charges: AbilityCharges,
}

impl AbilityWallet<'_> {
    /// Decides how a use would be paid without mutating anything.
    pub fn payment_for(&self, kind: AbilityKind) -> EngineResult<AbilityPayment> {
        if !self.enabled.contains(&kind) {
            return Err(EngineError::AbilityDisabled(kind));
        }
        if self.free.is_free(kind) {
            return Ok(AbilityPayment::Free);
        }
        match self.mode {
            GameMode::FreePlay if self.gem_balance > 0 => Ok(AbilityPayment::Gem),
            GameMode::FreePlay => Err(EngineError::InsufficientCurrency(kind)),
            GameMode::Randomizer if self.charges.get(kind) > 0 => Ok(AbilityPayment::Charge),
            GameMode::Randomizer => Err(EngineError::InsufficientAbilityCharge(kind)),
        }
    }

    pub fn can_use(&self, kind: AbilityKind) -> bool {
        self.payment_for(kind).is_ok()
    }
}

/// Base multiplier from items plus `increment` for every combo so far.
pub fn effective_score_multiplier(base: f64, total_combos: u64, increment: f64) -> f64 {
    base + total_combos as f64 * increment
}
