//! Randomizer item catalog and the entitlements derived from received items.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ledger::ItemId;
use crate::piece::PieceKind;
use crate::progression::{AbilityCharges, AbilityKind, DEFAULT_SCORE_MULTIPLIER, FreeAbilities};

pub const PIECE_ITEM_BASE: ItemId = 8_000_000;
pub const PIECE_SLOT_4: ItemId = 8_002_001;
pub const PIECE_SLOT_5: ItemId = 8_002_002;
pub const ROTATE_ABILITY: ItemId = 8_003_001;
pub const UNDO_ABILITY: ItemId = 8_003_002;
pub const REMOVE_BLOCK_ABILITY: ItemId = 8_003_003;
pub const HOLD_ABILITY: ItemId = 8_003_004;
pub const MIRROR_ABILITY: ItemId = 8_003_005;
pub const SHRINK_ABILITY: ItemId = 8_003_006;
pub const PERMANENT_FREE_ROTATE: ItemId = 8_003_101;
pub const PERMANENT_FREE_MIRROR: ItemId = 8_003_102;
pub const PERMANENT_FREE_HOLD: ItemId = 8_003_103;
pub const SCORE_MULT_10: ItemId = 8_004_001;
pub const SCORE_MULT_25: ItemId = 8_004_002;
pub const SCORE_MULT_50: ItemId = 8_004_003;

pub const MIN_PIECE_SLOTS: usize = 3;
pub const DEFAULT_PIECE_SLOTS: usize = 3;
pub const MAX_PIECE_SLOTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Piece(PieceKind),
    PieceSlot,
    Ability(AbilityKind),
    PermanentFree(AbilityKind),
    /// Additive bonus in hundredths.
    ScoreMultiplier(u32),
}

impl ItemKind {
    pub fn from_id(id: ItemId) -> Option<ItemKind> {
        let kind = match id {
            PIECE_SLOT_4 | PIECE_SLOT_5 => ItemKind::PieceSlot,
            ROTATE_ABILITY => ItemKind::Ability(AbilityKind::Rotate),
            UNDO_ABILITY => ItemKind::Ability(AbilityKind::Undo),
            REMOVE_BLOCK_ABILITY => ItemKind::Ability(AbilityKind::RemoveBlock),
            HOLD_ABILITY => ItemKind::Ability(AbilityKind::Hold),
            MIRROR_ABILITY => ItemKind::Ability(AbilityKind::Mirror),
            SHRINK_ABILITY => ItemKind::Ability(AbilityKind::Shrink),
            PERMANENT_FREE_ROTATE => ItemKind::PermanentFree(AbilityKind::Rotate),
            PERMANENT_FREE_MIRROR => ItemKind::PermanentFree(AbilityKind::Mirror),
            PERMANENT_FREE_HOLD => ItemKind::PermanentFree(AbilityKind::Hold),
            SCORE_MULT_10 => ItemKind::ScoreMultiplier(10),
            SCORE_MULT_25 => ItemKind::ScoreMultiplier(25),
            SCORE_MULT_50 => ItemKind::ScoreMultiplier(50),
            _ => {
                let offset = id.checked_sub(PIECE_ITEM_BASE + 1)?;
                let index = usize::try_from(offset).ok()?;
                return PieceKind::ALL.get(index).copied().map(ItemKind::Piece);
            }
        };
        Some(kind)
    }

    pub fn piece_item_id(kind: PieceKind) -> ItemId {
        let index = PieceKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default();
        PIECE_ITEM_BASE + index as ItemId + 1
    }

    pub fn ability_item_id(kind: AbilityKind) -> ItemId {
        match kind {
            AbilityKind::Rotate => ROTATE_ABILITY,
            AbilityKind::Undo => UNDO_ABILITY,
            AbilityKind::RemoveBlock => REMOVE_BLOCK_ABILITY,
            AbilityKind::Hold => HOLD_ABILITY,
            AbilityKind::Mirror => MIRROR_ABILITY,
            AbilityKind::Shrink => SHRINK_ABILITY,
        }
    }

    pub fn display_name(self) -> String {
        match self {
            ItemKind::Piece(kind) => kind.name().to_string(),
            ItemKind::PieceSlot => "Piece Slot".to_string(),
            ItemKind::Ability(AbilityKind::RemoveBlock) => "Remove Block Ability".to_string(),
            ItemKind::Ability(kind) => format!("{} Ability", capitalized(kind.label())),
            ItemKind::PermanentFree(kind) => format!("Permanent Free {}", capitalized(kind.label())),
            ItemKind::ScoreMultiplier(bonus) => format!("Score Multiplier +{bonus}%"),
        }
    }
}

fn capitalized(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// What the player may use, derived from the full list of received items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    pub unlocked_pieces: BTreeSet<PieceKind>,
    pub max_piece_slots: usize,
    pub granted: AbilityCharges,
    pub permanent_free: FreeAbilities,
    pub base_score_multiplier: f64,
}

impl Default for Entitlements {
    fn default() -> Self {
        Self::starting(DEFAULT_PIECE_SLOTS)
    }
}

impl Entitlements {
    /// Entitlements before any item has arrived.
    pub fn starting(base_slots: usize) -> Self {
        Self {
            unlocked_pieces: PieceKind::STARTERS.into_iter().collect(),
            max_piece_slots: base_slots.clamp(MIN_PIECE_SLOTS, MAX_PIECE_SLOTS),
            granted: AbilityCharges::default(),
            permanent_free: FreeAbilities::default(),
            base_score_multiplier: DEFAULT_SCORE_MULTIPLIER,
        }
    }

    /// Rebuilds entitlements from scratch. The result depends only on the
    /// multiset of ids, not on their order or on earlier calls.
    pub fn recompute<I>(item_ids: I, base_slots: usize) -> Self
    where
        I: IntoIterator<Item = ItemId>,
    {
        let mut out = Self::starting(base_slots);
        let mut bonus_hundredths = 0u32;
        for id in item_ids {
            match ItemKind::from_id(id) {
                Some(ItemKind::Piece(kind)) => {
                    out.unlocked_pieces.insert(kind);
                }
                Some(ItemKind::PieceSlot) => {
                    out.max_piece_slots = (out.max_piece_slots + 1).min(MAX_PIECE_SLOTS);
                }
                Some(ItemKind::Ability(kind)) => {
                    *out.granted.get_mut(kind) += 1;
                }
                Some(ItemKind::PermanentFree(kind)) => out.permanent_free.set(kind, true),
                Some(ItemKind::ScoreMultiplier(bonus)) => bonus_hundredths += bonus,
                None => log::warn!("ignoring unknown item id {id}"),
            }
        }
        out.base_score_multiplier = DEFAULT_SCORE_MULTIPLIER + bonus_hundredths as f64 / 100.0;
        out
    }

    pub fn unlocked_list(&self) -> Vec<PieceKind> {
        self.unlocked_pieces.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_items_follow_catalog_order() {
        assert_eq!(ItemKind::from_id(8_000_001), Some(ItemKind::Piece(PieceKind::Single)));
        assert_eq!(
            ItemKind::from_id(8_000_018),
            Some(ItemKind::Piece(PieceKind::Cross3x3))
        );
        assert_eq!(ItemKind::from_id(8_000_019), None);
        assert_eq!(ItemKind::from_id(8_000_000), None);
        assert_eq!(ItemKind::piece_item_id(PieceKind::TetrominoS), 8_000_009);
    }

    #[test]
    fn ability_and_bonus_ids_decode() {
        assert_eq!(
            ItemKind::from_id(8_003_003),
            Some(ItemKind::Ability(AbilityKind::RemoveBlock))
        );
        assert_eq!(
            ItemKind::from_id(8_003_102),
            Some(ItemKind::PermanentFree(AbilityKind::Mirror))
        );
        assert_eq!(ItemKind::from_id(8_004_002), Some(ItemKind::ScoreMultiplier(25)));
        assert_eq!(ItemKind::ability_item_id(AbilityKind::Shrink), 8_003_006);
        assert_eq!(
            ItemKind::Ability(AbilityKind::RemoveBlock).display_name(),
            "Remove Block Ability"
        );
        assert_eq!(ItemKind::PermanentFree(AbilityKind::Hold).display_name(), "Permanent Free Hold");
    }

    #[test]
    fn recompute_counts_the_multiset() {
        let ids = [
            ROTATE_ABILITY,
            ROTATE_ABILITY,
            UNDO_ABILITY,
            8_000_001,
            PIECE_SLOT_4,
            SCORE_MULT_10,
            SCORE_MULT_25,
            PERMANENT_FREE_HOLD,
            42,
        ];
        let e = Entitlements::recompute(ids, DEFAULT_PIECE_SLOTS);
        assert_eq!(e.granted.rotate, 2);
        assert_eq!(e.granted.undo, 1);
        assert_eq!(e.max_piece_slots, 4);
        assert!(e.unlocked_pieces.contains(&PieceKind::Single));
        assert!(e.unlocked_pieces.contains(&PieceKind::TrominoL));
        assert_eq!(e.unlocked_pieces.len(), 4);
        assert!(e.permanent_free.hold);
        assert!((e.base_score_multiplier - 1.35).abs() < 1e-9);
    }

    #[test]
    fn recompute_is_idempotent_and_order_independent() {
        let ids = vec![PIECE_SLOT_4, HOLD_ABILITY, 8_000_010, SCORE_MULT_50, HOLD_ABILITY];
        let forward = Entitlements::recompute(ids.clone(), 3);
        let again = Entitlements::recompute(ids.clone(), 3);
        let reversed = Entitlements::recompute(ids.into_iter().rev(), 3);
        assert_eq!(forward, again);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn slots_are_capped() {
        let ids = [PIECE_SLOT_4, PIECE_SLOT_5, PIECE_SLOT_5, PIECE_SLOT_4];
        assert_eq!(Entitlements::recompute(ids, 3).max_piece_slots, MAX_PIECE_SLOTS);
        assert_eq!(Entitlements::recompute([], 9).max_piece_slots, MAX_PIECE_SLOTS);
    }
}
