//! Weighted random dealing of piece batches.

use crate::error::{EngineError, EngineResult};
use crate::piece::{Piece, PieceId, PieceKind};
use crate::rng::Rng;

pub const DEFAULT_PIECE_SIZE_RATIO: f64 = 0.5;

const WEIGHT_SCALE: f64 = 1_000.0;
/// Keeps every available shape reachable at the extreme ratios.
const WEIGHT_FLOOR: f64 = 0.05;

/// Selection weight for `kind` among `available`.
///
/// `ratio = 0` favors the fewest-cell shapes, `ratio = 1` the largest, and
/// `ratio = 0.5` weights every shape equally.
pub fn size_weight(kind: PieceKind, available: &[PieceKind], ratio: f64) -> u32 {
    let ratio = ratio.clamp(0.0, 1.0);
    let sizes = available.iter().map(|k| k.cell_count());
    let min = sizes.clone().min().unwrap_or(1);
    let max = sizes.max().unwrap_or(1);
    let t = if max > min {
        (kind.cell_count() - min) as f64 / (max - min) as f64
    } else {
        0.5
    };
    let weight = WEIGHT_FLOOR + (1.0 - ratio) * (1.0 - t) + ratio * t;
    (weight * WEIGHT_SCALE).round().max(1.0) as u32
}

pub fn draw_kind(rng: &mut Rng, available: &[PieceKind], ratio: f64) -> EngineResult<PieceKind> {
    if available.is_empty() {
        return Err(EngineError::NoPiecesAvailable);
    }
    let weights: Vec<u32> = available
        .iter()
        .map(|&kind| size_weight(kind, available, ratio))
        .collect();
    let total: u32 = weights.iter().sum();
    let mut roll = rng.below(total);
    for (kind, weight) in available.iter().zip(weights) {
        if roll < weight {
            return Ok(*kind);
        }
        roll -= weight;
    }
    Ok(available[available.len() - 1])
}

/// Deals `count` fresh pieces with random orientation.
///
/// Dealing orientation does not mark the pieces as rotated or mirrored; only
/// player transforms do.
pub fn deal(
    rng: &mut Rng,
    available: &[PieceKind],
    count: usize,
    ratio: f64,
    next_id: &mut PieceId,
) -> EngineResult<Vec<Piece>> {
    if available.is_empty() {
        return Err(EngineError::NoPiecesAvailable);
    }

    let mut batch = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = draw_kind(rng, available, ratio)?;
        let mut shape = kind.base_shape();
        for _ in 0..rng.below(4) {
            shape = shape.rotated_cw();
        }
        if rng.chance(0.5) {
            shape = shape.mirrored();
        }
        let id = *next_id;
        *next_id += 1;
        batch.push(Piece::new(id, kind).with_shape(shape));
    }
    log::debug!(
        "dealt {} pieces: {:?}",
        batch.len(),
        batch.iter().map(|p| p.kind.id()).collect::<Vec<_>>()
    );
    Ok(batch)
}
