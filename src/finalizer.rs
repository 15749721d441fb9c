//! Plan finalizer.
//!
//! Merges the heuristic and refiner placement sets, resolving any conflict in
//! favor of whichever placement was proposed first (heuristic before refiner,
//! insertion order within a stage), computes the plan's aggregate metrics, and
//! re-validates the result so a caller never receives a geometrically invalid
//! [`CuttingPlan`].

use chrono::Utc;
use tracing::warn;

use crate::config::OptimizationSettings;
use crate::geometry::overlap;
use crate::progress::PerformanceSample;
use crate::types::{CuttingPlan, Piece, PlacedPiece, PlanId, PlanMetrics, Stock};

/// Accepts placements one at a time, keeping only those that don't overlap an
/// already-accepted placement on the same stock instance.
struct ConflictResolver<'a> {
    pieces: &'a [Piece],
    accepted: Vec<PlacedPiece>,
    warnings: Vec<String>,
}

impl<'a> ConflictResolver<'a> {
    fn new(pieces: &'a [Piece]) -> Self {
        Self { pieces, accepted: Vec::new(), warnings: Vec::new() }
    }

    fn piece_dims(&self, piece_id: crate::types::PieceId) -> Option<(f64, f64)> {
        self.pieces.iter().find(|p| p.id == piece_id).map(|p| (p.width, p.height))
    }

    fn try_accept(&mut self, candidate: PlacedPiece) {
        let Some((width, height)) = self.piece_dims(candidate.piece_id) else {
            self.warnings.push(format!("dropped placement {:?}: piece no longer exists", candidate.id));
            return;
        };
        let candidate_rect = candidate.rect(width, height);

        let conflicts = self.accepted.iter().any(|existing| {
            if existing.stock_instance != candidate.stock_instance {
                return false;
            }
            let Some((ew, eh)) = self.piece_dims(existing.piece_id) else { return false };
            overlap(&candidate_rect, &existing.rect(ew, eh))
        });

        if conflicts {
            self.warnings.push(format!(
                "dropped placement {:?} of piece {:?}: overlaps an already-accepted placement",
                candidate.id, candidate.piece_id
            ));
        } else {
            self.accepted.push(candidate);
        }
    }
}

fn merge_placements(pieces: &[Piece], heuristic: Vec<PlacedPiece>, refiner: Vec<PlacedPiece>) -> (Vec<PlacedPiece>, Vec<String>) {
    let mut resolver = ConflictResolver::new(pieces);
    for placement in heuristic.into_iter().chain(refiner.into_iter()) {
        resolver.try_accept(placement);
    }
    (resolver.accepted, resolver.warnings)
}

/// Enforces the per-piece-type quantity cap: once a piece type has as many
/// accepted placements as its quantity, further placements of that type are
/// dropped rather than silently over-counted.
fn enforce_quantity_caps(pieces: &[Piece], placements: Vec<PlacedPiece>) -> (Vec<PlacedPiece>, Vec<String>) {
    use std::collections::HashMap;

    let caps: HashMap<_, _> = pieces.iter().map(|p| (p.id, p.quantity)).collect();
    let mut seen: HashMap<_, u32> = HashMap::new();
    let mut kept = Vec::with_capacity(placements.len());
    let mut warnings = Vec::new();

    for placement in placements {
        let cap = caps.get(&placement.piece_id).copied().unwrap_or(0);
        let count = seen.entry(placement.piece_id).or_insert(0);
        if *count < cap {
            *count += 1;
            kept.push(placement);
        } else {
            warnings.push(format!(
                "dropped placement {:?}: piece {:?} already has {} of {} placed",
                placement.id, placement.piece_id, count, cap
            ));
        }
    }

    (kept, warnings)
}

fn compute_metrics(
    stocks: &[Stock],
    pieces: &[Piece],
    placements: &[PlacedPiece],
    elapsed_seconds: f64,
    performance: PerformanceSample,
) -> PlanMetrics {
    let total_stock_area: f64 = stocks.iter().map(Stock::total_area).sum();

    let total_placed_area: f64 = placements
        .iter()
        .filter_map(|p| pieces.iter().find(|piece| piece.id == p.piece_id).map(|piece| p.rect(piece.width, piece.height).area()))
        .sum();

    let utilization_percentage = if total_stock_area > 0.0 { 100.0 * total_placed_area / total_stock_area } else { 0.0 };

    let total_piece_quantity: usize = pieces.iter().map(|p| p.quantity as usize).sum();
    let pieces_placed = placements.len();
    let pieces_remaining = total_piece_quantity.saturating_sub(pieces_placed);

    PlanMetrics {
        total_stock_area,
        total_placed_area,
        utilization_percentage,
        pieces_placed,
        pieces_remaining,
        optimization_time_seconds: elapsed_seconds,
        memory_mb: performance.memory_mb,
        cpu_percent: performance.cpu_percent,
    }
}

/// Merges the two stages' placements, computes metrics, and produces the final
/// [`CuttingPlan`]. `elapsed_seconds` and `performance` are purely
/// informational metrics, supplied by the orchestrator.
pub fn finalize(
    stocks: Vec<Stock>,
    pieces: Vec<Piece>,
    heuristic_placements: Vec<PlacedPiece>,
    refiner_placements: Vec<PlacedPiece>,
    settings: OptimizationSettings,
    elapsed_seconds: f64,
    performance: PerformanceSample,
) -> CuttingPlan {
    let (merged, mut warnings) = merge_placements(&pieces, heuristic_placements, refiner_placements);
    let (capped, cap_warnings) = enforce_quantity_caps(&pieces, merged);
    warnings.extend(cap_warnings);

    let metrics = compute_metrics(&stocks, &pieces, &capped, elapsed_seconds, performance);

    let plan = CuttingPlan {
        id: PlanId::next(),
        created_at: Utc::now(),
        stocks,
        pieces,
        placements: capped,
        settings,
        metrics,
        warnings,
    };

    for problem in plan.validate() {
        warn!(problem = %problem, "finalizer post-condition check found a surviving invariant violation");
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rotation;
    use crate::types::StockInstanceId;

    fn instance(stock: &Stock) -> StockInstanceId {
        StockInstanceId { stock_id: stock.id, instance_index: 0 }
    }

    #[test]
    fn overlapping_refiner_placement_is_dropped_in_favor_of_heuristic() {
        let stock = Stock::new("Sheet", 100.0, 100.0, 1);
        let piece = Piece::new("Tile", 50.0, 50.0, 2);
        let inst = instance(&stock);

        let heuristic = vec![PlacedPiece::new(piece.id, 0.0, 0.0, Rotation::R0, inst)];
        let refiner = vec![PlacedPiece::new(piece.id, 10.0, 10.0, Rotation::R0, inst)];

        let plan = finalize(
            vec![stock],
            vec![piece],
            heuristic,
            refiner,
            OptimizationSettings::default(),
            0.1,
            PerformanceSample::default(),
        );

        assert_eq!(plan.placements.len(), 1);
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.validate().is_empty());
    }

    #[test]
    fn non_overlapping_placements_from_both_stages_are_kept() {
        let stock = Stock::new("Sheet", 100.0, 100.0, 1);
        let piece = Piece::new("Tile", 50.0, 50.0, 2);
        let inst = instance(&stock);

        let heuristic = vec![PlacedPiece::new(piece.id, 0.0, 0.0, Rotation::R0, inst)];
        let refiner = vec![PlacedPiece::new(piece.id, 50.0, 50.0, Rotation::R0, inst)];

        let plan = finalize(
            vec![stock],
            vec![piece],
            heuristic,
            refiner,
            OptimizationSettings::default(),
            0.1,
            PerformanceSample::default(),
        );

        assert_eq!(plan.placements.len(), 2);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn quantity_cap_drops_excess_placements() {
        let stock = Stock::new("Sheet", 100.0, 100.0, 1);
        let piece = Piece::new("Tile", 10.0, 10.0, 1);
        let inst = instance(&stock);

        let heuristic = vec![
            PlacedPiece::new(piece.id, 0.0, 0.0, Rotation::R0, inst),
            PlacedPiece::new(piece.id, 20.0, 20.0, Rotation::R0, inst),
        ];

        let plan = finalize(
            vec![stock],
            vec![piece],
            heuristic,
            Vec::new(),
            OptimizationSettings::default(),
            0.1,
            PerformanceSample::default(),
        );

        assert_eq!(plan.placements.len(), 1);
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn metrics_reflect_placed_and_remaining_pieces() {
        let stock = Stock::new("Sheet", 100.0, 100.0, 1);
        let piece = Piece::new("Tile", 50.0, 50.0, 4);
        let inst = instance(&stock);

        let heuristic = vec![
            PlacedPiece::new(piece.id, 0.0, 0.0, Rotation::R0, inst),
            PlacedPiece::new(piece.id, 50.0, 0.0, Rotation::R0, inst),
        ];

        let plan = finalize(
            vec![stock],
            vec![piece],
            heuristic,
            Vec::new(),
            OptimizationSettings::default(),
            2.5,
            PerformanceSample::default(),
        );

        assert_eq!(plan.metrics.pieces_placed, 2);
        assert_eq!(plan.metrics.pieces_remaining, 2);
        assert_eq!(plan.metrics.utilization_percentage, 50.0);
        assert_eq!(plan.metrics.optimization_time_seconds, 2.5);
    }
}
