//! Heuristic placer — ordered, best-fit greedy seating.
//!
//! Runs entirely synchronously; the orchestrator is responsible for yielding
//! around calls into this module. The only suspension points this stage itself
//! recognizes are the cancellation checks between requests.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::trace;

use crate::config::{HeuristicStrategy, OptimizationSettings};
use crate::geometry::{effective_dims, fits_without_overlap, Rect, Rotation};
use crate::progress::CancellationToken;
use crate::types::{Piece, PlacedPiece, Stock, StockInstanceId};

/// One physical stock sheet, live only for the duration of this stage.
struct StockInstance {
    id: StockInstanceId,
    width: f64,
    height: f64,
    placed_rects: Vec<Rect>,
    placed_area: f64,
    available_area: f64,
}

impl StockInstance {
    fn total_area(&self) -> f64 {
        self.width * self.height
    }
}

fn expand_stock_instances(stocks: &[Stock]) -> Vec<StockInstance> {
    let mut instances = Vec::new();
    for stock in stocks {
        for instance_index in 0..stock.quantity {
            instances.push(StockInstance {
                id: StockInstanceId { stock_id: stock.id, instance_index },
                width: stock.width,
                height: stock.height,
                placed_rects: Vec::new(),
                placed_area: 0.0,
                available_area: stock.area(),
            });
        }
    }
    instances
}

fn order_piece_types(pieces: &[Piece], settings: &OptimizationSettings) -> Vec<Piece> {
    let mut indexed: Vec<(usize, Piece)> = pieces.iter().cloned().enumerate().collect();

    match settings.heuristic_strategy {
        HeuristicStrategy::LargestFirst => {
            indexed.sort_by(|(ia, a), (ib, b)| b.area().partial_cmp(&a.area()).unwrap().then(ia.cmp(ib)));
        }
        HeuristicStrategy::SmallestFirst => {
            indexed.sort_by(|(ia, a), (ib, b)| a.area().partial_cmp(&b.area()).unwrap().then(ia.cmp(ib)));
        }
        HeuristicStrategy::PerimeterDescending => {
            indexed.sort_by(|(ia, a), (ib, b)| {
                perimeter(b).partial_cmp(&perimeter(a)).unwrap().then(ia.cmp(ib))
            });
        }
        HeuristicStrategy::PerimeterAscending => {
            indexed.sort_by(|(ia, a), (ib, b)| {
                perimeter(a).partial_cmp(&perimeter(b)).unwrap().then(ia.cmp(ib))
            });
        }
        HeuristicStrategy::Random => {
            let mut rng = match settings.random_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            indexed.shuffle(&mut rng);
        }
    }

    indexed.into_iter().map(|(_, piece)| piece).collect()
}

fn perimeter(piece: &Piece) -> f64 {
    2.0 * (piece.width + piece.height)
}

fn effective_rotations(piece: &Piece, settings: &OptimizationSettings) -> Vec<Rotation> {
    piece
        .candidate_rotations(settings.enable_rotation)
        .into_iter()
        .filter(|r| settings.allowed_rotations.allows(*r))
        .collect()
}

/// Candidate positions for an effective `w x h` footprint on a `W x H` sheet:
/// the four corners plus grid-stride positions along each edge.
fn candidate_positions(sheet_width: f64, sheet_height: f64, w: f64, h: f64) -> Vec<(f64, f64)> {
    let mut positions = Vec::new();
    let max_x = sheet_width - w;
    let max_y = sheet_height - h;

    positions.push((0.0, 0.0));
    positions.push((max_x, 0.0));
    positions.push((0.0, max_y));
    positions.push((max_x, max_y));

    if w > 0.0 {
        let mut k = 1.0;
        while k * w <= max_x {
            positions.push((k * w, 0.0));
            positions.push((k * w, max_y));
            k += 1.0;
        }
    }
    if h > 0.0 {
        let mut k = 1.0;
        while k * h <= max_y {
            positions.push((0.0, k * h));
            positions.push((max_x, k * h));
            k += 1.0;
        }
    }

    positions.retain(|(x, y)| x.is_finite() && y.is_finite());
    positions.sort_by(|a, b| a.partial_cmp(b).unwrap());
    positions.dedup();
    positions
}

struct BestCandidate {
    instance_idx: usize,
    rotation: Rotation,
    position: (f64, f64),
    score: f64,
}

fn seat_one(piece: &Piece, instances: &mut [StockInstance], settings: &OptimizationSettings) -> Option<PlacedPiece> {
    let mut best: Option<BestCandidate> = None;

    for (idx, instance) in instances.iter().enumerate() {
        if instance.available_area < piece.area() {
            continue;
        }

        for rotation in effective_rotations(piece, settings) {
            let (w, h) = effective_dims(piece.width, piece.height, rotation);
            if w > instance.width || h > instance.height {
                continue;
            }

            for position in candidate_positions(instance.width, instance.height, w, h) {
                let candidate = Rect::new(position.0, position.1, w, h);
                if !fits_without_overlap(&candidate, &instance.placed_rects, instance.width, instance.height) {
                    continue;
                }

                let score = (instance.placed_area + candidate.area()) / instance.total_area();
                let is_better = match &best {
                    Some(current) => score > current.score,
                    None => true,
                };
                if is_better {
                    best = Some(BestCandidate { instance_idx: idx, rotation, position, score });
                }
                // Only the first feasible position per (instance, rotation) is tried.
                break;
            }
        }
    }

    best.map(|candidate| {
        let instance = &mut instances[candidate.instance_idx];
        let (w, h) = effective_dims(piece.width, piece.height, candidate.rotation);
        let rect = Rect::new(candidate.position.0, candidate.position.1, w, h);
        instance.placed_rects.push(rect);
        instance.placed_area += rect.area();
        instance.available_area -= rect.area();

        trace!(piece = %piece.name, stock_instance = ?instance.id, score = candidate.score, "seated piece");

        PlacedPiece::new(piece.id, candidate.position.0, candidate.position.1, candidate.rotation, instance.id)
    })
}

/// Greedily seats pieces on stock instances in strategy order, honoring
/// cooperative cancellation between requests.
pub fn place(
    stocks: &[Stock],
    pieces: &[Piece],
    settings: &OptimizationSettings,
    cancellation: &CancellationToken,
) -> Vec<PlacedPiece> {
    if !settings.enable_heuristic_pre_arrangement {
        return Vec::new();
    }

    let ordered = order_piece_types(pieces, settings);
    let mut instances = expand_stock_instances(stocks);
    let mut placements = Vec::new();

    'requests: for piece in &ordered {
        for _ in 0..piece.quantity {
            if cancellation.is_cancelled() {
                break 'requests;
            }
            if settings.enable_greedy_placement {
                if let Some(placement) = seat_one(piece, &mut instances, settings) {
                    placements.push(placement);
                }
            }
            if cancellation.is_cancelled() {
                break 'requests;
            }
        }
    }

    placements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RotationSet;

    fn settings() -> OptimizationSettings {
        OptimizationSettings { enable_heuristic_pre_arrangement: true, ..OptimizationSettings::default() }
    }

    #[test]
    fn exact_fit_places_all_four_quadrants() {
        let stocks = vec![Stock::new("Sheet", 100.0, 100.0, 1)];
        let pieces = vec![Piece::new("Tile", 50.0, 50.0, 4)];
        let settings = OptimizationSettings { enable_rotation: false, ..settings() };

        let placements = place(&stocks, &pieces, &settings, &CancellationToken::new());
        assert_eq!(placements.len(), 4);

        let mut corners: Vec<(f64, f64)> = placements.iter().map(|p| (p.x, p.y)).collect();
        corners.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(corners, vec![(0.0, 0.0), (0.0, 50.0), (50.0, 0.0), (50.0, 50.0)]);
    }

    #[test]
    fn rotation_is_used_when_required_to_fit() {
        let stocks = vec![Stock::new("Sheet", 100.0, 50.0, 1)];
        let piece = Piece::new("Board", 50.0, 100.0, 1).with_rotation(RotationSet { r90: true, r180: false, r270: false });
        let placements = place(&stocks, &[piece], &settings(), &CancellationToken::new());

        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].rotation, Rotation::R90);
        assert_eq!((placements[0].x, placements[0].y), (0.0, 0.0));
    }

    #[test]
    fn no_placements_without_a_feasible_position() {
        let stocks = vec![Stock::new("Sheet", 10.0, 10.0, 1)];
        let pieces = vec![Piece::new("TooBig", 20.0, 20.0, 1)];
        let placements = place(&stocks, &pieces, &settings(), &CancellationToken::new());
        assert!(placements.is_empty());
    }

    #[test]
    fn cancellation_stops_further_seating() {
        let stocks = vec![Stock::new("Sheet", 1000.0, 1000.0, 10)];
        let pieces = vec![Piece::new("Tile", 10.0, 10.0, 10_000)];
        let token = CancellationToken::new();
        token.cancel();

        let placements = place(&stocks, &pieces, &settings(), &token);
        assert!(placements.is_empty());
    }

    #[test]
    fn placements_never_overlap_on_same_instance() {
        let stocks = vec![Stock::new("Sheet", 100.0, 100.0, 1)];
        let pieces = vec![
            Piece::new("Big", 60.0, 60.0, 1),
            Piece::new("Medium", 50.0, 50.0, 1),
            Piece::new("Small", 30.0, 30.0, 5),
        ];
        let placements = place(&stocks, &pieces, &settings(), &CancellationToken::new());

        for (i, a) in placements.iter().enumerate() {
            for b in placements.iter().skip(i + 1) {
                let pa = pieces.iter().find(|p| p.id == a.piece_id).unwrap();
                let pb = pieces.iter().find(|p| p.id == b.piece_id).unwrap();
                let ra = a.rect(pa.width, pa.height);
                let rb = b.rect(pb.width, pb.height);
                assert!(!crate::geometry::overlap(&ra, &rb));
            }
        }
    }
}
