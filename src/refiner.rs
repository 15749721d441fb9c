//! Constraint-programming refiner.
//!
//! Builds one CP model per group of stock instances and asks `selen` to decide,
//! for every (piece unit, stock instance) pair, whether the piece is placed and
//! at what integer position and rotation. Dimensions are floored to integers
//! for the solver; placements come back in those same integer units.
//!
//! When `enable_multithreading` is set the stock instances are partitioned into
//! `max_threads` groups and solved concurrently via `rayon`. Each piece type's
//! quantity is split proportionally across groups up front so that no two
//! groups can independently place more units of a piece than exist in total —
//! the partition, not the solver, owns that invariant.

use rayon::prelude::*;
use selen::prelude::*;
use tracing::{debug, warn};

use crate::config::OptimizationSettings;
use crate::geometry::Rotation;
use crate::progress::CancellationToken;
use crate::types::{Piece, PieceId, PlacedPiece, Stock, StockInstanceId};

struct StockInstance {
    id: StockInstanceId,
    width: i32,
    height: i32,
}

fn expand_stock_instances(stocks: &[Stock]) -> Vec<StockInstance> {
    let mut instances = Vec::new();
    for stock in stocks {
        for instance_index in 0..stock.quantity {
            instances.push(StockInstance {
                id: StockInstanceId { stock_id: stock.id, instance_index },
                width: stock.width.floor() as i32,
                height: stock.height.floor() as i32,
            });
        }
    }
    instances
}

/// One unit of a piece type: the model gets one variable set per physical
/// copy rather than per type.
#[derive(Clone)]
struct PieceUnit {
    piece_id: PieceId,
    width: i32,
    height: i32,
    rotations: Vec<Rotation>,
}

fn expand_piece_units(pieces: &[Piece], settings: &OptimizationSettings) -> Vec<PieceUnit> {
    let mut units = Vec::new();
    for piece in pieces {
        let allowed: Vec<Rotation> = piece
            .candidate_rotations(settings.enable_rotation)
            .into_iter()
            .filter(|r| settings.allowed_rotations.allows(*r))
            .collect();

        for _ in 0..piece.quantity {
            units.push(PieceUnit {
                piece_id: piece.id,
                width: piece.width.floor() as i32,
                height: piece.height.floor() as i32,
                rotations: allowed.clone(),
            });
        }
    }
    units
}

/// Splits `stocks`' expanded instances into up to `max_threads` groups, and
/// gives each group a disjoint, proportional share of every piece type's
/// quantity so the sum across groups never exceeds the original quantity.
fn partition(stocks: &[Stock], pieces: &[Piece], max_threads: usize) -> Vec<(Vec<StockInstance>, Vec<Piece>)> {
    let all_instances = expand_stock_instances(stocks);
    let group_count = max_threads.max(1).min(all_instances.len().max(1));

    let mut groups: Vec<Vec<StockInstance>> = (0..group_count).map(|_| Vec::new()).collect();
    for (i, instance) in all_instances.into_iter().enumerate() {
        groups[i % group_count].push(instance);
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(g, instances)| {
            let group_pieces = pieces
                .iter()
                .map(|piece| {
                    let share = proportional_share(piece.quantity, group_count, g);
                    Piece { quantity: share, ..piece.clone() }
                })
                .filter(|p| p.quantity > 0)
                .collect();
            (instances, group_pieces)
        })
        .collect()
}

/// Divides `total` into `groups` shares as evenly as possible; the first
/// `total % groups` groups receive one extra unit so the shares sum exactly
/// to `total`.
fn proportional_share(total: u32, groups: usize, group_index: usize) -> u32 {
    let base = total / groups as u32;
    let remainder = total % groups as u32;
    base + if (group_index as u32) < remainder { 1 } else { 0 }
}

struct VariableTable {
    x: Vec<Vec<VarId>>,
    y: Vec<Vec<VarId>>,
    rot: Vec<Vec<VarId>>,
    placed: Vec<Vec<VarId>>,
    /// `[unit][instance]` -> the rotations this unit may take on that instance,
    /// paired with the boolean that reifies "this is the rotation in use".
    /// Reused by the non-overlap block so separation is checked against the
    /// actual chosen footprint, not the unrotated one.
    rotation_flags: Vec<Vec<Vec<(Rotation, VarId)>>>,
}

/// Builds the CP model for one (instances, pieces) group: variables,
/// containment, at-most-one-stock, and pairwise non-overlap constraints.
/// Returns the model together with the variable table extraction needs.
fn build_model(instances: &[StockInstance], units: &[PieceUnit], settings: &OptimizationSettings) -> (Model, VariableTable) {
    let mut model = Model::with_config(SolverConfig::default().with_timeout_seconds(settings.time_limit_seconds));

    let mut table = VariableTable {
        x: vec![Vec::with_capacity(instances.len()); units.len()],
        y: vec![Vec::with_capacity(instances.len()); units.len()],
        rot: vec![Vec::with_capacity(instances.len()); units.len()],
        placed: vec![Vec::with_capacity(instances.len()); units.len()],
        rotation_flags: vec![Vec::with_capacity(instances.len()); units.len()],
    };

    for (ui, unit) in units.iter().enumerate() {
        let rotation_codes: Vec<i32> = unit.rotations.iter().map(|r| r.degrees() as i32).collect();

        for instance in instances {
            let xv = model.int(0, instance.width.max(0));
            let yv = model.int(0, instance.height.max(0));
            let rv = model.intset(rotation_codes.clone());
            let pv = model.bool();

            let mut flags_for_instance = Vec::with_capacity(unit.rotations.len());
            for rotation in &unit.rotations {
                let (w, h) = crate::geometry::effective_dims(unit.width as f64, unit.height as f64, *rotation);
                let (w, h) = (w as i32, h as i32);

                let is_this_rotation = model.bool();
                let code = model.int(rotation.degrees() as i32, rotation.degrees() as i32);
                model.int_eq_reif(rv, code, is_this_rotation);

                let x_plus_w = model.add(xv, model.int(w, w));
                let y_plus_h = model.add(yv, model.int(h, h));
                let fits_x = model.bool();
                let fits_y = model.bool();
                model.int_le_reif(x_plus_w, model.int(instance.width, instance.width), fits_x);
                model.int_le_reif(y_plus_h, model.int(instance.height, instance.height), fits_y);

                // Guarded by both placed and this-rotation: only binds when the
                // unit is actually seated here in this rotation.
                model.bool_clause(&[fits_x], &[pv, is_this_rotation]);
                model.bool_clause(&[fits_y], &[pv, is_this_rotation]);

                flags_for_instance.push((*rotation, is_this_rotation));
            }

            table.x[ui].push(xv);
            table.y[ui].push(yv);
            table.rot[ui].push(rv);
            table.placed[ui].push(pv);
            table.rotation_flags[ui].push(flags_for_instance);
        }

        // At most one stock instance per unit.
        let ones = vec![1; instances.len()];
        model.int_lin_le(&ones, &table.placed[ui], 1);
    }

    for s in 0..instances.len() {
        for ua in 0..units.len() {
            for ub in (ua + 1)..units.len() {
                let (xa, ya, pa) = (table.x[ua][s], table.y[ua][s], table.placed[ua][s]);
                let (xb, yb, pb) = (table.x[ub][s], table.y[ub][s], table.placed[ub][s]);

                // Separation must use the footprint the unit actually ends up
                // with, so each rotation combination gets its own reified
                // disjunction, guarded on both placed-flags and both
                // this-rotation flags.
                for &(rot_a, is_rot_a) in &table.rotation_flags[ua][s] {
                    let (wa, ha) = crate::geometry::effective_dims(units[ua].width as f64, units[ua].height as f64, rot_a);
                    let (wa, ha) = (wa as i32, ha as i32);

                    for &(rot_b, is_rot_b) in &table.rotation_flags[ub][s] {
                        let (wb, hb) = crate::geometry::effective_dims(units[ub].width as f64, units[ub].height as f64, rot_b);
                        let (wb, hb) = (wb as i32, hb as i32);

                        let a_left_b = model.bool();
                        let xa_plus_wa = model.add(xa, model.int(wa, wa));
                        model.int_le_reif(xa_plus_wa, xb, a_left_b);

                        let b_left_a = model.bool();
                        let xb_plus_wb = model.add(xb, model.int(wb, wb));
                        model.int_le_reif(xb_plus_wb, xa, b_left_a);

                        let a_below_b = model.bool();
                        let ya_plus_ha = model.add(ya, model.int(ha, ha));
                        model.int_le_reif(ya_plus_ha, yb, a_below_b);

                        let b_below_a = model.bool();
                        let yb_plus_hb = model.add(yb, model.int(hb, hb));
                        model.int_le_reif(yb_plus_hb, ya, b_below_a);

                        // If both a and b are placed on this instance in these
                        // rotations, at least one of the four separating
                        // relations must hold.
                        model.bool_clause(&[a_left_b, b_left_a, a_below_b, b_below_a], &[pa, pb, is_rot_a, is_rot_b]);
                    }
                }
            }
        }
    }

    (model, table)
}

/// Objective: maximize placed-unit count, tie-broken by minimizing the number
/// of stock instances touched (wired directly to the model's own variables,
/// not a disconnected objective term).
fn objective(model: &mut Model, table: &VariableTable, instance_count: usize) -> VarId {
    let placed_flat: Vec<VarId> = table.placed.iter().flatten().copied().collect();
    let total_placed = model.sum(&placed_flat);

    let used: Vec<VarId> = (0..instance_count)
        .map(|s| {
            let row: Vec<VarId> = (0..table.placed.len()).map(|ui| table.placed[ui][s]).collect();
            model.sum(&row)
        })
        .collect();
    let used_penalty = model.sum(&used);

    let scale = model.int(1_000, 1_000);
    let scaled_placed = model.mul(total_placed, scale);
    model.sub(scaled_placed, used_penalty)
}

fn as_int(value: Val) -> i32 {
    match value {
        Val::ValI(v) => v,
        Val::ValF(v) => v as i32,
    }
}

fn extract_placements(solution: &Solution, instances: &[StockInstance], units: &[PieceUnit], table: &VariableTable) -> Vec<PlacedPiece> {
    let mut result = Vec::new();
    for (ui, unit) in units.iter().enumerate() {
        for (s, instance) in instances.iter().enumerate() {
            if as_int(solution[table.placed[ui][s]]) == 0 {
                continue;
            }
            let px = as_int(solution[table.x[ui][s]]) as f64;
            let py = as_int(solution[table.y[ui][s]]) as f64;
            let degrees = as_int(solution[table.rot[ui][s]]) as u16;
            let rotation = Rotation::from_degrees(degrees).unwrap_or(Rotation::R0);
            result.push(PlacedPiece::new(unit.piece_id, px, py, rotation, instance.id));
        }
    }
    result
}

fn solve_group(instances: &[StockInstance], pieces: &[Piece], settings: &OptimizationSettings) -> Vec<PlacedPiece> {
    let units = expand_piece_units(pieces, settings);
    if units.is_empty() || instances.is_empty() {
        return Vec::new();
    }

    let (mut model, table) = build_model(instances, &units, settings);
    let obj = objective(&mut model, &table, instances.len());

    match model.maximize(obj) {
        Ok(solution) => extract_placements(&solution, instances, &units, &table),
        Err(SolverError::Timeout { .. }) => {
            warn!("refiner timed out before proving optimality");
            Vec::new()
        }
        Err(_) => Vec::new(),
    }
}

/// Runs the constraint-programming refiner. Returns an independent placement
/// set; the finalizer decides how heuristic and refiner output combine.
pub fn refine(stocks: &[Stock], pieces: &[Piece], settings: &OptimizationSettings, cancellation: &CancellationToken) -> Vec<PlacedPiece> {
    if cancellation.is_cancelled() {
        return Vec::new();
    }

    let thread_count = if settings.enable_multithreading { settings.max_threads.max(1) } else { 1 };
    let groups = partition(stocks, pieces, thread_count);
    debug!(groups = groups.len(), threads = thread_count, "refiner partitioned stock instances");

    let run_group = |(instances, group_pieces): &(Vec<StockInstance>, Vec<Piece>)| -> Vec<PlacedPiece> {
        if cancellation.is_cancelled() || instances.is_empty() || group_pieces.is_empty() {
            return Vec::new();
        }
        solve_group(instances, group_pieces, settings)
    };

    if thread_count > 1 {
        groups.par_iter().map(run_group).flatten().collect()
    } else {
        groups.iter().map(run_group).flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stock as DomainStock;

    fn settings() -> OptimizationSettings {
        OptimizationSettings { time_limit_seconds: 5, enable_multithreading: false, ..OptimizationSettings::default() }
    }

    #[test]
    fn proportional_share_sums_to_total() {
        let total = 10;
        let groups = 3;
        let sum: u32 = (0..groups).map(|g| proportional_share(total, groups, g)).sum();
        assert_eq!(sum, total);
    }

    #[test]
    fn refine_places_pieces_that_fit() {
        let stocks = vec![DomainStock::new("Sheet", 10.0, 10.0, 1)];
        let pieces = vec![Piece::new("Tile", 5.0, 5.0, 2)];
        let placements = refine(&stocks, &pieces, &settings(), &CancellationToken::new());
        assert!(placements.len() <= 2);
    }

    #[test]
    fn refine_returns_empty_when_cancelled() {
        let stocks = vec![DomainStock::new("Sheet", 10.0, 10.0, 1)];
        let pieces = vec![Piece::new("Tile", 5.0, 5.0, 1)];
        let token = CancellationToken::new();
        token.cancel();
        let placements = refine(&stocks, &pieces, &settings(), &token);
        assert!(placements.is_empty());
    }

    #[test]
    fn refine_returns_empty_for_oversized_piece() {
        let stocks = vec![DomainStock::new("Sheet", 5.0, 5.0, 1)];
        let pieces = vec![Piece::new("TooBig", 10.0, 10.0, 1)];
        let placements = refine(&stocks, &pieces, &settings(), &CancellationToken::new());
        assert!(placements.is_empty());
    }
}
