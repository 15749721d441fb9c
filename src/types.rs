//! Domain entities for the cutting-stock problem.
//!
//! Placements reference their source piece by id, not by owning pointer, to keep
//! the plan trivially serializable and free of aliasing: `CuttingPlan.pieces` is the
//! read-only lookup table every [`PlacedPiece`] indexes into.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{effective_dims, Rect, Rotation};

fn next_id(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed)
}

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            pub fn next() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(1);
                Self(next_id(&COUNTER))
            }
        }
    };
}

id_type!(StockId);
id_type!(PieceId);
id_type!(PlacedPieceId);
id_type!(PlanId);

/// Which 90-degree rotations (beyond the always-allowed R0) a piece may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSet {
    pub r90: bool,
    pub r180: bool,
    pub r270: bool,
}

impl RotationSet {
    pub const NONE: Self = Self { r90: false, r180: false, r270: false };
    pub const ALL: Self = Self { r90: true, r180: true, r270: true };

    pub fn allows(&self, rotation: Rotation) -> bool {
        match rotation {
            Rotation::R0 => true,
            Rotation::R90 => self.r90,
            Rotation::R180 => self.r180,
            Rotation::R270 => self.r270,
        }
    }

    /// The rotations this set permits, always including R0.
    pub fn permitted(&self) -> Vec<Rotation> {
        Rotation::ALL.into_iter().filter(|r| self.allows(*r)).collect()
    }
}

impl Default for RotationSet {
    fn default() -> Self {
        Self::NONE
    }
}

/// A rectangular sheet of material available in a given multiplicity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub quantity: u32,
    pub material: Option<String>,
    pub thickness: Option<f64>,
    pub cost_per_area: Option<f64>,
}

impl Stock {
    pub fn new(name: impl Into<String>, width: f64, height: f64, quantity: u32) -> Self {
        Self {
            id: StockId::next(),
            name: name.into(),
            width,
            height,
            quantity,
            material: None,
            thickness: None,
            cost_per_area: None,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn total_area(&self) -> f64 {
        self.area() * self.quantity as f64
    }
}

/// A rectangular part that must be produced, in a given multiplicity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub quantity: u32,
    pub allow_rotation: bool,
    pub allowed_rotations: RotationSet,
}

impl Piece {
    pub fn new(name: impl Into<String>, width: f64, height: f64, quantity: u32) -> Self {
        Self {
            id: PieceId::next(),
            name: name.into(),
            width,
            height,
            quantity,
            allow_rotation: false,
            allowed_rotations: RotationSet::NONE,
        }
    }

    pub fn with_rotation(mut self, allowed_rotations: RotationSet) -> Self {
        self.allow_rotation = true;
        self.allowed_rotations = allowed_rotations;
        self
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn total_area(&self) -> f64 {
        self.area() * self.quantity as f64
    }

    /// Rotations usable for this piece under its own policy and the engine-wide
    /// `enable_rotation` switch.
    pub fn candidate_rotations(&self, enable_rotation: bool) -> Vec<Rotation> {
        if !enable_rotation || !self.allow_rotation {
            vec![Rotation::R0]
        } else {
            self.allowed_rotations.permitted()
        }
    }
}

/// Identifies one physical instance of a stock (index in `[0, quantity)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockInstanceId {
    pub stock_id: StockId,
    pub instance_index: u32,
}

/// A piece instance assigned a position and rotation on a stock instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedPiece {
    pub id: PlacedPieceId,
    pub piece_id: PieceId,
    pub x: f64,
    pub y: f64,
    pub rotation: Rotation,
    pub stock_instance: StockInstanceId,
}

impl PlacedPiece {
    pub fn new(piece_id: PieceId, x: f64, y: f64, rotation: Rotation, stock_instance: StockInstanceId) -> Self {
        Self { id: PlacedPieceId::next(), piece_id, x, y, rotation, stock_instance }
    }

    /// The occupied rectangle, given the source piece's un-rotated dimensions.
    pub fn rect(&self, piece_width: f64, piece_height: f64) -> Rect {
        let (w, h) = effective_dims(piece_width, piece_height, self.rotation);
        Rect::new(self.x, self.y, w, h)
    }
}

/// A snapshot of recognized optimization options. Defined fully in
/// [`crate::config`]; re-exported here so `CuttingPlan` can embed it without a
/// circular module reference.
pub use crate::config::OptimizationSettings;

/// Aggregate metrics computed by the finalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetrics {
    pub total_stock_area: f64,
    pub total_placed_area: f64,
    pub utilization_percentage: f64,
    pub pieces_placed: usize,
    pub pieces_remaining: usize,
    pub optimization_time_seconds: f64,
    pub memory_mb: Option<f64>,
    pub cpu_percent: Option<f64>,
}

/// The complete output of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuttingPlan {
    pub id: PlanId,
    pub created_at: DateTime<Utc>,
    pub stocks: Vec<Stock>,
    pub pieces: Vec<Piece>,
    pub placements: Vec<PlacedPiece>,
    pub settings: OptimizationSettings,
    pub metrics: PlanMetrics,
    /// Non-fatal diagnostics recorded during finalization (e.g. a dropped
    /// placement that violated a geometric invariant).
    pub warnings: Vec<String>,
}

impl CuttingPlan {
    fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.id == id)
    }

    fn stock(&self, id: StockId) -> Option<&Stock> {
        self.stocks.iter().find(|s| s.id == id)
    }

    /// Re-checks containment and non-overlap against the plan's current
    /// placements. An empty error list is the finalizer's post-condition.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for placement in &self.placements {
            let Some(piece) = self.piece(placement.piece_id) else {
                errors.push(format!("placement {:?} references unknown piece", placement.id));
                continue;
            };
            let Some(stock) = self.stock(placement.stock_instance.stock_id) else {
                errors.push(format!("placement {:?} references unknown stock", placement.id));
                continue;
            };
            let rect = placement.rect(piece.width, piece.height);
            if !crate::geometry::fits(&rect, stock.width, stock.height) {
                errors.push(format!(
                    "placement {:?} of piece {:?} does not fit stock instance {:?}",
                    placement.id, piece.id, placement.stock_instance
                ));
            }
        }

        for (i, a) in self.placements.iter().enumerate() {
            for b in self.placements.iter().skip(i + 1) {
                if a.stock_instance != b.stock_instance {
                    continue;
                }
                let (Some(pa), Some(pb)) = (self.piece(a.piece_id), self.piece(b.piece_id)) else {
                    continue;
                };
                let ra = a.rect(pa.width, pa.height);
                let rb = b.rect(pb.width, pb.height);
                if crate::geometry::overlap(&ra, &rb) {
                    errors.push(format!("placements {:?} and {:?} overlap", a.id, b.id));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_area_and_total_area() {
        let s = Stock::new("Birch ply", 100.0, 50.0, 3);
        assert_eq!(s.area(), 5000.0);
        assert_eq!(s.total_area(), 15000.0);
    }

    #[test]
    fn piece_candidate_rotations_respects_policy() {
        let piece = Piece::new("Shelf", 10.0, 20.0, 1);
        assert_eq!(piece.candidate_rotations(true), vec![Rotation::R0]);

        let rotatable = piece.with_rotation(RotationSet { r90: true, r180: false, r270: false });
        assert_eq!(rotatable.candidate_rotations(true), vec![Rotation::R0, Rotation::R90]);
        assert_eq!(rotatable.candidate_rotations(false), vec![Rotation::R0]);
    }

    #[test]
    fn ids_are_unique_and_monotonic() {
        let a = StockId::next();
        let b = StockId::next();
        assert!(b.0 > a.0);
    }

    #[test]
    fn validate_reports_overlap() {
        let piece = Piece::new("A", 10.0, 10.0, 2);
        let stock = Stock::new("Sheet", 100.0, 100.0, 1);
        let instance = StockInstanceId { stock_id: stock.id, instance_index: 0 };
        let p1 = PlacedPiece::new(piece.id, 0.0, 0.0, Rotation::R0, instance);
        let p2 = PlacedPiece::new(piece.id, 5.0, 5.0, Rotation::R0, instance);

        let plan = CuttingPlan {
            id: PlanId::next(),
            created_at: Utc::now(),
            stocks: vec![stock],
            pieces: vec![piece],
            placements: vec![p1, p2],
            settings: OptimizationSettings::default(),
            metrics: PlanMetrics {
                total_stock_area: 10000.0,
                total_placed_area: 200.0,
                utilization_percentage: 2.0,
                pieces_placed: 2,
                pieces_remaining: 0,
                optimization_time_seconds: 0.0,
                memory_mb: None,
                cpu_percent: None,
            },
            warnings: Vec::new(),
        };

        let errors = plan.validate();
        assert_eq!(errors.len(), 1);
    }
}
