//! Rectangle math: overlap, containment, and rotation bookkeeping.
//!
//! Everything here is pure and allocation-free; it has no opinion about stock,
//! pieces, or the optimization stages that consume it.

use serde::{Deserialize, Serialize};

/// Rotation of a piece, in 90-degree increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// All four rotations, in degree order.
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::R0),
            90 => Some(Rotation::R90),
            180 => Some(Rotation::R180),
            270 => Some(Rotation::R270),
            _ => None,
        }
    }

    /// True if this rotation swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::R90 | Rotation::R270)
    }
}

/// An axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Effective (width, height) of a piece once `rotation` is applied.
pub fn effective_dims(width: f64, height: f64, rotation: Rotation) -> (f64, f64) {
    if rotation.swaps_dimensions() {
        (height, width)
    } else {
        (width, height)
    }
}

/// True iff the open rectangles `a` and `b` overlap. Edge contact is not overlap.
pub fn overlap(a: &Rect, b: &Rect) -> bool {
    a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom()
}

/// True iff `rect` lies fully within `[0, width] x [0, height]`.
pub fn fits(rect: &Rect, width: f64, height: f64) -> bool {
    rect.x >= 0.0 && rect.y >= 0.0 && rect.right() <= width && rect.bottom() <= height
}

/// True iff none of `existing` overlaps `candidate`.
pub fn fits_without_overlap(candidate: &Rect, existing: &[Rect], width: f64, height: f64) -> bool {
    fits(candidate, width, height) && existing.iter().all(|other| !overlap(candidate, other))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_contact_is_not_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!overlap(&a, &b));
    }

    #[test]
    fn overlapping_rects_detected() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert!(overlap(&a, &b));
    }

    #[test]
    fn fits_checks_bounds() {
        let r = Rect::new(90.0, 90.0, 10.0, 10.0);
        assert!(fits(&r, 100.0, 100.0));
        assert!(!fits(&r, 99.0, 100.0));
        let negative = Rect::new(-1.0, 0.0, 10.0, 10.0);
        assert!(!fits(&negative, 100.0, 100.0));
    }

    #[test]
    fn rotation_swaps_dims_only_for_90_270() {
        assert_eq!(effective_dims(3.0, 5.0, Rotation::R0), (3.0, 5.0));
        assert_eq!(effective_dims(3.0, 5.0, Rotation::R90), (5.0, 3.0));
        assert_eq!(effective_dims(3.0, 5.0, Rotation::R180), (3.0, 5.0));
        assert_eq!(effective_dims(3.0, 5.0, Rotation::R270), (5.0, 3.0));
    }

    #[test]
    fn rotation_degrees_roundtrip() {
        for r in Rotation::ALL {
            assert_eq!(Rotation::from_degrees(r.degrees()), Some(r));
        }
        assert_eq!(Rotation::from_degrees(45), None);
    }
}
