//! Problem validator.
//!
//! Rules E1-E5 and W1 are evaluated independently and all accumulate; the
//! validator never short-circuits on the first problem so a caller sees every
//! issue in one pass.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{Piece, Stock};

/// Outcome of validating a stock/piece list pair, with enough detail to explain
/// itself in a log line or to a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub total_stock_area: f64,
    pub total_piece_area: f64,
    pub estimated_utilization: f64,
}

impl ValidationResult {
    /// A single line combining errors and warnings, for logging.
    pub fn summary(&self) -> String {
        if self.errors.is_empty() && self.warnings.is_empty() {
            return "valid, no warnings".to_string();
        }
        let mut parts = Vec::new();
        if !self.errors.is_empty() {
            parts.push(format!("errors: [{}]", self.errors.join("; ")));
        }
        if !self.warnings.is_empty() {
            parts.push(format!("warnings: [{}]", self.warnings.join("; ")));
        }
        parts.join(", ")
    }
}

/// Validates a stock/piece list pair without mutating either.
pub fn validate(stocks: &[Stock], pieces: &[Piece]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // E1
    if stocks.is_empty() {
        errors.push("No stock materials provided".to_string());
    }
    // E2
    if pieces.is_empty() {
        errors.push("No pieces to cut provided".to_string());
    }

    // E4: per-stock dimension sanity
    for stock in stocks {
        if stock.width <= 0.0 || stock.height <= 0.0 {
            errors.push(format!(
                "Stock '{}' has non-positive dimensions ({}x{})",
                stock.name, stock.width, stock.height
            ));
        }
    }

    // E5: per-piece dimension sanity
    for piece in pieces {
        if piece.width <= 0.0 || piece.height <= 0.0 {
            errors.push(format!(
                "Piece '{}' has non-positive dimensions ({}x{})",
                piece.name, piece.width, piece.height
            ));
        }
    }

    let total_stock_area: f64 = stocks.iter().map(Stock::total_area).sum();
    let total_piece_area: f64 = pieces.iter().map(Piece::total_area).sum();

    // E3
    if total_piece_area > total_stock_area {
        errors.push(format!(
            "Total piece area {:.2} exceeds total stock area {:.2}",
            total_piece_area, total_stock_area
        ));
    }

    let estimated_utilization = if total_stock_area > 0.0 {
        100.0 * total_piece_area / total_stock_area
    } else {
        0.0
    };

    // W1
    if estimated_utilization < 50.0 && total_stock_area > 0.0 {
        warnings.push(format!("Estimated utilization is low: {:.1}%", estimated_utilization));
    }

    let is_valid = errors.is_empty();
    let result = ValidationResult {
        is_valid,
        errors,
        warnings,
        total_stock_area,
        total_piece_area,
        estimated_utilization,
    };

    if is_valid {
        debug!(summary = %result.summary(), "problem validated");
    } else {
        warn!(summary = %result.summary(), "problem validation failed");
    }

    result
}
