//! Error taxonomy for the optimization engine.
//!
//! Only [`EngineError::InvalidProblem`] aborts an optimization before any placement
//! is attempted. Every other stage-level failure degrades gracefully inside the
//! orchestrator and never reaches the caller as an `Err`.

use thiserror::Error;

use crate::validator::ValidationResult;

/// Errors the engine can report to a caller of [`crate::orchestrator::optimize`].
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Validation found one or more problems with the input; no placement was attempted.
    #[error("invalid problem: {0:?}", .0.errors)]
    InvalidProblem(ValidationResult),
}

impl EngineError {
    pub fn invalid_problem(result: ValidationResult) -> Self {
        Self::InvalidProblem(result)
    }
}

/// Internal, per-stage failure reasons. These never escape the orchestrator as
/// `Err` values — a failing stage simply contributes an empty placement set.
/// Kept as a type so stages can log *why* they produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage ran to completion.
    Completed,
    /// A cooperative cancellation signal was observed mid-stage.
    Cancelled,
    /// The refiner's solver exhausted its time budget before an incumbent appeared.
    SolverDeadline,
    /// The refiner proved the model infeasible.
    Infeasible,
    /// The finalizer detected and dropped a placement that violated a geometric
    /// invariant; this should be unreachable and is logged as a warning, never an
    /// error.
    InternalGeometryInvariantViolated { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValidationResult;

    #[test]
    fn invalid_problem_carries_validation_result() {
        let mut result = ValidationResult::default();
        result.errors.push("No stock materials provided".to_string());
        let err = EngineError::invalid_problem(result.clone());
        match err {
            EngineError::InvalidProblem(r) => assert_eq!(r.errors, result.errors),
        }
    }
}
