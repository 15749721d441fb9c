//! Rectangular cutting-stock optimization engine.
//!
//! Pipeline: [`validator`] checks a problem is solvable in principle,
//! [`heuristic`] greedily seats pieces for a fast first answer, [`refiner`]
//! spends the remaining time budget on a constraint-programming search for a
//! better one, and [`finalizer`] reconciles both into one [`types::CuttingPlan`].
//! [`orchestrator::optimize`] is the crate's single async entry point and
//! sequences all four.

pub mod config;
pub mod error;
pub mod finalizer;
pub mod geometry;
pub mod heuristic;
pub mod orchestrator;
pub mod progress;
pub mod refiner;
pub mod types;
pub mod validator;

pub use config::{HeuristicStrategy, OptimizationSettings};
pub use error::EngineError;
pub use geometry::{Rect, Rotation};
pub use orchestrator::{optimize, optimize_default};
pub use progress::{CancellationToken, ChannelProgressSink, NullPerformanceMonitor, NullProgressSink, PerformanceMonitor, PerformanceSample, Phase, ProgressEvent, ProgressSink};
pub use types::{CuttingPlan, Piece, PieceId, PlacedPiece, PlacedPieceId, PlanId, PlanMetrics, RotationSet, Stock, StockId, StockInstanceId};
pub use validator::ValidationResult;

/// Result alias used throughout the engine's public API.
pub type Result<T> = std::result::Result<T, EngineError>;
