//! Top-level orchestration.
//!
//! Sequences validator → heuristic pre-arrangement → constraint-programming
//! refinement → finalization, reporting progress at each phase boundary and
//! honoring cooperative cancellation throughout. This is the crate's only
//! async entry point; every stage underneath is synchronous, so the yield
//! points below are the orchestrator's own responsibility, not the stages'.

use std::time::Instant;

use tracing::{info, instrument};

use crate::config::OptimizationSettings;
use crate::error::EngineError;
use crate::finalizer;
use crate::heuristic;
use crate::progress::{estimate_time_budget, CancellationToken, NullPerformanceMonitor, NullProgressSink, PerformanceMonitor, Phase, ProgressEvent, ProgressSink};
use crate::refiner;
use crate::types::{CuttingPlan, Piece, Stock};
use crate::validator;

const TOTAL_PHASES: u8 = 3;

fn report(sink: &dyn ProgressSink, phase: Phase, percent: f64, start: Instant, pieces_placed: usize, total_pieces: usize, utilization: f64, performance: &dyn PerformanceMonitor) {
    let sample = performance.sample();
    sink.report(ProgressEvent {
        phase_index: phase.index(),
        total_phases: TOTAL_PHASES,
        description: phase.description().to_string(),
        percent,
        pieces_placed,
        total_pieces,
        current_utilization: utilization,
        elapsed_seconds: start.elapsed().as_secs_f64(),
        memory_mb: sample.memory_mb,
        cpu_percent: sample.cpu_percent,
    });
}

/// Runs one full optimization. Validates first and returns
/// [`EngineError::InvalidProblem`] immediately if the problem is malformed;
/// otherwise always returns `Ok` with the best plan the engine could produce
/// in the time and cancellation budget it was given, even if that plan is
/// empty.
#[instrument(skip(stocks, pieces, settings, cancellation, progress, performance), fields(stocks = stocks.len(), pieces = pieces.len()))]
pub async fn optimize(
    stocks: Vec<Stock>,
    pieces: Vec<Piece>,
    settings: OptimizationSettings,
    cancellation: CancellationToken,
    progress: &dyn ProgressSink,
    performance: &dyn PerformanceMonitor,
) -> Result<CuttingPlan, EngineError> {
    let start = Instant::now();
    let total_pieces: usize = pieces.iter().map(|p| p.quantity as usize).sum();

    let validation = validator::validate(&stocks, &pieces);
    if !validation.is_valid {
        return Err(EngineError::invalid_problem(validation));
    }

    let available_cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let budget = estimate_time_budget(
        total_pieces as u64,
        stocks.iter().map(|s| s.quantity as u64).sum(),
        settings.enable_rotation,
        settings.max_threads,
        available_cores,
        settings.time_limit_seconds,
    );
    info!(estimated_seconds = budget.as_secs_f64(), "time budget estimated");

    report(progress, Phase::Heuristic, 0.0, start, 0, total_pieces, 0.0, performance);

    let heuristic_placements = heuristic::place(&stocks, &pieces, &settings, &cancellation);
    tokio::task::yield_now().await;

    report(progress, Phase::Heuristic, 50.0, start, heuristic_placements.len(), total_pieces, 0.0, performance);

    let refiner_placements = if cancellation.is_cancelled() {
        Vec::new()
    } else {
        let stocks_for_refiner = stocks.clone();
        let pieces_for_refiner = pieces.clone();
        let settings_for_refiner = settings.clone();
        let cancellation_for_refiner = cancellation.clone();
        tokio::task::spawn_blocking(move || refiner::refine(&stocks_for_refiner, &pieces_for_refiner, &settings_for_refiner, &cancellation_for_refiner))
            .await
            .unwrap_or_default()
    };

    report(progress, Phase::Refinement, 90.0, start, heuristic_placements.len() + refiner_placements.len(), total_pieces, 0.0, performance);

    let elapsed_seconds = start.elapsed().as_secs_f64();
    let plan = finalizer::finalize(
        stocks,
        pieces,
        heuristic_placements,
        refiner_placements,
        settings,
        elapsed_seconds,
        performance.sample(),
    );

    report(progress, Phase::Finalization, 100.0, start, plan.metrics.pieces_placed, total_pieces, plan.metrics.utilization_percentage, performance);

    info!(
        pieces_placed = plan.metrics.pieces_placed,
        pieces_remaining = plan.metrics.pieces_remaining,
        utilization = plan.metrics.utilization_percentage,
        "optimization complete"
    );

    Ok(plan)
}

/// Convenience wrapper around [`optimize`] for callers that don't need
/// progress reporting, performance sampling, or cancellation.
pub async fn optimize_default(stocks: Vec<Stock>, pieces: Vec<Piece>, settings: OptimizationSettings) -> Result<CuttingPlan, EngineError> {
    optimize(stocks, pieces, settings, CancellationToken::new(), &NullProgressSink, &NullPerformanceMonitor).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_problem_is_rejected_before_any_placement() {
        let result = optimize_default(Vec::new(), vec![Piece::new("A", 10.0, 10.0, 1)], OptimizationSettings::default()).await;
        assert!(matches!(result, Err(EngineError::InvalidProblem(_))));
    }

    #[tokio::test]
    async fn valid_problem_produces_a_plan() {
        let stocks = vec![Stock::new("Sheet", 100.0, 100.0, 1)];
        let pieces = vec![Piece::new("Tile", 50.0, 50.0, 2)];
        let plan = optimize_default(stocks, pieces, OptimizationSettings::default()).await.unwrap();
        assert!(plan.validate().is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start_still_produces_a_valid_empty_plan() {
        let stocks = vec![Stock::new("Sheet", 100.0, 100.0, 1)];
        let pieces = vec![Piece::new("Tile", 50.0, 50.0, 2)];
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let plan = optimize(stocks, pieces, OptimizationSettings::default(), cancellation, &NullProgressSink, &NullPerformanceMonitor)
            .await
            .unwrap();

        assert!(plan.placements.is_empty());
        assert!(plan.validate().is_empty());
    }
}
