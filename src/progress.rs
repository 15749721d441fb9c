//! Cooperative cancellation and progress reporting.
//!
//! Cancellation is a single-shot, observable signal — never an error. Progress
//! reporters and performance monitors must be internally thread-safe since the
//! refiner may sample them from worker threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A cheap, `Clone`-able, thread-safe single-shot cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One of the three phases the orchestrator sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Heuristic,
    Refinement,
    Finalization,
}

impl Phase {
    pub fn index(self) -> u8 {
        match self {
            Phase::Heuristic => 0,
            Phase::Refinement => 1,
            Phase::Finalization => 2,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Phase::Heuristic => "heuristic pre-arrangement",
            Phase::Refinement => "constraint-based refinement",
            Phase::Finalization => "plan finalization",
        }
    }
}

/// A single progress update emitted at a phase boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase_index: u8,
    pub total_phases: u8,
    pub description: String,
    pub percent: f64,
    pub pieces_placed: usize,
    pub total_pieces: usize,
    pub current_utilization: f64,
    pub elapsed_seconds: f64,
    pub memory_mb: Option<f64>,
    pub cpu_percent: Option<f64>,
}

/// Receives progress events. Implementors must be `Send + Sync`: the refiner may
/// report from worker threads.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards every event. The default when a caller doesn't care about progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events over a `crossbeam` channel, the same worker/channel
/// plumbing a background solver uses elsewhere in this crate. A disconnected
/// receiver is treated the same as "nobody is listening" — reporting never
/// blocks the hot path.
pub struct ChannelProgressSink {
    sender: crossbeam::channel::Sender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, crossbeam::channel::Receiver<ProgressEvent>) {
        let (sender, receiver) = crossbeam::channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn report(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}

/// An advisory memory/CPU snapshot. Real sampling is a host/collaborator
/// concern; the engine only defines the seam.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceSample {
    pub memory_mb: Option<f64>,
    pub cpu_percent: Option<f64>,
}

/// Supplies advisory performance samples. Must be `Send + Sync`.
pub trait PerformanceMonitor: Send + Sync {
    fn sample(&self) -> PerformanceSample;
}

/// Always reports nothing. The default performance monitor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPerformanceMonitor;

impl PerformanceMonitor for NullPerformanceMonitor {
    fn sample(&self) -> PerformanceSample {
        PerformanceSample::default()
    }
}

/// Estimates wall-clock for a problem of the given complexity. Purely
/// informational — never gates the actual run.
pub fn estimate_time_budget(
    total_piece_quantity: u64,
    total_stock_quantity: u64,
    enable_rotation: bool,
    max_threads: usize,
    available_cores: usize,
    time_limit_seconds: u64,
) -> Duration {
    let complexity = total_piece_quantity * total_stock_quantity * if enable_rotation { 4 } else { 1 };
    let base_seconds: u64 = if complexity < 100 {
        1
    } else if complexity < 500 {
        5
    } else if complexity < 1000 {
        15
    } else if complexity < 5000 {
        60
    } else {
        300
    };
    let divisor = max_threads.min(available_cores).max(1) as u64;
    let estimated = (base_seconds / divisor).max(1).min(time_limit_seconds.max(1));
    Duration::from_secs(estimated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_observable_after_cancel() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancellation_clone_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn time_budget_is_capped_by_time_limit() {
        let estimate = estimate_time_budget(10_000, 10_000, true, 1, 1, 5);
        assert_eq!(estimate, Duration::from_secs(5));
    }

    #[test]
    fn time_budget_shrinks_with_more_threads() {
        let one_thread = estimate_time_budget(200, 10, true, 1, 1, 300);
        let many_threads = estimate_time_budget(200, 10, true, 8, 8, 300);
        assert!(many_threads <= one_thread);
    }
}
