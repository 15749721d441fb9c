//! Engine configuration (`OptimizationSettings`).
//!
//! Settings are immutable for the duration of one optimization; the orchestrator
//! clones them into each stage rather than sharing a mutable reference.

use serde::{Deserialize, Serialize};

use crate::types::RotationSet;

/// Ordering rule used by the heuristic placer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeuristicStrategy {
    LargestFirst,
    SmallestFirst,
    PerimeterDescending,
    PerimeterAscending,
    Random,
}

impl Default for HeuristicStrategy {
    fn default() -> Self {
        HeuristicStrategy::LargestFirst
    }
}

/// Recognized optimization options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSettings {
    /// Enable 90-degree rotation variants during search.
    pub enable_rotation: bool,
    /// Global cap on which rotations the refiner may use, independent of any
    /// individual piece's own policy.
    pub allowed_rotations: RotationSet,
    /// Permit the refiner to split its model across worker threads.
    pub enable_multithreading: bool,
    /// Cap on the refiner's worker thread count.
    pub max_threads: usize,
    /// Wall-clock budget for the refiner, in seconds.
    pub time_limit_seconds: u64,
    /// Acceptable relative gap from the refiner's internal bound before it may
    /// stop early.
    pub gap_tolerance: f64,
    /// Allow the refiner to collapse equivalent placements via symmetry-breaking
    /// constraints.
    pub enable_symmetry_breaking: bool,
    /// Include the heuristic pre-arrangement stage (component C) at all.
    pub enable_heuristic_pre_arrangement: bool,
    /// Ordering rule for the heuristic stage.
    pub heuristic_strategy: HeuristicStrategy,
    /// Permit the heuristic's first-fit fallback search.
    pub enable_greedy_placement: bool,
    /// Seed for the `Random` heuristic strategy; `None` draws fresh entropy.
    pub random_seed: Option<u64>,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            enable_rotation: true,
            allowed_rotations: RotationSet::ALL,
            enable_multithreading: true,
            max_threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            time_limit_seconds: 30,
            gap_tolerance: 0.0,
            enable_symmetry_breaking: true,
            enable_heuristic_pre_arrangement: true,
            heuristic_strategy: HeuristicStrategy::default(),
            enable_greedy_placement: true,
            random_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_max_threads_is_positive() {
        assert!(OptimizationSettings::default().max_threads >= 1);
    }

    #[test]
    fn default_strategy_is_largest_first() {
        assert_eq!(OptimizationSettings::default().heuristic_strategy, HeuristicStrategy::LargestFirst);
    }
}
