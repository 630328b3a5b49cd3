//! Configuration constants and defaults for worker behaviour.
//!
//! These values correspond to the `workers` section of
//! `homestead-config.yaml`. The [`BehaviorConfig`] struct bundles every
//! tunable so that callers (tick cycle, tests) can override defaults.

/// Movement credit a worker earns per tick. Step costs are counted in
/// these units so fractional diagonal costs accumulate exactly.
pub const MOVE_UNITS_PER_TICK: u32 = 100;

/// Configuration for the per-tick worker decision procedure.
///
/// The core crate builds this from `homestead-config.yaml` at start-up and
/// stores it in the colony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorConfig {
    /// Ticks between meals (default: 2400).
    ///
    /// Food with a non-zero nourishment value overrides this for the meal
    /// that consumed it.
    pub hunger_interval_ticks: u64,

    /// Ticks to wait before trying again after a meal could not be found
    /// or produced (default: 200).
    pub eat_retry_ticks: u64,

    /// Ticks a building waits before requesting a recipe again after a
    /// task for it could not be resolved (default: 200).
    pub request_retry_ticks: u64,

    /// Work ticks needed to finish a meal (default: 20).
    pub meal_ticks: u32,

    /// Item names workers will eat, in preference order
    /// (default: Berries, Wheat).
    pub edible_items: Vec<String>,

    /// Ticks to cross a tile with walking lag 1 (default: 1).
    pub base_step_ticks: u32,

    /// Diagonal step cost relative to a straight step, in percent
    /// (default: 140).
    pub diagonal_pct: u32,

    /// Maximum tiles a single search may examine (default: 10000).
    pub search_limit: u32,

    /// How deep producer sub-tasks may nest beneath a task (default: 4).
    pub max_subtask_depth: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            hunger_interval_ticks: 2400,
            eat_retry_ticks: 200,
            request_retry_ticks: 200,
            meal_ticks: 20,
            edible_items: vec![String::from("Berries"), String::from("Wheat")],
            base_step_ticks: 1,
            diagonal_pct: 140,
            search_limit: 10_000,
            max_subtask_depth: 4,
        }
    }
}

impl BehaviorConfig {
    /// Movement cost of stepping onto a tile with walking lag `lag`, in
    /// hundredths of a tick.
    ///
    /// Diagonal steps are scaled by `diagonal_pct`. The result is never
    /// below one whole tick, so a worker lands at most one step per tick.
    pub fn step_cost(&self, lag: u32, diagonal: bool) -> u32 {
        let straight = lag
            .saturating_mul(self.base_step_ticks)
            .saturating_mul(MOVE_UNITS_PER_TICK);
        let cost = if diagonal {
            straight
                .saturating_mul(self.diagonal_pct)
                .checked_div(100)
                .unwrap_or(straight)
        } else {
            straight
        };
        cost.max(MOVE_UNITS_PER_TICK)
    }
}
