//! One tick of the colony.
//!
//! [`run_tick`] is the whole simulated step: advance the clock, let every
//! worker act in order, give buildings their update hook, and spoil
//! expired perishables. Everything a renderer needs to know about the tick
//! comes back in a [`TickSummary`].
//!
//! Worker order is fixed (the order of `Colony::workers`), which is what
//! keeps claims first-come-first-served.

use tracing::debug;

use homestead_agents::{Colony, DirtySet, StepOutcome, step_worker};
use homestead_types::WorkerId;

use crate::clock::{self, ClockError};

/// Errors that can stop the tick cycle.
///
/// Task failures are not among them: workers cancel and log those
/// themselves.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The clock could not advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// How many workers ended the tick in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    /// Had nothing to do.
    pub idle: u32,
    /// Walked or waited on a step.
    pub moving: u32,
    /// Put work into a recipe, or picked something up.
    pub working: u32,
    /// Queued a producer or relocation sub-task.
    pub queued: u32,
    /// Finished a unit or a whole task.
    pub completed: u32,
    /// Cancelled their active task.
    pub cancelled: u32,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: StepOutcome) {
        let slot = match outcome {
            StepOutcome::Idle => &mut self.idle,
            StepOutcome::Moving => &mut self.moving,
            StepOutcome::Worked | StepOutcome::PickedUp => &mut self.working,
            StepOutcome::SubTaskQueued | StepOutcome::RelocationQueued => &mut self.queued,
            StepOutcome::UnitCompleted | StepOutcome::Completed => &mut self.completed,
            StepOutcome::Cancelled => &mut self.cancelled,
        };
        *slot = slot.saturating_add(1);
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// The tick that just ran.
    pub tick: u64,
    /// Per-worker outcomes.
    pub outcomes: OutcomeCounts,
    /// Tasks queued by building update hooks.
    pub tasks_requested: usize,
    /// Perishables destroyed.
    pub items_spoiled: usize,
    /// Live tasks after the tick.
    pub live_tasks: usize,
    /// Consistency violations found. Only checked in debug builds.
    pub violations: usize,
    /// What the renderer should redraw.
    pub dirty: DirtySet,
}

/// Execute a single tick.
///
/// # Errors
///
/// Returns [`TickError::Clock`] if the tick counter would overflow.
pub fn run_tick(colony: &mut Colony) -> Result<TickSummary, TickError> {
    colony.tick = clock::next_tick(colony.tick)?;
    let tick = colony.tick;

    let mut outcomes = OutcomeCounts::default();
    let order: Vec<WorkerId> = colony.workers.iter().map(|worker| worker.id).collect();
    for worker in order {
        outcomes.record(step_worker(colony, worker));
    }

    let tasks_requested = colony.update_buildings();
    let items_spoiled = colony.spoil_items();
    let violations = check_consistency(colony);
    let dirty = colony.take_dirty();

    debug!(
        tick,
        idle = outcomes.idle,
        moving = outcomes.moving,
        working = outcomes.working,
        completed = outcomes.completed,
        cancelled = outcomes.cancelled,
        tasks_requested,
        items_spoiled,
        live_tasks = colony.tasks.len(),
        "Tick complete"
    );

    Ok(TickSummary {
        tick,
        outcomes,
        tasks_requested,
        items_spoiled,
        live_tasks: colony.tasks.len(),
        violations,
        dirty,
    })
}

#[cfg(debug_assertions)]
fn check_consistency(colony: &Colony) -> usize {
    let violations = colony.check_invariants();
    for violation in &violations {
        tracing::warn!(tick = colony.tick, violation = ?violation, "Colony invariant violated");
    }
    violations.len()
}

#[cfg(not(debug_assertions))]
const fn check_consistency(_colony: &Colony) -> usize {
    0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homestead_agents::{BehaviorConfig, Catalog};
    use homestead_types::{Coord, Terrain};
    use homestead_world::TileMap;

    use super::*;

    fn colony() -> Colony {
        let world = TileMap::filled(8, 8, Terrain::Grass);
        Colony::new(world, Catalog::standard(), BehaviorConfig::default())
    }

    #[test]
    fn tick_advances_clock() {
        let mut colony = colony();
        let summary = run_tick(&mut colony).unwrap();
        assert_eq!(summary.tick, 1);
        assert_eq!(colony.tick, 1);
        let summary = run_tick(&mut colony).unwrap();
        assert_eq!(summary.tick, 2);
    }

    #[test]
    fn idle_workers_are_counted() {
        let mut colony = colony();
        colony.add_worker("Ada", Coord::new(1, 1));
        colony.add_worker("Bo", Coord::new(2, 2));
        let summary = run_tick(&mut colony).unwrap();
        assert_eq!(summary.outcomes.idle, 2);
        assert_eq!(summary.violations, 0);
    }

    #[test]
    fn building_hook_runs_each_tick() {
        let mut colony = colony();
        colony.add_building("Flint Knapper", Coord::new(3, 3)).unwrap();
        let summary = run_tick(&mut colony).unwrap();
        assert!(summary.tasks_requested > 0);
        assert_eq!(summary.live_tasks, colony.tasks.len());
    }

    #[test]
    fn overflow_is_an_error() {
        let mut colony = colony();
        colony.tick = u64::MAX;
        assert!(matches!(
            run_tick(&mut colony),
            Err(TickError::Clock {
                source: ClockError::TickOverflow
            })
        ));
    }
}
