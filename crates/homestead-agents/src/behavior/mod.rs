//! The per-tick worker decision procedure.
//!
//! [`step_worker`] runs once per worker per tick, in the colony's worker
//! order. Each call walks the pipeline below and stops at the first stage
//! that has something to do:
//!
//! 1. Hunger check: queue a meal on top of the stack when the timer has run out.
//! 2. Acquisition: take the oldest assignable task when the stack is empty.
//! 3. Work-site resolution, recipe selection, shortfall resolution, and
//!    relocation (`resolve`).
//! 4. Movement toward the target (`movement`).
//! 5. Execution once co-located (`execute`).
//!
//! Any [`TaskError`] cancels the active task (or, for an unresolvable
//! recipe, the whole chain it belongs to). An unresolvable building task
//! also makes its building hold off requesting that recipe for
//! `request_retry_ticks`. Nothing here is fatal.
//!
//! # Submodules
//!
//! - `acquire` -- Hunger check and task acquisition.
//! - `resolve` -- Work site, input selection, shortfall, relocation.
//! - `movement` -- Path caching and per-step walking delay.
//! - `execute` -- Work ticks, tool wear, completion, item moves.

mod acquire;
mod execute;
mod movement;
mod resolve;

use tracing::{debug, warn};

use homestead_types::{TaskId, WorkerId};

use crate::colony::Colony;
use crate::error::TaskError;
use crate::task::{Task, TaskKind};

/// What a worker did this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do.
    Idle,
    /// A producer sub-task was pushed for a missing input.
    SubTaskQueued,
    /// Move sub-tasks were pushed to bring inputs to the work site.
    RelocationQueued,
    /// Walked, or waited out a step's delay.
    Moving,
    /// Put one tick of work into a recipe.
    Worked,
    /// Picked an item up for a move task.
    PickedUp,
    /// Finished one unit of a batch; more remain.
    UnitCompleted,
    /// Finished a task, which has been deleted.
    Completed,
    /// The active task failed and was cancelled.
    Cancelled,
}

/// Run one tick of the decision procedure for a worker.
pub fn step_worker(colony: &mut Colony, worker: WorkerId) -> StepOutcome {
    acquire::check_hunger(colony, worker);
    let Some(task) = acquire::active_task(colony, worker) else {
        return StepOutcome::Idle;
    };
    match advance(colony, worker, task) {
        Ok(outcome) => outcome,
        Err(err) => {
            cancel(colony, worker, task, &err);
            StepOutcome::Cancelled
        }
    }
}

fn advance(colony: &mut Colony, worker: WorkerId, task_id: TaskId) -> Result<StepOutcome, TaskError> {
    let task = colony
        .tasks
        .get(task_id)
        .ok_or(TaskError::TaskNotFound(task_id))?;
    if let TaskKind::MoveItem { .. } = task.kind {
        return execute::step_move(colony, worker, task_id);
    }
    let recipe = task
        .recipe
        .clone()
        .ok_or(TaskError::TaskNotFound(task_id))?;

    let target = match resolve::prepare(colony, worker, task_id, &recipe)? {
        resolve::Prepared::Ready(target) => target,
        resolve::Prepared::Queued(outcome) => return Ok(outcome),
    };

    let position = colony
        .worker(worker)
        .ok_or(TaskError::WorkerNotFound(worker))?
        .position;
    if position != target {
        return movement::advance(colony, worker, target);
    }
    execute::work(colony, worker, task_id, &recipe, target)
}

/// Cancel a failed task and make sure the worker lets go of it.
fn cancel(colony: &mut Colony, worker: WorkerId, task: TaskId, err: &TaskError) {
    let doomed = match err {
        TaskError::UnresolvableRecipe { .. } => colony.tasks.root_of(task),
        _ => task,
    };
    let was_meal = [task, doomed]
        .iter()
        .any(|&id| colony.tasks.get(id).is_some_and(Task::is_meal));
    warn!(
        tick = colony.tick,
        worker = %worker,
        task = %task,
        cancelled = %doomed,
        error = %err,
        "Task cancelled"
    );

    let deferred = match err {
        TaskError::UnresolvableRecipe { .. } => colony.tasks.get(doomed).and_then(|root| {
            let recipe = root.recipe.as_ref()?;
            Some((root.building?, recipe.name.clone()))
        }),
        _ => None,
    };

    colony.delete_task(doomed);
    if colony.tasks.contains(task) {
        colony.delete_task(task);
    }

    let tick = colony.tick;
    if let Some((building_id, recipe)) = deferred {
        let until = tick.saturating_add(colony.config.request_retry_ticks);
        if let Some(building) = colony.buildings.get_mut(&building_id) {
            debug!(tick, building = %building_id, recipe = %recipe, retry_at = until, "Recipe deferred");
            building.defer_recipe(recipe, until);
        }
    }

    let retry = colony.config.eat_retry_ticks;
    if let Some(state) = colony.worker_mut(worker) {
        for stale in [doomed, task] {
            if state.tasks.remove(stale) {
                let err = TaskError::OrphanedTaskReference {
                    worker,
                    task: stale,
                };
                warn!(tick, error = %err, "Stack re-synced after cancel");
            }
        }
        state.clear_path();
        if was_meal {
            state.hungry_at = tick.saturating_add(retry);
            debug!(tick, worker = %worker, retry_at = state.hungry_at, "Meal postponed");
        }
    }
    colony.mark_workers_dirty();
}
