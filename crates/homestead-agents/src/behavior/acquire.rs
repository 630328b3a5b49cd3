//! Hunger check and task acquisition.

use tracing::{debug, info, warn};

use homestead_types::{TaskId, WorkerId};

use crate::colony::Colony;
use crate::error::TaskError;
use crate::recipe::Recipe;
use crate::task::{Task, TaskKind};

/// Queue a meal on top of the worker's stack if it is hungry and has none.
pub(super) fn check_hunger(colony: &mut Colony, worker_id: WorkerId) {
    let Some(worker) = colony.worker(worker_id) else {
        return;
    };
    if colony.tick < worker.hungry_at {
        return;
    }
    let queued = worker
        .tasks
        .iter()
        .any(|task| colony.tasks.get(task).is_some_and(Task::is_meal));
    if queued {
        return;
    }

    let meal = Recipe::meal(&colony.config);
    let result = colony
        .create_recipe_task(None, meal, 1)
        .and_then(|task| colony.assign(task, worker_id).map(|()| task));
    match result {
        Ok(task) => info!(tick = colony.tick, worker = %worker_id, task = %task, "Worker hungry"),
        Err(err) => warn!(tick = colony.tick, worker = %worker_id, error = %err, "Meal not queued"),
    }
}

/// The task the worker should work on this tick.
///
/// Stale stack entries are dropped on the way. An empty stack pulls the
/// oldest unassigned task the owning building lets this worker take.
pub(super) fn active_task(colony: &mut Colony, worker_id: WorkerId) -> Option<TaskId> {
    loop {
        let worker = colony.worker(worker_id)?;
        let Some(task_id) = worker.tasks.active() else {
            break;
        };
        if colony
            .tasks
            .get(task_id)
            .is_some_and(|task| task.worker == Some(worker_id))
        {
            return Some(task_id);
        }
        let err = TaskError::OrphanedTaskReference {
            worker: worker_id,
            task: task_id,
        };
        warn!(tick = colony.tick, error = %err, "Stale stack entry dropped");
        if let Some(worker) = colony.worker_mut(worker_id) {
            worker.tasks.remove(task_id);
        }
    }

    let worker = colony.worker(worker_id)?;
    let buildings = &colony.buildings;
    let task_id = colony.tasks.oldest_unassigned(|task| {
        let Some(recipe) = &task.recipe else {
            return matches!(task.kind, TaskKind::MoveItem { .. });
        };
        task.building
            .and_then(|id| buildings.get(&id))
            .is_none_or(|building| building.behavior.can_assign(recipe, worker))
    })?;

    match colony.assign(task_id, worker_id) {
        Ok(()) => {
            debug!(tick = colony.tick, worker = %worker_id, task = %task_id, "Task acquired");
            Some(task_id)
        }
        Err(err) => {
            warn!(tick = colony.tick, worker = %worker_id, error = %err, "Task not acquired");
            None
        }
    }
}
