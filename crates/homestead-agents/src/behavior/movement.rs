//! Walking toward a target, one step delay at a time.
//!
//! A path is requested once per goal and cached on the worker. Entering a
//! tile costs its walking lag times the base step ticks, scaled for
//! diagonals, counted in hundredths of a tick. The worker earns one tick
//! of credit per tick and lands once the credit covers the step; leftover
//! credit carries into the next step of the same path.

use tracing::debug;

use homestead_types::{Coord, WorkerId};

use super::StepOutcome;
use crate::colony::Colony;
use crate::config::MOVE_UNITS_PER_TICK;
use crate::error::TaskError;

/// Spend one tick walking toward `goal`.
pub(super) fn advance(colony: &mut Colony, worker_id: WorkerId, goal: Coord) -> Result<StepOutcome, TaskError> {
    let worker = colony
        .worker(worker_id)
        .ok_or(TaskError::WorkerNotFound(worker_id))?;
    let origin = worker.position;
    if worker.path_goal != Some(goal) || worker.path.is_empty() {
        let found = colony
            .search
            .path_to(&colony.world, origin, &mut |tile| tile.coord == goal)?;
        debug!(
            worker = %worker_id,
            from = %origin,
            to = %goal,
            steps = found.path.len(),
            tiles_scanned = found.tiles_scanned,
            "Path planned"
        );
        let worker = colony
            .worker_mut(worker_id)
            .ok_or(TaskError::WorkerNotFound(worker_id))?;
        worker.path = found.path.into_iter().collect();
        worker.path_goal = Some(goal);
        worker.move_credit = 0;
    }

    let worker = colony
        .workers
        .iter_mut()
        .find(|worker| worker.id == worker_id)
        .ok_or(TaskError::WorkerNotFound(worker_id))?;
    let Some(&direction) = worker.path.front() else {
        return Err(TaskError::PathNotFound {
            origin,
            tiles_scanned: 0,
        });
    };
    let next = origin.step(direction).ok_or(TaskError::ArithmeticOverflow)?;

    let lag = colony.world.walk_lag(next).ok_or(TaskError::PathNotFound {
        origin,
        tiles_scanned: 0,
    })?;
    let cost = colony.config.step_cost(lag, direction.is_diagonal());
    worker.move_credit = worker.move_credit.saturating_add(MOVE_UNITS_PER_TICK);
    if worker.move_credit >= cost {
        worker.move_credit = worker.move_credit.saturating_sub(cost);
        worker.position = next;
        worker.path.pop_front();
        if worker.path.is_empty() {
            worker.path_goal = None;
            worker.move_credit = 0;
        }
        colony.mark_workers_dirty();
    }
    Ok(StepOutcome::Moving)
}
