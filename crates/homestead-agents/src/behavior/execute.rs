//! Work ticks, tool wear, unit completion, and item moves.

use tracing::{debug, info, warn};

use homestead_types::{
    BuildingId, Coord, InputRole, ItemId, ItemRole, ItemTemplate, MovePhase, TaskId,
    TaskStatus, WorkerId,
};

use super::{StepOutcome, movement};
use crate::building::CompletionContext;
use crate::colony::Colony;
use crate::error::TaskError;
use crate::recipe::{Recipe, RecipeAction, WorkSite};
use crate::task::{Tag, TaskKind};

// ---------------------------------------------------------------------------
// Recipe work
// ---------------------------------------------------------------------------

/// Put one tick of work into a recipe task at its target.
pub(super) fn work(
    colony: &mut Colony,
    worker: WorkerId,
    task_id: TaskId,
    recipe: &Recipe,
    target: Coord,
) -> Result<StepOutcome, TaskError> {
    let task = colony
        .tasks
        .get_mut(task_id)
        .ok_or(TaskError::TaskNotFound(task_id))?;
    task.status = TaskStatus::InProgress;
    task.progress = task
        .progress
        .checked_add(1)
        .ok_or(TaskError::ArithmeticOverflow)?;
    let progress = task.progress;

    wear_tools(colony, task_id, recipe);

    if progress < recipe.duration_ticks {
        return Ok(StepOutcome::Worked);
    }
    finish_unit(colony, worker, task_id, recipe, target)
}

/// Take one point of endurance off every tagged tool. Tools that reach
/// zero are destroyed and untagged, and their group's choice is reset.
fn wear_tools(colony: &mut Colony, task_id: TaskId, recipe: &Recipe) {
    let tools: Vec<Tag> = colony
        .tasks
        .get(task_id)
        .map(|task| {
            task.tagged
                .iter()
                .filter(|tag| recipe.role_of(tag.group) == Some(InputRole::Tool))
                .copied()
                .collect()
        })
        .unwrap_or_default();

    for tag in tools {
        let Some(item) = colony.world.item_mut(tag.item) else {
            continue;
        };
        let ItemRole::Tool { endurance, .. } = &mut item.role else {
            continue;
        };
        *endurance = endurance.saturating_sub(1);
        if *endurance > 0 {
            continue;
        }

        let broken = colony.world.take_item(tag.item);
        if let Some(task) = colony.tasks.get_mut(task_id) {
            task.untag(tag.item);
            if let Some(choice) = task.choices.get_mut(tag.group) {
                *choice = None;
            }
        }
        if let Ok((coord, _)) = broken {
            colony.mark_tile_dirty(coord);
        }
        let err = TaskError::ToolBroken {
            task: task_id,
            item: tag.item,
        };
        warn!(tick = colony.tick, error = %err, "Tool worn out");
    }
}

/// Run the recipe's completion action, then advance or finish the batch.
fn finish_unit(
    colony: &mut Colony,
    worker: WorkerId,
    task_id: TaskId,
    recipe: &Recipe,
    target: Coord,
) -> Result<StepOutcome, TaskError> {
    match &recipe.action {
        RecipeAction::Craft | RecipeAction::Construct => {
            complete_at_building(colony, task_id, recipe, target)?;
        }
        RecipeAction::GatherFood { spent, byproducts } => {
            gather_food(colony, worker, task_id, recipe, target, spent.as_ref(), byproducts)?;
        }
        RecipeAction::GatherItems => gather_items(colony, worker, task_id, recipe, target)?,
        RecipeAction::Eat => eat(colony, worker, task_id, recipe)?,
    }
    colony.mark_tile_dirty(target);

    let task = colony
        .tasks
        .get_mut(task_id)
        .ok_or(TaskError::TaskNotFound(task_id))?;
    task.remaining = task.remaining.saturating_sub(1);
    if task.remaining == 0 {
        info!(
            tick = colony.tick,
            worker = %worker,
            task = %task_id,
            recipe = %recipe.name,
            "Task completed"
        );
        colony.delete_task(task_id);
        return Ok(StepOutcome::Completed);
    }

    task.progress = 0;
    task.choices.iter_mut().for_each(|choice| *choice = None);
    if recipe.work_site != WorkSite::Building {
        task.target = None;
    }
    let remaining = task.remaining;
    colony.release_tags(task_id, None);
    debug!(
        tick = colony.tick,
        worker = %worker,
        task = %task_id,
        recipe = %recipe.name,
        remaining,
        "Unit completed"
    );
    Ok(StepOutcome::UnitCompleted)
}

/// Hand the unit to the owning building's completion callback.
fn complete_at_building(
    colony: &mut Colony,
    task_id: TaskId,
    recipe: &Recipe,
    site: Coord,
) -> Result<(), TaskError> {
    let task = colony
        .tasks
        .get(task_id)
        .ok_or(TaskError::TaskNotFound(task_id))?;
    let tagged = task.tagged.clone();
    let owner = task.building;

    let mut ctx = CompletionContext {
        tick: colony.tick,
        task: task_id,
        recipe,
        site,
        tagged: &tagged,
        world: &mut colony.world,
        ids: &mut colony.ids,
        consumed: Vec::new(),
        produced: Vec::new(),
    };
    match owner.and_then(|id| colony.buildings.get_mut(&id)) {
        Some(building) => building.behavior.complete(&mut ctx)?,
        None => {
            ctx.consume_inputs()?;
            ctx.emit_outputs()?;
        }
    }
    let CompletionContext {
        consumed, produced, ..
    } = ctx;

    if let Some(task) = colony.tasks.get_mut(task_id) {
        for item in &consumed {
            task.untag(*item);
        }
    }
    debug!(
        task = %task_id,
        site = %site,
        consumed = consumed.len(),
        produced = produced.len(),
        "Recipe unit produced"
    );
    Ok(())
}

/// Tagged items in the recipe's work-site group.
fn site_items(colony: &Colony, task_id: TaskId, recipe: &Recipe) -> Vec<ItemId> {
    let Some(group) = recipe.work_site_group() else {
        return Vec::new();
    };
    colony
        .tasks
        .get(task_id)
        .map(|task| {
            task.tagged
                .iter()
                .filter(|tag| tag.group == group)
                .map(|tag| tag.item)
                .collect()
        })
        .unwrap_or_default()
}

/// Where harvested goods go: the owning building, unless the task is a
/// sub-task whose parent wants them where they lie.
fn delivery_site(colony: &Colony, task_id: TaskId) -> Option<(BuildingId, Coord)> {
    let task = colony.tasks.get(task_id)?;
    if task.parent.is_some() {
        return None;
    }
    let id = task.building?;
    colony.buildings.get(&id).map(|building| (id, building.coord))
}

/// Queue a move for each item onto the worker's own stack.
fn deliver(
    colony: &mut Colony,
    worker: WorkerId,
    items: &[ItemId],
    from: Coord,
    building: BuildingId,
    to: Coord,
) -> Result<(), TaskError> {
    if from == to {
        return Ok(());
    }
    for &item in items.iter().rev() {
        let task = colony.create_item_move_task(item, from, to, Some(building))?;
        colony.assign(task, worker)?;
    }
    Ok(())
}

fn gather_food(
    colony: &mut Colony,
    worker: WorkerId,
    task_id: TaskId,
    recipe: &Recipe,
    site: Coord,
    spent: Option<&ItemTemplate>,
    byproducts: &[ItemTemplate],
) -> Result<(), TaskError> {
    for source in site_items(colony, task_id, recipe) {
        if let Some(task) = colony.tasks.get_mut(task_id) {
            task.untag(source);
        }
        colony.world.take_item(source)?;
        for template in spent.into_iter().chain(byproducts) {
            colony.spawn_item(site, template)?;
        }
    }
    let mut produced = Vec::new();
    for output in &recipe.outputs {
        produced.push(colony.spawn_item(site, output)?);
    }
    debug!(task = %task_id, site = %site, produced = produced.len(), "Food gathered");

    if let Some((building, to)) = delivery_site(colony, task_id) {
        deliver(colony, worker, &produced, site, building, to)?;
    }
    Ok(())
}

fn gather_items(
    colony: &mut Colony,
    worker: WorkerId,
    task_id: TaskId,
    recipe: &Recipe,
    site: Coord,
) -> Result<(), TaskError> {
    let items = site_items(colony, task_id, recipe);
    for &item in &items {
        colony.release_claim(item, task_id);
        if let Some(task) = colony.tasks.get_mut(task_id) {
            task.untag(item);
        }
    }
    debug!(task = %task_id, site = %site, items = items.len(), "Items gathered");

    if let Some((building, to)) = delivery_site(colony, task_id) {
        deliver(colony, worker, &items, site, building, to)?;
    }
    Ok(())
}

fn eat(colony: &mut Colony, worker: WorkerId, task_id: TaskId, recipe: &Recipe) -> Result<(), TaskError> {
    let mut nourishment = 0;
    for food in site_items(colony, task_id, recipe) {
        if let Some(task) = colony.tasks.get_mut(task_id) {
            task.untag(food);
        }
        let (_, item) = colony.world.take_item(food)?;
        if let ItemRole::Food {
            nourishment: value, ..
        } = item.role
        {
            nourishment = value;
        }
    }
    let interval = if nourishment > 0 {
        nourishment
    } else {
        colony.config.hunger_interval_ticks
    };

    let tick = colony.tick;
    let state = colony
        .worker_mut(worker)
        .ok_or(TaskError::WorkerNotFound(worker))?;
    state.hungry_at = tick.saturating_add(interval);
    info!(tick, worker = %worker, hungry_at = state.hungry_at, "Meal eaten");
    Ok(())
}

// ---------------------------------------------------------------------------
// Item moves
// ---------------------------------------------------------------------------

/// Run one tick of a two-phase item move.
pub(super) fn step_move(colony: &mut Colony, worker: WorkerId, task_id: TaskId) -> Result<StepOutcome, TaskError> {
    let task = colony
        .tasks
        .get(task_id)
        .ok_or(TaskError::TaskNotFound(task_id))?;
    let TaskKind::MoveItem {
        item,
        from,
        to,
        phase,
    } = task.kind
    else {
        return Err(TaskError::TaskNotFound(task_id));
    };
    let position = colony
        .worker(worker)
        .ok_or(TaskError::WorkerNotFound(worker))?
        .position;

    match phase {
        MovePhase::Pickup => {
            let at = colony.world.locate(item).ok_or(TaskError::MissingItem(item))?;
            if at != from {
                retarget_pickup(colony, task_id, at);
            }
            if position != at {
                return movement::advance(colony, worker, at);
            }
            let (_, carried) = colony.world.take_item(item)?;
            let state = colony
                .worker_mut(worker)
                .ok_or(TaskError::WorkerNotFound(worker))?;
            state.inventory.push(carried);
            if let Some(task) = colony.tasks.get_mut(task_id) {
                task.status = TaskStatus::InProgress;
                task.target = Some(to);
                if let TaskKind::MoveItem { phase, .. } = &mut task.kind {
                    *phase = MovePhase::Putdown;
                }
            }
            colony.mark_tile_dirty(at);
            colony.mark_workers_dirty();
            debug!(tick = colony.tick, worker = %worker, task = %task_id, item = %item, at = %at, "Item picked up");
            Ok(StepOutcome::PickedUp)
        }
        MovePhase::Putdown => {
            let carrying = colony
                .worker(worker)
                .is_some_and(|state| state.is_carrying(item));
            if !carrying {
                return Err(TaskError::MissingItem(item));
            }
            if position != to {
                return movement::advance(colony, worker, to);
            }
            let carried = colony
                .worker_mut(worker)
                .and_then(|state| state.take_carried(item))
                .ok_or(TaskError::MissingItem(item))?;
            colony.world.place_item(to, carried)?;
            colony.mark_tile_dirty(to);
            colony.mark_workers_dirty();
            debug!(tick = colony.tick, worker = %worker, task = %task_id, item = %item, at = %to, "Item put down");
            colony.delete_task(task_id);
            Ok(StepOutcome::Completed)
        }
    }
}

fn retarget_pickup(colony: &mut Colony, task_id: TaskId, at: Coord) {
    if let Some(task) = colony.tasks.get_mut(task_id) {
        task.target = Some(at);
        if let TaskKind::MoveItem { from, .. } = &mut task.kind {
            *from = at;
        }
    }
}
