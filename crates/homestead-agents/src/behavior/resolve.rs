//! Work-site resolution, input selection, shortfall, and relocation.
//!
//! By the time [`prepare`] returns [`Prepared::Ready`], the task has a
//! target, every input group is tagged to its required quantity, and every
//! tagged item lies on the target tile.

use std::collections::BTreeSet;

use tracing::{debug, info};

use homestead_types::{Coord, ItemId, TaskId, WorkerId};
use homestead_world::WorldError;

use super::StepOutcome;
use crate::colony::{Colony, ItemLocation};
use crate::error::TaskError;
use crate::recipe::{InputGroup, Recipe, WorkSite};
use crate::task::{Tag, TaskKind};

/// Result of [`prepare`].
pub(super) enum Prepared {
    /// Ready to walk to and work at this tile.
    Ready(Coord),
    /// A sub-task was queued; the task waits.
    Queued(StepOutcome),
}

/// Run stages 3 to 6 of the decision procedure for a recipe task.
pub(super) fn prepare(
    colony: &mut Colony,
    worker: WorkerId,
    task: TaskId,
    recipe: &Recipe,
) -> Result<Prepared, TaskError> {
    let target = match current_target(colony, task)? {
        Some(target) => target,
        None => match resolve_work_site(colony, worker, task, recipe)? {
            Prepared::Ready(target) => target,
            queued @ Prepared::Queued(_) => return Ok(queued),
        },
    };
    select_inputs(colony, task, recipe, target)?;
    if let Some(outcome) = fill_shortfall(colony, worker, task, recipe, target)? {
        return Ok(Prepared::Queued(outcome));
    }
    if let Some(outcome) = relocate(colony, worker, task, target)? {
        return Ok(Prepared::Queued(outcome));
    }
    Ok(Prepared::Ready(target))
}

fn current_target(colony: &Colony, task: TaskId) -> Result<Option<Coord>, TaskError> {
    colony
        .tasks
        .get(task)
        .map(|task| task.target)
        .ok_or(TaskError::TaskNotFound(task))
}

fn set_target(colony: &mut Colony, task: TaskId, target: Coord) {
    if let Some(task) = colony.tasks.get_mut(task) {
        task.target = Some(target);
    }
}

fn set_choice(colony: &mut Colony, task: TaskId, group: usize, option: usize) {
    if let Some(choice) = colony
        .tasks
        .get_mut(task)
        .and_then(|task| task.choices.get_mut(group))
    {
        *choice = Some(option);
    }
}

fn unresolvable(task: TaskId, group: &InputGroup) -> TaskError {
    TaskError::UnresolvableRecipe {
        task,
        wanted: group.item_names().join(", "),
    }
}

// ---------------------------------------------------------------------------
// Work site
// ---------------------------------------------------------------------------

fn resolve_work_site(
    colony: &mut Colony,
    worker: WorkerId,
    task_id: TaskId,
    recipe: &Recipe,
) -> Result<Prepared, TaskError> {
    let position = colony
        .worker(worker)
        .ok_or(TaskError::WorkerNotFound(worker))?
        .position;
    let owner = colony
        .tasks
        .get(task_id)
        .and_then(|task| task.building)
        .and_then(|id| colony.buildings.get(&id));

    let target = match recipe.work_site {
        WorkSite::Building => owner.map_or(position, |building| building.coord),
        WorkSite::Locator => owner
            .and_then(|building| {
                building
                    .behavior
                    .locate_work_site(recipe, &colony.world, position)
            })
            .ok_or_else(|| TaskError::UnresolvableRecipe {
                task: task_id,
                wanted: recipe.name.clone(),
            })?,
        WorkSite::Input => return find_input_site(colony, worker, task_id, recipe, position),
    };
    set_target(colony, task_id, target);
    debug!(task = %task_id, target = %target, "Work site resolved");
    Ok(Prepared::Ready(target))
}

/// Search from the worker for a tile holding the work-site group.
///
/// The first pass wants a whole option's quantity on one tile; the second
/// settles for any unit. Gather recipes never harvest their own building's
/// tile.
fn find_input_site(
    colony: &mut Colony,
    worker: WorkerId,
    task_id: TaskId,
    recipe: &Recipe,
    origin: Coord,
) -> Result<Prepared, TaskError> {
    let Some((index, group)) = recipe
        .work_site_group()
        .and_then(|index| recipe.group(index).map(|group| (index, group)))
    else {
        set_target(colony, task_id, origin);
        return Ok(Prepared::Ready(origin));
    };
    let excluded = if recipe.action.is_gather() {
        colony
            .tasks
            .get(task_id)
            .and_then(|task| task.building)
            .and_then(|id| colony.buildings.get(&id))
            .map(|building| building.coord)
    } else {
        None
    };

    for whole in [true, false] {
        let mut chosen = None;
        let search = colony.search.path_to(&colony.world, origin, &mut |tile| {
            if Some(tile.coord) == excluded {
                return false;
            }
            chosen = group.options.iter().position(|option| {
                let need = if whole { option.wanted() } else { 1 };
                tile.count_unclaimed(|item| option.accepts(item, group.role)) >= need
            });
            chosen.is_some()
        });
        let found = match search {
            Ok(found) => found,
            Err(WorldError::PathNotFound { .. }) => continue,
            Err(err) => return Err(err.into()),
        };
        let (Some(option_index), Some(option)) =
            (chosen, chosen.and_then(|option| group.option(option)))
        else {
            continue;
        };

        let items: Vec<ItemId> = colony
            .world
            .get(found.tile)
            .map(|tile| {
                tile.unclaimed(|item| option.accepts(item, group.role))
                    .take(option.wanted())
                    .map(|item| item.id)
                    .collect()
            })
            .unwrap_or_default();
        colony.release_tags(task_id, Some(index));
        for item in items {
            colony.tag_item(task_id, item, index)?;
        }
        set_choice(colony, task_id, index, option_index);
        set_target(colony, task_id, found.tile);
        debug!(
            task = %task_id,
            target = %found.tile,
            option = %option.item,
            tiles_scanned = found.tiles_scanned,
            "Work site found"
        );
        return Ok(Prepared::Ready(found.tile));
    }

    queue_producer(colony, worker, task_id, recipe, index).map(Prepared::Queued)
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Choose an option for every unresolved group.
///
/// Each option is searched from the target against a local set of
/// tentative reservations; the first fully satisfied option wins,
/// otherwise the best found-to-wanted ratio with ties going to the earlier
/// option. Only the winners' items are tagged.
fn select_inputs(
    colony: &mut Colony,
    task_id: TaskId,
    recipe: &Recipe,
    target: Coord,
) -> Result<(), TaskError> {
    let site_group = match recipe.work_site {
        WorkSite::Input => recipe.work_site_group(),
        WorkSite::Building | WorkSite::Locator => None,
    };
    let choices = colony
        .tasks
        .get(task_id)
        .map(|task| task.choices.clone())
        .ok_or(TaskError::TaskNotFound(task_id))?;

    let mut reserved: BTreeSet<ItemId> = BTreeSet::new();
    let mut plan: Vec<(usize, usize, Vec<ItemId>)> = Vec::new();
    for (index, group) in recipe.inputs.iter().enumerate() {
        if Some(index) == site_group || group.options.is_empty() {
            continue;
        }
        if choices.get(index).copied().flatten().is_some() {
            continue;
        }

        let mut best: Option<(usize, Vec<ItemId>)> = None;
        for (option_index, option) in group.options.iter().enumerate() {
            let wanted = option.wanted();
            let found: Vec<ItemId> = colony
                .search
                .collect_unclaimed(&colony.world, target, wanted, &mut |item| {
                    !reserved.contains(&item.id) && option.accepts(item, group.role)
                })?
                .into_iter()
                .map(|(_, item)| item)
                .collect();
            if found.len() >= wanted {
                best = Some((option_index, found));
                break;
            }
            let better = best.as_ref().is_none_or(|(held, have)| {
                let held_wanted = group.option(*held).map_or(1, |held| held.wanted());
                found.len().saturating_mul(held_wanted) > have.len().saturating_mul(wanted)
            });
            if better {
                best = Some((option_index, found));
            }
        }

        if let Some((option_index, items)) = best {
            reserved.extend(items.iter().copied());
            plan.push((index, option_index, items));
        }
    }

    for (index, option_index, items) in plan {
        colony.release_tags(task_id, Some(index));
        for item in items {
            colony.tag_item(task_id, item, index)?;
        }
        set_choice(colony, task_id, index, option_index);
        debug!(task = %task_id, group = index, option = option_index, "Input selected");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shortfall
// ---------------------------------------------------------------------------

/// Top up every group below its quantity, or queue a producer.
fn fill_shortfall(
    colony: &mut Colony,
    worker: WorkerId,
    task_id: TaskId,
    recipe: &Recipe,
    target: Coord,
) -> Result<Option<StepOutcome>, TaskError> {
    for (index, group) in recipe.inputs.iter().enumerate() {
        let task = colony
            .tasks
            .get(task_id)
            .ok_or(TaskError::TaskNotFound(task_id))?;
        let Some(option) = task
            .choices
            .get(index)
            .copied()
            .flatten()
            .and_then(|choice| group.option(choice))
        else {
            continue;
        };
        let wanted = option.wanted();
        let have = task.tagged_in_group(index);
        if have >= wanted {
            continue;
        }
        let short = wanted.saturating_sub(have);

        let found = colony
            .search
            .collect_unclaimed(&colony.world, target, short, &mut |item| {
                option.accepts(item, group.role)
            })?;
        let topped_up = found.len();
        for (_, item) in found {
            colony.tag_item(task_id, item, index)?;
        }
        if topped_up < short {
            return queue_producer(colony, worker, task_id, recipe, index).map(Some);
        }
    }
    Ok(None)
}

/// Push a sub-task on a building that makes something the group accepts.
///
/// When the producer makes a different option than the one chosen, the
/// choice switches to it and the group's tags are released.
fn queue_producer(
    colony: &mut Colony,
    worker: WorkerId,
    task_id: TaskId,
    recipe: &Recipe,
    index: usize,
) -> Result<StepOutcome, TaskError> {
    let group = recipe
        .group(index)
        .ok_or(TaskError::TaskNotFound(task_id))?;
    if colony.tasks.depth(task_id) >= colony.config.max_subtask_depth {
        return Err(unresolvable(task_id, group));
    }
    let names = group.item_names();
    let (building, matched, producer) = colony
        .find_producer(&names)
        .ok_or_else(|| unresolvable(task_id, group))?;
    let option = group
        .option(matched)
        .ok_or_else(|| unresolvable(task_id, group))?;

    let current = colony
        .tasks
        .get(task_id)
        .and_then(|task| task.choices.get(index).copied().flatten());
    if current != Some(matched) {
        colony.release_tags(task_id, Some(index));
        set_choice(colony, task_id, index, matched);
    }
    let have = colony
        .tasks
        .get(task_id)
        .map_or(0, |task| task.tagged_in_group(index));
    let short = option.wanted().saturating_sub(have).max(1);
    let per_unit = producer
        .outputs
        .iter()
        .filter(|output| output.name == option.item)
        .count()
        .max(1);
    let quantity = u32::try_from(short.div_ceil(per_unit)).unwrap_or(u32::MAX);

    let producer_name = producer.name.clone();
    let sub = colony.create_recipe_task(Some(building), producer, quantity)?;
    if let Some(task) = colony.tasks.get_mut(sub) {
        task.parent = Some(task_id);
    }
    colony.assign(sub, worker)?;
    info!(
        tick = colony.tick,
        worker = %worker,
        task = %task_id,
        sub_task = %sub,
        recipe = %producer_name,
        building = %building,
        quantity,
        "Producer sub-task queued"
    );
    Ok(StepOutcome::SubTaskQueued)
}

// ---------------------------------------------------------------------------
// Relocation
// ---------------------------------------------------------------------------

/// Push a move sub-task for every tagged item away from the target.
fn relocate(
    colony: &mut Colony,
    worker: WorkerId,
    task_id: TaskId,
    target: Coord,
) -> Result<Option<StepOutcome>, TaskError> {
    let tagged: Vec<Tag> = colony
        .tasks
        .get(task_id)
        .map(|task| task.tagged.clone())
        .ok_or(TaskError::TaskNotFound(task_id))?;
    let in_flight: BTreeSet<ItemId> = colony
        .tasks
        .children_of(task_id)
        .into_iter()
        .filter_map(|child| colony.tasks.get(child))
        .filter_map(|child| match child.kind {
            TaskKind::MoveItem { item, .. } => Some(item),
            TaskKind::Recipe => None,
        })
        .collect();

    let mut moves = Vec::new();
    for tag in tagged {
        if in_flight.contains(&tag.item) {
            continue;
        }
        let from = match colony.locate_item(tag.item) {
            Some(ItemLocation::Tile(coord)) if coord == target => continue,
            Some(ItemLocation::Tile(coord)) => coord,
            Some(ItemLocation::Carried(carrier)) => colony
                .worker(carrier)
                .map(|carrier| carrier.position)
                .ok_or(TaskError::MissingItem(tag.item))?,
            None => return Err(TaskError::MissingItem(tag.item)),
        };
        moves.push((tag.item, from));
    }
    if moves.is_empty() {
        return Ok(None);
    }

    // Pushed in reverse so the first tagged item is fetched first.
    for &(item, from) in moves.iter().rev() {
        let sub = colony.create_item_move_task(item, from, target, None)?;
        if let Some(task) = colony.tasks.get_mut(sub) {
            task.parent = Some(task_id);
        }
        colony.assign(sub, worker)?;
    }
    debug!(
        tick = colony.tick,
        worker = %worker,
        task = %task_id,
        moves = moves.len(),
        "Relocation queued"
    );
    Ok(Some(StepOutcome::RelocationQueued))
}
