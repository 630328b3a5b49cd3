//! The colony context: world, tasks, workers, and buildings in one place.
//!
//! [`Colony`] is owned by the tick driver and passed by `&mut` into every
//! component. It is also where the task registry keeps its back-references
//! honest: creating a task registers it with its building, assigning it
//! pushes it onto a worker's stack, and [`Colony::delete_task`] undoes all
//! of that plus every item claim in one call.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use homestead_types::{
    BuildingId, Coord, IdAllocator, ItemId, ItemTemplate, MovePhase, TaskId, TaskStatus,
    WorkerId,
};
use homestead_world::{GridSearch, SpatialSearch, TileMap, WorldError};

use crate::building::{Building, BuildingContext};
use crate::catalog::Catalog;
use crate::config::BehaviorConfig;
use crate::error::TaskError;
use crate::recipe::{Recipe, WorkSite};
use crate::task::{Tag, Task, TaskKind, TaskRegistry};
use crate::worker::Worker;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// What changed since the renderer was last told.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    /// A worker moved, picked something up, or put something down.
    pub workers: bool,
    /// Tiles whose items changed.
    pub tiles: BTreeSet<Coord>,
    /// Buildings whose task lists or state changed.
    pub buildings: BTreeSet<BuildingId>,
}

impl DirtySet {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        !self.workers && self.tiles.is_empty() && self.buildings.is_empty()
    }
}

/// Where an item currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemLocation {
    /// Lying on a tile.
    Tile(Coord),
    /// In a worker's inventory.
    Carried(WorkerId),
}

/// A broken consistency rule found by [`Colony::check_invariants`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// An item's claim names a task that no longer exists.
    DanglingClaim {
        /// The item.
        item: ItemId,
        /// The missing task.
        task: TaskId,
    },
    /// An item's claim names a task that does not list it as tagged.
    UntrackedClaim {
        /// The item.
        item: ItemId,
        /// The claiming task.
        task: TaskId,
    },
    /// Two tasks tag the same item.
    DoubleTag {
        /// The item.
        item: ItemId,
        /// The first task found tagging it.
        first: TaskId,
        /// The second task found tagging it.
        second: TaskId,
    },
    /// A task tags an item whose claim names something else.
    UnclaimedTag {
        /// The item.
        item: ItemId,
        /// The tagging task.
        task: TaskId,
    },
    /// A task tags an item that is neither on the map nor carried.
    MissingTaggedItem {
        /// The item.
        item: ItemId,
        /// The tagging task.
        task: TaskId,
    },
    /// A worker's stack lists a task that no longer exists.
    OrphanedTaskReference {
        /// The worker.
        worker: WorkerId,
        /// The missing task.
        task: TaskId,
    },
    /// A worker's stack lists a task assigned to someone else.
    StackMismatch {
        /// The worker.
        worker: WorkerId,
        /// The task.
        task: TaskId,
    },
    /// A building lists a task that no longer exists.
    StaleBuildingTask {
        /// The building.
        building: BuildingId,
        /// The missing task.
        task: TaskId,
    },
}

/// What [`Colony::resync_references`] had to repair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncReport {
    /// Tasks deleted because something they depend on is gone.
    pub tasks_dropped: usize,
    /// Stale references removed from stacks, building lists, and tasks.
    pub references_dropped: usize,
    /// Item claims cleared because their task is gone.
    pub claims_cleared: usize,
}

// ---------------------------------------------------------------------------
// Colony
// ---------------------------------------------------------------------------

/// The whole simulated colony.
#[derive(Debug)]
pub struct Colony {
    /// Current tick.
    pub tick: u64,
    /// The map.
    pub world: TileMap,
    /// Every live task.
    pub tasks: TaskRegistry,
    /// Workers in processing order. Earlier workers win contested claims.
    pub workers: Vec<Worker>,
    /// Buildings keyed by ID.
    pub buildings: BTreeMap<BuildingId, Building>,
    /// Building templates.
    pub catalog: Catalog,
    /// Worker behaviour tunables.
    pub config: BehaviorConfig,
    /// ID source for every entity kind.
    pub ids: IdAllocator,
    pub(crate) search: Box<dyn SpatialSearch>,
    pub(crate) dirty: DirtySet,
}

impl Colony {
    /// Create a colony on `world` using grid search.
    pub fn new(world: TileMap, catalog: Catalog, config: BehaviorConfig) -> Self {
        let search = GridSearch::new(config.search_limit, config.diagonal_pct);
        Self {
            tick: 0,
            world,
            tasks: TaskRegistry::new(),
            workers: Vec::new(),
            buildings: BTreeMap::new(),
            catalog,
            config,
            ids: IdAllocator::new(),
            search: Box::new(search),
            dirty: DirtySet::default(),
        }
    }

    /// Replace the search backend.
    #[must_use]
    pub fn with_search(mut self, search: Box<dyn SpatialSearch>) -> Self {
        self.search = search;
        self
    }

    /// The search backend.
    pub fn search(&self) -> &dyn SpatialSearch {
        self.search.as_ref()
    }

    // -------------------------------------------------------------------
    // Population
    // -------------------------------------------------------------------

    /// Add a worker at the back of the processing order.
    pub fn add_worker(&mut self, name: impl Into<String>, position: Coord) -> WorkerId {
        let id = self.ids.next_worker();
        let hungry_at = self.tick.saturating_add(self.config.hunger_interval_ticks);
        self.workers
            .push(Worker::new(id, name, position, hungry_at));
        self.dirty.workers = true;
        id
    }

    /// Place a building from the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::MissingTile`] if `coord` is off the map, or
    /// [`TaskError::UnknownTemplate`] if the catalog has no such template.
    pub fn add_building(&mut self, template: &str, coord: Coord) -> Result<BuildingId, TaskError> {
        self.world.tile(coord)?;
        let id = self.ids.next_building();
        let building = self.catalog.instantiate(template, id, coord)?;
        self.buildings.insert(id, building);
        self.dirty.buildings.insert(id);
        info!(building = %id, template, coord = %coord, "Building placed");
        Ok(id)
    }

    /// Create an item from `template` on `coord`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::MissingTile`] if `coord` is off the map.
    pub fn spawn_item(&mut self, coord: Coord, template: &ItemTemplate) -> Result<ItemId, TaskError> {
        let id = self.ids.next_item();
        self.world
            .place_item(coord, template.instantiate(id, self.tick))?;
        self.dirty.tiles.insert(coord);
        Ok(id)
    }

    /// Look up a worker.
    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.workers.iter().find(|worker| worker.id == id)
    }

    /// Look up a worker for mutation.
    pub fn worker_mut(&mut self, id: WorkerId) -> Option<&mut Worker> {
        self.workers.iter_mut().find(|worker| worker.id == id)
    }

    /// Look up a building.
    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    // -------------------------------------------------------------------
    // Task creation
    // -------------------------------------------------------------------

    /// Queue `quantity` units of the building's recipe named `recipe`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::BuildingNotFound`] or
    /// [`TaskError::UnknownRecipe`].
    pub fn create_task(
        &mut self,
        building: BuildingId,
        recipe: &str,
        quantity: u32,
    ) -> Result<TaskId, TaskError> {
        let found = self
            .buildings
            .get(&building)
            .ok_or(TaskError::BuildingNotFound(building))?
            .recipe(recipe)
            .cloned()
            .ok_or_else(|| TaskError::UnknownRecipe {
                building,
                recipe: recipe.to_owned(),
            })?;
        self.create_recipe_task(Some(building), found, quantity)
    }

    /// Queue `quantity` units of `recipe`, optionally owned by a building.
    ///
    /// The target is filled in straight away when the recipe runs at the
    /// building. Nothing in the world is touched.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::BuildingNotFound`] if `building` is given but
    /// does not exist.
    pub fn create_recipe_task(
        &mut self,
        building: Option<BuildingId>,
        recipe: Recipe,
        quantity: u32,
    ) -> Result<TaskId, TaskError> {
        let site = match building {
            Some(id) => Some(
                self.buildings
                    .get(&id)
                    .ok_or(TaskError::BuildingNotFound(id))?
                    .coord,
            ),
            None => None,
        };
        let id = self.ids.next_task();
        let mut task = Task::for_recipe(id, building, recipe, quantity);
        if task
            .recipe
            .as_ref()
            .is_some_and(|recipe| recipe.work_site == WorkSite::Building)
        {
            task.target = site;
        }
        debug!(task = %id, recipe = task.label(), quantity, "Task created");
        self.tasks.insert(task);
        self.register_with_building(building, id);
        Ok(id)
    }

    /// Queue a move of `item` from `from` to `to`.
    ///
    /// If the item is unclaimed the move task claims it. An item already
    /// in a worker's hands starts in the putdown phase.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::MissingItem`] if the item is nowhere, or
    /// [`TaskError::BuildingNotFound`] if `building` does not exist.
    pub fn create_item_move_task(
        &mut self,
        item: ItemId,
        from: Coord,
        to: Coord,
        building: Option<BuildingId>,
    ) -> Result<TaskId, TaskError> {
        if let Some(id) = building
            && !self.buildings.contains_key(&id)
        {
            return Err(TaskError::BuildingNotFound(id));
        }
        let location = self.locate_item(item).ok_or(TaskError::MissingItem(item))?;
        let id = self.ids.next_task();
        let mut task = Task::for_move(id, building, item, from, to);
        if let ItemLocation::Carried(_) = location
            && let TaskKind::MoveItem { phase, .. } = &mut task.kind
        {
            *phase = MovePhase::Putdown;
            task.target = Some(to);
        }
        self.tasks.insert(task);
        if self.claim_of(item).is_none() {
            self.tag_item(id, item, 0)?;
        }
        self.register_with_building(building, id);
        debug!(task = %id, item = %item, from = %from, to = %to, "Move task created");
        Ok(id)
    }

    fn register_with_building(&mut self, building: Option<BuildingId>, task: TaskId) {
        if let Some(id) = building
            && let Some(found) = self.buildings.get_mut(&id)
        {
            found.active_tasks.push(task);
            self.dirty.buildings.insert(id);
        }
    }

    /// Put a task on top of a worker's stack.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] or [`TaskError::WorkerNotFound`].
    pub fn assign(&mut self, task_id: TaskId, worker_id: WorkerId) -> Result<(), TaskError> {
        let worker = self
            .workers
            .iter_mut()
            .find(|worker| worker.id == worker_id)
            .ok_or(TaskError::WorkerNotFound(worker_id))?;
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or(TaskError::TaskNotFound(task_id))?;
        task.worker = Some(worker_id);
        task.status = TaskStatus::Assigned;
        worker.tasks.push_front(task_id);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Task deletion
    // -------------------------------------------------------------------

    /// Delete a task and everything hanging off it.
    ///
    /// Sub-tasks spawned for it go first. Then every claim it holds is
    /// cleared, an item it was carrying is dropped where the worker stands,
    /// and it is detached from its building and its worker. Deleting a task
    /// that no longer exists is a no-op returning `None`.
    pub fn delete_task(&mut self, task_id: TaskId) -> Option<Task> {
        for child in self.tasks.children_of(task_id) {
            self.delete_task(child);
        }
        let task = self.tasks.remove(task_id)?;

        for tag in &task.tagged {
            self.release_claim(tag.item, task_id);
        }
        if let (Some(item), Some(worker)) = (task.moved_item(), task.worker) {
            self.drop_carried(worker, item);
        }
        if let Some(building_id) = task.building
            && let Some(building) = self.buildings.get_mut(&building_id)
        {
            building.detach(task_id);
            self.dirty.buildings.insert(building_id);
        }

        let detached = task
            .worker
            .and_then(|id| self.workers.iter_mut().find(|worker| worker.id == id))
            .is_some_and(|worker| worker.tasks.remove(task_id));
        if !detached {
            self.scrub_from_stacks(task_id);
        }

        debug!(task = %task_id, recipe = task.label(), "Task deleted");
        Some(task)
    }

    /// Remove `task` from every worker's stack, reporting each hit.
    pub(crate) fn scrub_from_stacks(&mut self, task: TaskId) {
        for worker in &mut self.workers {
            if worker.tasks.remove(task) {
                let err = TaskError::OrphanedTaskReference {
                    worker: worker.id,
                    task,
                };
                warn!(tick = self.tick, error = %err, "Stale stack entry removed");
            }
        }
    }

    /// Put a carried item down on the carrier's tile.
    fn drop_carried(&mut self, worker_id: WorkerId, item: ItemId) {
        let Some(worker) = self.workers.iter_mut().find(|worker| worker.id == worker_id) else {
            return;
        };
        let Some(carried) = worker.take_carried(item) else {
            return;
        };
        let position = worker.position;
        match self.world.place_item(position, carried) {
            Ok(()) => {
                self.dirty.tiles.insert(position);
                self.dirty.workers = true;
                debug!(worker = %worker_id, item = %item, at = %position, "Carried item dropped");
            }
            Err(err) => {
                warn!(worker = %worker_id, item = %item, error = %err, "Carried item lost");
            }
        }
    }

    // -------------------------------------------------------------------
    // Items and claims
    // -------------------------------------------------------------------

    /// Where an item is.
    pub fn locate_item(&self, item: ItemId) -> Option<ItemLocation> {
        if let Some(coord) = self.world.locate(item) {
            return Some(ItemLocation::Tile(coord));
        }
        self.workers
            .iter()
            .find(|worker| worker.is_carrying(item))
            .map(|worker| ItemLocation::Carried(worker.id))
    }

    /// The task claiming an item, wherever it is.
    pub fn claim_of(&self, item: ItemId) -> Option<TaskId> {
        if let Some(found) = self.world.item(item) {
            return found.in_task;
        }
        self.workers
            .iter()
            .flat_map(|worker| worker.inventory.iter())
            .find(|carried| carried.id == item)
            .and_then(|carried| carried.in_task)
    }

    /// Claim an item for a task and record the tag.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`], [`TaskError::MissingItem`], or a
    /// wrapped [`WorldError::ItemAlreadyClaimed`].
    pub fn tag_item(&mut self, task_id: TaskId, item: ItemId, group: usize) -> Result<(), TaskError> {
        if !self.tasks.contains(task_id) {
            return Err(TaskError::TaskNotFound(task_id));
        }
        match self.locate_item(item) {
            Some(ItemLocation::Tile(_)) => self.world.claim(item, task_id)?,
            Some(ItemLocation::Carried(worker_id)) => {
                let carried = self
                    .worker_mut(worker_id)
                    .and_then(|worker| worker.carried_mut(item))
                    .ok_or(TaskError::MissingItem(item))?;
                match carried.in_task {
                    Some(holder) if holder != task_id => {
                        return Err(WorldError::ItemAlreadyClaimed { item, holder }.into());
                    }
                    _ => carried.in_task = Some(task_id),
                }
            }
            None => return Err(TaskError::MissingItem(item)),
        }
        if let Some(task) = self.tasks.get_mut(task_id)
            && !task.has_tagged(item)
        {
            task.tagged.push(Tag { item, group });
        }
        Ok(())
    }

    /// Clear `task`'s claim on an item, wherever it is.
    pub fn release_claim(&mut self, item: ItemId, task: TaskId) -> bool {
        if self.world.release(item, task) {
            return true;
        }
        for worker in &mut self.workers {
            if let Some(carried) = worker.carried_mut(item)
                && carried.in_task == Some(task)
            {
                carried.in_task = None;
                return true;
            }
        }
        false
    }

    /// Untag and release every item a task holds for `group`, or for all
    /// groups when `group` is `None`.
    pub fn release_tags(&mut self, task_id: TaskId, group: Option<usize>) {
        let Some(task) = self.tasks.get_mut(task_id) else {
            return;
        };
        let (dropped, kept): (Vec<Tag>, Vec<Tag>) = task
            .tagged
            .drain(..)
            .partition(|tag| group.is_none_or(|g| tag.group == g));
        task.tagged = kept;
        for tag in dropped {
            self.release_claim(tag.item, task_id);
        }
    }

    /// Find a building recipe producing any of `wanted`, trying names in
    /// order and buildings in ID order.
    ///
    /// Returns the building, the index of the matched name, and a copy of
    /// the recipe.
    pub fn find_producer(&self, wanted: &[String]) -> Option<(BuildingId, usize, Recipe)> {
        wanted.iter().enumerate().find_map(|(index, name)| {
            self.buildings.values().find_map(|building| {
                building
                    .recipes()
                    .iter()
                    .find(|recipe| recipe.produces(name))
                    .map(|recipe| (building.id, index, recipe.clone()))
            })
        })
    }

    /// Destroy every item that has spoiled by the current tick.
    ///
    /// Claimed items are untagged from their task, which re-acquires a
    /// replacement on its next step. Returns how many items spoiled.
    pub fn spoil_items(&mut self) -> usize {
        let spoiled = self.world.remove_spoiled(self.tick);
        for (coord, item) in &spoiled {
            self.dirty.tiles.insert(*coord);
            if let Some(task_id) = item.in_task
                && let Some(task) = self.tasks.get_mut(task_id)
                && task.untag(item.id).is_some()
            {
                debug!(task = %task_id, item = %item.id, "Tagged item spoiled");
            }
        }
        spoiled.len()
    }

    // -------------------------------------------------------------------
    // Buildings
    // -------------------------------------------------------------------

    /// Run every building's update hook in ID order.
    ///
    /// Failures are logged and skipped. Returns how many tasks the hooks
    /// created.
    pub fn update_buildings(&mut self) -> usize {
        let ids: Vec<BuildingId> = self.buildings.keys().copied().collect();
        let mut created: usize = 0;
        for id in ids {
            match self.update_building(id) {
                Ok(count) => created = created.saturating_add(count),
                Err(err) => {
                    warn!(tick = self.tick, building = %id, error = %err, "Building update failed");
                }
            }
        }
        created
    }

    fn update_building(&mut self, id: BuildingId) -> Result<usize, TaskError> {
        let mut created = self.fill_tool_slots(id)?;
        let queued = self.queued_units(id);

        let building = self
            .buildings
            .get_mut(&id)
            .ok_or(TaskError::BuildingNotFound(id))?;
        let coord = building.coord;
        if let Some(tile) = self.world.get(coord)
            && let Some(outputs) = building.behavior.as_outputs_mut()
        {
            outputs.record_on_hand(tile);
        }

        let mut ctx = BuildingContext::new(
            self.tick,
            id,
            coord,
            &mut self.world,
            &mut self.ids,
            queued,
        );
        building.behavior.update(&mut ctx)?;
        let (mut requests, tiles) = ctx.finish();
        if let Some(order) = building.behavior.as_priority_ordering() {
            requests.sort_by_key(|request| order.priority(&request.recipe));
        }
        self.dirty.tiles.extend(tiles);

        let tick = self.tick;
        requests.retain(|request| {
            let allowed = building.may_request(&request.recipe, tick);
            if !allowed {
                debug!(tick, building = %id, recipe = %request.recipe, "Request held back");
            }
            allowed
        });

        for request in requests {
            self.create_task(id, &request.recipe, request.quantity)?;
            created = created.saturating_add(1);
        }
        Ok(created)
    }

    /// Units owed per recipe by a building's active tasks.
    fn queued_units(&self, id: BuildingId) -> BTreeMap<String, u32> {
        let mut queued: BTreeMap<String, u32> = BTreeMap::new();
        let Some(building) = self.buildings.get(&id) else {
            return queued;
        };
        for task in building
            .active_tasks
            .iter()
            .filter_map(|&task| self.tasks.get(task))
        {
            if let Some(recipe) = &task.recipe {
                let owed = queued.entry(recipe.name.clone()).or_insert(0);
                *owed = owed.saturating_add(task.remaining);
            }
        }
        queued
    }

    /// Queue haul tasks for empty tool slots.
    fn fill_tool_slots(&mut self, id: BuildingId) -> Result<usize, TaskError> {
        let building = self
            .buildings
            .get(&id)
            .ok_or(TaskError::BuildingNotFound(id))?;
        let Some(slots) = building.behavior.as_tool_slots() else {
            return Ok(0);
        };
        let coord = building.coord;
        let wanted: Vec<(String, Option<TaskId>)> = slots
            .slots()
            .iter()
            .map(|slot| (slot.tool.clone(), slot.haul_task))
            .collect();

        let mut present: BTreeMap<String, usize> = BTreeMap::new();
        if let Some(tile) = self.world.get(coord) {
            for item in &tile.items {
                if item.endurance().is_some_and(|left| left > 0) {
                    let count = present.entry(item.name.clone()).or_insert(0);
                    *count = count.saturating_add(1);
                }
            }
        }

        let mut updates: Vec<(usize, Option<TaskId>)> = Vec::new();
        for (index, (tool, haul)) in wanted.into_iter().enumerate() {
            if haul.is_some_and(|task| self.tasks.contains(task)) {
                continue;
            }
            if let Some(count) = present.get_mut(&tool)
                && *count > 0
            {
                *count = count.saturating_sub(1);
                updates.push((index, None));
                continue;
            }
            let found = self.search.collect_unclaimed(&self.world, coord, 1, &mut |item| {
                item.name == tool && item.endurance().is_some_and(|left| left > 0)
            })?;
            let Some(&(from, item)) = found.first() else {
                updates.push((index, None));
                continue;
            };
            let task = self.create_item_move_task(item, from, coord, Some(id))?;
            info!(building = %id, tool = %tool, task = %task, "Hauling tool to slot");
            updates.push((index, Some(task)));
        }

        let hauls = updates.iter().filter(|(_, task)| task.is_some()).count();
        if let Some(slots) = self
            .buildings
            .get_mut(&id)
            .and_then(|building| building.behavior.as_tool_slots_mut())
        {
            for (index, task) in updates {
                if let Some(slot) = slots.slots_mut().get_mut(index) {
                    slot.haul_task = task;
                }
            }
        }
        Ok(hauls)
    }

    // -------------------------------------------------------------------
    // Change tracking
    // -------------------------------------------------------------------

    /// Note that worker state visible to the renderer changed.
    pub const fn mark_workers_dirty(&mut self) {
        self.dirty.workers = true;
    }

    /// Note that a tile's items changed.
    pub fn mark_tile_dirty(&mut self, coord: Coord) {
        self.dirty.tiles.insert(coord);
    }

    /// Take and reset the change set.
    pub fn take_dirty(&mut self) -> DirtySet {
        core::mem::take(&mut self.dirty)
    }

    // -------------------------------------------------------------------
    // Consistency
    // -------------------------------------------------------------------

    /// Check every claim, tag, stack, and building list for consistency.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        let mut tagged_by: BTreeMap<ItemId, TaskId> = BTreeMap::new();
        for task in self.tasks.iter() {
            for tag in &task.tagged {
                if let Some(first) = tagged_by.insert(tag.item, task.id)
                    && first != task.id
                {
                    violations.push(InvariantViolation::DoubleTag {
                        item: tag.item,
                        first,
                        second: task.id,
                    });
                }
                if self.locate_item(tag.item).is_none() {
                    violations.push(InvariantViolation::MissingTaggedItem {
                        item: tag.item,
                        task: task.id,
                    });
                } else if self.claim_of(tag.item) != Some(task.id) {
                    violations.push(InvariantViolation::UnclaimedTag {
                        item: tag.item,
                        task: task.id,
                    });
                }
            }
        }

        let claims = self
            .world
            .items()
            .map(|(_, item)| item)
            .chain(self.workers.iter().flat_map(|worker| worker.inventory.iter()));
        for item in claims {
            let Some(task_id) = item.in_task else {
                continue;
            };
            match self.tasks.get(task_id) {
                None => violations.push(InvariantViolation::DanglingClaim {
                    item: item.id,
                    task: task_id,
                }),
                Some(task) if !task.has_tagged(item.id) => {
                    violations.push(InvariantViolation::UntrackedClaim {
                        item: item.id,
                        task: task_id,
                    });
                }
                Some(_) => {}
            }
        }

        for worker in &self.workers {
            for task_id in worker.tasks.iter() {
                match self.tasks.get(task_id) {
                    None => violations.push(InvariantViolation::OrphanedTaskReference {
                        worker: worker.id,
                        task: task_id,
                    }),
                    Some(task) if task.worker != Some(worker.id) => {
                        violations.push(InvariantViolation::StackMismatch {
                            worker: worker.id,
                            task: task_id,
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        for building in self.buildings.values() {
            for &task_id in &building.active_tasks {
                if !self.tasks.contains(task_id) {
                    violations.push(InvariantViolation::StaleBuildingTask {
                        building: building.id,
                        task: task_id,
                    });
                }
            }
        }

        violations
    }

    /// Repair references after a load.
    ///
    /// Drops stack entries, building task entries, parent links, and tags
    /// that point at nothing; deletes move tasks whose item is gone;
    /// clears claims held by vanished tasks; re-attaches assigned tasks a
    /// worker's stack forgot; and moves the ID allocator past every
    /// restored ID.
    pub fn resync_references(&mut self) -> ResyncReport {
        let mut report = ResyncReport::default();
        let worker_ids: BTreeSet<WorkerId> = self.workers.iter().map(|worker| worker.id).collect();

        // Tasks: parents, workers, tags.
        let mut doomed = Vec::new();
        for task_id in self.tasks.ids() {
            let parent_alive = self
                .tasks
                .get(task_id)
                .and_then(|task| task.parent)
                .map(|parent| self.tasks.contains(parent));
            let Some(task) = self.tasks.get_mut(task_id) else {
                continue;
            };
            if parent_alive == Some(false) {
                task.parent = None;
                report.references_dropped = report.references_dropped.saturating_add(1);
            }
            if task.worker.is_some_and(|worker| !worker_ids.contains(&worker)) {
                task.worker = None;
                task.status = TaskStatus::Unassigned;
                report.references_dropped = report.references_dropped.saturating_add(1);
            }
            if let Some(item) = task.moved_item()
                && self.world.locate(item).is_none()
                && !self.workers.iter().any(|worker| worker.is_carrying(item))
            {
                doomed.push(task_id);
            }
        }
        for task_id in doomed {
            if self.delete_task(task_id).is_some() {
                report.tasks_dropped = report.tasks_dropped.saturating_add(1);
            }
        }

        for task_id in self.tasks.ids() {
            let tags: Vec<Tag> = self
                .tasks
                .get(task_id)
                .map(|task| task.tagged.clone())
                .unwrap_or_default();
            for tag in tags {
                let holder = self.claim_of(tag.item);
                let present = self.locate_item(tag.item).is_some();
                let keep = present
                    && match holder {
                        Some(holder) => holder == task_id,
                        None => self.tag_item(task_id, tag.item, tag.group).is_ok(),
                    };
                if !keep && let Some(task) = self.tasks.get_mut(task_id) {
                    task.untag(tag.item);
                    report.references_dropped = report.references_dropped.saturating_add(1);
                }
            }
        }

        // Claims naming tasks that are gone or do not tag the item.
        let tasks = &self.tasks;
        let mut claims_cleared = self
            .world
            .release_where(|task| tasks.contains(task))
            .len();
        for worker in &mut self.workers {
            for item in &mut worker.inventory {
                if item.in_task.is_some_and(|task| !tasks.contains(task)) {
                    item.in_task = None;
                    claims_cleared = claims_cleared.saturating_add(1);
                }
            }
        }
        report.claims_cleared = claims_cleared;

        // Worker stacks.
        for worker in &mut self.workers {
            let before = worker.tasks.len();
            let id = worker.id;
            worker.tasks.retain(|task| {
                tasks.get(task).is_some_and(|task| task.worker == Some(id))
            });
            let dropped = before.saturating_sub(worker.tasks.len());
            report.references_dropped = report.references_dropped.saturating_add(dropped);
            for task in tasks.iter() {
                if task.worker == Some(id) && !worker.tasks.contains(task.id) {
                    worker.tasks.push_back(task.id);
                }
            }
        }

        // Building lists and behaviour-held task IDs.
        for building in self.buildings.values_mut() {
            let before = building.active_tasks.len();
            building.active_tasks.retain(|&task| tasks.contains(task));
            let dropped = before.saturating_sub(building.active_tasks.len());
            report.references_dropped = report.references_dropped.saturating_add(dropped);
            building.behavior.forget_tasks(&|task| tasks.contains(task));
        }

        self.observe_restored_ids();
        if report != ResyncReport::default() {
            info!(
                tasks_dropped = report.tasks_dropped,
                references_dropped = report.references_dropped,
                claims_cleared = report.claims_cleared,
                "References re-resolved after load"
            );
        }
        report
    }

    fn observe_restored_ids(&mut self) {
        let mut highest: u64 = 0;
        for id in self.tasks.ids() {
            highest = highest.max(id.into_inner());
        }
        for worker in &self.workers {
            highest = highest.max(worker.id.into_inner());
            for item in &worker.inventory {
                highest = highest.max(item.id.into_inner());
            }
        }
        for id in self.buildings.keys() {
            highest = highest.max(id.into_inner());
        }
        for (_, item) in self.world.items() {
            highest = highest.max(item.id.into_inner());
        }
        self.ids.observe(highest);
    }
}
