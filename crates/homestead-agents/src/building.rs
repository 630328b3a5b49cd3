//! Buildings and the capability traits that define them.
//!
//! A building is a tile position, a list of active task IDs, and a boxed
//! [`BuildingBehavior`]. Behaviour is assembled from capabilities:
//!
//! - [`Crafting`] -- every building has it: its recipes, the assignability
//!   predicate, an optional custom work-site locator, and the completion
//!   callback that consumes inputs and emits outputs.
//! - [`Outputs`] -- keeps an on-hand count of produced goods lying on the
//!   building's tile.
//! - [`ToolSlots`] -- tools the building wants kept on its tile. The colony
//!   queues haul tasks to fill empty slots.
//! - [`PriorityOrdering`] -- orders the building's task requests.
//!
//! The scheduler discovers optional capabilities through the `as_*`
//! accessors on [`BuildingBehavior`], which a concrete type answers once,
//! statically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use homestead_types::{
    BuildingId, BuildingRecord, Coord, IdAllocator, InputRole, ItemId, ItemTemplate, TaskId,
};
use homestead_world::{Tile, TileMap};

use crate::error::TaskError;
use crate::recipe::Recipe;
use crate::task::Tag;
use crate::worker::Worker;

// ---------------------------------------------------------------------------
// Contexts handed to building callbacks
// ---------------------------------------------------------------------------

/// Everything a completion callback may touch.
#[derive(Debug)]
pub struct CompletionContext<'a> {
    /// Current tick.
    pub tick: u64,
    /// The completing task.
    pub task: TaskId,
    /// The task's recipe.
    pub recipe: &'a Recipe,
    /// Where the work happened. Outputs land here.
    pub site: Coord,
    /// Items the task reserved.
    pub tagged: &'a [Tag],
    /// The map.
    pub world: &'a mut TileMap,
    /// The colony ID source.
    pub ids: &'a mut IdAllocator,
    /// Items consumed so far.
    pub consumed: Vec<ItemId>,
    /// Items emitted so far.
    pub produced: Vec<ItemId>,
}

impl CompletionContext<'_> {
    /// Remove every tagged item whose group is consumed. Tools are kept.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::MissingItem`] if a tagged item is gone.
    pub fn consume_inputs(&mut self) -> Result<(), TaskError> {
        for tag in self.tagged {
            if self.recipe.role_of(tag.group) != Some(InputRole::Item) {
                continue;
            }
            self.world.take_item(tag.item)?;
            self.consumed.push(tag.item);
        }
        Ok(())
    }

    /// Emit every recipe output at the work site.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::MissingTile`] if the site tile is gone.
    pub fn emit_outputs(&mut self) -> Result<(), TaskError> {
        let recipe = self.recipe;
        for output in &recipe.outputs {
            self.emit(output)?;
        }
        Ok(())
    }

    /// Create one item from `template` at the work site.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::MissingTile`] if the site tile is gone.
    pub fn emit(&mut self, template: &ItemTemplate) -> Result<ItemId, TaskError> {
        let id = self.ids.next_item();
        self.world
            .place_item(self.site, template.instantiate(id, self.tick))?;
        self.produced.push(id);
        Ok(id)
    }
}

/// A request from a building's update hook for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    /// Name of one of the building's recipes.
    pub recipe: String,
    /// Units to produce.
    pub quantity: u32,
}

/// Everything a building update hook may touch.
#[derive(Debug)]
pub struct BuildingContext<'a> {
    /// Current tick.
    pub tick: u64,
    /// The building being updated.
    pub building: BuildingId,
    /// The building's tile.
    pub coord: Coord,
    /// The map.
    pub world: &'a mut TileMap,
    /// The colony ID source.
    pub ids: &'a mut IdAllocator,
    queued: BTreeMap<String, u32>,
    requests: Vec<TaskRequest>,
    changed_tiles: Vec<Coord>,
}

impl<'a> BuildingContext<'a> {
    /// Create a context. `queued` maps recipe names to units still owed by
    /// the building's active tasks.
    pub const fn new(
        tick: u64,
        building: BuildingId,
        coord: Coord,
        world: &'a mut TileMap,
        ids: &'a mut IdAllocator,
        queued: BTreeMap<String, u32>,
    ) -> Self {
        Self {
            tick,
            building,
            coord,
            world,
            ids,
            queued,
            requests: Vec::new(),
            changed_tiles: Vec::new(),
        }
    }

    /// Units of `recipe` already owed by active tasks or earlier requests.
    pub fn queued_units(&self, recipe: &str) -> u32 {
        self.queued.get(recipe).copied().unwrap_or(0)
    }

    /// Ask the colony for a new task.
    pub fn request_task(&mut self, recipe: impl Into<String>, quantity: u32) {
        let recipe = recipe.into();
        let owed = self.queued.entry(recipe.clone()).or_insert(0);
        *owed = owed.saturating_add(quantity);
        self.requests.push(TaskRequest { recipe, quantity });
    }

    /// Create an item from `template` on `coord`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::MissingTile`] if there is no tile at `coord`.
    pub fn spawn_item(&mut self, coord: Coord, template: &ItemTemplate) -> Result<ItemId, TaskError> {
        let id = self.ids.next_item();
        self.world
            .place_item(coord, template.instantiate(id, self.tick))?;
        self.changed_tiles.push(coord);
        Ok(id)
    }

    /// Hand back the requests and touched tiles.
    pub fn finish(self) -> (Vec<TaskRequest>, Vec<Coord>) {
        (self.requests, self.changed_tiles)
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Recipes a building can run and how they run.
pub trait Crafting {
    /// The building's recipes.
    fn recipes(&self) -> &[Recipe];

    /// Whether `worker` may take a task for `recipe`.
    fn can_assign(&self, recipe: &Recipe, worker: &Worker) -> bool {
        let _ = (recipe, worker);
        true
    }

    /// Custom work site for [`WorkSite::Locator`](crate::recipe::WorkSite)
    /// recipes.
    fn locate_work_site(&self, recipe: &Recipe, world: &TileMap, origin: Coord) -> Option<Coord> {
        let _ = (recipe, world, origin);
        None
    }

    /// Finish one unit of a craft or construct recipe.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] if an input has vanished or the site is gone.
    fn complete(&mut self, ctx: &mut CompletionContext<'_>) -> Result<(), TaskError> {
        ctx.consume_inputs()?;
        ctx.emit_outputs()
    }
}

/// Tracks produced goods lying on the building's tile.
pub trait Outputs {
    /// Units of `item` on hand.
    fn on_hand(&self, item: &str) -> u32;

    /// Desired on-hand stock of `item`, if the building keeps one.
    fn stock_target(&self, item: &str) -> Option<u32>;

    /// Recount on-hand stock from the building's tile.
    fn record_on_hand(&mut self, tile: &Tile);
}

/// One tool a building wants kept on its tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSlot {
    /// Tool name.
    pub tool: String,
    /// Haul task currently fetching a tool for this slot.
    #[serde(default)]
    pub haul_task: Option<TaskId>,
}

impl ToolSlot {
    /// An empty slot for `tool`.
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            haul_task: None,
        }
    }
}

/// Tools kept on the building's tile.
pub trait ToolSlots {
    /// The slots.
    fn slots(&self) -> &[ToolSlot];

    /// The slots, for recording haul tasks.
    fn slots_mut(&mut self) -> &mut [ToolSlot];
}

/// Orders a building's task requests.
pub trait PriorityOrdering {
    /// Rank of `recipe`. Lower runs first.
    fn priority(&self, recipe: &str) -> u32;
}

/// The behaviour of a building, assembled from capabilities.
pub trait BuildingBehavior: Crafting + core::fmt::Debug + Send + Sync {
    /// Catalog template this behaviour was built from.
    fn template(&self) -> &str;

    /// On-hand stock tracking, if the building has it.
    fn as_outputs(&self) -> Option<&dyn Outputs> {
        None
    }

    /// On-hand stock tracking for mutation.
    fn as_outputs_mut(&mut self) -> Option<&mut dyn Outputs> {
        None
    }

    /// Tool slots, if the building has them.
    fn as_tool_slots(&self) -> Option<&dyn ToolSlots> {
        None
    }

    /// Tool slots for mutation.
    fn as_tool_slots_mut(&mut self) -> Option<&mut dyn ToolSlots> {
        None
    }

    /// Request ordering, if the building has one.
    fn as_priority_ordering(&self) -> Option<&dyn PriorityOrdering> {
        None
    }

    /// Per-tick update hook.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] if the hook fails. The colony logs it and
    /// carries on with the next building.
    fn update(&mut self, ctx: &mut BuildingContext<'_>) -> Result<(), TaskError> {
        let _ = ctx;
        Ok(())
    }

    /// Behaviour state to persist.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidBuildingState`] if the state cannot be
    /// serialized.
    fn save(&self) -> Result<serde_json::Value, TaskError>;

    /// Drop remembered task IDs rejected by `keep`. Called after a load
    /// so stale references do not survive.
    fn forget_tasks(&mut self, keep: &dyn Fn(TaskId) -> bool) {
        let _ = keep;
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// A placed building.
#[derive(Debug)]
pub struct Building {
    /// Unique building identifier.
    pub id: BuildingId,
    /// Tile the building occupies.
    pub coord: Coord,
    /// Tasks the building owns, in creation order.
    pub active_tasks: Vec<TaskId>,
    /// Recipes whose last task could not be resolved, with the tick before
    /// which the building will not request them again.
    pub request_retry: BTreeMap<String, u64>,
    /// Recipes and capabilities.
    pub behavior: Box<dyn BuildingBehavior>,
}

impl Building {
    /// Place a building.
    pub fn new(id: BuildingId, coord: Coord, behavior: Box<dyn BuildingBehavior>) -> Self {
        Self {
            id,
            coord,
            active_tasks: Vec::new(),
            request_retry: BTreeMap::new(),
            behavior,
        }
    }

    /// Catalog template name.
    pub fn template(&self) -> &str {
        self.behavior.template()
    }

    /// The building's recipes.
    pub fn recipes(&self) -> &[Recipe] {
        self.behavior.recipes()
    }

    /// Look up a recipe by name.
    pub fn recipe(&self, name: &str) -> Option<&Recipe> {
        self.recipes().iter().find(|recipe| recipe.name == name)
    }

    /// The first recipe producing any of `items`, searched item by item.
    ///
    /// Returns the index into `items` that matched with the recipe.
    pub fn producer_of(&self, items: &[String]) -> Option<(usize, &Recipe)> {
        items.iter().enumerate().find_map(|(index, item)| {
            self.recipes()
                .iter()
                .find(|recipe| recipe.produces(item))
                .map(|recipe| (index, recipe))
        })
    }

    /// Detach a task. Returns whether it was listed.
    pub fn detach(&mut self, task: TaskId) -> bool {
        let before = self.active_tasks.len();
        self.active_tasks.retain(|&active| active != task);
        self.active_tasks.len() != before
    }

    /// Hold off requesting `recipe` until `until`.
    pub fn defer_recipe(&mut self, recipe: impl Into<String>, until: u64) {
        self.request_retry.insert(recipe.into(), until);
    }

    /// Whether `recipe` may be requested at `tick`. Expired holds are
    /// dropped.
    pub fn may_request(&mut self, recipe: &str, tick: u64) -> bool {
        match self.request_retry.get(recipe) {
            Some(&until) if tick < until => false,
            Some(_) => {
                self.request_retry.remove(recipe);
                true
            }
            None => true,
        }
    }

    /// The persisted form of the building.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidBuildingState`] if the behaviour state
    /// cannot be serialized.
    pub fn save(&self) -> Result<BuildingRecord, TaskError> {
        Ok(BuildingRecord {
            id: self.id,
            template: self.template().to_owned(),
            coord: self.coord,
            active_tasks: self.active_tasks.clone(),
            request_retry: self.request_retry.clone(),
            state: self.behavior.save()?,
        })
    }
}
