//! Tasks and the global task registry.
//!
//! A [`Task`] is one unit of scheduled work: either a recipe run (possibly
//! a batch of several units) or a two-phase item move. Tasks live in the
//! [`TaskRegistry`] keyed by [`TaskId`]. Because IDs are issued in
//! creation order, iterating the registry visits the oldest task first.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use homestead_types::{BuildingId, Coord, ItemId, MovePhase, TaskId, TaskStatus, WorkerId};

use crate::recipe::Recipe;

/// Fallback label for tasks that carry no recipe.
const MOVE_LABEL: &str = "move item";

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// What kind of work a task does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// Run the task's recipe.
    Recipe,
    /// Carry one item from `from` to `to`.
    MoveItem {
        /// The item being moved.
        item: ItemId,
        /// Where to pick the item up.
        from: Coord,
        /// Where to put it down.
        to: Coord,
        /// Current phase.
        phase: MovePhase,
    },
}

/// An item reserved by a task for one of its input groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// The reserved item.
    pub item: ItemId,
    /// Index of the input group it fills.
    pub group: usize,
}

/// A unit of scheduled work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Building that owns the task, if any.
    pub building: Option<BuildingId>,
    /// Recipe being run. `None` for item moves.
    pub recipe: Option<Recipe>,
    /// Recipe run or item move.
    pub kind: TaskKind,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Worker whose stack holds the task.
    pub worker: Option<WorkerId>,
    /// Task this one was spawned to serve.
    pub parent: Option<TaskId>,
    /// Tile where the work happens, once known.
    pub target: Option<Coord>,
    /// Chosen option per input group, parallel to the recipe's inputs.
    pub choices: Vec<Option<usize>>,
    /// Items reserved by this task.
    pub tagged: Vec<Tag>,
    /// Work ticks accumulated on the current unit.
    pub progress: u32,
    /// Units still to produce, including the current one.
    pub remaining: u32,
}

impl Task {
    /// A recipe task for `quantity` units.
    pub fn for_recipe(
        id: TaskId,
        building: Option<BuildingId>,
        recipe: Recipe,
        quantity: u32,
    ) -> Self {
        let groups = recipe.inputs.len();
        Self {
            id,
            building,
            recipe: Some(recipe),
            kind: TaskKind::Recipe,
            status: TaskStatus::Unassigned,
            worker: None,
            parent: None,
            target: None,
            choices: vec![None; groups],
            tagged: Vec::new(),
            progress: 0,
            remaining: quantity.max(1),
        }
    }

    /// A two-phase move of `item` from `from` to `to`.
    pub const fn for_move(
        id: TaskId,
        building: Option<BuildingId>,
        item: ItemId,
        from: Coord,
        to: Coord,
    ) -> Self {
        Self {
            id,
            building,
            recipe: None,
            kind: TaskKind::MoveItem {
                item,
                from,
                to,
                phase: MovePhase::Pickup,
            },
            status: TaskStatus::Unassigned,
            worker: None,
            parent: None,
            target: Some(from),
            choices: Vec::new(),
            tagged: Vec::new(),
            progress: 0,
            remaining: 1,
        }
    }

    /// Recipe name, or a fixed label for moves.
    pub fn label(&self) -> &str {
        self.recipe
            .as_ref()
            .map_or(MOVE_LABEL, |recipe| recipe.name.as_str())
    }

    /// Whether the task is a meal.
    pub fn is_meal(&self) -> bool {
        self.recipe.as_ref().is_some_and(Recipe::is_meal)
    }

    /// Whether the task waits in the pool with no worker.
    pub const fn is_unassigned(&self) -> bool {
        matches!(self.status, TaskStatus::Unassigned) && self.worker.is_none()
    }

    /// Whether `item` is tagged by this task.
    pub fn has_tagged(&self, item: ItemId) -> bool {
        self.tagged.iter().any(|tag| tag.item == item)
    }

    /// Number of items tagged for `group`.
    pub fn tagged_in_group(&self, group: usize) -> usize {
        self.tagged.iter().filter(|tag| tag.group == group).count()
    }

    /// Remove `item` from the tagged list, returning its tag.
    pub fn untag(&mut self, item: ItemId) -> Option<Tag> {
        let index = self.tagged.iter().position(|tag| tag.item == item)?;
        Some(self.tagged.remove(index))
    }

    /// The item a move task carries.
    pub const fn moved_item(&self) -> Option<ItemId> {
        match self.kind {
            TaskKind::MoveItem { item, .. } => Some(item),
            TaskKind::Recipe => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TaskRegistry
// ---------------------------------------------------------------------------

/// Every live task, keyed and ordered by ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRegistry {
    /// Tasks in creation order.
    tasks: BTreeMap<TaskId, Task>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }

    /// Add a task, replacing any task with the same ID.
    pub fn insert(&mut self, task: Task) -> Option<Task> {
        self.tasks.insert(task.id, task)
    }

    /// Look up a task.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Look up a task for mutation.
    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    /// Remove a task, returning it.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        self.tasks.remove(&id)
    }

    /// Whether a task exists.
    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether there are no live tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterate tasks oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Iterate tasks oldest first for mutation.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.values_mut()
    }

    /// Every task ID, oldest first.
    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.keys().copied().collect()
    }

    /// Tasks spawned on behalf of `parent`.
    pub fn children_of(&self, parent: TaskId) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|task| task.parent == Some(parent))
            .map(|task| task.id)
            .collect()
    }

    /// How many ancestors `id` has.
    ///
    /// Stops counting at the registry size so a malformed parent cycle
    /// cannot loop forever.
    pub fn depth(&self, id: TaskId) -> usize {
        let mut depth: usize = 0;
        let mut current = self.tasks.get(&id).and_then(|task| task.parent);
        while let Some(parent) = current {
            if depth >= self.tasks.len() {
                break;
            }
            depth = depth.saturating_add(1);
            current = self.tasks.get(&parent).and_then(|task| task.parent);
        }
        depth
    }

    /// The outermost ancestor of `id` (itself when it has no parent).
    pub fn root_of(&self, id: TaskId) -> TaskId {
        let mut root = id;
        let mut hops: usize = 0;
        while let Some(parent) = self.tasks.get(&root).and_then(|task| task.parent) {
            if hops >= self.tasks.len() || !self.tasks.contains_key(&parent) {
                break;
            }
            root = parent;
            hops = hops.saturating_add(1);
        }
        root
    }

    /// Oldest unassigned task accepted by `accept`.
    pub fn oldest_unassigned(&self, mut accept: impl FnMut(&Task) -> bool) -> Option<TaskId> {
        self.tasks
            .values()
            .find(|task| task.is_unassigned() && accept(task))
            .map(|task| task.id)
    }
}
