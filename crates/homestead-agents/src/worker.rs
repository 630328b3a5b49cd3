//! Workers and their task stacks.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use homestead_types::{Coord, Direction, Item, ItemId, TaskId, WorkerId};

// ---------------------------------------------------------------------------
// TaskStack
// ---------------------------------------------------------------------------

/// A worker's pending tasks, front first.
///
/// The front entry is the active task. Sub-tasks are pushed to the front
/// and must finish (or be cancelled) before the task beneath them runs
/// again. Completed tasks leave from the front; cancelled or deleted tasks
/// may leave from anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskStack {
    entries: VecDeque<TaskId>,
}

impl TaskStack {
    /// Create an empty stack.
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// The active task.
    pub fn active(&self) -> Option<TaskId> {
        self.entries.front().copied()
    }

    /// Make `task` the active task, suspending the current one.
    pub fn push_front(&mut self, task: TaskId) {
        self.entries.push_front(task);
    }

    /// Queue `task` behind everything already on the stack.
    pub fn push_back(&mut self, task: TaskId) {
        self.entries.push_back(task);
    }

    /// Remove and return the active task.
    pub fn pop_front(&mut self) -> Option<TaskId> {
        self.entries.pop_front()
    }

    /// Remove every occurrence of `task`. Returns whether any was found.
    pub fn remove(&mut self, task: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|&entry| entry != task);
        self.entries.len() != before
    }

    /// Whether `task` is anywhere on the stack.
    pub fn contains(&self, task: TaskId) -> bool {
        self.entries.contains(&task)
    }

    /// Number of stacked tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate front to back.
    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.entries.iter().copied()
    }

    /// Keep only tasks accepted by `keep`, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(TaskId) -> bool) {
        self.entries.retain(|&entry| keep(entry));
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// An autonomous colonist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Unique worker identifier.
    pub id: WorkerId,
    /// Display name.
    pub name: String,
    /// Current tile.
    pub position: Coord,
    /// Movement credit toward the next step, in hundredths of a tick.
    /// Zero when not mid-step.
    pub move_credit: u32,
    /// Remaining steps of the cached path.
    pub path: VecDeque<Direction>,
    /// Destination the cached path leads to.
    pub path_goal: Option<Coord>,
    /// Pending tasks, active first.
    pub tasks: TaskStack,
    /// Items being carried.
    pub inventory: Vec<Item>,
    /// Tick at which the worker next gets hungry.
    pub hungry_at: u64,
}

impl Worker {
    /// Create an idle worker.
    pub fn new(id: WorkerId, name: impl Into<String>, position: Coord, hungry_at: u64) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            move_credit: 0,
            path: VecDeque::new(),
            path_goal: None,
            tasks: TaskStack::new(),
            inventory: Vec::new(),
            hungry_at,
        }
    }

    /// Whether the worker is carrying `item`.
    pub fn is_carrying(&self, item: ItemId) -> bool {
        self.inventory.iter().any(|carried| carried.id == item)
    }

    /// Look up a carried item for mutation.
    pub fn carried_mut(&mut self, item: ItemId) -> Option<&mut Item> {
        self.inventory.iter_mut().find(|carried| carried.id == item)
    }

    /// Take a carried item out of the inventory.
    pub fn take_carried(&mut self, item: ItemId) -> Option<Item> {
        let index = self.inventory.iter().position(|carried| carried.id == item)?;
        Some(self.inventory.remove(index))
    }

    /// Forget the cached path and any step in progress.
    pub fn clear_path(&mut self) {
        self.path.clear();
        self.path_goal = None;
        self.move_credit = 0;
    }
}

#[cfg(test)]
mod tests {
    use homestead_types::ItemRole;

    use super::*;

    #[test]
    fn stack_front_is_active() {
        let mut stack = TaskStack::new();
        stack.push_front(TaskId(1));
        stack.push_front(TaskId(2));
        assert_eq!(stack.active(), Some(TaskId(2)));
        assert_eq!(stack.pop_front(), Some(TaskId(2)));
        assert_eq!(stack.active(), Some(TaskId(1)));
    }

    #[test]
    fn remove_from_middle_keeps_order() {
        let mut stack = TaskStack::new();
        for id in [3, 2, 1] {
            stack.push_front(TaskId(id));
        }
        assert!(stack.remove(TaskId(2)));
        assert!(!stack.remove(TaskId(2)));
        assert_eq!(stack.iter().collect::<Vec<_>>(), vec![TaskId(1), TaskId(3)]);
    }

    #[test]
    fn carried_items_can_be_taken() {
        let mut worker = Worker::new(WorkerId(1), "Ada", Coord::new(0, 0), 100);
        worker
            .inventory
            .push(Item::new(ItemId(8), "Log", ItemRole::Plain));
        assert!(worker.is_carrying(ItemId(8)));
        assert!(worker.take_carried(ItemId(8)).is_some());
        assert!(!worker.is_carrying(ItemId(8)));
    }
}
