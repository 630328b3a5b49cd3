//! Error types for the `homestead-agents` crate.
//!
//! Every failure inside the worker decision procedure is a [`TaskError`].
//! None of them are fatal: the worker cancels its active task, logs the
//! error, and moves on.

use homestead_types::{BuildingId, Coord, ItemId, TaskId, WorkerId};
use homestead_world::WorldError;

/// Errors raised while creating, running, or tearing down tasks.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// A tile the task depends on does not exist.
    #[error("no tile at {0}")]
    MissingTile(Coord),

    /// An item the task tagged or carries is gone.
    #[error("item {0} is missing")]
    MissingItem(ItemId),

    /// A search or walk could not reach its goal.
    #[error("no path from {origin} after scanning {tiles_scanned} tiles")]
    PathNotFound {
        /// Where the search started.
        origin: Coord,
        /// Tiles examined before giving up.
        tiles_scanned: u32,
    },

    /// No item on the map and no building can supply an input.
    #[error("task {task} cannot obtain any of: {wanted}")]
    UnresolvableRecipe {
        /// The task that needed the input.
        task: TaskId,
        /// Comma-separated names of the acceptable items.
        wanted: String,
    },

    /// A tool wore out mid-task. Reported, not cancelled.
    #[error("tool {item} broke while working task {task}")]
    ToolBroken {
        /// The task using the tool.
        task: TaskId,
        /// The destroyed tool.
        item: ItemId,
    },

    /// A worker's stack still referenced a task after it was deleted.
    #[error("worker {worker} still referenced deleted task {task}")]
    OrphanedTaskReference {
        /// The worker holding the stale reference.
        worker: WorkerId,
        /// The deleted task.
        task: TaskId,
    },

    /// The task is not in the registry.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The worker does not exist.
    #[error("worker not found: {0}")]
    WorkerNotFound(WorkerId),

    /// The building does not exist.
    #[error("building not found: {0}")]
    BuildingNotFound(BuildingId),

    /// No catalog template has this name.
    #[error("unknown building template: {0}")]
    UnknownTemplate(String),

    /// The building has no recipe with this name.
    #[error("building {building} has no recipe named {recipe:?}")]
    UnknownRecipe {
        /// The building asked.
        building: BuildingId,
        /// The missing recipe name.
        recipe: String,
    },

    /// A saved building state could not be read or written.
    #[error("building state for template {template:?} is invalid: {source}")]
    InvalidBuildingState {
        /// Template the state belongs to.
        template: String,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in task calculation")]
    ArithmeticOverflow,

    /// Any other map failure.
    #[error("world error: {0}")]
    World(WorldError),
}

impl From<WorldError> for TaskError {
    fn from(err: WorldError) -> Self {
        match err {
            WorldError::MissingTile(coord) => Self::MissingTile(coord),
            WorldError::MissingItem(item) => Self::MissingItem(item),
            WorldError::PathNotFound {
                origin,
                tiles_scanned,
            } => Self::PathNotFound {
                origin,
                tiles_scanned,
            },
            WorldError::ArithmeticOverflow => Self::ArithmeticOverflow,
            other @ (WorldError::ItemAlreadyClaimed { .. }
            | WorldError::DuplicateTile(_)
            | WorldError::DuplicateItem(_)) => Self::World(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_errors_map_onto_task_taxonomy() {
        let err = TaskError::from(WorldError::MissingTile(Coord::new(1, 2)));
        assert!(matches!(err, TaskError::MissingTile(c) if c == Coord::new(1, 2)));

        let err = TaskError::from(WorldError::PathNotFound {
            origin: Coord::new(0, 0),
            tiles_scanned: 9,
        });
        assert!(matches!(err, TaskError::PathNotFound { tiles_scanned: 9, .. }));

        let err = TaskError::from(WorldError::DuplicateItem(ItemId(3)));
        assert!(matches!(err, TaskError::World(WorldError::DuplicateItem(_))));
    }
}
