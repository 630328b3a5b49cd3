//! Enumeration types for the Homestead colony scheduler.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Ground type of a tile.
///
/// Terrain decides walking lag, the per-step cost multiplier applied to a
/// worker's base step time. Water cannot be entered at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Terrain {
    /// Packed road, the fastest surface.
    Road,
    /// Open grass.
    Grass,
    /// Loose sand.
    Sand,
    /// Undergrowth between trees.
    Forest,
    /// Broken rock.
    Rock,
    /// Open water. Impassable.
    Water,
}

impl Terrain {
    /// Walking lag of the tile, or `None` when it cannot be entered.
    pub const fn walk_lag(self) -> Option<u32> {
        match self {
            Self::Road => Some(1),
            Self::Grass => Some(2),
            Self::Sand | Self::Forest => Some(3),
            Self::Rock => Some(4),
            Self::Water => None,
        }
    }

    /// Whether workers can stand on and walk through the tile.
    pub const fn is_passable(self) -> bool {
        self.walk_lag().is_some()
    }
}

// ---------------------------------------------------------------------------
// Recipe inputs
// ---------------------------------------------------------------------------

/// How a recipe input group uses its items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRole {
    /// Consumed when a unit of the recipe completes.
    #[default]
    Item,
    /// Worn down by one endurance per tick of progress and never consumed.
    Tool,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// In the global pool, waiting for a worker.
    #[default]
    Unassigned,
    /// On a worker's stack but not yet producing progress.
    Assigned,
    /// The worker is at the work site and progress is accumulating.
    InProgress,
}

/// Phase of an item-move task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePhase {
    /// Walking to the item to pick it up.
    Pickup,
    /// Carrying the item to its destination.
    Putdown,
}
