//! Core entity structs shared across the workspace.
//!
//! Covers items and their roles, item templates used by recipe outputs, and
//! the persisted form of a building.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coord::Coord;
use crate::ids::{BuildingId, ItemId, TaskId};

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// What an item is for, with the per-role data it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ItemRole {
    /// A plain material with no special behaviour.
    Plain,
    /// A tool that wears down while used.
    Tool {
        /// Remaining uses. The tool is destroyed when this reaches zero.
        endurance: u32,
        /// Work speed multiplier in percent. Stored, not yet applied.
        efficiency: u32,
    },
    /// A material that disappears from the world at `spoils_at`.
    Perishable {
        /// Tick at which the item spoils.
        spoils_at: u64,
    },
    /// Something a worker can eat.
    Food {
        /// Ticks of satiation granted by eating one unit.
        nourishment: u64,
        /// Tick at which the item spoils, if it ever does.
        spoils_at: Option<u64>,
    },
}

/// A single object in the colony.
///
/// An item is either on exactly one tile or in exactly one worker's
/// inventory. `in_task` is the claim: at most one task may tag an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique item identifier.
    pub id: ItemId,
    /// Item name, matched against recipe options.
    pub name: String,
    /// Role and role data.
    pub role: ItemRole,
    /// The task that has claimed this item, if any.
    pub in_task: Option<TaskId>,
}

impl Item {
    /// Create an unclaimed item.
    pub fn new(id: ItemId, name: impl Into<String>, role: ItemRole) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            in_task: None,
        }
    }

    /// Whether any task holds a claim on this item.
    pub const fn is_claimed(&self) -> bool {
        self.in_task.is_some()
    }

    /// Whether this item is a tool.
    pub const fn is_tool(&self) -> bool {
        matches!(self.role, ItemRole::Tool { .. })
    }

    /// Remaining endurance when this item is a tool.
    pub const fn endurance(&self) -> Option<u32> {
        match self.role {
            ItemRole::Tool { endurance, .. } => Some(endurance),
            _ => None,
        }
    }

    /// Tick at which the item spoils, if it is perishable.
    pub const fn spoils_at(&self) -> Option<u64> {
        match self.role {
            ItemRole::Perishable { spoils_at } => Some(spoils_at),
            ItemRole::Food { spoils_at, .. } => spoils_at,
            ItemRole::Plain | ItemRole::Tool { .. } => None,
        }
    }

    /// Whether the item has spoiled by `tick`.
    pub fn is_spoiled(&self, tick: u64) -> bool {
        self.spoils_at().is_some_and(|at| tick >= at)
    }

    /// Whether the item is food.
    pub const fn is_food(&self) -> bool {
        matches!(self.role, ItemRole::Food { .. })
    }
}

// ---------------------------------------------------------------------------
// Item templates
// ---------------------------------------------------------------------------

/// Role data for a not-yet-created item.
///
/// Spoilage is expressed as a shelf life relative to the creation tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleTemplate {
    /// See [`ItemRole::Plain`].
    #[default]
    Plain,
    /// See [`ItemRole::Tool`].
    Tool {
        /// Starting endurance.
        endurance: u32,
        /// Work speed multiplier in percent.
        #[serde(default = "default_efficiency")]
        efficiency: u32,
    },
    /// See [`ItemRole::Perishable`].
    Perishable {
        /// Ticks between creation and spoilage.
        shelf_life: u64,
    },
    /// See [`ItemRole::Food`].
    Food {
        /// Ticks of satiation granted by eating one unit.
        nourishment: u64,
        /// Ticks between creation and spoilage, if it spoils at all.
        #[serde(default)]
        shelf_life: Option<u64>,
    },
}

const fn default_efficiency() -> u32 {
    100
}

/// Blueprint for an item produced by a recipe or placed by world generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTemplate {
    /// Name given to created items.
    pub name: String,
    /// Role given to created items.
    #[serde(flatten)]
    pub role: RoleTemplate,
}

impl ItemTemplate {
    /// A template for a plain material.
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: RoleTemplate::Plain,
        }
    }

    /// A template for a tool.
    pub fn tool(name: impl Into<String>, endurance: u32) -> Self {
        Self {
            name: name.into(),
            role: RoleTemplate::Tool {
                endurance,
                efficiency: default_efficiency(),
            },
        }
    }

    /// A template for food.
    pub fn food(name: impl Into<String>, nourishment: u64, shelf_life: Option<u64>) -> Self {
        Self {
            name: name.into(),
            role: RoleTemplate::Food {
                nourishment,
                shelf_life,
            },
        }
    }

    /// A template for a perishable material.
    pub fn perishable(name: impl Into<String>, shelf_life: u64) -> Self {
        Self {
            name: name.into(),
            role: RoleTemplate::Perishable { shelf_life },
        }
    }

    /// Create an unclaimed item from this template at `tick`.
    pub fn instantiate(&self, id: ItemId, tick: u64) -> Item {
        let role = match self.role {
            RoleTemplate::Plain => ItemRole::Plain,
            RoleTemplate::Tool {
                endurance,
                efficiency,
            } => ItemRole::Tool {
                endurance,
                efficiency,
            },
            RoleTemplate::Perishable { shelf_life } => ItemRole::Perishable {
                spoils_at: tick.saturating_add(shelf_life),
            },
            RoleTemplate::Food {
                nourishment,
                shelf_life,
            } => ItemRole::Food {
                nourishment,
                spoils_at: shelf_life.map(|life| tick.saturating_add(life)),
            },
        };
        Item::new(id, self.name.clone(), role)
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// The persisted form of a building.
///
/// `state` holds whatever the building's behaviour chose to save; the
/// catalog entry named by `template` knows how to read it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRecord {
    /// Building identifier.
    pub id: BuildingId,
    /// Catalog template the building was created from.
    pub template: String,
    /// Tile the building occupies.
    pub coord: Coord,
    /// Tasks the building currently owns, in creation order.
    pub active_tasks: Vec<TaskId>,
    /// Recipes held back from requesting, with the tick the hold ends.
    #[serde(default)]
    pub request_retry: BTreeMap<String, u64>,
    /// Behaviour-specific saved state.
    #[serde(default)]
    pub state: serde_json::Value,
}
