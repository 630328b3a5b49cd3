//! Workshops: recipe buildings that keep stock targets and tool slots.
//!
//! A workshop recounts its output stock every tick and requests tasks in
//! priority order whenever stock plus work already queued falls below the
//! target. Recipes without a stock target only run when asked for, either
//! directly or as producer sub-tasks. A workshop with a work radius only
//! hands its tasks to workers standing within that many tiles of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use homestead_types::{Coord, TaskId};
use homestead_world::Tile;

use crate::building::{
    BuildingBehavior, BuildingContext, Crafting, Outputs, PriorityOrdering, ToolSlot, ToolSlots,
};
use crate::error::TaskError;
use crate::recipe::Recipe;
use crate::worker::Worker;

/// Catalog data for a workshop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopSpec {
    /// Desired on-hand stock per output item.
    #[serde(default)]
    pub stock_targets: BTreeMap<String, u32>,
    /// Tools to keep on the workshop tile, one entry per slot.
    #[serde(default)]
    pub tool_slots: Vec<String>,
    /// Recipe names in priority order. Unlisted recipes follow in
    /// declaration order.
    #[serde(default)]
    pub priority: Vec<String>,
    /// Only workers within this many tiles (king moves) may take the
    /// workshop's tasks. `None` serves the whole map.
    #[serde(default)]
    pub work_radius: Option<u32>,
}

/// Saved workshop state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WorkshopState {
    #[serde(default)]
    tool_slots: Vec<ToolSlot>,
}

/// A recipe building with stock targets.
#[derive(Debug, Clone)]
pub struct Workshop {
    template: String,
    origin: Coord,
    recipes: Vec<Recipe>,
    work_radius: Option<u32>,
    stock_targets: BTreeMap<String, u32>,
    priority: Vec<String>,
    on_hand: BTreeMap<String, u32>,
    slots: Vec<ToolSlot>,
}

impl Workshop {
    /// Build a workshop at `origin` from catalog data.
    pub fn new(
        template: impl Into<String>,
        recipes: Vec<Recipe>,
        spec: &WorkshopSpec,
        origin: Coord,
    ) -> Self {
        Self {
            template: template.into(),
            origin,
            recipes,
            work_radius: spec.work_radius,
            stock_targets: spec.stock_targets.clone(),
            priority: spec.priority.clone(),
            on_hand: BTreeMap::new(),
            slots: spec.tool_slots.iter().map(ToolSlot::new).collect(),
        }
    }

    /// Restore a workshop from catalog data and saved state.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidBuildingState`] if `state` does not
    /// parse.
    pub fn load(
        template: impl Into<String>,
        recipes: Vec<Recipe>,
        spec: &WorkshopSpec,
        origin: Coord,
        state: &serde_json::Value,
    ) -> Result<Self, TaskError> {
        let mut workshop = Self::new(template, recipes, spec, origin);
        if state.is_null() {
            return Ok(workshop);
        }
        let saved: WorkshopState =
            serde_json::from_value(state.clone()).map_err(|source| {
                TaskError::InvalidBuildingState {
                    template: workshop.template.clone(),
                    source,
                }
            })?;
        for (slot, saved_slot) in workshop.slots.iter_mut().zip(saved.tool_slots) {
            if slot.tool == saved_slot.tool {
                slot.haul_task = saved_slot.haul_task;
            }
        }
        Ok(workshop)
    }

    /// Recipe indices in priority order.
    fn recipe_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.recipes.len()).collect();
        order.sort_by_key(|&index| {
            self.recipes
                .get(index)
                .map_or(u32::MAX, |recipe| self.priority(&recipe.name))
        });
        order
    }
}

impl Crafting for Workshop {
    fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    fn can_assign(&self, _recipe: &Recipe, worker: &Worker) -> bool {
        self.work_radius
            .is_none_or(|radius| self.origin.chebyshev_distance(worker.position) <= radius)
    }
}

impl Outputs for Workshop {
    fn on_hand(&self, item: &str) -> u32 {
        self.on_hand.get(item).copied().unwrap_or(0)
    }

    fn stock_target(&self, item: &str) -> Option<u32> {
        self.stock_targets.get(item).copied()
    }

    fn record_on_hand(&mut self, tile: &Tile) {
        self.on_hand.clear();
        for recipe in &self.recipes {
            for output in &recipe.outputs {
                self.on_hand.entry(output.name.clone()).or_insert(0);
            }
        }
        for item in &tile.items {
            if let Some(count) = self.on_hand.get_mut(&item.name) {
                *count = count.saturating_add(1);
            }
        }
    }
}

impl ToolSlots for Workshop {
    fn slots(&self) -> &[ToolSlot] {
        &self.slots
    }

    fn slots_mut(&mut self) -> &mut [ToolSlot] {
        &mut self.slots
    }
}

impl PriorityOrdering for Workshop {
    fn priority(&self, recipe: &str) -> u32 {
        let listed = self.priority.iter().position(|name| name == recipe);
        let declared = self.recipes.iter().position(|r| r.name == recipe);
        let rank = listed.or_else(|| {
            declared.map(|index| index.saturating_add(self.priority.len()))
        });
        rank.and_then(|rank| u32::try_from(rank).ok())
            .unwrap_or(u32::MAX)
    }
}

impl BuildingBehavior for Workshop {
    fn template(&self) -> &str {
        &self.template
    }

    fn as_outputs(&self) -> Option<&dyn Outputs> {
        Some(self)
    }

    fn as_outputs_mut(&mut self) -> Option<&mut dyn Outputs> {
        Some(self)
    }

    fn as_tool_slots(&self) -> Option<&dyn ToolSlots> {
        if self.slots.is_empty() {
            return None;
        }
        Some(self as &dyn ToolSlots)
    }

    fn as_tool_slots_mut(&mut self) -> Option<&mut dyn ToolSlots> {
        if self.slots.is_empty() {
            return None;
        }
        Some(self as &mut dyn ToolSlots)
    }

    fn as_priority_ordering(&self) -> Option<&dyn PriorityOrdering> {
        Some(self)
    }

    fn update(&mut self, ctx: &mut BuildingContext<'_>) -> Result<(), TaskError> {
        for index in self.recipe_order() {
            let Some(recipe) = self.recipes.get(index) else {
                continue;
            };
            let deficit = recipe
                .outputs
                .iter()
                .filter_map(|output| {
                    let target = self.stock_target(&output.name)?;
                    let have = self
                        .on_hand(&output.name)
                        .saturating_add(ctx.queued_units(&recipe.name));
                    target.checked_sub(have).filter(|&short| short > 0)
                })
                .max();
            if let Some(quantity) = deficit {
                debug!(
                    building = %ctx.building,
                    recipe = %recipe.name,
                    quantity,
                    "Stock below target"
                );
                ctx.request_task(recipe.name.clone(), quantity);
            }
        }
        Ok(())
    }

    fn save(&self) -> Result<serde_json::Value, TaskError> {
        let state = WorkshopState {
            tool_slots: self.slots.clone(),
        };
        serde_json::to_value(state).map_err(|source| TaskError::InvalidBuildingState {
            template: self.template.clone(),
            source,
        })
    }

    fn forget_tasks(&mut self, keep: &dyn Fn(TaskId) -> bool) {
        for slot in &mut self.slots {
            if slot.haul_task.is_some_and(|task| !keep(task)) {
                slot.haul_task = None;
            }
        }
    }
}
