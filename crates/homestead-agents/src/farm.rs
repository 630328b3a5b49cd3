//! Farms: plots that grow a crop and queue harvest tasks.
//!
//! Each plot is an absolute tile coordinate. An empty plot is planted on
//! the next update, grows for `growth_ticks`, and then drops one crop item
//! on its tile. The plot stays fallow until that item has been harvested.
//! Whenever more ripe crop items lie on the plots than harvest units are
//! queued, the farm requests more harvest work. A harvest is sent to the
//! ripe plot nearest the worker who takes it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use homestead_types::{Coord, ItemTemplate};
use homestead_world::TileMap;

use crate::building::{BuildingBehavior, BuildingContext, Crafting};
use crate::error::TaskError;
use crate::recipe::Recipe;

/// Default number of ticks for a crop to mature after planting.
pub const DEFAULT_GROWTH_TICKS: u64 = 600;

const fn default_growth_ticks() -> u64 {
    DEFAULT_GROWTH_TICKS
}

// ---------------------------------------------------------------------------
// FarmCropState
// ---------------------------------------------------------------------------

/// Growth state of the crop on a single plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmCropState {
    /// The tick when the crop was planted.
    pub planted_at_tick: u64,
    /// The tick at which the crop is ripe.
    pub mature_at_tick: u64,
}

impl FarmCropState {
    /// Plant at `current_tick`, ripening after `growth_ticks`.
    ///
    /// Returns `None` on arithmetic overflow.
    pub fn plant(current_tick: u64, growth_ticks: u64) -> Option<Self> {
        let mature_at = current_tick.checked_add(growth_ticks)?;
        Some(Self {
            planted_at_tick: current_tick,
            mature_at_tick: mature_at,
        })
    }

    /// Whether the crop is ripe.
    pub const fn is_mature(&self, current_tick: u64) -> bool {
        current_tick >= self.mature_at_tick
    }
}

// ---------------------------------------------------------------------------
// Farm
// ---------------------------------------------------------------------------

/// Catalog data for a farm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmSpec {
    /// Plot offsets from the farm's own tile, as `[dx, dy]`.
    pub plots: Vec<[i32; 2]>,
    /// What each plot grows.
    pub crop: ItemTemplate,
    /// Ticks from planting to harvest.
    #[serde(default = "default_growth_ticks")]
    pub growth_ticks: u64,
    /// Recipe the farm requests to bring crops in.
    pub harvest_recipe: String,
}

/// One plot's saved state.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlotState {
    coord: Coord,
    crop: FarmCropState,
}

/// Saved farm state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FarmState {
    #[serde(default)]
    growing: Vec<PlotState>,
}

/// A building with crop plots.
#[derive(Debug, Clone)]
pub struct Farm {
    template: String,
    recipes: Vec<Recipe>,
    crop: ItemTemplate,
    growth_ticks: u64,
    harvest_recipe: String,
    plots: Vec<Coord>,
    growing: BTreeMap<Coord, FarmCropState>,
}

impl Farm {
    /// Build a farm at `origin` from catalog data.
    pub fn new(
        template: impl Into<String>,
        recipes: Vec<Recipe>,
        spec: &FarmSpec,
        origin: Coord,
    ) -> Self {
        let plots = spec
            .plots
            .iter()
            .filter_map(|&[dx, dy]| {
                Some(Coord::new(
                    origin.x.checked_add(dx)?,
                    origin.y.checked_add(dy)?,
                ))
            })
            .collect();
        Self {
            template: template.into(),
            recipes,
            crop: spec.crop.clone(),
            growth_ticks: spec.growth_ticks,
            harvest_recipe: spec.harvest_recipe.clone(),
            plots,
            growing: BTreeMap::new(),
        }
    }

    /// Restore a farm from catalog data and saved state.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidBuildingState`] if `state` does not
    /// parse.
    pub fn load(
        template: impl Into<String>,
        recipes: Vec<Recipe>,
        spec: &FarmSpec,
        origin: Coord,
        state: &serde_json::Value,
    ) -> Result<Self, TaskError> {
        let mut farm = Self::new(template, recipes, spec, origin);
        if state.is_null() {
            return Ok(farm);
        }
        let saved: FarmState = serde_json::from_value(state.clone()).map_err(|source| {
            TaskError::InvalidBuildingState {
                template: farm.template.clone(),
                source,
            }
        })?;
        for plot in saved.growing {
            if farm.plots.contains(&plot.coord) {
                farm.growing.insert(plot.coord, plot.crop);
            }
        }
        Ok(farm)
    }

    /// Plot coordinates.
    pub fn plots(&self) -> &[Coord] {
        &self.plots
    }

    /// Crop state of a plot, if something is growing there.
    pub fn crop_state(&self, plot: Coord) -> Option<&FarmCropState> {
        self.growing.get(&plot)
    }
}

impl Crafting for Farm {
    fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// The plot with an unclaimed crop nearest `origin`. Ties go to the
    /// lower coordinate.
    fn locate_work_site(&self, recipe: &Recipe, world: &TileMap, origin: Coord) -> Option<Coord> {
        if recipe.name != self.harvest_recipe {
            return None;
        }
        self.plots
            .iter()
            .copied()
            .filter(|&plot| {
                world.get(plot).is_some_and(|tile| {
                    tile.count_unclaimed(|item| item.name == self.crop.name) > 0
                })
            })
            .min_by_key(|&plot| (origin.chebyshev_distance(plot), plot))
    }
}

impl BuildingBehavior for Farm {
    fn template(&self) -> &str {
        &self.template
    }

    fn update(&mut self, ctx: &mut BuildingContext<'_>) -> Result<(), TaskError> {
        for &plot in &self.plots {
            match self.growing.get(&plot).copied() {
                Some(state) if state.is_mature(ctx.tick) => {
                    ctx.spawn_item(plot, &self.crop)?;
                    self.growing.remove(&plot);
                    debug!(building = %ctx.building, plot = %plot, "Crop ripened");
                }
                Some(_) => {}
                None => {
                    let Some(tile) = ctx.world.get(plot) else {
                        warn!(building = %ctx.building, plot = %plot, "Farm plot has no tile");
                        continue;
                    };
                    let fallow = tile.items.iter().any(|item| item.name == self.crop.name);
                    if !fallow
                        && let Some(state) = FarmCropState::plant(ctx.tick, self.growth_ticks)
                    {
                        self.growing.insert(plot, state);
                    }
                }
            }
        }

        let ripe: usize = self
            .plots
            .iter()
            .filter_map(|&plot| ctx.world.get(plot))
            .map(|tile| tile.count_unclaimed(|item| item.name == self.crop.name))
            .sum();
        let ripe = u32::try_from(ripe).unwrap_or(u32::MAX);
        let queued = ctx.queued_units(&self.harvest_recipe);
        if ripe > queued {
            ctx.request_task(self.harvest_recipe.clone(), ripe.saturating_sub(queued));
        }
        Ok(())
    }

    fn save(&self) -> Result<serde_json::Value, TaskError> {
        let state = FarmState {
            growing: self
                .growing
                .iter()
                .map(|(&coord, &crop)| PlotState { coord, crop })
                .collect(),
        };
        serde_json::to_value(state).map_err(|source| TaskError::InvalidBuildingState {
            template: self.template.clone(),
            source,
        })
    }
}
