//! Recipe definitions: input groups, outputs, work sites, and actions.
//!
//! A [`Recipe`] is pure data. Buildings own their recipes and tasks carry a
//! copy, so the scheduler never hard-codes what a recipe needs or makes.
//!
//! Each recipe has a list of [`InputGroup`]s. A group is one requirement
//! that can be met by any of several interchangeable [`RecipeOption`]s,
//! for example "2 Bark Fibers or 3 Grass Fibers". Exactly one option per
//! group is chosen when a task resolves, and the choice is kept in the
//! task's choice vector.

use serde::{Deserialize, Serialize};

use homestead_types::{InputRole, Item, ItemTemplate};

use crate::config::BehaviorConfig;

/// Name of the recipe synthesized for hungry workers.
pub const MEAL_RECIPE: &str = "Eat";

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One interchangeable way of satisfying an input group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeOption {
    /// Item name to look for.
    pub item: String,
    /// Units required.
    pub quantity: u32,
}

impl RecipeOption {
    /// Create an option.
    pub fn new(item: impl Into<String>, quantity: u32) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }

    /// Whether `item` can fill this option when used in `role`.
    ///
    /// Tools with no endurance left are never accepted.
    pub fn accepts(&self, item: &Item, role: InputRole) -> bool {
        if item.name != self.item {
            return false;
        }
        match role {
            InputRole::Item => true,
            InputRole::Tool => item.endurance().is_some_and(|left| left > 0),
        }
    }

    /// Required units as a collection length.
    pub fn wanted(&self) -> usize {
        usize::try_from(self.quantity).unwrap_or(usize::MAX)
    }
}

/// A single input requirement with interchangeable options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputGroup {
    /// Alternatives in declaration order. Earlier options win ties.
    pub options: Vec<RecipeOption>,
    /// Whether the chosen items are consumed or worn.
    #[serde(default)]
    pub role: InputRole,
    /// Whether this group decides where the task is performed.
    #[serde(default)]
    pub work_site: bool,
}

impl InputGroup {
    /// A consumed-item group.
    pub const fn items(options: Vec<RecipeOption>) -> Self {
        Self {
            options,
            role: InputRole::Item,
            work_site: false,
        }
    }

    /// A tool group.
    pub const fn tools(options: Vec<RecipeOption>) -> Self {
        Self {
            options,
            role: InputRole::Tool,
            work_site: false,
        }
    }

    /// Mark the group as the one that decides the work site.
    #[must_use]
    pub const fn at_work_site(mut self) -> Self {
        self.work_site = true;
        self
    }

    /// Look up an option by index.
    pub fn option(&self, index: usize) -> Option<&RecipeOption> {
        self.options.get(index)
    }

    /// Names of every option, in declaration order.
    pub fn item_names(&self) -> Vec<String> {
        self.options.iter().map(|option| option.item.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Work site and action
// ---------------------------------------------------------------------------

/// Where a task built from the recipe is performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkSite {
    /// On the owning building's tile.
    #[default]
    Building,
    /// Wherever the work-site input group is found.
    Input,
    /// Wherever the owning building's custom locator says.
    Locator,
}

/// What happens when progress reaches the recipe duration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecipeAction {
    /// Consume item inputs and emit outputs at the work site.
    #[default]
    Craft,
    /// Same as craft; the output is a fixture rather than a carried good.
    Construct,
    /// Harvest the work-site item in place and deliver the outputs to the
    /// owning building.
    GatherFood {
        /// What the source item turns into, if it is not simply removed.
        #[serde(default)]
        spent: Option<ItemTemplate>,
        /// Extra items left on the source tile.
        #[serde(default)]
        byproducts: Vec<ItemTemplate>,
    },
    /// Deliver the work-site items to the owning building unchanged.
    GatherItems,
    /// Consume food and reset the worker's hunger timer.
    Eat,
}

impl RecipeAction {
    /// Whether the action moves goods to the owning building.
    pub const fn is_gather(&self) -> bool {
        matches!(self, Self::GatherFood { .. } | Self::GatherItems)
    }
}

// ---------------------------------------------------------------------------
// Recipe
// ---------------------------------------------------------------------------

/// A production recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Recipe name, unique within its building.
    pub name: String,
    /// Input requirements.
    #[serde(default)]
    pub inputs: Vec<InputGroup>,
    /// Items produced per completed unit.
    #[serde(default)]
    pub outputs: Vec<ItemTemplate>,
    /// Work ticks per unit.
    pub duration_ticks: u32,
    /// Where the work happens.
    #[serde(default)]
    pub work_site: WorkSite,
    /// What completion does.
    #[serde(default)]
    pub action: RecipeAction,
}

impl Recipe {
    /// A craft recipe performed at the building with no inputs.
    pub fn craft(name: impl Into<String>, duration_ticks: u32) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            duration_ticks,
            work_site: WorkSite::Building,
            action: RecipeAction::Craft,
        }
    }

    /// Add an input group.
    #[must_use]
    pub fn with_input(mut self, group: InputGroup) -> Self {
        self.inputs.push(group);
        self
    }

    /// Add an output.
    #[must_use]
    pub fn with_output(mut self, output: ItemTemplate) -> Self {
        self.outputs.push(output);
        self
    }

    /// Set the work site.
    #[must_use]
    pub const fn at(mut self, work_site: WorkSite) -> Self {
        self.work_site = work_site;
        self
    }

    /// Set the action.
    #[must_use]
    pub fn with_action(mut self, action: RecipeAction) -> Self {
        self.action = action;
        self
    }

    /// The recipe a hungry worker runs: eat one unit of any edible item,
    /// wherever it lies.
    pub fn meal(config: &BehaviorConfig) -> Self {
        let options = config
            .edible_items
            .iter()
            .map(|name| RecipeOption::new(name.clone(), 1))
            .collect();
        Self {
            name: String::from(MEAL_RECIPE),
            inputs: vec![InputGroup::items(options).at_work_site()],
            outputs: Vec::new(),
            duration_ticks: config.meal_ticks,
            work_site: WorkSite::Input,
            action: RecipeAction::Eat,
        }
    }

    /// Whether this is a meal.
    pub const fn is_meal(&self) -> bool {
        matches!(self.action, RecipeAction::Eat)
    }

    /// Look up an input group by index.
    pub fn group(&self, index: usize) -> Option<&InputGroup> {
        self.inputs.get(index)
    }

    /// Index of the group that decides the work site, if any.
    pub fn work_site_group(&self) -> Option<usize> {
        self.inputs.iter().position(|group| group.work_site)
    }

    /// Whether a completed unit emits an item named `item`.
    pub fn produces(&self, item: &str) -> bool {
        self.outputs.iter().any(|output| output.name == item)
    }

    /// Role of the group at `index`, `None` when out of range.
    pub fn role_of(&self, index: usize) -> Option<InputRole> {
        self.group(index).map(|group| group.role)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homestead_types::{ItemId, ItemRole};

    use super::*;

    #[test]
    fn tool_option_rejects_worn_out_tools() {
        let option = RecipeOption::new("Flint Knife", 1);
        let fresh = Item::new(
            ItemId(1),
            "Flint Knife",
            ItemRole::Tool {
                endurance: 3,
                efficiency: 100,
            },
        );
        let worn = Item::new(
            ItemId(2),
            "Flint Knife",
            ItemRole::Tool {
                endurance: 0,
                efficiency: 100,
            },
        );
        assert!(option.accepts(&fresh, InputRole::Tool));
        assert!(!option.accepts(&worn, InputRole::Tool));
        assert!(option.accepts(&worn, InputRole::Item));
    }

    #[test]
    fn meal_uses_edible_items_as_work_site() {
        let config = BehaviorConfig::default();
        let meal = Recipe::meal(&config);
        assert!(meal.is_meal());
        assert_eq!(meal.work_site, WorkSite::Input);
        assert_eq!(meal.work_site_group(), Some(0));
        assert_eq!(
            meal.group(0).unwrap().item_names(),
            vec![String::from("Berries"), String::from("Wheat")]
        );
    }

    #[test]
    fn recipe_reads_from_json_with_defaults() {
        let json = r#"{
            "name": "Twist Twine",
            "duration_ticks": 6,
            "inputs": [
                {"options": [{"item": "Bark Fibers", "quantity": 2}]},
                {"options": [{"item": "Flint Knife", "quantity": 1}], "role": "tool"}
            ],
            "outputs": [{"name": "Twine", "role": "plain"}]
        }"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.work_site, WorkSite::Building);
        assert_eq!(recipe.action, RecipeAction::Craft);
        assert_eq!(recipe.role_of(1), Some(InputRole::Tool));
        assert!(recipe.produces("Twine"));
        assert!(recipe.work_site_group().is_none());
    }

    #[test]
    fn gather_actions_are_flagged() {
        let pick = RecipeAction::GatherFood {
            spent: None,
            byproducts: Vec::new(),
        };
        assert!(pick.is_gather());
        assert!(RecipeAction::GatherItems.is_gather());
        assert!(!RecipeAction::Craft.is_gather());
    }
}
