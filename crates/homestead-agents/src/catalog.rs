//! The building catalog: templates that buildings are created from.
//!
//! A [`BuildingTemplate`] names a building type, lists its recipes, and
//! carries the data its behaviour needs ([`BuildingSpec`]). The
//! [`Catalog`] is a set of templates keyed by name. It is consumed data:
//! [`Catalog::standard`] supplies the default content, and the core crate
//! can load a replacement from `homestead-config.yaml`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use homestead_types::{BuildingId, BuildingRecord, Coord, ItemTemplate};

use crate::building::{Building, BuildingBehavior};
use crate::error::TaskError;
use crate::farm::{Farm, FarmSpec};
use crate::recipe::{InputGroup, Recipe, RecipeAction, RecipeOption, WorkSite};
use crate::workshop::{Workshop, WorkshopSpec};

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Behaviour-specific catalog data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildingSpec {
    /// A [`Workshop`].
    Workshop(WorkshopSpec),
    /// A [`Farm`].
    Farm(FarmSpec),
}

/// A building type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingTemplate {
    /// Template name, unique within the catalog.
    pub name: String,
    /// Recipes buildings of this type can run.
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    /// Behaviour data.
    #[serde(flatten)]
    pub spec: BuildingSpec,
}

impl BuildingTemplate {
    /// Create fresh behaviour for a building at `origin`.
    pub fn build(&self, origin: Coord) -> Box<dyn BuildingBehavior> {
        match &self.spec {
            BuildingSpec::Workshop(spec) => Box::new(Workshop::new(
                self.name.clone(),
                self.recipes.clone(),
                spec,
                origin,
            )),
            BuildingSpec::Farm(spec) => Box::new(Farm::new(
                self.name.clone(),
                self.recipes.clone(),
                spec,
                origin,
            )),
        }
    }

    /// Recreate behaviour from saved state.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidBuildingState`] if `state` does not
    /// parse.
    pub fn restore(
        &self,
        origin: Coord,
        state: &serde_json::Value,
    ) -> Result<Box<dyn BuildingBehavior>, TaskError> {
        Ok(match &self.spec {
            BuildingSpec::Workshop(spec) => Box::new(Workshop::load(
                self.name.clone(),
                self.recipes.clone(),
                spec,
                origin,
                state,
            )?),
            BuildingSpec::Farm(spec) => Box::new(Farm::load(
                self.name.clone(),
                self.recipes.clone(),
                spec,
                origin,
                state,
            )?),
        })
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Every known building template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    templates: BTreeMap<String, BuildingTemplate>,
}

impl Catalog {
    /// Create an empty catalog.
    pub const fn new() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    /// Build a catalog from a template list. Later duplicates replace
    /// earlier ones.
    pub fn from_templates(templates: impl IntoIterator<Item = BuildingTemplate>) -> Self {
        let mut catalog = Self::new();
        for template in templates {
            catalog.insert(template);
        }
        catalog
    }

    /// Add or replace a template.
    pub fn insert(&mut self, template: BuildingTemplate) -> Option<BuildingTemplate> {
        self.templates.insert(template.name.clone(), template)
    }

    /// Look up a template.
    pub fn template(&self, name: &str) -> Option<&BuildingTemplate> {
        self.templates.get(name)
    }

    /// Iterate templates in name order.
    pub fn templates(&self) -> impl Iterator<Item = &BuildingTemplate> {
        self.templates.values()
    }

    /// Create a building from the template `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::UnknownTemplate`] if no template has that name.
    pub fn instantiate(
        &self,
        name: &str,
        id: BuildingId,
        coord: Coord,
    ) -> Result<Building, TaskError> {
        let template = self
            .template(name)
            .ok_or_else(|| TaskError::UnknownTemplate(name.to_owned()))?;
        Ok(Building::new(id, coord, template.build(coord)))
    }

    /// Recreate a building from its saved record.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::UnknownTemplate`] if the record names an unknown
    /// template, or [`TaskError::InvalidBuildingState`] if its state does not
    /// parse.
    pub fn restore(&self, record: &BuildingRecord) -> Result<Building, TaskError> {
        let template = self
            .template(&record.template)
            .ok_or_else(|| TaskError::UnknownTemplate(record.template.clone()))?;
        let behavior = template.restore(record.coord, &record.state)?;
        let mut building = Building::new(record.id, record.coord, behavior);
        building.active_tasks.clone_from(&record.active_tasks);
        building.request_retry.clone_from(&record.request_retry);
        Ok(building)
    }

    /// The default colony content.
    ///
    /// - Flint Knapper: knocks out flint knives from nothing.
    /// - Bark Peeler: strips logs into bark fibers where the log lies,
    ///   using a knife.
    /// - Rope Walk: twists fibers into twine with a knife kept on site.
    /// - Forager Hut: picks berry bushes and stores the berries.
    /// - Wheat Farm: grows wheat on four plots and brings it in, starting
    ///   with the ripe plot nearest the harvester.
    pub fn standard() -> Self {
        let knife = ItemTemplate::tool("Flint Knife", 30);
        let berries = ItemTemplate::food("Berries", 2400, Some(3000));
        let wheat = ItemTemplate::food("Wheat", 3000, None);

        let knapper = BuildingTemplate {
            name: String::from("Flint Knapper"),
            recipes: vec![Recipe::craft("Craft Flint Knife", 8).with_output(knife)],
            spec: BuildingSpec::Workshop(WorkshopSpec {
                stock_targets: BTreeMap::from([(String::from("Flint Knife"), 1)]),
                ..WorkshopSpec::default()
            }),
        };

        let peeler = BuildingTemplate {
            name: String::from("Bark Peeler"),
            recipes: vec![
                Recipe::craft("Peel Bark", 6)
                    .with_input(InputGroup::items(vec![RecipeOption::new("Log", 1)]).at_work_site())
                    .with_input(InputGroup::tools(vec![RecipeOption::new("Flint Knife", 1)]))
                    .with_output(ItemTemplate::plain("Bark Fibers"))
                    .with_output(ItemTemplate::plain("Bark Fibers"))
                    .at(WorkSite::Input),
            ],
            spec: BuildingSpec::Workshop(WorkshopSpec::default()),
        };

        let rope_walk = BuildingTemplate {
            name: String::from("Rope Walk"),
            recipes: vec![
                Recipe::craft("Twist Twine", 10)
                    .with_input(InputGroup::items(vec![
                        RecipeOption::new("Bark Fibers", 2),
                        RecipeOption::new("Grass Fibers", 3),
                    ]))
                    .with_input(InputGroup::tools(vec![RecipeOption::new("Flint Knife", 1)]))
                    .with_output(ItemTemplate::plain("Twine")),
            ],
            spec: BuildingSpec::Workshop(WorkshopSpec {
                stock_targets: BTreeMap::from([(String::from("Twine"), 4)]),
                tool_slots: vec![String::from("Flint Knife")],
                priority: Vec::new(),
                work_radius: None,
            }),
        };

        let forager = BuildingTemplate {
            name: String::from("Forager Hut"),
            recipes: vec![
                Recipe::craft("Pick Berries", 4)
                    .with_input(
                        InputGroup::items(vec![RecipeOption::new("Berry Bush", 1)]).at_work_site(),
                    )
                    .with_output(berries)
                    .at(WorkSite::Input)
                    .with_action(RecipeAction::GatherFood {
                        spent: Some(ItemTemplate::plain("Picked Bush")),
                        byproducts: Vec::new(),
                    }),
            ],
            spec: BuildingSpec::Workshop(WorkshopSpec {
                stock_targets: BTreeMap::from([(String::from("Berries"), 6)]),
                ..WorkshopSpec::default()
            }),
        };

        let farm = BuildingTemplate {
            name: String::from("Wheat Farm"),
            recipes: vec![
                Recipe::craft("Harvest Wheat", 3)
                    .with_input(
                        InputGroup::items(vec![RecipeOption::new("Wheat", 1)]).at_work_site(),
                    )
                    .at(WorkSite::Locator)
                    .with_action(RecipeAction::GatherItems),
            ],
            spec: BuildingSpec::Farm(FarmSpec {
                plots: vec![[1, 0], [2, 0], [1, 1], [2, 1]],
                crop: wheat,
                growth_ticks: 900,
                harvest_recipe: String::from("Harvest Wheat"),
            }),
        };

        Self::from_templates([knapper, peeler, rope_walk, forager, farm])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_has_every_template() {
        let catalog = Catalog::standard();
        let names: Vec<&str> = catalog.templates().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Bark Peeler",
                "Flint Knapper",
                "Forager Hut",
                "Rope Walk",
                "Wheat Farm"
            ]
        );
    }

    #[test]
    fn instantiate_unknown_template_fails() {
        let catalog = Catalog::standard();
        let err = catalog
            .instantiate("Smithy", BuildingId(1), Coord::new(0, 0))
            .unwrap_err();
        assert!(matches!(err, TaskError::UnknownTemplate(name) if name == "Smithy"));
    }

    #[test]
    fn rope_walk_has_tool_slots_and_knapper_does_not() {
        let catalog = Catalog::standard();
        let rope = catalog
            .instantiate("Rope Walk", BuildingId(1), Coord::new(0, 0))
            .unwrap();
        let knapper = catalog
            .instantiate("Flint Knapper", BuildingId(2), Coord::new(0, 0))
            .unwrap();
        assert!(rope.behavior.as_tool_slots().is_some());
        assert!(knapper.behavior.as_tool_slots().is_none());
        assert!(knapper.behavior.as_outputs().is_some());
    }

    #[test]
    fn producer_lookup_walks_items_in_order() {
        let catalog = Catalog::standard();
        let peeler = catalog
            .instantiate("Bark Peeler", BuildingId(1), Coord::new(0, 0))
            .unwrap();
        let wanted = vec![String::from("Grass Fibers"), String::from("Bark Fibers")];
        let (index, recipe) = peeler.producer_of(&wanted).unwrap();
        assert_eq!(index, 1);
        assert_eq!(recipe.name, "Peel Bark");
    }

    #[test]
    fn template_reads_from_json() {
        let json = r#"{
            "name": "Flint Knapper",
            "kind": "workshop",
            "stock_targets": {"Flint Knife": 2},
            "recipes": [{
                "name": "Craft Flint Knife",
                "duration_ticks": 5,
                "outputs": [{"name": "Flint Knife", "role": "tool", "endurance": 10}]
            }]
        }"#;
        let template: BuildingTemplate = serde_json::from_str(json).unwrap();
        let BuildingSpec::Workshop(spec) = &template.spec else {
            panic!("expected a workshop");
        };
        assert_eq!(spec.stock_targets.get("Flint Knife"), Some(&2));
        assert!(template.recipes.first().unwrap().produces("Flint Knife"));
    }

    #[test]
    fn restore_keeps_active_tasks() {
        let catalog = Catalog::standard();
        let mut farm = catalog
            .instantiate("Wheat Farm", BuildingId(4), Coord::new(2, 2))
            .unwrap();
        farm.active_tasks.push(homestead_types::TaskId(9));
        let record = farm.save().unwrap();
        let restored = catalog.restore(&record).unwrap();
        assert_eq!(restored.active_tasks, farm.active_tasks);
        assert_eq!(restored.template(), "Wheat Farm");
    }
}
