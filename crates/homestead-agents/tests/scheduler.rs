//! Integration tests for the worker scheduler.
//!
//! Each test builds a small colony by hand and steps workers directly,
//! without the tick driver, so tick counts are exact. Building update
//! hooks only run where a test calls them.

#![allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    clippy::panic
)]

use std::collections::{BTreeMap, BTreeSet};

use homestead_agents::{
    BehaviorConfig, BuildingSpec, BuildingTemplate, Catalog, Colony, InputGroup, Recipe,
    RecipeOption, StepOutcome, TaskKind, WorkshopSpec, step_worker,
};
use homestead_types::{BuildingId, Coord, ItemId, ItemTemplate, Terrain, WorkerId};
use homestead_world::TileMap;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const fn at(x: i32, y: i32) -> Coord {
    Coord::new(x, y)
}

fn workshop(name: &str, recipes: Vec<Recipe>) -> BuildingTemplate {
    BuildingTemplate {
        name: String::from(name),
        recipes,
        spec: BuildingSpec::Workshop(WorkshopSpec::default()),
    }
}

/// A "Carver" that turns nothing into a peg with a knife.
fn carver(duration: u32) -> BuildingTemplate {
    workshop(
        "Carver",
        vec![
            Recipe::craft("Carve Peg", duration)
                .with_input(InputGroup::tools(vec![RecipeOption::new("Flint Knife", 1)]))
                .with_output(ItemTemplate::plain("Peg")),
        ],
    )
}

/// A "Twiner" that needs one bundle of bark fibers per cord.
fn twiner() -> BuildingTemplate {
    workshop(
        "Twiner",
        vec![
            Recipe::craft("Twist Cord", 5)
                .with_input(InputGroup::items(vec![RecipeOption::new("Bark Fibers", 1)]))
                .with_output(ItemTemplate::plain("Cord")),
        ],
    )
}

fn colony(map: TileMap, catalog: Catalog) -> Colony {
    Colony::new(map, catalog, BehaviorConfig::default())
}

fn road(width: i32, height: i32) -> TileMap {
    TileMap::filled(width, height, Terrain::Road)
}

/// Advance the clock and step one worker.
fn step(colony: &mut Colony, worker: WorkerId) -> StepOutcome {
    colony.tick += 1;
    step_worker(colony, worker)
}

/// Advance the clock and step every worker in order.
fn step_all(colony: &mut Colony) -> Vec<StepOutcome> {
    colony.tick += 1;
    let ids: Vec<WorkerId> = colony.workers.iter().map(|worker| worker.id).collect();
    ids.into_iter()
        .map(|worker| step_worker(colony, worker))
        .collect()
}

fn count_named(colony: &Colony, coord: Coord, name: &str) -> usize {
    colony
        .world
        .get(coord)
        .map_or(0, |tile| tile.items.iter().filter(|item| item.name == name).count())
}

fn endurance(colony: &Colony, item: ItemId) -> Option<u32> {
    colony.world.item(item).and_then(|item| item.endurance())
}

fn assert_consistent(colony: &Colony) {
    let violations = colony.check_invariants();
    assert!(violations.is_empty(), "invariant violations: {violations:?}");
}

// ---------------------------------------------------------------------------
// Scenario A: zero-input recipe
// ---------------------------------------------------------------------------

#[test]
fn flint_knife_appears_after_exactly_duration_ticks() {
    let mut colony = colony(road(4, 4), Catalog::standard());
    let knapper = colony.add_building("Flint Knapper", at(0, 0)).unwrap();
    let worker = colony.add_worker("Ada", at(0, 0));
    let task = colony.create_task(knapper, "Craft Flint Knife", 1).unwrap();

    for _ in 0..7 {
        assert_eq!(step(&mut colony, worker), StepOutcome::Worked);
        assert_eq!(count_named(&colony, at(0, 0), "Flint Knife"), 0);
    }
    assert_eq!(step(&mut colony, worker), StepOutcome::Completed);

    assert_eq!(count_named(&colony, at(0, 0), "Flint Knife"), 1);
    let knife = colony
        .world
        .items()
        .find(|(_, item)| item.name == "Flint Knife")
        .map(|(_, item)| item.clone())
        .unwrap();
    assert_eq!(knife.endurance(), Some(30));
    assert!(!knife.is_claimed());
    assert!(!colony.tasks.contains(task));
    assert!(colony.building(knapper).unwrap().active_tasks.is_empty());
    assert!(colony.worker(worker).unwrap().tasks.is_empty());
    assert_consistent(&colony);
}

#[test]
fn building_task_target_is_prefilled() {
    let mut colony = colony(road(4, 4), Catalog::standard());
    let knapper = colony.add_building("Flint Knapper", at(2, 1)).unwrap();
    let task = colony.create_task(knapper, "Craft Flint Knife", 1).unwrap();

    let task = colony.tasks.get(task).unwrap();
    assert_eq!(task.target, Some(at(2, 1)));
    assert!(task.is_unassigned());
    assert_eq!(colony.building(knapper).unwrap().active_tasks, vec![task.id]);
    assert_eq!(colony.world.item_count(), 0);
}

// ---------------------------------------------------------------------------
// Scenario B: tool wear
// ---------------------------------------------------------------------------

#[test]
fn tool_breaks_after_endurance_ticks_and_is_replaced() {
    let mut colony = colony(road(6, 1), Catalog::from_templates([carver(10)]));
    let building = colony.add_building("Carver", at(0, 0)).unwrap();
    let worker = colony.add_worker("Bo", at(0, 0));
    let first = colony
        .spawn_item(at(0, 0), &ItemTemplate::tool("Flint Knife", 4))
        .unwrap();
    let spare = colony
        .spawn_item(at(3, 0), &ItemTemplate::tool("Flint Knife", 10))
        .unwrap();
    let task = colony.create_task(building, "Carve Peg", 1).unwrap();

    for expected in [3, 2, 1] {
        assert_eq!(step(&mut colony, worker), StepOutcome::Worked);
        assert_eq!(endurance(&colony, first), Some(expected));
    }
    assert_eq!(step(&mut colony, worker), StepOutcome::Worked);
    assert!(colony.world.item(first).is_none(), "worn-out knife is destroyed");
    let state = colony.tasks.get(task).unwrap();
    assert_eq!(state.progress, 4);
    assert!(state.tagged.is_empty());
    assert_consistent(&colony);

    // No progress until the spare knife has been fetched.
    assert_eq!(step(&mut colony, worker), StepOutcome::RelocationQueued);
    assert_eq!(colony.world.item(spare).unwrap().in_task, Some(task));

    let mut outcome = StepOutcome::Idle;
    for _ in 0..40 {
        outcome = step(&mut colony, worker);
        if !colony.tasks.contains(task) {
            break;
        }
        assert_eq!(colony.tasks.get(task).map(|t| t.progress >= 4), Some(true));
    }
    assert_eq!(outcome, StepOutcome::Completed);
    assert_eq!(count_named(&colony, at(0, 0), "Peg"), 1);
    assert_eq!(colony.world.locate(spare), Some(at(0, 0)));
    assert_eq!(endurance(&colony, spare), Some(4));
    assert!(!colony.world.item(spare).unwrap().is_claimed());
    assert_consistent(&colony);
}

#[test]
fn broken_tool_without_replacement_cancels() {
    let mut colony = colony(road(3, 1), Catalog::from_templates([carver(10)]));
    let building = colony.add_building("Carver", at(0, 0)).unwrap();
    let worker = colony.add_worker("Cy", at(0, 0));
    colony
        .spawn_item(at(0, 0), &ItemTemplate::tool("Flint Knife", 2))
        .unwrap();
    let task = colony.create_task(building, "Carve Peg", 1).unwrap();

    assert_eq!(step(&mut colony, worker), StepOutcome::Worked);
    assert_eq!(step(&mut colony, worker), StepOutcome::Worked);
    assert_eq!(step(&mut colony, worker), StepOutcome::Cancelled);

    assert!(!colony.tasks.contains(task));
    assert!(colony.building(building).unwrap().active_tasks.is_empty());
    assert!(colony.worker(worker).unwrap().tasks.is_empty());
    assert_eq!(colony.world.item_count(), 0);
    assert_consistent(&colony);
}

// ---------------------------------------------------------------------------
// Scenario C: contested claim
// ---------------------------------------------------------------------------

#[test]
fn first_worker_in_order_wins_the_last_fibers() {
    let mut colony = colony(road(4, 1), Catalog::from_templates([twiner()]));
    let building = colony.add_building("Twiner", at(0, 0)).unwrap();
    let first = colony.add_worker("Di", at(0, 0));
    let second = colony.add_worker("Ed", at(0, 0));
    let fibers = colony
        .spawn_item(at(2, 0), &ItemTemplate::plain("Bark Fibers"))
        .unwrap();
    let winner_task = colony.create_task(building, "Twist Cord", 1).unwrap();
    let loser_task = colony.create_task(building, "Twist Cord", 1).unwrap();

    let outcomes = step_all(&mut colony);
    assert_eq!(
        outcomes,
        vec![StepOutcome::RelocationQueued, StepOutcome::Cancelled]
    );
    assert_eq!(colony.world.item(fibers).unwrap().in_task, Some(winner_task));
    assert!(colony.worker(first).unwrap().tasks.contains(winner_task));
    assert!(!colony.tasks.contains(loser_task));
    assert!(colony.worker(second).unwrap().tasks.is_empty());
    assert_consistent(&colony);

    // The winner finishes; the loser has nothing left to take.
    for _ in 0..30 {
        let outcomes = step_all(&mut colony);
        assert_eq!(outcomes.get(1), Some(&StepOutcome::Idle));
        if !colony.tasks.contains(winner_task) {
            break;
        }
    }
    assert!(!colony.tasks.contains(winner_task));
    assert_eq!(count_named(&colony, at(0, 0), "Cord"), 1);
    assert!(colony.world.item(fibers).is_none());
    assert_consistent(&colony);
}

// ---------------------------------------------------------------------------
// Scenario D: batches
// ---------------------------------------------------------------------------

#[test]
fn batch_of_three_resets_between_units() {
    let mut colony = colony(road(2, 2), Catalog::standard());
    let knapper = colony.add_building("Flint Knapper", at(0, 0)).unwrap();
    let worker = colony.add_worker("Fa", at(0, 0));
    let task = colony.create_task(knapper, "Craft Flint Knife", 3).unwrap();

    for unit in 1..=3_usize {
        for _ in 0..7 {
            assert_eq!(step(&mut colony, worker), StepOutcome::Worked);
        }
        let outcome = step(&mut colony, worker);
        assert_eq!(count_named(&colony, at(0, 0), "Flint Knife"), unit);
        if unit < 3 {
            assert_eq!(outcome, StepOutcome::UnitCompleted);
            let state = colony.tasks.get(task).unwrap();
            assert_eq!(state.progress, 0);
            assert_eq!(usize::try_from(state.remaining).unwrap(), 3 - unit);
            assert_eq!(state.target, Some(at(0, 0)));
            assert_eq!(colony.building(knapper).unwrap().active_tasks, vec![task]);
        } else {
            assert_eq!(outcome, StepOutcome::Completed);
        }
    }
    assert!(colony.building(knapper).unwrap().active_tasks.is_empty());
    assert_consistent(&colony);
}

// ---------------------------------------------------------------------------
// Deletion and consistency
// ---------------------------------------------------------------------------

#[test]
fn deleting_a_task_mid_carry_unwinds_everything() {
    let mut colony = colony(road(4, 1), Catalog::from_templates([twiner()]));
    let building = colony.add_building("Twiner", at(0, 0)).unwrap();
    let worker = colony.add_worker("Gu", at(0, 0));
    let fibers = colony
        .spawn_item(at(2, 0), &ItemTemplate::plain("Bark Fibers"))
        .unwrap();
    let task = colony.create_task(building, "Twist Cord", 1).unwrap();

    assert_eq!(step(&mut colony, worker), StepOutcome::RelocationQueued);
    assert_eq!(step(&mut colony, worker), StepOutcome::Moving);
    assert_eq!(step(&mut colony, worker), StepOutcome::Moving);
    assert_eq!(step(&mut colony, worker), StepOutcome::PickedUp);
    assert!(colony.worker(worker).unwrap().is_carrying(fibers));
    assert_eq!(colony.tasks.len(), 2);
    assert_consistent(&colony);

    let deleted = colony.delete_task(task).unwrap();
    assert_eq!(deleted.id, task);

    assert!(colony.tasks.is_empty(), "move sub-task deleted with its parent");
    let state = colony.worker(worker).unwrap();
    assert!(state.inventory.is_empty());
    assert!(state.tasks.is_empty());
    assert_eq!(colony.world.locate(fibers), Some(at(2, 0)));
    assert!(!colony.world.item(fibers).unwrap().is_claimed());
    assert!(colony.building(building).unwrap().active_tasks.is_empty());
    assert_consistent(&colony);

    assert!(colony.delete_task(task).is_none());
}

#[test]
fn move_task_claims_unclaimed_item_only() {
    let mut colony = colony(road(3, 1), Catalog::new());
    let item = colony
        .spawn_item(at(2, 0), &ItemTemplate::plain("Log"))
        .unwrap();
    let first = colony
        .create_item_move_task(item, at(2, 0), at(0, 0), None)
        .unwrap();
    assert_eq!(colony.world.item(item).unwrap().in_task, Some(first));

    let second = colony
        .create_item_move_task(item, at(2, 0), at(1, 0), None)
        .unwrap();
    assert_eq!(colony.world.item(item).unwrap().in_task, Some(first));
    assert!(colony.tasks.get(second).unwrap().tagged.is_empty());

    colony.delete_task(first);
    assert!(!colony.world.item(item).unwrap().is_claimed());
    assert_consistent(&colony);
}

#[test]
fn resync_repairs_dangling_references() {
    let mut colony = colony(road(4, 1), Catalog::from_templates([twiner()]));
    let building = colony.add_building("Twiner", at(0, 0)).unwrap();
    let worker = colony.add_worker("Hu", at(0, 0));
    let fibers = colony
        .spawn_item(at(2, 0), &ItemTemplate::plain("Bark Fibers"))
        .unwrap();
    let task = colony.create_task(building, "Twist Cord", 1).unwrap();
    assert_eq!(step(&mut colony, worker), StepOutcome::RelocationQueued);

    // Drop the parent behind the registry's back.
    colony.tasks.remove(task);
    assert!(!colony.check_invariants().is_empty());

    let report = colony.resync_references();
    assert!(report.references_dropped > 0 || report.claims_cleared > 0);
    assert!(colony.tasks.iter().all(|t| t.parent.is_none()));
    assert!(colony.building(building).unwrap().active_tasks.is_empty());
    assert!(!colony.worker(worker).unwrap().tasks.contains(task));
    assert_ne!(colony.world.item(fibers).unwrap().in_task, Some(task));
    assert_consistent(&colony);
}

#[test]
fn unknown_recipe_and_building_are_rejected() {
    let mut colony = colony(road(2, 2), Catalog::standard());
    let knapper = colony.add_building("Flint Knapper", at(0, 0)).unwrap();
    assert!(colony.create_task(knapper, "Bake Bread", 1).is_err());
    assert!(colony.create_task(BuildingId(999), "Craft Flint Knife", 1).is_err());
    assert!(colony.add_building("Flint Knapper", at(9, 9)).is_err());
    assert!(colony.tasks.is_empty());
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Count `Moving` outcomes until the worker picks the item up.
fn ticks_to_pickup(colony: &mut Colony, worker: WorkerId) -> usize {
    let mut moving = 0;
    for _ in 0..100 {
        match step(colony, worker) {
            StepOutcome::Moving => moving += 1,
            StepOutcome::PickedUp => return moving,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    panic!("never picked up");
}

#[test]
fn straight_walk_costs_tiles_times_lag() {
    let mut colony = colony(TileMap::filled(6, 1, Terrain::Sand), Catalog::new());
    let worker = colony.add_worker("Io", at(0, 0));
    let item = colony
        .spawn_item(at(4, 0), &ItemTemplate::plain("Stone"))
        .unwrap();
    colony
        .create_item_move_task(item, at(4, 0), at(0, 0), None)
        .unwrap();

    let lag = usize::try_from(Terrain::Sand.walk_lag().unwrap()).unwrap();
    assert_eq!(ticks_to_pickup(&mut colony, worker), 4 * lag);
    assert_eq!(colony.worker(worker).unwrap().position, at(4, 0));
}

#[test]
fn diagonal_steps_cost_more_than_straight_ones() {
    let mut colony = colony(TileMap::filled(3, 3, Terrain::Sand), Catalog::new());
    let worker = colony.add_worker("Ju", at(0, 0));
    let item = colony
        .spawn_item(at(2, 2), &ItemTemplate::plain("Stone"))
        .unwrap();
    colony
        .create_item_move_task(item, at(2, 2), at(0, 0), None)
        .unwrap();

    // Two diagonal sand steps: 2 * 3 * 1.4 = 8.4 ticks, landing on the 9th.
    let per_step = BehaviorConfig::default().step_cost(3, true);
    assert_eq!(per_step, 420);
    assert_eq!(ticks_to_pickup(&mut colony, worker), 9);
}

/// Ticks a lone worker at the origin of a road map spends walking to an
/// item at `target`.
fn road_walk_ticks(size: i32, target: Coord) -> usize {
    let mut colony = colony(road(size, size), Catalog::new());
    let worker = colony.add_worker("Lu", at(0, 0));
    let item = colony
        .spawn_item(target, &ItemTemplate::plain("Stone"))
        .unwrap();
    colony
        .create_item_move_task(item, target, at(0, 0), None)
        .unwrap();
    ticks_to_pickup(&mut colony, worker)
}

#[test]
fn road_diagonal_costs_more_than_road_straight() {
    assert_eq!(road_walk_ticks(3, at(1, 0)), 1);
    assert_eq!(road_walk_ticks(3, at(1, 1)), 2);
}

#[test]
fn diagonal_fractions_accumulate_along_a_path() {
    // Ten road diagonals cost 14 ticks in total, not 10 or 20.
    assert_eq!(road_walk_ticks(11, at(10, 10)), 14);
    assert_eq!(road_walk_ticks(11, at(10, 0)), 10);
}

#[test]
fn move_task_delivers_and_releases() {
    let mut colony = colony(road(3, 1), Catalog::new());
    let worker = colony.add_worker("Ka", at(0, 0));
    let item = colony
        .spawn_item(at(2, 0), &ItemTemplate::plain("Log"))
        .unwrap();
    let task = colony
        .create_item_move_task(item, at(2, 0), at(0, 0), None)
        .unwrap();

    let mut outcomes = Vec::new();
    while colony.tasks.contains(task) && outcomes.len() < 20 {
        outcomes.push(step(&mut colony, worker));
    }
    assert_eq!(
        outcomes,
        vec![
            StepOutcome::Moving,
            StepOutcome::Moving,
            StepOutcome::PickedUp,
            StepOutcome::Moving,
            StepOutcome::Moving,
            StepOutcome::Completed,
        ]
    );
    assert_eq!(colony.world.locate(item), Some(at(0, 0)));
    assert!(!colony.world.item(item).unwrap().is_claimed());
    assert_consistent(&colony);
}

// ---------------------------------------------------------------------------
// Hunger, spoilage, sub-tasks
// ---------------------------------------------------------------------------

fn hungry_config() -> BehaviorConfig {
    BehaviorConfig {
        hunger_interval_ticks: 3,
        eat_retry_ticks: 50,
        meal_ticks: 2,
        ..BehaviorConfig::default()
    }
}

#[test]
fn hungry_worker_eats_nearby_food() {
    let mut colony = Colony::new(road(3, 1), Catalog::new(), hungry_config());
    let worker = colony.add_worker("Lu", at(0, 0));
    let berries = colony
        .spawn_item(at(1, 0), &ItemTemplate::food("Berries", 500, None))
        .unwrap();

    let mut ate_at = None;
    for _ in 0..20 {
        step(&mut colony, worker);
        if colony.world.item(berries).is_none() {
            ate_at = Some(colony.tick);
            break;
        }
    }
    let ate_at = ate_at.unwrap();
    assert_eq!(colony.worker(worker).unwrap().hungry_at, ate_at + 500);
    assert!(colony.tasks.is_empty());
    assert_consistent(&colony);
}

#[test]
fn hunger_without_food_backs_off() {
    let mut colony = Colony::new(road(3, 1), Catalog::new(), hungry_config());
    let worker = colony.add_worker("Mo", at(0, 0));

    assert_eq!(step(&mut colony, worker), StepOutcome::Idle);
    assert_eq!(step(&mut colony, worker), StepOutcome::Idle);
    assert_eq!(step(&mut colony, worker), StepOutcome::Cancelled);
    assert_eq!(colony.worker(worker).unwrap().hungry_at, 3 + 50);
    assert!(colony.tasks.is_empty());
    assert_eq!(step(&mut colony, worker), StepOutcome::Idle);
}

#[test]
fn meal_spawns_forage_sub_task_when_no_food_lies_around() {
    let mut colony = Colony::new(road(5, 1), Catalog::standard(), hungry_config());
    colony.add_building("Forager Hut", at(0, 0)).unwrap();
    let worker = colony.add_worker("Ny", at(0, 0));
    colony
        .spawn_item(at(3, 0), &ItemTemplate::plain("Berry Bush"))
        .unwrap();

    step(&mut colony, worker);
    step(&mut colony, worker);
    assert_eq!(step(&mut colony, worker), StepOutcome::SubTaskQueued);
    let stack: Vec<_> = colony.worker(worker).unwrap().tasks.iter().collect();
    assert_eq!(stack.len(), 2);
    let sub = colony.tasks.get(stack[0]).unwrap();
    assert_eq!(sub.label(), "Pick Berries");
    assert_eq!(sub.parent, Some(stack[1]));

    let meal = stack[1];
    for _ in 0..60 {
        step(&mut colony, worker);
        if !colony.tasks.contains(meal) {
            break;
        }
    }
    assert!(!colony.tasks.contains(meal));
    assert_eq!(count_named(&colony, at(3, 0), "Picked Bush"), 1);
    assert_eq!(colony.worker(worker).unwrap().hungry_at, colony.tick + 2400);
    assert_consistent(&colony);
}

#[test]
fn producer_sub_task_supplies_missing_input() {
    let mut colony = colony(road(4, 1), Catalog::standard());
    let rope = colony.add_building("Rope Walk", at(0, 0)).unwrap();
    colony.add_building("Bark Peeler", at(3, 0)).unwrap();
    let worker = colony.add_worker("Ol", at(0, 0));
    colony
        .spawn_item(at(1, 0), &ItemTemplate::plain("Log"))
        .unwrap();
    colony
        .spawn_item(at(0, 0), &ItemTemplate::tool("Flint Knife", 30))
        .unwrap();
    let peeling_knife = colony
        .spawn_item(at(2, 0), &ItemTemplate::tool("Flint Knife", 30))
        .unwrap();
    let task = colony.create_task(rope, "Twist Twine", 1).unwrap();

    assert_eq!(step(&mut colony, worker), StepOutcome::SubTaskQueued);
    let sub = colony.worker(worker).unwrap().tasks.active().unwrap();
    let sub_task = colony.tasks.get(sub).unwrap();
    assert_eq!(sub_task.label(), "Peel Bark");
    assert_eq!(sub_task.parent, Some(task));
    assert_eq!(sub_task.remaining, 1, "one peel yields two fibers");
    assert_eq!(colony.tasks.get(task).unwrap().choices[0], Some(0));
    assert_consistent(&colony);

    for _ in 0..80 {
        step(&mut colony, worker);
        if !colony.tasks.contains(task) {
            break;
        }
        assert_consistent(&colony);
    }
    assert!(!colony.tasks.contains(task));
    assert_eq!(count_named(&colony, at(0, 0), "Twine"), 1);
    assert_eq!(colony.world.items().filter(|(_, i)| i.name == "Log").count(), 0);
    assert_eq!(colony.world.locate(peeling_knife), Some(at(1, 0)));
    assert_eq!(endurance(&colony, peeling_knife), Some(24));
    assert_consistent(&colony);
}

#[test]
fn depth_guard_cancels_deep_producer_chains() {
    let config = BehaviorConfig {
        max_subtask_depth: 0,
        ..BehaviorConfig::default()
    };
    let mut colony = Colony::new(road(4, 1), Catalog::standard(), config);
    let rope = colony.add_building("Rope Walk", at(0, 0)).unwrap();
    colony.add_building("Bark Peeler", at(3, 0)).unwrap();
    let worker = colony.add_worker("Pa", at(0, 0));
    let task = colony.create_task(rope, "Twist Twine", 1).unwrap();

    assert_eq!(step(&mut colony, worker), StepOutcome::Cancelled);
    assert!(!colony.tasks.contains(task));
    assert_consistent(&colony);
}

#[test]
fn spoiled_tagged_item_is_untagged() {
    let mut colony = colony(road(4, 1), Catalog::from_templates([twiner()]));
    let building = colony.add_building("Twiner", at(0, 0)).unwrap();
    let worker = colony.add_worker("Qu", at(0, 0));
    let fibers = colony
        .spawn_item(at(2, 0), &ItemTemplate::perishable("Bark Fibers", 2))
        .unwrap();
    let task = colony.create_task(building, "Twist Cord", 1).unwrap();

    assert_eq!(step(&mut colony, worker), StepOutcome::RelocationQueued);
    assert!(colony.tasks.get(task).unwrap().has_tagged(fibers));

    colony.tick = 2;
    assert_eq!(colony.spoil_items(), 1);
    assert!(colony.world.item(fibers).is_none());
    assert!(!colony.tasks.get(task).unwrap().has_tagged(fibers));
}

// ---------------------------------------------------------------------------
// Building hooks
// ---------------------------------------------------------------------------

#[test]
fn stock_targets_queue_tasks_once() {
    let mut colony = colony(road(2, 2), Catalog::standard());
    let knapper = colony.add_building("Flint Knapper", at(0, 0)).unwrap();

    assert_eq!(colony.update_buildings(), 1);
    assert_eq!(colony.update_buildings(), 0, "queued units count toward the target");
    let tasks = &colony.building(knapper).unwrap().active_tasks;
    assert_eq!(tasks.len(), 1);
}

#[test]
fn unresolvable_stock_recipe_is_held_back_until_retry() {
    let template = BuildingTemplate {
        spec: BuildingSpec::Workshop(WorkshopSpec {
            stock_targets: BTreeMap::from([(String::from("Cord"), 1)]),
            ..WorkshopSpec::default()
        }),
        ..twiner()
    };
    let config = BehaviorConfig {
        request_retry_ticks: 50,
        ..BehaviorConfig::default()
    };
    let mut colony = Colony::new(road(3, 1), Catalog::from_templates([template]), config);
    let building = colony.add_building("Twiner", at(0, 0)).unwrap();
    colony.add_worker("Ra", at(0, 0));

    // No fibers and nobody makes them: one attempt, then silence.
    let mut seen = BTreeSet::new();
    let mut cancels = 0;
    for _ in 0..40 {
        colony.update_buildings();
        seen.extend(colony.tasks.iter().map(|task| task.id));
        cancels += step_all(&mut colony)
            .iter()
            .filter(|&&outcome| outcome == StepOutcome::Cancelled)
            .count();
    }
    assert_eq!(seen.len(), 1, "one task, not one per tick");
    assert_eq!(cancels, 1);
    assert!(colony.tasks.is_empty());
    assert_eq!(
        colony.building(building).unwrap().request_retry.get("Twist Cord"),
        Some(&51)
    );
    assert_consistent(&colony);

    // Fibers turn up; once the hold expires the cord gets made.
    colony
        .spawn_item(at(2, 0), &ItemTemplate::plain("Bark Fibers"))
        .unwrap();
    for _ in 0..60 {
        colony.update_buildings();
        step_all(&mut colony);
    }
    assert_eq!(count_named(&colony, at(0, 0), "Cord"), 1);
    assert!(colony.building(building).unwrap().request_retry.is_empty());
    assert_consistent(&colony);
}

#[test]
fn workers_outside_the_work_radius_are_passed_over() {
    let template = BuildingTemplate {
        spec: BuildingSpec::Workshop(WorkshopSpec {
            work_radius: Some(2),
            ..WorkshopSpec::default()
        }),
        ..carver(3)
    };
    let mut colony = colony(road(12, 1), Catalog::from_templates([template]));
    let building = colony.add_building("Carver", at(0, 0)).unwrap();
    let far = colony.add_worker("Sy", at(10, 0));
    let near = colony.add_worker("Ty", at(1, 0));
    colony
        .spawn_item(at(0, 0), &ItemTemplate::tool("Flint Knife", 10))
        .unwrap();
    let task = colony.create_task(building, "Carve Peg", 1).unwrap();

    let outcomes = step_all(&mut colony);
    assert_eq!(outcomes[0], StepOutcome::Idle);
    assert_eq!(colony.tasks.get(task).unwrap().worker, Some(near));
    assert!(colony.worker(far).unwrap().tasks.is_empty());
    assert_consistent(&colony);
}

#[test]
fn farm_harvest_starts_at_the_nearest_ripe_plot() {
    let mut colony = colony(road(5, 2), Catalog::standard());
    let farm = colony.add_building("Wheat Farm", at(0, 0)).unwrap();
    let worker = colony.add_worker("Uma", at(4, 1));
    let wheat = ItemTemplate::food("Wheat", 3000, None);
    let far_crop = colony.spawn_item(at(1, 0), &wheat).unwrap();
    let near_crop = colony.spawn_item(at(2, 1), &wheat).unwrap();
    let task = colony.create_task(farm, "Harvest Wheat", 1).unwrap();
    assert_eq!(colony.tasks.get(task).unwrap().target, None);

    step(&mut colony, worker);
    let state = colony.tasks.get(task).unwrap();
    assert_eq!(state.target, Some(at(2, 1)));
    assert!(state.has_tagged(near_crop));
    assert!(!colony.world.item(far_crop).unwrap().is_claimed());

    for _ in 0..40 {
        step(&mut colony, worker);
        if colony.worker(worker).unwrap().tasks.is_empty() {
            break;
        }
    }
    assert!(!colony.tasks.contains(task));
    assert_eq!(colony.world.locate(near_crop), Some(at(0, 0)));
    assert_eq!(colony.world.locate(far_crop), Some(at(1, 0)));
    assert_consistent(&colony);
}

#[test]
fn farm_harvest_without_ripe_crop_is_unresolvable() {
    let mut colony = colony(road(5, 2), Catalog::standard());
    let farm = colony.add_building("Wheat Farm", at(0, 0)).unwrap();
    let worker = colony.add_worker("Vi", at(4, 1));
    let task = colony.create_task(farm, "Harvest Wheat", 1).unwrap();

    assert_eq!(step(&mut colony, worker), StepOutcome::Cancelled);
    assert!(!colony.tasks.contains(task));
    assert!(
        colony
            .building(farm)
            .unwrap()
            .request_retry
            .contains_key("Harvest Wheat")
    );
}

#[test]
fn empty_tool_slot_queues_a_haul() {
    let mut colony = colony(road(5, 1), Catalog::standard());
    let rope = colony.add_building("Rope Walk", at(0, 0)).unwrap();
    let knife = colony
        .spawn_item(at(4, 0), &ItemTemplate::tool("Flint Knife", 30))
        .unwrap();

    colony.update_buildings();

    let haul = colony
        .tasks
        .iter()
        .find(|task| matches!(task.kind, TaskKind::MoveItem { .. }))
        .unwrap();
    assert_eq!(haul.building, Some(rope));
    assert_eq!(haul.moved_item(), Some(knife));
    assert_eq!(colony.world.item(knife).unwrap().in_task, Some(haul.id));
    let slots = colony
        .building(rope)
        .unwrap()
        .behavior
        .as_tool_slots()
        .unwrap()
        .slots()
        .to_vec();
    assert_eq!(slots[0].haul_task, Some(haul.id));

    let hauls_before = colony.tasks.iter().filter(|t| t.recipe.is_none()).count();
    colony.update_buildings();
    let hauls_after = colony.tasks.iter().filter(|t| t.recipe.is_none()).count();
    assert_eq!(hauls_before, hauls_after, "a pending haul is not duplicated");
    assert_consistent(&colony);
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

fn busy_colony() -> Colony {
    let mut colony = colony(road(8, 8), Catalog::standard());
    colony.add_building("Flint Knapper", at(0, 0)).unwrap();
    colony.add_building("Rope Walk", at(7, 0)).unwrap();
    colony.add_building("Bark Peeler", at(0, 7)).unwrap();
    colony.add_building("Forager Hut", at(4, 4)).unwrap();
    for x in 1..6 {
        colony
            .spawn_item(at(x, 5), &ItemTemplate::plain("Log"))
            .unwrap();
        colony
            .spawn_item(at(x, 2), &ItemTemplate::plain("Berry Bush"))
            .unwrap();
    }
    for name in ["Ra", "Sa", "Ti"] {
        colony.add_worker(name, at(3, 3));
    }
    colony
}

fn run(colony: &mut Colony, ticks: u64) {
    for _ in 0..ticks {
        step_all(colony);
        colony.update_buildings();
        colony.spoil_items();
    }
}

#[test]
fn identical_colonies_stay_identical() {
    let mut left = busy_colony();
    let mut right = busy_colony();
    run(&mut left, 300);
    run(&mut right, 300);

    assert_eq!(
        serde_json::to_value(&left.world).unwrap(),
        serde_json::to_value(&right.world).unwrap()
    );
    assert_eq!(left.workers, right.workers);
    let left_tasks: BTreeMap<_, _> = left.tasks.iter().map(|t| (t.id, t.clone())).collect();
    let right_tasks: BTreeMap<_, _> = right.tasks.iter().map(|t| (t.id, t.clone())).collect();
    assert_eq!(left_tasks, right_tasks);
    assert_consistent(&left);
    let knives = left
        .world
        .items()
        .map(|(_, item)| item)
        .chain(left.workers.iter().flat_map(|worker| worker.inventory.iter()))
        .filter(|item| item.name == "Flint Knife")
        .count();
    assert!(knives > 0);
}
