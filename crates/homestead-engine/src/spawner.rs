//! Starting colony generation.
//!
//! At simulation start, the spawner lays out a seeded map, places one
//! building per catalog template along a road through the middle, scatters
//! raw materials (logs in the woods, berry bushes in the open, a single
//! flint knife by the road), and puts the configured number of workers at
//! the settlement. The same seed always produces the same colony.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use homestead_agents::Colony;
use homestead_core::config::SimulationConfig;
use homestead_types::{Coord, ItemTemplate, Terrain};
use homestead_world::TileMap;

use crate::error::EngineError;

// -----------------------------------------------------------------------
// Layout constants
// -----------------------------------------------------------------------

/// Tiles between neighbouring buildings along the road.
const BUILDING_SPACING: i32 = 4;

/// Half-height of the cleared settlement band around the road.
const CLEARING_HALF_HEIGHT: i32 = 3;

/// One log per this many tiles of map.
const TILES_PER_LOG: usize = 40;

/// One berry bush per this many tiles of map.
const TILES_PER_BUSH: usize = 60;

/// Random placement attempts per scattered item before giving up on it.
const PLACEMENT_ATTEMPTS: u32 = 64;

// -----------------------------------------------------------------------
// Name pool
// -----------------------------------------------------------------------

/// Built-in pool of worker names. The spawner picks without replacement
/// from this list to keep names unique.
const NAME_POOL: &[&str] = &[
    "Alder", "Birch", "Cedar", "Dusk", "Ember", "Fern", "Grove", "Haze", "Iris", "Juniper",
    "Kestrel", "Lark", "Moss", "Nettle", "Oak", "Pine", "Quill", "Reed", "Sage", "Thorn",
    "Umber", "Vale", "Wren", "Yarrow", "Zephyr", "Ash", "Brook", "Clay", "Dawn", "Elm",
];

// -----------------------------------------------------------------------
// Entry point
// -----------------------------------------------------------------------

/// Build the starting colony described by `config`.
///
/// # Errors
///
/// Returns [`EngineError::Spawner`] if the map is too small for the
/// catalog's buildings, or wraps the world/task error raised while placing
/// something.
pub fn build_starting_colony(config: &SimulationConfig) -> Result<Colony, EngineError> {
    let mut rng = StdRng::seed_from_u64(config.world.seed);
    let width = config.world.width;
    let height = config.world.height;
    let road_y = height.checked_div(2).unwrap_or(0);

    let world = generate_terrain(&mut rng, width, height, road_y)?;
    let mut colony = Colony::new(world, config.catalog(), config.workers.behavior());

    let footprint = place_buildings(&mut colony, width, road_y)?;
    let knife_at = Coord::new(0, road_y);
    colony.spawn_item(knife_at, &ItemTemplate::tool("Flint Knife", 30))?;

    let area = usize::try_from(width.saturating_mul(height)).unwrap_or(0);
    let logs = scatter(
        &mut colony,
        &mut rng,
        (width, height),
        &footprint,
        &ItemTemplate::plain("Log"),
        area.checked_div(TILES_PER_LOG).unwrap_or(0).max(1),
        Some(Terrain::Forest),
    )?;
    let bushes = scatter(
        &mut colony,
        &mut rng,
        (width, height),
        &footprint,
        &ItemTemplate::plain("Berry Bush"),
        area.checked_div(TILES_PER_BUSH).unwrap_or(0).max(1),
        Some(Terrain::Grass),
    )?;

    let names = pick_unique_names(&mut rng, config.workers.count)?;
    for (offset, name) in (0_i32..).zip(names) {
        let position = Coord::new(offset.checked_rem(width).unwrap_or(0), road_y);
        let id = colony.add_worker(name.clone(), position);
        info!(worker = %id, name = %name, position = %position, "Spawned worker");
    }

    info!(
        seed = config.world.seed,
        width,
        height,
        buildings = colony.buildings.len(),
        workers = colony.workers.len(),
        logs,
        bushes,
        "Starting colony created"
    );
    Ok(colony)
}

// -----------------------------------------------------------------------
// Terrain
// -----------------------------------------------------------------------

/// Fill the map with random terrain, then clear a road and the settlement
/// band around it.
fn generate_terrain(
    rng: &mut impl Rng,
    width: i32,
    height: i32,
    road_y: i32,
) -> Result<TileMap, EngineError> {
    let mut world = TileMap::filled(width, height, Terrain::Grass);
    for y in 0..height {
        for x in 0..width {
            let coord = Coord::new(x, y);
            let terrain = if y == road_y {
                Terrain::Road
            } else if y.abs_diff(road_y) <= CLEARING_HALF_HEIGHT.unsigned_abs() {
                Terrain::Grass
            } else {
                roll_terrain(rng)
            };
            world.set_terrain(coord, terrain)?;
        }
    }
    Ok(world)
}

/// Terrain for a tile outside the settlement.
fn roll_terrain(rng: &mut impl Rng) -> Terrain {
    match rng.random_range(0_u32..100) {
        0..=29 => Terrain::Forest,
        30..=37 => Terrain::Sand,
        38..=43 => Terrain::Rock,
        44..=46 => Terrain::Water,
        _ => Terrain::Grass,
    }
}

// -----------------------------------------------------------------------
// Buildings
// -----------------------------------------------------------------------

/// Place one building per catalog template just north of the road.
///
/// Returns every tile a building or its plots occupy.
fn place_buildings(
    colony: &mut Colony,
    width: i32,
    road_y: i32,
) -> Result<BTreeSet<Coord>, EngineError> {
    let templates: Vec<String> = colony
        .catalog
        .templates()
        .map(|template| template.name.clone())
        .collect();
    let count = i32::try_from(templates.len()).unwrap_or(i32::MAX);
    let needed = count.saturating_mul(BUILDING_SPACING);
    if needed > width {
        return Err(EngineError::Spawner {
            message: format!(
                "map width {width} cannot fit {count} buildings ({needed} tiles needed)"
            ),
        });
    }

    let row = road_y.saturating_sub(2);
    let mut footprint = BTreeSet::new();
    for (index, name) in (0_i32..).zip(templates) {
        let origin = Coord::new(index.saturating_mul(BUILDING_SPACING).saturating_add(1), row);
        let id = colony.add_building(&name, origin)?;
        for dy in 0..2 {
            for dx in 0..3 {
                footprint.insert(Coord::new(
                    origin.x.saturating_add(dx),
                    origin.y.saturating_add(dy),
                ));
            }
        }
        info!(building = %id, template = %name, origin = %origin, "Placed building");
    }
    Ok(footprint)
}

// -----------------------------------------------------------------------
// Items
// -----------------------------------------------------------------------

/// Drop `count` copies of `template` on random tiles, preferring `terrain`
/// and avoiding building footprints. Returns how many were placed.
fn scatter(
    colony: &mut Colony,
    rng: &mut impl Rng,
    size: (i32, i32),
    footprint: &BTreeSet<Coord>,
    template: &ItemTemplate,
    count: usize,
    terrain: Option<Terrain>,
) -> Result<usize, EngineError> {
    let (width, height) = size;
    let mut placed: usize = 0;
    for _ in 0..count {
        let mut spot = None;
        for _ in 0..PLACEMENT_ATTEMPTS {
            let coord = Coord::new(rng.random_range(0..width), rng.random_range(0..height));
            let Some(tile) = colony.world.get(coord) else {
                continue;
            };
            let walkable = tile.terrain.walk_lag().is_some();
            let preferred = terrain.is_none_or(|wanted| tile.terrain == wanted);
            if walkable && preferred && !footprint.contains(&coord) {
                spot = Some(coord);
                break;
            }
        }
        if let Some(coord) = spot {
            colony.spawn_item(coord, template)?;
            placed = placed.saturating_add(1);
        }
    }
    Ok(placed)
}

// -----------------------------------------------------------------------
// Names
// -----------------------------------------------------------------------

/// Pick `count` unique names from the name pool.
///
/// Once the pool runs dry, names continue as `Settler-N`.
fn pick_unique_names(rng: &mut impl Rng, count: u32) -> Result<Vec<String>, EngineError> {
    let count_usize = usize::try_from(count).map_err(|_conversion_err| EngineError::Spawner {
        message: format!("worker count {count} exceeds usize range"),
    })?;

    let mut available: Vec<&str> = NAME_POOL.to_vec();
    let mut names = Vec::with_capacity(count_usize);
    for index in 0..count_usize {
        if available.is_empty() {
            names.push(format!("Settler-{}", index.saturating_add(1)));
            continue;
        }
        let pick = rng.random_range(0..available.len());
        names.push(available.swap_remove(pick).to_owned());
    }
    Ok(names)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homestead_core::snapshot::ColonySnapshot;

    use super::*;

    fn small_config(seed: u64) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.world.seed = seed;
        config.world.width = 30;
        config.world.height = 20;
        config.workers.count = 3;
        config
    }

    #[test]
    fn colony_matches_config() {
        let config = small_config(42);
        let colony = build_starting_colony(&config).unwrap();
        assert_eq!(colony.workers.len(), 3);
        assert_eq!(colony.buildings.len(), config.catalog().templates().count());
        assert!(colony.world.item_count() > 2);
        assert!(colony.check_invariants().is_empty());
    }

    #[test]
    fn same_seed_same_colony() {
        let first = build_starting_colony(&small_config(7)).unwrap();
        let second = build_starting_colony(&small_config(7)).unwrap();
        assert_eq!(
            ColonySnapshot::capture(&first).unwrap(),
            ColonySnapshot::capture(&second).unwrap()
        );
    }

    #[test]
    fn road_crosses_the_map() {
        let colony = build_starting_colony(&small_config(3)).unwrap();
        for x in 0..30 {
            let tile = colony.world.get(Coord::new(x, 10)).unwrap();
            assert_eq!(tile.terrain, Terrain::Road);
        }
    }

    #[test]
    fn worker_names_are_unique() {
        let mut config = small_config(11);
        config.workers.count = 40;
        let colony = build_starting_colony(&config).unwrap();
        let names: BTreeSet<&str> = colony
            .workers
            .iter()
            .map(|worker| worker.name.as_str())
            .collect();
        assert_eq!(names.len(), 40);
    }

    #[test]
    fn narrow_map_is_rejected() {
        let mut config = small_config(1);
        config.world.width = 6;
        assert!(matches!(
            build_starting_colony(&config),
            Err(EngineError::Spawner { .. })
        ));
    }
}
