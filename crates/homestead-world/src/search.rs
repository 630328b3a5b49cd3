//! Predicate-driven nearest-tile search over the grid.
//!
//! The scheduler asks one question of the map: starting here, which is the
//! cheapest-to-reach tile that satisfies this predicate, and how do I walk
//! there? [`SpatialSearch`] is that question as a trait so the algorithm can
//! be swapped. [`GridSearch`] answers it with Dijkstra over the eight
//! king-move neighbours, using terrain walking lag as edge cost and a
//! `BTreeSet` as the priority queue.
//!
//! Ties are broken by coordinate order, so the same map always yields the
//! same answer.

use std::collections::{BTreeMap, BTreeSet};

use homestead_types::{Coord, Direction, Item, ItemId};

use crate::error::WorldError;
use crate::tile::Tile;
use crate::tile_map::TileMap;

/// Default upper bound on tiles examined by one search.
pub const DEFAULT_SEARCH_LIMIT: u32 = 10_000;

/// Default cost of a diagonal step relative to a straight one, in percent.
pub const DEFAULT_DIAGONAL_PCT: u32 = 140;

/// Cost units of one straight step across a tile with walking lag 1.
const STRAIGHT_STEP_COST: u32 = 100;

/// A successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFound {
    /// The tile that satisfied the predicate.
    pub tile: Coord,
    /// Steps from the origin to `tile`. Empty when the origin matched.
    pub path: Vec<Direction>,
    /// Tiles examined, including the match.
    pub tiles_scanned: u32,
    /// Accumulated path cost in search units.
    pub cost: u32,
}

/// Nearest-match search over a [`TileMap`].
pub trait SpatialSearch: core::fmt::Debug + Send + Sync {
    /// Find the nearest tile for which `predicate` returns `true`.
    ///
    /// The predicate is called at most once per tile, in nearest-first
    /// order, starting with the origin.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingTile`] if the origin is not on the map,
    /// or [`WorldError::PathNotFound`] if the reachable area or the scan
    /// limit is exhausted without a match.
    fn path_to(
        &self,
        map: &TileMap,
        origin: Coord,
        predicate: &mut dyn FnMut(&Tile) -> bool,
    ) -> Result<PathFound, WorldError>;

    /// Collect up to `wanted` unclaimed items accepted by `accept`, nearest
    /// first.
    ///
    /// Returns fewer than `wanted` when the reachable area runs out.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingTile`] if the origin is not on the map.
    fn collect_unclaimed(
        &self,
        map: &TileMap,
        origin: Coord,
        wanted: usize,
        accept: &mut dyn FnMut(&Item) -> bool,
    ) -> Result<Vec<(Coord, ItemId)>, WorldError> {
        let mut found = Vec::new();
        if wanted == 0 {
            return Ok(found);
        }
        let mut gather = |tile: &Tile| {
            for item in &tile.items {
                if found.len() >= wanted {
                    break;
                }
                if !item.is_claimed() && accept(item) {
                    found.push((tile.coord, item.id));
                }
            }
            found.len() >= wanted
        };
        match self.path_to(map, origin, &mut gather) {
            // Running out of map is not an error here; the partial list stands.
            Ok(_) | Err(WorldError::PathNotFound { .. }) => Ok(found),
            Err(err) => Err(err),
        }
    }
}

/// Dijkstra search on the eight-neighbour grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSearch {
    /// Give up after examining this many tiles.
    pub max_tiles_scanned: u32,
    /// Diagonal step cost relative to a straight step, in percent.
    pub diagonal_pct: u32,
}

impl GridSearch {
    /// Create a search with explicit limits.
    pub const fn new(max_tiles_scanned: u32, diagonal_pct: u32) -> Self {
        Self {
            max_tiles_scanned,
            diagonal_pct,
        }
    }

    /// Cost of entering a tile with walking lag `lag` via `direction`.
    fn step_cost(&self, lag: u32, direction: Direction) -> Option<u32> {
        let straight = lag.checked_mul(STRAIGHT_STEP_COST)?;
        if direction.is_diagonal() {
            straight.checked_mul(self.diagonal_pct)?.checked_div(100)
        } else {
            Some(straight)
        }
    }
}

impl Default for GridSearch {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_LIMIT, DEFAULT_DIAGONAL_PCT)
    }
}

impl SpatialSearch for GridSearch {
    fn path_to(
        &self,
        map: &TileMap,
        origin: Coord,
        predicate: &mut dyn FnMut(&Tile) -> bool,
    ) -> Result<PathFound, WorldError> {
        map.tile(origin)?;

        let mut dist: BTreeMap<Coord, u32> = BTreeMap::new();
        let mut prev: BTreeMap<Coord, (Coord, Direction)> = BTreeMap::new();
        let mut settled: BTreeSet<Coord> = BTreeSet::new();
        let mut queue: BTreeSet<(u32, Coord)> = BTreeSet::new();
        let mut tiles_scanned: u32 = 0;

        dist.insert(origin, 0);
        queue.insert((0, origin));

        while let Some((cost, coord)) = queue.pop_first() {
            if !settled.insert(coord) {
                continue;
            }
            let Some(tile) = map.get(coord) else {
                continue;
            };
            tiles_scanned = tiles_scanned.saturating_add(1);

            if predicate(tile) {
                return Ok(PathFound {
                    tile: coord,
                    path: rebuild_path(&prev, origin, coord),
                    tiles_scanned,
                    cost,
                });
            }
            if tiles_scanned >= self.max_tiles_scanned {
                break;
            }

            for direction in Direction::ALL {
                let Some(next) = coord.step(direction) else {
                    continue;
                };
                if settled.contains(&next) {
                    continue;
                }
                let Some(lag) = map.walk_lag(next) else {
                    continue;
                };
                let Some(new_cost) = self
                    .step_cost(lag, direction)
                    .and_then(|step| cost.checked_add(step))
                else {
                    continue;
                };
                if dist.get(&next).is_none_or(|&existing| new_cost < existing) {
                    if let Some(old) = dist.insert(next, new_cost) {
                        queue.remove(&(old, next));
                    }
                    prev.insert(next, (coord, direction));
                    queue.insert((new_cost, next));
                }
            }
        }

        Err(WorldError::PathNotFound {
            origin,
            tiles_scanned,
        })
    }
}

/// Walk the predecessor map back from `goal` and return forward steps.
fn rebuild_path(
    prev: &BTreeMap<Coord, (Coord, Direction)>,
    origin: Coord,
    goal: Coord,
) -> Vec<Direction> {
    let mut steps = Vec::new();
    let mut current = goal;
    while current != origin {
        let Some(&(from, direction)) = prev.get(&current) else {
            break;
        };
        steps.push(direction);
        current = from;
    }
    steps.reverse();
    steps
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homestead_types::{ItemRole, Terrain};

    use super::*;

    fn walk(origin: Coord, path: &[Direction]) -> Coord {
        path.iter()
            .fold(origin, |at, &direction| at.step(direction).unwrap())
    }

    fn log(id: u64) -> Item {
        Item::new(ItemId(id), "Log", ItemRole::Plain)
    }

    #[test]
    fn origin_match_has_empty_path() {
        let map = TileMap::filled(3, 3, Terrain::Grass);
        let found = GridSearch::default()
            .path_to(&map, Coord::new(1, 1), &mut |_| true)
            .unwrap();
        assert_eq!(found.tile, Coord::new(1, 1));
        assert!(found.path.is_empty());
        assert_eq!(found.tiles_scanned, 1);
    }

    #[test]
    fn straight_line_path() {
        let map = TileMap::filled(6, 1, Terrain::Grass);
        let goal = Coord::new(5, 0);
        let found = GridSearch::default()
            .path_to(&map, Coord::new(0, 0), &mut |tile| tile.coord == goal)
            .unwrap();
        assert_eq!(found.path, vec![Direction::East; 5]);
        assert_eq!(walk(Coord::new(0, 0), &found.path), goal);
    }

    #[test]
    fn diagonal_is_used_when_cheaper() {
        let map = TileMap::filled(4, 4, Terrain::Grass);
        let goal = Coord::new(3, 3);
        let found = GridSearch::default()
            .path_to(&map, Coord::new(0, 0), &mut |tile| tile.coord == goal)
            .unwrap();
        assert_eq!(found.path, vec![Direction::SouthEast; 3]);
    }

    #[test]
    fn routes_around_water() {
        let mut map = TileMap::filled(5, 3, Terrain::Grass);
        for y in 0..2 {
            map.set_terrain(Coord::new(2, y), Terrain::Water).unwrap();
        }
        let goal = Coord::new(4, 0);
        let found = GridSearch::default()
            .path_to(&map, Coord::new(0, 0), &mut |tile| tile.coord == goal)
            .unwrap();
        assert_eq!(walk(Coord::new(0, 0), &found.path), goal);
        let mut at = Coord::new(0, 0);
        for &direction in &found.path {
            at = at.step(direction).unwrap();
            assert!(map.tile(at).unwrap().is_passable());
        }
    }

    #[test]
    fn prefers_road_detour_over_rock() {
        // Row 0 is rock, row 1 is road; the cheapest way east is via the road.
        let mut map = TileMap::filled(6, 2, Terrain::Road);
        for x in 1..5 {
            map.set_terrain(Coord::new(x, 0), Terrain::Rock).unwrap();
        }
        let goal = Coord::new(5, 0);
        let found = GridSearch::default()
            .path_to(&map, Coord::new(0, 0), &mut |tile| tile.coord == goal)
            .unwrap();
        let mut at = Coord::new(0, 0);
        for &direction in &found.path {
            at = at.step(direction).unwrap();
            if at != goal {
                assert_eq!(map.tile(at).unwrap().terrain, Terrain::Road);
            }
        }
    }

    #[test]
    fn unreachable_reports_scan_count() {
        let mut map = TileMap::filled(3, 1, Terrain::Grass);
        map.set_terrain(Coord::new(1, 0), Terrain::Water).unwrap();
        let goal = Coord::new(2, 0);
        let err = GridSearch::default()
            .path_to(&map, Coord::new(0, 0), &mut |tile| tile.coord == goal)
            .unwrap_err();
        assert_eq!(
            err,
            WorldError::PathNotFound {
                origin: Coord::new(0, 0),
                tiles_scanned: 1
            }
        );
    }

    #[test]
    fn scan_limit_stops_search() {
        let map = TileMap::filled(20, 20, Terrain::Grass);
        let search = GridSearch::new(5, DEFAULT_DIAGONAL_PCT);
        let err = search
            .path_to(&map, Coord::new(0, 0), &mut |tile| tile.coord == Coord::new(19, 19))
            .unwrap_err();
        assert!(matches!(err, WorldError::PathNotFound { tiles_scanned: 5, .. }));
    }

    #[test]
    fn missing_origin_is_an_error() {
        let map = TileMap::filled(1, 1, Terrain::Grass);
        let err = GridSearch::default()
            .path_to(&map, Coord::new(3, 3), &mut |_| true)
            .unwrap_err();
        assert_eq!(err, WorldError::MissingTile(Coord::new(3, 3)));
    }

    #[test]
    fn collect_takes_nearest_unclaimed_first() {
        let mut map = TileMap::filled(6, 1, Terrain::Grass);
        map.place_item(Coord::new(5, 0), log(1)).unwrap();
        map.place_item(Coord::new(2, 0), log(2)).unwrap();
        map.place_item(Coord::new(1, 0), log(3)).unwrap();
        map.claim(ItemId(3), homestead_types::TaskId(99)).unwrap();

        let found = GridSearch::default().collect_unclaimed(
            &map,
            Coord::new(0, 0),
            2,
            &mut |item| item.name == "Log",
        )
        .unwrap();
        assert_eq!(
            found,
            vec![(Coord::new(2, 0), ItemId(2)), (Coord::new(5, 0), ItemId(1))]
        );
    }

    #[test]
    fn collect_returns_partial_when_map_runs_out() {
        let mut map = TileMap::filled(3, 1, Terrain::Grass);
        map.place_item(Coord::new(2, 0), log(1)).unwrap();
        let found = GridSearch::default()
            .collect_unclaimed(&map, Coord::new(0, 0), 3, &mut |_| true)
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn collect_from_off_map_origin_is_an_error() {
        let mut map = TileMap::filled(3, 1, Terrain::Grass);
        map.place_item(Coord::new(2, 0), log(1)).unwrap();
        let err = GridSearch::default()
            .collect_unclaimed(&map, Coord::new(7, 7), 1, &mut |_| true)
            .unwrap_err();
        assert_eq!(err, WorldError::MissingTile(Coord::new(7, 7)));
    }
}
