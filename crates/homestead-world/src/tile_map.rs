//! The tile grid: terrain, item storage, and item claims.
//!
//! [`TileMap`] owns every tile and every item lying on the ground. It keeps
//! an index from item ID to coordinate so items can be found without a scan.
//! The index is rebuilt on load and never serialized.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use homestead_types::{Coord, Item, ItemId, TaskId, Terrain};

use crate::error::WorldError;
use crate::tile::Tile;

/// The colony map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TileMapRecord", into = "TileMapRecord")]
pub struct TileMap {
    /// Tiles keyed by coordinate.
    tiles: BTreeMap<Coord, Tile>,
    /// Where every item on the ground lies.
    item_index: BTreeMap<ItemId, Coord>,
}

/// Serialized form of a [`TileMap`]: a flat tile list.
#[derive(Serialize, Deserialize)]
struct TileMapRecord {
    tiles: Vec<Tile>,
}

impl From<TileMap> for TileMapRecord {
    fn from(map: TileMap) -> Self {
        Self {
            tiles: map.tiles.into_values().collect(),
        }
    }
}

impl From<TileMapRecord> for TileMap {
    fn from(record: TileMapRecord) -> Self {
        let mut map = Self::new();
        for tile in record.tiles {
            for item in &tile.items {
                map.item_index.insert(item.id, tile.coord);
            }
            map.tiles.insert(tile.coord, tile);
        }
        map
    }
}

impl TileMap {
    /// Create an empty map.
    pub const fn new() -> Self {
        Self {
            tiles: BTreeMap::new(),
            item_index: BTreeMap::new(),
        }
    }

    /// Create a `width` by `height` rectangle of one terrain with its
    /// north-west corner at `(0, 0)`.
    pub fn filled(width: i32, height: i32, terrain: Terrain) -> Self {
        let mut map = Self::new();
        for y in 0..height {
            for x in 0..width {
                let coord = Coord::new(x, y);
                map.tiles.insert(coord, Tile::new(coord, terrain));
            }
        }
        map
    }

    // -------------------------------------------------------------------
    // Tiles
    // -------------------------------------------------------------------

    /// Add a tile.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateTile`] if a tile already exists at the
    /// coordinate, or [`WorldError::DuplicateItem`] if one of its items is
    /// already on the map.
    pub fn insert_tile(&mut self, tile: Tile) -> Result<(), WorldError> {
        if self.tiles.contains_key(&tile.coord) {
            return Err(WorldError::DuplicateTile(tile.coord));
        }
        if let Some(item) = tile
            .items
            .iter()
            .find(|item| self.item_index.contains_key(&item.id))
        {
            return Err(WorldError::DuplicateItem(item.id));
        }
        for item in &tile.items {
            self.item_index.insert(item.id, tile.coord);
        }
        self.tiles.insert(tile.coord, tile);
        Ok(())
    }

    /// Change the terrain of an existing tile.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingTile`] if there is no tile at `coord`.
    pub fn set_terrain(&mut self, coord: Coord, terrain: Terrain) -> Result<(), WorldError> {
        self.tile_mut(coord)?.terrain = terrain;
        Ok(())
    }

    /// Get a tile.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingTile`] if there is no tile at `coord`.
    pub fn tile(&self, coord: Coord) -> Result<&Tile, WorldError> {
        self.tiles.get(&coord).ok_or(WorldError::MissingTile(coord))
    }

    /// Get a tile for mutation.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingTile`] if there is no tile at `coord`.
    pub fn tile_mut(&mut self, coord: Coord) -> Result<&mut Tile, WorldError> {
        self.tiles
            .get_mut(&coord)
            .ok_or(WorldError::MissingTile(coord))
    }

    /// Get a tile if it exists.
    pub fn get(&self, coord: Coord) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    /// Whether a tile exists at `coord`.
    pub fn contains(&self, coord: Coord) -> bool {
        self.tiles.contains_key(&coord)
    }

    /// Number of tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Iterate tiles in coordinate order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    /// Walking lag at `coord`, `None` when missing or impassable.
    pub fn walk_lag(&self, coord: Coord) -> Option<u32> {
        self.tiles.get(&coord).and_then(Tile::walk_lag)
    }

    // -------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------

    /// Put an item on a tile.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingTile`] if there is no tile at `coord`,
    /// or [`WorldError::DuplicateItem`] if the item is already on the map.
    pub fn place_item(&mut self, coord: Coord, item: Item) -> Result<(), WorldError> {
        if self.item_index.contains_key(&item.id) {
            return Err(WorldError::DuplicateItem(item.id));
        }
        let tile = self
            .tiles
            .get_mut(&coord)
            .ok_or(WorldError::MissingTile(coord))?;
        self.item_index.insert(item.id, coord);
        tile.items.push(item);
        Ok(())
    }

    /// Remove an item from the map, returning it with the tile it was on.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingItem`] if the item is not on the map.
    pub fn take_item(&mut self, id: ItemId) -> Result<(Coord, Item), WorldError> {
        let coord = *self.item_index.get(&id).ok_or(WorldError::MissingItem(id))?;
        let item = self
            .tiles
            .get_mut(&coord)
            .and_then(|tile| tile.take(id))
            .ok_or(WorldError::MissingItem(id))?;
        self.item_index.remove(&id);
        Ok((coord, item))
    }

    /// Where an item lies, if it is on the map.
    pub fn locate(&self, id: ItemId) -> Option<Coord> {
        self.item_index.get(&id).copied()
    }

    /// Look up an item on the map.
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        let coord = self.item_index.get(&id)?;
        self.tiles.get(coord)?.item(id)
    }

    /// Look up an item on the map for mutation.
    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        let coord = self.item_index.get(&id)?;
        self.tiles.get_mut(coord)?.item_mut(id)
    }

    /// Number of items on the map.
    pub fn item_count(&self) -> usize {
        self.item_index.len()
    }

    /// Iterate every item on the map with its coordinate.
    pub fn items(&self) -> impl Iterator<Item = (Coord, &Item)> {
        self.tiles
            .values()
            .flat_map(|tile| tile.items.iter().map(move |item| (tile.coord, item)))
    }

    // -------------------------------------------------------------------
    // Claims
    // -------------------------------------------------------------------

    /// Claim an item for `task`. Re-claiming for the same task is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingItem`] if the item is not on the map, or
    /// [`WorldError::ItemAlreadyClaimed`] if another task holds it.
    pub fn claim(&mut self, id: ItemId, task: TaskId) -> Result<(), WorldError> {
        let item = self.item_mut(id).ok_or(WorldError::MissingItem(id))?;
        match item.in_task {
            Some(holder) if holder != task => Err(WorldError::ItemAlreadyClaimed { item: id, holder }),
            _ => {
                item.in_task = Some(task);
                Ok(())
            }
        }
    }

    /// Release `task`'s claim on an item.
    ///
    /// Returns `true` if a claim held by `task` was cleared. Claims held by
    /// other tasks are left alone.
    pub fn release(&mut self, id: ItemId, task: TaskId) -> bool {
        match self.item_mut(id) {
            Some(item) if item.in_task == Some(task) => {
                item.in_task = None;
                true
            }
            _ => false,
        }
    }

    /// Clear every claim on the map that names a task rejected by `keep`.
    ///
    /// Returns the released item IDs.
    pub fn release_where(&mut self, mut keep: impl FnMut(TaskId) -> bool) -> Vec<ItemId> {
        let mut released = Vec::new();
        for tile in self.tiles.values_mut() {
            for item in &mut tile.items {
                if let Some(task) = item.in_task
                    && !keep(task)
                {
                    item.in_task = None;
                    released.push(item.id);
                }
            }
        }
        released
    }

    // -------------------------------------------------------------------
    // Spoilage
    // -------------------------------------------------------------------

    /// Remove every item that has spoiled by `tick`.
    ///
    /// Returns the removed items with the tile each was on, in coordinate
    /// order.
    pub fn remove_spoiled(&mut self, tick: u64) -> Vec<(Coord, Item)> {
        let mut spoiled = Vec::new();
        for tile in self.tiles.values_mut() {
            if !tile.items.iter().any(|item| item.is_spoiled(tick)) {
                continue;
            }
            let (gone, kept): (Vec<Item>, Vec<Item>) = tile
                .items
                .drain(..)
                .partition(|item| item.is_spoiled(tick));
            tile.items = kept;
            for item in gone {
                self.item_index.remove(&item.id);
                spoiled.push((tile.coord, item));
            }
        }
        if !spoiled.is_empty() {
            debug!(tick, count = spoiled.len(), "Items spoiled");
        }
        spoiled
    }
}
