//! A single grid square and the items lying on it.

use serde::{Deserialize, Serialize};

use homestead_types::{Coord, Item, ItemId, Terrain};

/// One square of the map.
///
/// Items keep their insertion order so scans over a tile are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Position of the tile.
    pub coord: Coord,
    /// Ground type.
    pub terrain: Terrain,
    /// Items lying on the tile.
    pub items: Vec<Item>,
}

impl Tile {
    /// Create an empty tile.
    pub const fn new(coord: Coord, terrain: Terrain) -> Self {
        Self {
            coord,
            terrain,
            items: Vec::new(),
        }
    }

    /// Walking lag of the tile, `None` when impassable.
    pub const fn walk_lag(&self) -> Option<u32> {
        self.terrain.walk_lag()
    }

    /// Whether workers can enter the tile.
    pub const fn is_passable(&self) -> bool {
        self.terrain.is_passable()
    }

    /// Look up an item on this tile.
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Look up an item on this tile for mutation.
    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Unclaimed items accepted by `accept`, in tile order.
    pub fn unclaimed<'a>(
        &'a self,
        mut accept: impl FnMut(&Item) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Item> + 'a {
        self.items
            .iter()
            .filter(move |item| !item.is_claimed() && accept(item))
    }

    /// Count unclaimed items accepted by `accept`.
    pub fn count_unclaimed(&self, accept: impl FnMut(&Item) -> bool) -> usize {
        self.unclaimed(accept).count()
    }

    /// Remove an item from the tile.
    pub(crate) fn take(&mut self, id: ItemId) -> Option<Item> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }
}
