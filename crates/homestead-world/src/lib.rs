//! Tile grid, item storage, and spatial search for the Homestead colony
//! scheduler.
//!
//! This crate models the physical colony: a grid of tiles with terrain,
//! the items lying on them, the claims tasks hold on those items, and the
//! nearest-match search workers use to find things and walk to them.
//!
//! # Modules
//!
//! - [`error`] -- Error types for map and search operations.
//! - [`tile`] -- A single grid square and its items.
//! - [`tile_map`] -- [`TileMap`]: tiles, an item index, claims, and spoilage.
//! - [`search`] -- The [`SpatialSearch`] trait and the Dijkstra-based
//!   [`GridSearch`].

pub mod error;
pub mod search;
pub mod tile;
pub mod tile_map;

// Re-export primary types at crate root.
pub use error::WorldError;
pub use search::{
    DEFAULT_DIAGONAL_PCT, DEFAULT_SEARCH_LIMIT, GridSearch, PathFound, SpatialSearch,
};
pub use tile::Tile;
pub use tile_map::TileMap;
