//! Error types for the `homestead-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type alias.

use homestead_types::{Coord, ItemId, TaskId};

/// Errors that can occur during tile map and search operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// No tile exists at the coordinate.
    #[error("no tile at {0}")]
    MissingTile(Coord),

    /// The item is not on any tile.
    #[error("item not found on the map: {0}")]
    MissingItem(ItemId),

    /// The search gave up without finding a matching tile.
    #[error("no path from {origin} after scanning {tiles_scanned} tiles")]
    PathNotFound {
        /// Where the search started.
        origin: Coord,
        /// How many tiles were examined before giving up.
        tiles_scanned: u32,
    },

    /// The item is already claimed by another task.
    #[error("item {item} is already claimed by task {holder}")]
    ItemAlreadyClaimed {
        /// The contested item.
        item: ItemId,
        /// The task holding the claim.
        holder: TaskId,
    },

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in world calculation")]
    ArithmeticOverflow,

    /// A tile was inserted where one already exists.
    #[error("duplicate tile at {0}")]
    DuplicateTile(Coord),

    /// An item was placed while already present on the map.
    #[error("duplicate item id: {0}")]
    DuplicateItem(ItemId),
}
