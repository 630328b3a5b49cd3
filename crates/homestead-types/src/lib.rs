//! Shared type definitions for the Homestead colony scheduler.
//!
//! This crate is the single source of truth for identifiers, coordinates,
//! and item types used across the Homestead workspace.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe integer wrappers and the shared ID allocator
//! - [`coord`] -- Grid coordinates and movement directions
//! - [`enums`] -- Enumeration types (terrain, input roles, task status)
//! - [`structs`] -- Items, item templates, and persisted building records

pub mod coord;
pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use coord::{Coord, Direction, InvalidDirectionCode};
pub use enums::{InputRole, MovePhase, TaskStatus, Terrain};
pub use ids::{BuildingId, IdAllocator, ItemId, TaskId, WorkerId};
pub use structs::{BuildingRecord, Item, ItemRole, ItemTemplate, RoleTemplate};
