//! Recipes, buildings, tasks, and workers for the Homestead colony.
//!
//! This crate holds the scheduler: everything that decides who does what,
//! where, and with which items. It sits between `homestead-world` (the map,
//! claims, and spatial search) and `homestead-core` (the tick driver and
//! persistence), and performs no I/O of its own.
//!
//! # Modules
//!
//! - [`behavior`] -- The per-tick worker decision procedure ([`step_worker`])
//! - [`building`] -- Buildings and their capability traits ([`BuildingBehavior`])
//! - [`catalog`] -- Building templates and the standard catalog ([`Catalog`])
//! - [`colony`] -- The colony context owned by the tick driver ([`Colony`])
//! - [`config`] -- Worker behaviour tunables ([`BehaviorConfig`])
//! - [`error`] -- Error types for task operations ([`TaskError`])
//! - [`farm`] -- Crop plots that grow and queue harvests ([`Farm`])
//! - [`recipe`] -- Recipes, input groups, and completion actions ([`Recipe`])
//! - [`task`] -- Tasks and the task registry ([`TaskRegistry`])
//! - [`worker`] -- Workers and their task stacks ([`Worker`], [`TaskStack`])
//! - [`workshop`] -- Stock-keeping production buildings ([`Workshop`])

pub mod behavior;
pub mod building;
pub mod catalog;
pub mod colony;
pub mod config;
pub mod error;
pub mod farm;
pub mod recipe;
pub mod task;
pub mod worker;
pub mod workshop;

// Re-export primary types at crate root for convenience.
pub use behavior::{StepOutcome, step_worker};
pub use building::{
    Building, BuildingBehavior, BuildingContext, CompletionContext, Crafting, Outputs,
    PriorityOrdering, TaskRequest, ToolSlot, ToolSlots,
};
pub use catalog::{BuildingSpec, BuildingTemplate, Catalog};
pub use colony::{Colony, DirtySet, InvariantViolation, ItemLocation, ResyncReport};
pub use config::{BehaviorConfig, MOVE_UNITS_PER_TICK};
pub use error::TaskError;
pub use farm::{DEFAULT_GROWTH_TICKS, Farm, FarmCropState, FarmSpec};
pub use recipe::{
    InputGroup, MEAL_RECIPE, Recipe, RecipeAction, RecipeOption, WorkSite,
};
pub use task::{Tag, Task, TaskKind, TaskRegistry};
pub use worker::{TaskStack, Worker};
pub use workshop::{Workshop, WorkshopSpec};
