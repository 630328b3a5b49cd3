//! Clock, configuration, tick cycle, and run loop for the Homestead colony
//! scheduler.
//!
//! This crate owns the tick: each one advances the clock, steps every
//! worker in order, runs building update hooks, and spoils expired food.
//! The runner repeats ticks at a fixed wall-clock interval until a bound or
//! a stop request ends the run.
//!
//! # Modules
//!
//! - [`clock`] -- Tick counter arithmetic and drift-compensating pacing.
//! - [`config`] -- Configuration loading from `homestead-config.yaml` into
//!   strongly-typed structs.
//! - [`operator`] -- Stop handle and end reasons.
//! - [`runner`] -- The async tick loop and render hooks.
//! - [`snapshot`] -- JSON save and load of a whole colony.
//! - [`tick`] -- A single tick and its summary.

pub mod clock;
pub mod config;
pub mod operator;
pub mod runner;
pub mod snapshot;
pub mod tick;

pub use clock::{ClockError, TickPacer};
pub use config::{ConfigError, SimulationConfig};
pub use operator::{SimulationEndReason, StopHandle};
pub use runner::{NoOpHooks, RenderHooks, RunnerError, SimulationResult, run_simulation};
pub use snapshot::{ColonySnapshot, SnapshotError};
pub use tick::{TickError, TickSummary, run_tick};
