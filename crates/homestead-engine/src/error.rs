//! Error types for the Homestead engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and simulation execution.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: homestead_core::config::ConfigError,
    },

    /// Map construction failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: homestead_world::WorldError,
    },

    /// Placing a building or item failed.
    #[error("colony error: {source}")]
    Colony {
        /// The underlying task error.
        #[from]
        source: homestead_agents::TaskError,
    },

    /// Saving or loading a snapshot failed.
    #[error("snapshot error: {source}")]
    Snapshot {
        /// The underlying snapshot error.
        #[from]
        source: homestead_core::snapshot::SnapshotError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: homestead_core::runner::RunnerError,
    },

    /// Starting colony generation failed.
    #[error("spawner error: {message}")]
    Spawner {
        /// Description of the spawner failure.
        message: String,
    },
}
