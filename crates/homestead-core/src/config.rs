//! Configuration loading and typed config structures for the Homestead
//! scheduler.
//!
//! The canonical configuration lives in `homestead-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Every field has a default, so a partial file (or no file at all) still
//! yields a runnable configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use homestead_agents::{BehaviorConfig, BuildingTemplate, Catalog};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an unusable colony.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `homestead-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Map and timing settings.
    #[serde(default)]
    pub world: WorldConfig,

    /// Worker population and behaviour tunables.
    #[serde(default)]
    pub workers: WorkersConfig,

    /// Simulation boundary parameters.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Building templates replacing the standard catalog, if given.
    #[serde(default)]
    pub catalog: Option<Vec<BuildingTemplate>>,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the values are unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::from_file`] other than a missing file.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::from_file(path) {
            Err(ConfigError::Io { source }) if source.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if the values are unusable.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.width <= 0 || self.world.height <= 0 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "world must be at least 1x1, got {}x{}",
                    self.world.width, self.world.height
                ),
            });
        }
        if self.workers.search_limit == 0 {
            return Err(ConfigError::Invalid {
                reason: "workers.search_limit must be at least 1".to_owned(),
            });
        }
        if self.catalog.as_ref().is_some_and(Vec::is_empty) {
            return Err(ConfigError::Invalid {
                reason: "catalog, when given, must list at least one template".to_owned(),
            });
        }
        Ok(())
    }

    /// The building catalog: the configured templates, or the standard
    /// content when none are given.
    pub fn catalog(&self) -> Catalog {
        self.catalog
            .as_ref()
            .map_or_else(Catalog::standard, |templates| {
                Catalog::from_templates(templates.iter().cloned())
            })
    }
}

/// Map and timing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable colony name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for the starting map.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Map width in tiles.
    #[serde(default = "default_width")]
    pub width: i32,

    /// Map height in tiles.
    #[serde(default = "default_height")]
    pub height: i32,

    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            width: default_width(),
            height: default_height(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Worker population and decision-procedure tunables.
///
/// Everything except `count` is handed to the agents crate as a
/// [`BehaviorConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkersConfig {
    /// Workers placed in the starting colony.
    #[serde(default = "default_worker_count")]
    pub count: u32,

    /// Ticks between meals.
    #[serde(default = "default_hunger_interval_ticks")]
    pub hunger_interval_ticks: u64,

    /// Delay before retrying a meal that could not be found.
    #[serde(default = "default_eat_retry_ticks")]
    pub eat_retry_ticks: u64,

    /// Delay before a building re-requests a recipe that could not be
    /// resolved.
    #[serde(default = "default_request_retry_ticks")]
    pub request_retry_ticks: u64,

    /// Work ticks to eat one meal.
    #[serde(default = "default_meal_ticks")]
    pub meal_ticks: u32,

    /// Item names workers will eat, in preference order.
    #[serde(default = "default_edible_items")]
    pub edible_items: Vec<String>,

    /// Ticks to cross a lag-1 tile.
    #[serde(default = "default_base_step_ticks")]
    pub base_step_ticks: u32,

    /// Diagonal step cost in percent of a straight step.
    #[serde(default = "default_diagonal_pct")]
    pub diagonal_pct: u32,

    /// Maximum tiles one search may examine.
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,

    /// Maximum nesting of producer sub-tasks.
    #[serde(default = "default_max_subtask_depth")]
    pub max_subtask_depth: usize,
}

impl WorkersConfig {
    /// The behaviour tunables in the form the agents crate takes.
    pub fn behavior(&self) -> BehaviorConfig {
        BehaviorConfig {
            hunger_interval_ticks: self.hunger_interval_ticks,
            eat_retry_ticks: self.eat_retry_ticks,
            request_retry_ticks: self.request_retry_ticks,
            meal_ticks: self.meal_ticks,
            edible_items: self.edible_items.clone(),
            base_step_ticks: self.base_step_ticks,
            diagonal_pct: self.diagonal_pct,
            search_limit: self.search_limit,
            max_subtask_depth: self.max_subtask_depth,
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            hunger_interval_ticks: default_hunger_interval_ticks(),
            eat_retry_ticks: default_eat_retry_ticks(),
            request_retry_ticks: default_request_retry_ticks(),
            meal_ticks: default_meal_ticks(),
            edible_items: default_edible_items(),
            base_step_ticks: default_base_step_ticks(),
            diagonal_pct: default_diagonal_pct(),
            search_limit: default_search_limit(),
            max_subtask_depth: default_max_subtask_depth(),
        }
    }
}

/// Simulation boundary configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Stop after this many ticks (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,

    /// Snapshot file to resume from when present and to write on shutdown.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    String::from("Homestead")
}

const fn default_seed() -> u64 {
    42
}

const fn default_width() -> i32 {
    48
}

const fn default_height() -> i32 {
    32
}

const fn default_tick_interval_ms() -> u64 {
    50
}

const fn default_worker_count() -> u32 {
    4
}

fn default_hunger_interval_ticks() -> u64 {
    BehaviorConfig::default().hunger_interval_ticks
}

fn default_eat_retry_ticks() -> u64 {
    BehaviorConfig::default().eat_retry_ticks
}

fn default_request_retry_ticks() -> u64 {
    BehaviorConfig::default().request_retry_ticks
}

fn default_meal_ticks() -> u32 {
    BehaviorConfig::default().meal_ticks
}

fn default_edible_items() -> Vec<String> {
    BehaviorConfig::default().edible_items
}

fn default_base_step_ticks() -> u32 {
    BehaviorConfig::default().base_step_ticks
}

fn default_diagonal_pct() -> u32 {
    BehaviorConfig::default().diagonal_pct
}

fn default_search_limit() -> u32 {
    BehaviorConfig::default().search_limit
}

fn default_max_subtask_depth() -> usize {
    BehaviorConfig::default().max_subtask_depth
}

fn default_log_level() -> String {
    String::from("info")
}
