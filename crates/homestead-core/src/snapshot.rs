//! Colony save and load.
//!
//! A [`ColonySnapshot`] is plain data: the tile map with every item on it,
//! the workers with their stacks and inventories, one [`BuildingRecord`]
//! per building, and the task records. Buildings are rebuilt from their
//! catalog template on load, and every cross-reference is re-resolved so a
//! snapshot taken mid-task (or edited by hand) loads into a consistent
//! colony.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use homestead_agents::{BehaviorConfig, Catalog, Colony, ResyncReport, Task, TaskError, Worker};
use homestead_types::{BuildingRecord, IdAllocator};
use homestead_world::TileMap;

/// Snapshot format version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur when saving or loading a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Failed to read or write the snapshot file.
    #[error("snapshot I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to encode or decode JSON.
    #[error("snapshot JSON invalid: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// A building could not be saved or rebuilt.
    #[error("snapshot building invalid: {source}")]
    Building {
        /// The underlying task error.
        #[from]
        source: TaskError,
    },

    /// The snapshot was written by an incompatible build.
    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
    },
}

/// Serializable state of a whole colony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonySnapshot {
    /// Format version.
    pub version: u32,
    /// Tick the snapshot was taken at.
    pub tick: u64,
    /// Tiles and the items on them.
    pub world: TileMap,
    /// Workers in processing order.
    pub workers: Vec<Worker>,
    /// One record per building.
    pub buildings: Vec<BuildingRecord>,
    /// Every live task.
    pub tasks: Vec<Task>,
    /// ID allocator state.
    pub ids: IdAllocator,
}

impl ColonySnapshot {
    /// Capture the current state of `colony`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Building`] if a building's state cannot be
    /// saved.
    pub fn capture(colony: &Colony) -> Result<Self, SnapshotError> {
        let buildings = colony
            .buildings
            .values()
            .map(homestead_agents::Building::save)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            tick: colony.tick,
            world: colony.world.clone(),
            workers: colony.workers.clone(),
            buildings,
            tasks: colony.tasks.iter().cloned().collect(),
            ids: colony.ids,
        })
    }

    /// Rebuild a colony from this snapshot.
    ///
    /// Returns the colony together with what had to be repaired to make
    /// its references consistent.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::UnsupportedVersion`] for a foreign format,
    /// or [`SnapshotError::Building`] if a building names a template the
    /// catalog does not have.
    pub fn restore(
        self,
        catalog: Catalog,
        config: BehaviorConfig,
    ) -> Result<(Colony, ResyncReport), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
            });
        }

        let mut colony = Colony::new(self.world, catalog, config);
        colony.tick = self.tick;
        colony.ids = self.ids;
        colony.workers = self.workers;
        for task in self.tasks {
            colony.tasks.insert(task);
        }
        for record in &self.buildings {
            let building = colony.catalog.restore(record)?;
            colony.buildings.insert(record.id, building);
        }

        let report = colony.resync_references();
        colony.mark_workers_dirty();
        info!(
            tick = colony.tick,
            workers = colony.workers.len(),
            buildings = colony.buildings.len(),
            tasks = colony.tasks.len(),
            "Colony restored"
        );
        Ok((colony, report))
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] if encoding fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] if the text is not a snapshot.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] or [`SnapshotError::Json`].
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read from a JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] or [`SnapshotError::Json`].
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}
