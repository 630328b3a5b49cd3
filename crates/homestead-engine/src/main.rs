//! Engine binary for the Homestead colony scheduler.
//!
//! This is the main entry point that wires together configuration, the
//! starting colony, and the tick loop. It runs until the configured tick
//! limit or Ctrl-C, whichever comes first.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `homestead-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Resume from the configured snapshot, or generate a starting colony
//! 4. Install the Ctrl-C stop handler
//! 5. Run the simulation loop
//! 6. Log the result and write the snapshot

mod error;
mod log_hooks;
mod spawner;

use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use homestead_agents::Colony;
use homestead_core::clock::TickPacer;
use homestead_core::config::{LoggingConfig, SimulationConfig};
use homestead_core::operator::StopHandle;
use homestead_core::runner;
use homestead_core::snapshot::ColonySnapshot;

use crate::error::EngineError;
use crate::log_hooks::LogHooks;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "homestead-config.yaml";

/// Ticks between `info`-level colony reports.
const REPORT_EVERY_TICKS: u64 = 200;

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = SimulationConfig::load_or_default(Path::new(CONFIG_PATH))?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        colony = config.world.name,
        seed = config.world.seed,
        width = config.world.width,
        height = config.world.height,
        tick_interval_ms = config.world.tick_interval_ms,
        workers = config.workers.count,
        "homestead-engine starting"
    );

    // 3. Build or resume the colony.
    let mut colony = load_colony(&config)?;

    // 4. Stop cleanly on Ctrl-C.
    let stop = StopHandle::new();
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current tick");
            signal_stop.request_stop();
        }
    });

    // 5. Run the simulation.
    let mut pacer = TickPacer::new(config.world.tick_interval_ms);
    let mut hooks = LogHooks::new(REPORT_EVERY_TICKS);
    let result = runner::run_simulation(
        &mut colony,
        &config.simulation,
        &mut pacer,
        &stop,
        &mut hooks,
    )
    .await
    .map_err(EngineError::from)?;

    // 6. Log results and persist.
    runner::log_simulation_end(&result);
    if let Some(path) = &config.simulation.snapshot_path {
        ColonySnapshot::capture(&colony)
            .and_then(|snapshot| snapshot.save(path))
            .map_err(EngineError::from)?;
        info!(path = %path.display(), tick = colony.tick, "Snapshot written");
    }

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "homestead-engine shutdown complete"
    );

    Ok(())
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Resume from the configured snapshot if one exists, otherwise generate
/// the starting colony.
fn load_colony(config: &SimulationConfig) -> Result<Colony, EngineError> {
    if let Some(path) = config.simulation.snapshot_path.as_deref()
        && path.exists()
    {
        let snapshot = ColonySnapshot::load(path)?;
        let (colony, report) = snapshot.restore(config.catalog(), config.workers.behavior())?;
        info!(
            path = %path.display(),
            tick = colony.tick,
            tasks_dropped = report.tasks_dropped,
            references_dropped = report.references_dropped,
            claims_cleared = report.claims_cleared,
            "Resumed from snapshot"
        );
        return Ok(colony);
    }
    spawner::build_starting_colony(config)
}
