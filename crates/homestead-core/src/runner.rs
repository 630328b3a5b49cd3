//! Simulation loop runner with operator controls.
//!
//! This module provides [`run_simulation`], the top-level async function
//! that drives the tick loop with support for:
//!
//! - **Bounded simulation**: stop after `max_ticks`
//! - **Operator stop**: clean stop between ticks via a [`StopHandle`]
//! - **Drift-compensated pacing**: sleeps are planned by a [`TickPacer`]
//! - **Render hooks**: workers and tiles are reported only when they changed
//!
//! The runner wraps the single-tick [`run_tick`] function and adds the
//! control plane around it.
//!
//! [`run_tick`]: crate::tick::run_tick

use tokio::time::Instant;
use tracing::{debug, info, warn};

use homestead_agents::{Colony, DirtySet};

use crate::clock::TickPacer;
use crate::config::SimulationBoundsConfig;
use crate::operator::{SimulationEndReason, StopHandle};
use crate::tick::{self, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
}

/// Rendering boundary.
///
/// After a tick that moved workers or changed tiles, the runner calls the
/// matching method. Ticks that changed nothing call neither.
pub trait RenderHooks: Send {
    /// Worker positions or inventories changed.
    fn workers_changed(&mut self, colony: &Colony);

    /// Tile contents or building task lists changed.
    fn tiles_changed(&mut self, colony: &Colony, dirty: &DirtySet);

    /// Called after every tick, changed or not.
    fn on_tick(&mut self, _summary: &TickSummary) {}
}

/// Render hooks that ignore everything.
pub struct NoOpHooks;

impl RenderHooks for NoOpHooks {
    fn workers_changed(&mut self, _colony: &Colony) {}

    fn tiles_changed(&mut self, _colony: &Colony, _dirty: &DirtySet) {}
}

/// Run the simulation loop until a termination condition is met.
///
/// # Arguments
///
/// * `colony` - The colony to advance
/// * `bounds` - Tick limit for this run (`0` = unlimited)
/// * `pacer` - Wall-clock pacing between ticks
/// * `stop` - Checked before each tick
/// * `hooks` - Rendering callbacks
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick execution fails unrecoverably.
pub async fn run_simulation(
    colony: &mut Colony,
    bounds: &SimulationBoundsConfig,
    pacer: &mut TickPacer,
    stop: &StopHandle,
    hooks: &mut dyn RenderHooks,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        start_tick = colony.tick,
        max_ticks = bounds.max_ticks,
        tick_interval = ?pacer.interval(),
        workers = colony.workers.len(),
        buildings = colony.buildings.len(),
        "Simulation starting"
    );

    loop {
        // --- Check stop request (before tick) ---
        if stop.is_stop_requested() {
            info!(tick = colony.tick, "Stop requested");
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::StopRequested,
                final_summary: last_summary,
                total_ticks,
            });
        }

        // --- Execute tick ---
        let started = Instant::now();
        let summary = tick::run_tick(colony)?;
        total_ticks = total_ticks.saturating_add(1);

        // --- Notify renderer ---
        if summary.dirty.workers {
            hooks.workers_changed(colony);
        }
        if !summary.dirty.tiles.is_empty() || !summary.dirty.buildings.is_empty() {
            hooks.tiles_changed(colony, &summary.dirty);
        }
        hooks.on_tick(&summary);

        // --- Check tick limit (after tick) ---
        if bounds.max_ticks > 0 && total_ticks >= bounds.max_ticks {
            info!(
                tick = summary.tick,
                max_ticks = bounds.max_ticks,
                "Tick limit reached"
            );
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::MaxTicksReached,
                final_summary: Some(summary),
                total_ticks,
            });
        }

        // --- Sleep out the rest of the interval ---
        let work = started.elapsed();
        let planned = pacer.plan_next(work);
        if planned.is_zero() {
            if work > pacer.interval() && !pacer.interval().is_zero() {
                debug!(
                    tick = summary.tick,
                    work = ?work,
                    "Tick overran its interval"
                );
            }
            tokio::task::yield_now().await;
        } else {
            let sleep_start = Instant::now();
            tokio::time::sleep(planned).await;
            pacer.record_sleep(planned, sleep_start.elapsed());
        }

        last_summary = Some(summary);
    }
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            live_tasks = summary.live_tasks,
            idle = summary.outcomes.idle,
            violations = summary.violations,
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homestead_agents::{BehaviorConfig, Catalog};
    use homestead_types::{Coord, Terrain};
    use homestead_world::TileMap;

    use super::*;

    fn make_colony() -> Colony {
        let world = TileMap::filled(10, 4, Terrain::Grass);
        let mut colony = Colony::new(world, Catalog::standard(), BehaviorConfig::default());
        colony.add_building("Flint Knapper", Coord::new(6, 0)).unwrap();
        colony.add_worker("Ada", Coord::new(0, 0));
        colony
    }

    fn bounds(max_ticks: u64) -> SimulationBoundsConfig {
        SimulationBoundsConfig {
            max_ticks,
            snapshot_path: None,
        }
    }

    /// Counts hook calls and stops the run after a given tick.
    #[derive(Default)]
    struct CountingHooks {
        workers: u32,
        tiles: u32,
        ticks: u32,
        stop_after: Option<(u64, StopHandle)>,
    }

    impl RenderHooks for CountingHooks {
        fn workers_changed(&mut self, _colony: &Colony) {
            self.workers = self.workers.saturating_add(1);
        }

        fn tiles_changed(&mut self, _colony: &Colony, dirty: &DirtySet) {
            assert!(!dirty.tiles.is_empty() || !dirty.buildings.is_empty());
            self.tiles = self.tiles.saturating_add(1);
        }

        fn on_tick(&mut self, summary: &TickSummary) {
            self.ticks = self.ticks.saturating_add(1);
            let due = self.stop_after.as_ref().filter(|(tick, _)| summary.tick >= *tick);
            if let Some((_, handle)) = due {
                handle.request_stop();
            }
        }
    }

    #[tokio::test]
    async fn bounded_by_max_ticks() {
        let mut colony = make_colony();
        let mut pacer = TickPacer::new(0);
        let stop = StopHandle::new();

        let result = run_simulation(&mut colony, &bounds(5), &mut pacer, &stop, &mut NoOpHooks)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert_eq!(colony.tick, 5);
        assert_eq!(result.final_summary.unwrap().tick, 5);
    }

    #[tokio::test]
    async fn operator_stop_before_first_tick() {
        let mut colony = make_colony();
        let mut pacer = TickPacer::new(0);
        let stop = StopHandle::new();
        stop.request_stop();

        let result = run_simulation(&mut colony, &bounds(0), &mut pacer, &stop, &mut NoOpHooks)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::StopRequested);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
        assert_eq!(colony.tick, 0);
    }

    #[tokio::test]
    async fn stop_lands_between_ticks() {
        let mut colony = make_colony();
        let mut pacer = TickPacer::new(0);
        let stop = StopHandle::new();
        let mut hooks = CountingHooks {
            stop_after: Some((3, stop.clone())),
            ..CountingHooks::default()
        };

        let result = run_simulation(&mut colony, &bounds(0), &mut pacer, &stop, &mut hooks)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::StopRequested);
        assert_eq!(result.total_ticks, 3);
        assert_eq!(hooks.ticks, 3);
        assert_eq!(result.final_summary.unwrap().tick, 3);
    }

    #[tokio::test]
    async fn hooks_fire_when_workers_move() {
        let mut colony = make_colony();
        let mut pacer = TickPacer::new(0);
        let stop = StopHandle::new();
        let mut hooks = CountingHooks::default();

        run_simulation(&mut colony, &bounds(12), &mut pacer, &stop, &mut hooks)
            .await
            .unwrap();

        assert!(hooks.workers > 0);
        assert!(hooks.tiles > 0);
        assert_eq!(hooks.ticks, 12);
    }

    #[tokio::test]
    async fn paced_run_sleeps_between_ticks() {
        let mut colony = make_colony();
        let mut pacer = TickPacer::new(5);
        let stop = StopHandle::new();
        let started = Instant::now();

        run_simulation(&mut colony, &bounds(4), &mut pacer, &stop, &mut NoOpHooks)
            .await
            .unwrap();

        // Three sleeps separate four ticks.
        assert!(started.elapsed() >= std::time::Duration::from_millis(10));
    }
}
