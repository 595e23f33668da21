//! Periodic quest top-up task.
//!
//! Runs next to request handling on a tokio interval. Each sweep executes on
//! the blocking pool so sled I/O never stalls the async workers. Ticks missed
//! under load are skipped, not replayed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::world::engine::GameEngine;
use crate::world::errors::WorldError;
use crate::world::quest::SweepSummary;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub sweeps: u64,
    pub quests_generated: u64,
    /// Failed characters plus sweeps that failed outright.
    pub failures: u64,
    pub last_run: Option<DateTime<Utc>>,
}

impl SweepStats {
    fn record(&mut self, result: &Result<SweepSummary, WorldError>) {
        self.sweeps += 1;
        self.last_run = Some(Utc::now());
        match result {
            Ok(summary) => {
                self.quests_generated += summary.generated as u64;
                self.failures += summary.failures as u64;
            }
            Err(_) => self.failures += 1,
        }
    }
}

pub struct QuestSweeper {
    engine: Arc<GameEngine>,
    period: Duration,
    stats: Arc<Mutex<SweepStats>>,
}

impl QuestSweeper {
    pub fn new(engine: Arc<GameEngine>, period: Duration) -> Self {
        Self {
            engine,
            period,
            stats: Arc::new(Mutex::new(SweepStats::default())),
        }
    }

    /// Sweeper using the engine's configured interval.
    pub fn from_rules(engine: Arc<GameEngine>) -> Self {
        let period = engine.rules().quest_sweep_interval();
        Self::new(engine, period)
    }

    /// Shared view of the counters, readable while the task runs.
    pub fn stats_handle(&self) -> Arc<Mutex<SweepStats>> {
        self.stats.clone()
    }

    pub fn stats(&self) -> SweepStats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    /// Run a single sweep on the blocking pool and record it.
    pub async fn run_once(&self) -> Result<SweepSummary, WorldError> {
        let engine = self.engine.clone();
        let result = tokio::task::spawn_blocking(move || engine.sweep_quests())
            .await
            .map_err(|e| WorldError::Internal(format!("quest sweep task failed: {}", e)))
            .and_then(|inner| inner);

        if let Ok(mut stats) = self.stats.lock() {
            stats.record(&result);
        }
        match &result {
            Ok(summary) if summary.generated > 0 || summary.failures > 0 => info!(
                "Quest sweep: {} characters, {} quests generated, {} failures",
                summary.characters, summary.generated, summary.failures
            ),
            Ok(summary) => debug!("Quest sweep: {} characters already at floor", summary.characters),
            Err(e) => warn!("Quest sweep failed: {}", e),
        }
        result
    }

    /// Sweep every period until `shutdown` flips to true or its sender drops.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Quest sweeper started (every {:?})", self.period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Errors are logged and counted by run_once.
                    let _ = self.run_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Quest sweeper stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::rules::WorldRules;
    use crate::world::seed::starter_templates;
    use tempfile::TempDir;

    fn engine() -> (Arc<GameEngine>, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let engine = GameEngine::open(dir.path(), WorldRules::default()).expect("engine");
        engine.seed_catalog(&starter_templates()).unwrap();
        (Arc::new(engine), dir)
    }

    #[tokio::test]
    async fn single_sweep_restores_the_floor() {
        let (engine, _dir) = engine();
        let character = engine.create_character("ash", "Ash").unwrap();
        let mut quests = engine.store().list_active_quests(character.id).unwrap();
        for quest in quests.iter_mut() {
            quest.mark_complete();
        }
        engine.store().put_quests(&quests).unwrap();

        let sweeper = QuestSweeper::new(engine.clone(), Duration::from_secs(60));
        let summary = sweeper.run_once().await.unwrap();
        assert_eq!(summary.characters, 1);
        assert_eq!(summary.generated, 3);

        let stats = sweeper.stats();
        assert_eq!(stats.sweeps, 1);
        assert_eq!(stats.quests_generated, 3);
        assert!(stats.last_run.is_some());
    }

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let (engine, _dir) = engine();
        engine.create_character("ash", "Ash").unwrap();
        let sweeper = QuestSweeper::new(engine, Duration::from_millis(20));
        let stats = sweeper.stats_handle();
        let (tx, rx) = watch::channel(false);
        let handle = sweeper.spawn(rx);

        tokio::time::sleep(Duration::from_millis(80)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper exits")
            .expect("task joins");

        let stats = stats.lock().unwrap().clone();
        assert!(stats.sweeps >= 1);
        assert_eq!(stats.failures, 0);
    }
}
