//! The `Engine`: owns the 60 s wakeup loop and exposes manual
//! start/stop control.

use crate::config::EngineConfig;
use crate::cycle::run_cycle;
use crate::error::{EngineError, EngineResult};
use crate::gates::{cooldown_has_elapsed, next_window_open_after, window_is_open};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use suppression_api_types::{CycleTrigger, RefreshCycle, RefreshStatusResponse};
use suppression_store::Store;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How often the scheduler loop wakes up to re-check its gates.
const WAKEUP_INTERVAL: Duration = Duration::from_secs(60);

/// Owns the background scheduler task. Cloning an `Engine` shares the
/// same task and cancellation token; the struct itself is just a
/// handle, following the `Store` handle-clone pattern it sits on top of.
pub struct Engine {
    store: Store,
    config: EngineConfig,
    running: Arc<AtomicBool>,
    cancellation: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(store: Store, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            config,
            running: Arc::new(AtomicBool::new(false)),
            cancellation: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    /// Start the background loop. Idempotent: calling this on an
    /// already-started engine is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        let engine = Arc::clone(self);
        *task = Some(tokio::spawn(async move { engine.run_loop().await }));
        tracing::info!("refresh engine started");
    }

    /// Stop the background loop. Does not cancel a cycle already in
    /// progress; that cycle runs to completion.
    pub async fn stop(&self) -> EngineResult<()> {
        let mut task = self.task.lock().await;
        let Some(handle) = task.take() else {
            return Err(EngineError::NotRunning);
        };
        self.running.store(false, Ordering::SeqCst);
        self.cancellation.cancel();
        let _ = handle.await;
        tracing::info!("refresh engine stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn run_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(WAKEUP_INTERVAL);
        loop {
            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => return,
                _ = interval.tick() => {}
            }

            if !self.running.load(Ordering::SeqCst) {
                return;
            }

            if let Err(err) = self.maybe_run_scheduled_cycle().await {
                tracing::error!(%err, "scheduled cycle attempt failed");
            }
        }
    }

    /// Re-check every scheduler gate and, if all are open, run one
    /// cycle.
    async fn maybe_run_scheduled_cycle(&self) -> EngineResult<()> {
        let now = Utc::now();
        if !window_is_open(self.config.scheduler_zone, now) {
            return Ok(());
        }
        if self.store.running_cycle().await?.is_some() {
            return Ok(());
        }
        let last = self.store.last_completed_scheduler_cycle().await?;
        if !cooldown_has_elapsed(last.map(|c| c.started_at), now) {
            return Ok(());
        }

        run_cycle(&self.store, &self.config, CycleTrigger::Scheduler, &self.cancellation).await?;
        Ok(())
    }

    /// `POST /refresh/trigger`: bypasses the window and
    /// cooldown gates but not exclusivity — a manual trigger while a
    /// cycle is already running is refused, not queued.
    pub async fn trigger_manual(&self) -> EngineResult<RefreshCycle> {
        if let Some(running_id) = self.store.running_cycle().await? {
            return Err(EngineError::Store(suppression_store::StoreError::CycleAlreadyRunning(running_id)));
        }
        let cycle_id = run_cycle(&self.store, &self.config, CycleTrigger::Manual, &self.cancellation).await?;
        self.store
            .get_cycle(cycle_id)
            .await?
            .ok_or(EngineError::NotRunning)
    }

    /// `GET /refresh/status`.
    pub async fn status(&self) -> EngineResult<RefreshStatusResponse> {
        let running_id = self.store.running_cycle().await?;
        let current_cycle = match running_id {
            Some(id) => self.store.get_cycle(id).await?,
            None => None,
        };
        let last_completed_cycle = self.store.last_completed_scheduler_cycle().await?;
        let now = Utc::now();
        let next_window_opens_at = Some(next_window_open_after(self.config.scheduler_zone, now));

        Ok(RefreshStatusResponse {
            running: current_cycle.is_some(),
            current_cycle,
            last_completed_cycle,
            next_window_opens_at,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suppression.db");
        (dir, Store::open(path.to_str().unwrap()).unwrap())
    }

    #[tokio::test]
    async fn manual_trigger_runs_a_cycle_with_no_sources() {
        let (_dir, store) = temp_store();
        let config = EngineConfig::new("UTC", "test-token", uuid::Uuid::nil());
        let engine = Engine::new(store, config);
        let cycle = engine.trigger_manual().await.unwrap();
        assert_eq!(cycle.trigger, CycleTrigger::Manual);
        assert_eq!(cycle.status, suppression_api_types::CycleStatus::Completed);
    }

    #[tokio::test]
    async fn second_manual_trigger_while_running_is_refused() {
        let (_dir, store) = temp_store();
        store.open_cycle(CycleTrigger::Manual).await.unwrap();
        let config = EngineConfig::new("UTC", "test-token", uuid::Uuid::nil());
        let engine = Engine::new(store, config);
        let result = engine.trigger_manual().await;
        assert!(matches!(
            result,
            Err(EngineError::Store(suppression_store::StoreError::CycleAlreadyRunning(_)))
        ));
    }

    #[tokio::test]
    async fn stop_without_start_reports_not_running() {
        let (_dir, store) = temp_store();
        let config = EngineConfig::new("UTC", "test-token", uuid::Uuid::nil());
        let engine = Engine::new(store, config);
        assert!(matches!(engine.stop().await, Err(EngineError::NotRunning)));
    }

    #[tokio::test]
    async fn start_and_stop_round_trip() {
        let (_dir, store) = temp_store();
        let config = EngineConfig::new("UTC", "test-token", uuid::Uuid::nil());
        let engine = Engine::new(store, config);
        engine.start().await;
        assert!(engine.is_running());
        engine.stop().await.unwrap();
        assert!(!engine.is_running());
    }
}
