//! `RefreshCycle` bookkeeping. The engine is
//! the sole writer of this table; everything else only reads it.

use crate::db::map_sqlite;
use crate::error::{StoreError, StoreResult};
use crate::Store;
use chrono::{DateTime, Utc};
use suppression_api_types::{CycleStatus, CycleTrigger, RefreshCycle};
use uuid::Uuid;

impl Store {
    /// Open a new `running` cycle. Fails with
    /// [`StoreError::CycleAlreadyRunning`] if one already exists,
    /// enforcing the "at most one running cycle" invariant
    /// at the same layer that will actually persist the row.
    pub async fn open_cycle(&self, trigger: CycleTrigger) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.db
            .perform("open_cycle", move |conn| {
                let mut existing = conn
                    .prepare("SELECT id FROM refresh_cycles WHERE status = 'running' LIMIT 1")
                    .map_err(map_sqlite)?;
                if matches!(existing.next(), Ok(sqlite::State::Row)) {
                    let running_id: String = existing.read(0).map_err(map_sqlite)?;
                    return Err(StoreError::CycleAlreadyRunning(
                        running_id.parse().unwrap_or_default(),
                    ));
                }

                let now = Utc::now().to_rfc3339();
                let trigger_str = match trigger {
                    CycleTrigger::Scheduler => "scheduler",
                    CycleTrigger::Manual => "manual",
                };
                let mut stmt = conn
                    .prepare(
                        "INSERT INTO refresh_cycles (id, status, trigger_kind, started_at) \
                         VALUES (?, 'running', ?, ?)",
                    )
                    .map_err(map_sqlite)?;
                stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.bind((2, trigger_str)).map_err(map_sqlite)?;
                stmt.bind((3, now.as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await?;
        Ok(id)
    }

    /// Returns the currently-running cycle id, if any. Backs the
    /// scheduler's exclusivity gate.
    pub async fn running_cycle(&self) -> StoreResult<Option<Uuid>> {
        self.db
            .perform("running_cycle", |conn| {
                let mut stmt = conn
                    .prepare("SELECT id FROM refresh_cycles WHERE status = 'running' LIMIT 1")
                    .map_err(map_sqlite)?;
                if matches!(stmt.next(), Ok(sqlite::State::Row)) {
                    let id: String = stmt.read(0).map_err(map_sqlite)?;
                    Ok(Some(id.parse().unwrap_or_default()))
                } else {
                    Ok(None)
                }
            })
            .await
    }

    /// The most recent `completed` cycle that was scheduler-triggered,
    /// used for the cooldown gate.
    pub async fn last_completed_scheduler_cycle(&self) -> StoreResult<Option<RefreshCycle>> {
        self.db
            .perform("last_completed_scheduler_cycle", |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT * FROM refresh_cycles \
                         WHERE status = 'completed' AND trigger_kind = 'scheduler' \
                         ORDER BY started_at DESC LIMIT 1",
                    )
                    .map_err(map_sqlite)?;
                if matches!(stmt.next(), Ok(sqlite::State::Row)) {
                    Ok(Some(read_cycle(&stmt)?))
                } else {
                    Ok(None)
                }
            })
            .await
    }

    pub async fn get_cycle(&self, id: Uuid) -> StoreResult<Option<RefreshCycle>> {
        self.db
            .perform("get_cycle", move |conn| {
                let mut stmt = conn
                    .prepare("SELECT * FROM refresh_cycles WHERE id = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                if matches!(stmt.next(), Ok(sqlite::State::Row)) {
                    Ok(Some(read_cycle(&stmt)?))
                } else {
                    Ok(None)
                }
            })
            .await
    }

    pub async fn list_cycles(
        &self,
        status: Option<CycleStatus>,
        limit: usize,
    ) -> StoreResult<Vec<RefreshCycle>> {
        self.db
            .perform("list_cycles", move |conn| {
                let mut stmt = match status {
                    Some(s) => {
                        let mut stmt = conn
                            .prepare(
                                "SELECT * FROM refresh_cycles WHERE status = ? \
                                 ORDER BY started_at DESC LIMIT ?",
                            )
                            .map_err(map_sqlite)?;
                        stmt.bind((1, status_str(s))).map_err(map_sqlite)?;
                        stmt.bind((2, limit as i64)).map_err(map_sqlite)?;
                        stmt
                    }
                    None => {
                        let mut stmt = conn
                            .prepare("SELECT * FROM refresh_cycles ORDER BY started_at DESC LIMIT ?")
                            .map_err(map_sqlite)?;
                        stmt.bind((1, limit as i64)).map_err(map_sqlite)?;
                        stmt
                    }
                };
                let mut out = Vec::new();
                while matches!(stmt.next(), Ok(sqlite::State::Row)) {
                    out.push(read_cycle(&stmt)?);
                }
                Ok(out)
            })
            .await
    }

    /// Apply one source's counters to the owning cycle.
    pub async fn record_cycle_source_result(
        &self,
        cycle_id: Uuid,
        status: &'static str,
        entries_downloaded: i64,
        entries_new: i64,
        download_ms: Option<i64>,
    ) -> StoreResult<()> {
        self.db
            .perform("record_cycle_source_result", move |conn| {
                let (completed_inc, failed_inc, skipped_inc) = match status {
                    "success" => (1, 0, 0),
                    "failed" => (0, 1, 0),
                    "skipped" => (0, 0, 1),
                    _ => (0, 0, 0),
                };
                let mut stmt = conn
                    .prepare(
                        "UPDATE refresh_cycles SET \
                         completed_sources = completed_sources + ?, \
                         failed_sources = failed_sources + ?, \
                         skipped_sources = skipped_sources + ?, \
                         entries_downloaded = entries_downloaded + ?, \
                         new_entries = new_entries + ?, \
                         avg_download_ms = CASE WHEN ? IS NULL THEN avg_download_ms ELSE \
                            (COALESCE(avg_download_ms, 0) * (completed_sources + failed_sources + skipped_sources) + ?) \
                            / (completed_sources + failed_sources + skipped_sources + 1) END \
                         WHERE id = ?",
                    )
                    .map_err(map_sqlite)?;
                stmt.bind((1, completed_inc)).map_err(map_sqlite)?;
                stmt.bind((2, failed_inc)).map_err(map_sqlite)?;
                stmt.bind((3, skipped_inc)).map_err(map_sqlite)?;
                stmt.bind((4, entries_downloaded)).map_err(map_sqlite)?;
                stmt.bind((5, entries_new)).map_err(map_sqlite)?;
                match download_ms {
                    Some(ms) => {
                        stmt.bind((6, ms)).map_err(map_sqlite)?;
                        stmt.bind((7, ms as f64)).map_err(map_sqlite)?;
                    }
                    None => {
                        stmt.bind((6, ())).map_err(map_sqlite)?;
                        stmt.bind((7, 0.0)).map_err(map_sqlite)?;
                    }
                }
                stmt.bind((8, cycle_id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }

    pub async fn set_cycle_total_sources(&self, cycle_id: Uuid, total: i64) -> StoreResult<()> {
        self.db
            .perform("set_cycle_total_sources", move |conn| {
                let mut stmt = conn
                    .prepare("UPDATE refresh_cycles SET total_sources = ? WHERE id = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, total)).map_err(map_sqlite)?;
                stmt.bind((2, cycle_id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }

    pub async fn close_cycle(&self, cycle_id: Uuid, status: CycleStatus) -> StoreResult<()> {
        self.db
            .perform("close_cycle", move |conn| {
                let now = Utc::now().to_rfc3339();
                let mut stmt = conn
                    .prepare("UPDATE refresh_cycles SET status = ?, completed_at = ? WHERE id = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, status_str(status))).map_err(map_sqlite)?;
                stmt.bind((2, now.as_str())).map_err(map_sqlite)?;
                stmt.bind((3, cycle_id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }
}

fn status_str(status: CycleStatus) -> &'static str {
    match status {
        CycleStatus::Running => "running",
        CycleStatus::Completed => "completed",
        CycleStatus::Failed => "failed",
        CycleStatus::Paused => "paused",
        CycleStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(s: &str) -> CycleStatus {
    match s {
        "completed" => CycleStatus::Completed,
        "failed" => CycleStatus::Failed,
        "paused" => CycleStatus::Paused,
        "cancelled" => CycleStatus::Cancelled,
        _ => CycleStatus::Running,
    }
}

fn read_cycle(stmt: &sqlite::Statement) -> StoreResult<RefreshCycle> {
    let id: String = stmt.read(0).map_err(map_sqlite)?;
    let status: String = stmt.read(1).map_err(map_sqlite)?;
    let trigger: String = stmt.read(2).map_err(map_sqlite)?;
    let started_at: String = stmt.read(3).map_err(map_sqlite)?;
    let completed_at: Option<String> = stmt.read(4).map_err(map_sqlite)?;
    let total_sources: i64 = stmt.read(5).map_err(map_sqlite)?;
    let completed_sources: i64 = stmt.read(6).map_err(map_sqlite)?;
    let failed_sources: i64 = stmt.read(7).map_err(map_sqlite)?;
    let skipped_sources: i64 = stmt.read(8).map_err(map_sqlite)?;
    let entries_downloaded: i64 = stmt.read(9).map_err(map_sqlite)?;
    let new_entries: i64 = stmt.read(10).map_err(map_sqlite)?;
    let avg_download_ms: Option<f64> = stmt.read(11).map_err(map_sqlite)?;

    Ok(RefreshCycle {
        id: id.parse().unwrap_or_default(),
        status: status_from_str(&status),
        trigger: if trigger == "manual" {
            CycleTrigger::Manual
        } else {
            CycleTrigger::Scheduler
        },
        started_at: started_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
        completed_at: completed_at.and_then(|s| s.parse::<DateTime<Utc>>().ok()),
        total_sources,
        completed_sources,
        failed_sources,
        skipped_sources,
        entries_downloaded,
        new_entries,
        avg_download_ms,
    })
}
