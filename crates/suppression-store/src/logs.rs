//! `RefreshLog` bookkeeping: one row per source attempted within a
//! cycle.

use crate::db::map_sqlite;
use crate::error::StoreResult;
use crate::Store;
use chrono::{DateTime, Utc};
use suppression_api_types::{LogStatus, RefreshLog};
use uuid::Uuid;

impl Store {
    pub async fn open_log(&self, cycle_id: Uuid, source_id: Uuid) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.db
            .perform("open_log", move |conn| {
                let now = Utc::now().to_rfc3339();
                let mut stmt = conn
                    .prepare(
                        "INSERT INTO refresh_logs (id, cycle_id, source_id, status, created_at) \
                         VALUES (?, ?, ?, 'downloading', ?)",
                    )
                    .map_err(map_sqlite)?;
                stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.bind((2, cycle_id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.bind((3, source_id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.bind((4, now.as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await?;
        Ok(id)
    }

    /// Close a log with its final status and measurements.
    #[allow(clippy::too_many_arguments)]
    pub async fn close_log(
        &self,
        id: Uuid,
        status: LogStatus,
        entries_downloaded: i64,
        entries_new: i64,
        download_ms: Option<i64>,
        processing_ms: Option<i64>,
        http_status: Option<i32>,
        content_type: Option<String>,
        error: Option<String>,
    ) -> StoreResult<()> {
        self.db
            .perform("close_log", move |conn| {
                let mut stmt = conn
                    .prepare(
                        "UPDATE refresh_logs SET status = ?, entries_downloaded = ?, \
                         entries_new = ?, download_ms = ?, processing_ms = ?, http_status = ?, \
                         content_type = ?, error = ? WHERE id = ?",
                    )
                    .map_err(map_sqlite)?;
                stmt.bind((1, log_status_str(status))).map_err(map_sqlite)?;
                stmt.bind((2, entries_downloaded)).map_err(map_sqlite)?;
                stmt.bind((3, entries_new)).map_err(map_sqlite)?;
                bind_opt_i64(&mut stmt, 4, download_ms)?;
                bind_opt_i64(&mut stmt, 5, processing_ms)?;
                bind_opt_i64(&mut stmt, 6, http_status.map(|v| v as i64))?;
                match &content_type {
                    Some(ct) => stmt.bind((7, ct.as_str())).map_err(map_sqlite)?,
                    None => stmt.bind((7, ())).map_err(map_sqlite)?,
                }
                match &error {
                    Some(e) => stmt.bind((8, e.as_str())).map_err(map_sqlite)?,
                    None => stmt.bind((8, ())).map_err(map_sqlite)?,
                }
                stmt.bind((9, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }

    pub async fn list_logs(
        &self,
        cycle_id: Uuid,
        status: Option<LogStatus>,
        source_id: Option<Uuid>,
    ) -> StoreResult<Vec<RefreshLog>> {
        self.db
            .perform("list_logs", move |conn| {
                let mut sql = "SELECT * FROM refresh_logs WHERE cycle_id = ?".to_string();
                if status.is_some() {
                    sql.push_str(" AND status = ?");
                }
                if source_id.is_some() {
                    sql.push_str(" AND source_id = ?");
                }
                sql.push_str(" ORDER BY created_at ASC");

                let mut stmt = conn.prepare(sql).map_err(map_sqlite)?;
                let mut idx = 1;
                stmt.bind((idx, cycle_id.to_string().as_str())).map_err(map_sqlite)?;
                idx += 1;
                if let Some(s) = status {
                    stmt.bind((idx, log_status_str(s))).map_err(map_sqlite)?;
                    idx += 1;
                }
                if let Some(id) = source_id {
                    stmt.bind((idx, id.to_string().as_str())).map_err(map_sqlite)?;
                }

                let mut out = Vec::new();
                while matches!(stmt.next(), Ok(sqlite::State::Row)) {
                    out.push(read_log(&stmt)?);
                }
                Ok(out)
            })
            .await
    }
}

fn bind_opt_i64(stmt: &mut sqlite::Statement, index: usize, value: Option<i64>) -> StoreResult<()> {
    match value {
        Some(v) => stmt.bind((index, v)).map_err(map_sqlite)?,
        None => stmt.bind((index, ())).map_err(map_sqlite)?,
    }
    Ok(())
}

fn log_status_str(status: LogStatus) -> &'static str {
    match status {
        LogStatus::Downloading => "downloading",
        LogStatus::Success => "success",
        LogStatus::Failed => "failed",
        LogStatus::Skipped => "skipped",
    }
}

fn log_status_from_str(s: &str) -> LogStatus {
    match s {
        "success" => LogStatus::Success,
        "failed" => LogStatus::Failed,
        "skipped" => LogStatus::Skipped,
        _ => LogStatus::Downloading,
    }
}

fn read_log(stmt: &sqlite::Statement) -> StoreResult<RefreshLog> {
    let id: String = stmt.read(0).map_err(map_sqlite)?;
    let cycle_id: String = stmt.read(1).map_err(map_sqlite)?;
    let source_id: String = stmt.read(2).map_err(map_sqlite)?;
    let status: String = stmt.read(3).map_err(map_sqlite)?;
    let entries_downloaded: i64 = stmt.read(4).map_err(map_sqlite)?;
    let entries_new: i64 = stmt.read(5).map_err(map_sqlite)?;
    let download_ms: Option<i64> = stmt.read(6).map_err(map_sqlite)?;
    let processing_ms: Option<i64> = stmt.read(7).map_err(map_sqlite)?;
    let http_status: Option<i64> = stmt.read(8).map_err(map_sqlite)?;
    let content_type: Option<String> = stmt.read(9).map_err(map_sqlite)?;
    let error: Option<String> = stmt.read(10).map_err(map_sqlite)?;
    let created_at: String = stmt.read(11).map_err(map_sqlite)?;

    Ok(RefreshLog {
        id: id.parse().unwrap_or_default(),
        cycle_id: cycle_id.parse().unwrap_or_default(),
        source_id: source_id.parse().unwrap_or_default(),
        status: log_status_from_str(&status),
        entries_downloaded,
        entries_new,
        download_ms,
        processing_ms,
        http_status: http_status.map(|v| v as i32),
        content_type,
        error,
        created_at: created_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}
