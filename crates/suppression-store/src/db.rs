use crate::error::{StoreError, StoreResult};
use sqlite::{Connection, ConnectionThreadSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::spawn_blocking;

const BUSY_TIMEOUT: Duration = Duration::from_secs(60);

/// Thin async wrapper over a shared `sqlite` connection.
///
/// Every sqlite call in this crate is synchronous and potentially
/// blocking (disk I/O), so it is pushed to `spawn_blocking` rather than
/// run inline on the async executor, following
/// `tsa-daemon::database::Database`.
#[derive(Clone)]
pub struct Database {
    conn: Arc<ConnectionThreadSafe>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS suppression_lists (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    source_tag TEXT NOT NULL,
    entry_count INTEGER NOT NULL DEFAULT 0,
    scope TEXT NOT NULL,
    organization_id TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS suppression_entries (
    list_id TEXT NOT NULL,
    email TEXT,
    fingerprint TEXT NOT NULL,
    reason TEXT NOT NULL,
    source TEXT NOT NULL,
    category TEXT NOT NULL,
    is_global INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS refresh_groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS refresh_sources (
    id TEXT PRIMARY KEY,
    offer_id TEXT,
    campaign_name TEXT NOT NULL,
    url TEXT NOT NULL,
    provider_tag TEXT NOT NULL,
    ga_id TEXT,
    internal_list_id TEXT,
    refresh_group TEXT,
    priority INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_run_at TEXT,
    last_status TEXT,
    last_error TEXT,
    last_entries_downloaded INTEGER
);

CREATE TABLE IF NOT EXISTS refresh_cycles (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    trigger_kind TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    total_sources INTEGER NOT NULL DEFAULT 0,
    completed_sources INTEGER NOT NULL DEFAULT 0,
    failed_sources INTEGER NOT NULL DEFAULT 0,
    skipped_sources INTEGER NOT NULL DEFAULT 0,
    entries_downloaded INTEGER NOT NULL DEFAULT 0,
    new_entries INTEGER NOT NULL DEFAULT 0,
    avg_download_ms REAL
);

CREATE TABLE IF NOT EXISTS refresh_logs (
    id TEXT PRIMARY KEY,
    cycle_id TEXT NOT NULL,
    source_id TEXT NOT NULL,
    status TEXT NOT NULL,
    entries_downloaded INTEGER NOT NULL DEFAULT 0,
    entries_new INTEGER NOT NULL DEFAULT 0,
    download_ms INTEGER,
    processing_ms INTEGER,
    http_status INTEGER,
    content_type TEXT,
    error TEXT,
    created_at TEXT NOT NULL
);
"#;

/// Name/definition pairs for every secondary index and the unique
/// constraint that `replace_list` may drop for large loads. Recreating all of these is also how the store
/// self-heals after a crash between drop and rebuild.
pub(crate) const SECONDARY_INDEXES: &[(&str, &str)] = &[
    (
        "idx_entries_list_id",
        "CREATE INDEX IF NOT EXISTS idx_entries_list_id ON suppression_entries(list_id)",
    ),
    (
        "idx_entries_email",
        "CREATE INDEX IF NOT EXISTS idx_entries_email ON suppression_entries(email)",
    ),
    (
        "idx_entries_fingerprint",
        "CREATE INDEX IF NOT EXISTS idx_entries_fingerprint ON suppression_entries(fingerprint)",
    ),
    (
        "idx_entries_category",
        "CREATE INDEX IF NOT EXISTS idx_entries_category ON suppression_entries(category)",
    ),
    (
        "idx_entries_is_global",
        "CREATE INDEX IF NOT EXISTS idx_entries_is_global ON suppression_entries(is_global)",
    ),
];

pub(crate) const UNIQUE_INDEX_NAME: &str = "uq_entries_list_fingerprint";
pub(crate) const UNIQUE_INDEX_SQL: &str = "CREATE UNIQUE INDEX IF NOT EXISTS uq_entries_list_fingerprint ON suppression_entries(list_id, fingerprint)";

impl Database {
    pub fn open(path: &str) -> StoreResult<Self> {
        let mut conn = Connection::open_thread_safe(path)?;
        conn.set_busy_timeout(
            BUSY_TIMEOUT
                .as_millis()
                .try_into()
                .expect("busy timeout fits in sqlite's int range"),
        )?;
        conn.execute(SCHEMA)?;
        conn.execute("PRAGMA foreign_keys = OFF")?;
        conn.execute("PRAGMA journal_mode = WAL")?;

        let db = Self {
            conn: Arc::new(conn),
        };
        db.verify_indexes_sync()?;
        Ok(db)
    }

    /// Re-create any secondary index or the unique constraint that is
    /// missing. Called at startup to recover from a crash that landed
    /// between a bulk load's index drop and its rebuild.
    fn verify_indexes_sync(&self) -> StoreResult<()> {
        for (_name, sql) in SECONDARY_INDEXES {
            self.conn.execute(sql)?;
        }
        self.conn.execute(UNIQUE_INDEX_SQL)?;
        Ok(())
    }

    /// Run a blocking sqlite operation on the blocking thread pool.
    pub async fn perform<T, F>(&self, reason: &'static str, func: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ConnectionThreadSafe) -> StoreResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        let start = Instant::now();
        let result = spawn_blocking(move || func(&conn)).await?;
        let took = start.elapsed();
        if took > Duration::from_secs(1) {
            tracing::warn!(reason, ?took, is_ok = result.is_ok(), "slow store operation");
        }
        result
    }
}

pub(crate) fn map_sqlite(err: sqlite::Error) -> StoreError {
    StoreError::Sqlite(err)
}
