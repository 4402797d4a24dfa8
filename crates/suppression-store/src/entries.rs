//! `SuppressionEntry` CRUD, including the transactional bulk loader.

use crate::db::{map_sqlite, SECONDARY_INDEXES, UNIQUE_INDEX_SQL};
use crate::error::{StoreError, StoreResult};
use crate::Store;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use suppression_api_types::HubStatsResponse;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// Above this input size, `replace_list` drops the secondary indexes
/// and the unique constraint before bulk-appending.
pub const BULK_INDEX_DROP_THRESHOLD: usize = 1_000_000;

/// A single row to be written by `add` or `replace_list`. Does not
/// carry `list_id`; the caller supplies that separately so a batch can
/// be reused across the dedup step without cloning it into every row.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub email: Option<String>,
    pub fingerprint: String,
    pub reason: String,
    pub source: String,
    pub category: String,
}

/// Outcome of a `replace_list` call.
#[derive(Debug, Clone, Default)]
pub struct ReplaceOutcome {
    pub entries_written: usize,
    pub entries_new: usize,
    pub rows_errored: usize,
    pub index_rebuild_failed: bool,
}

/// Up to this many per-row failures are tolerated cumulatively before
/// the transaction is rolled back. The in-memory
/// dedup step in `replace_list` makes unique-constraint violations on
/// `(list_id, fingerprint)` structurally impossible, so in practice
/// this tolerance only ever absorbs a genuine sqlite row-level error
/// (e.g. a transient disk error on one row), not a correctness bug.
const MAX_TOLERATED_ROW_ERRORS: usize = 100;

impl Store {
    /// Fully replace `list_id`'s contents with `entries`, in one
    /// transaction: drop indexes if the input is large, dedup by
    /// fingerprint, bulk-insert, then rebuild indexes.
    pub async fn replace_list(
        &self,
        list_id: Uuid,
        entries: Vec<NewEntry>,
    ) -> StoreResult<ReplaceOutcome> {
        let outcome = self
            .db
            .perform("replace_list", move |conn| {
                let deduped = dedup_by_fingerprint(entries);
                let drop_indexes = deduped.len() > BULK_INDEX_DROP_THRESHOLD;

                if drop_indexes {
                    tracing::info!(
                        list_id = %list_id,
                        count = deduped.len(),
                        "dropping secondary indexes for large bulk load"
                    );
                    for (name, _) in SECONDARY_INDEXES {
                        conn.execute(format!("DROP INDEX IF EXISTS {name}"))?;
                    }
                    conn.execute(format!("DROP INDEX IF EXISTS {}", crate::db::UNIQUE_INDEX_NAME))?;
                }

                let result = run_replace_transaction(conn, list_id, &deduped);

                let mut index_rebuild_failed = false;
                if drop_indexes {
                    for (name, sql) in SECONDARY_INDEXES {
                        if let Err(err) = conn.execute(sql) {
                            tracing::error!(list_id = %list_id, index = name, %err, "index rebuild failed");
                            index_rebuild_failed = true;
                        }
                    }
                    if let Err(err) = conn.execute(UNIQUE_INDEX_SQL) {
                        tracing::error!(list_id = %list_id, "unique index rebuild failed: {err}");
                        index_rebuild_failed = true;
                    }
                }

                let mut outcome = result?;
                outcome.index_rebuild_failed = index_rebuild_failed;
                Ok(outcome)
            })
            .await?;

        let written = outcome.entries_written as i64;
        self.db
            .perform("update list entry_count", move |conn| {
                let now = Utc::now().to_rfc3339();
                let mut stmt = conn
                    .prepare("UPDATE suppression_lists SET entry_count = ?, updated_at = ? WHERE id = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, written)).map_err(map_sqlite)?;
                stmt.bind((2, now.as_str())).map_err(map_sqlite)?;
                stmt.bind((3, list_id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await?;

        Ok(outcome)
    }

    /// Single-entry upsert. Used both by the Hub's
    /// `suppress()` write path and by admin tooling.
    pub async fn add(
        &self,
        list_id: Option<Uuid>,
        email: Option<String>,
        fingerprint: String,
        reason: String,
        source: String,
        category: String,
    ) -> StoreResult<bool> {
        self.db
            .perform("add entry", move |conn| {
                let list_id_str = list_id.map(|id| id.to_string()).unwrap_or_default();
                let mut existing = conn
                    .prepare("SELECT 1 FROM suppression_entries WHERE list_id = ? AND fingerprint = ?")
                    .map_err(map_sqlite)?;
                existing.bind((1, list_id_str.as_str())).map_err(map_sqlite)?;
                existing.bind((2, fingerprint.as_str())).map_err(map_sqlite)?;
                let is_new = !matches!(existing.next(), Ok(sqlite::State::Row));

                let now = Utc::now().to_rfc3339();
                let mut stmt = conn
                    .prepare(
                        "INSERT INTO suppression_entries \
                         (list_id, email, fingerprint, reason, source, category, is_global, created_at) \
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                         ON CONFLICT DO NOTHING",
                    )
                    .map_err(map_sqlite)?;
                stmt.bind((1, list_id_str.as_str())).map_err(map_sqlite)?;
                match &email {
                    Some(e) => stmt.bind((2, e.as_str())).map_err(map_sqlite)?,
                    None => stmt.bind((2, ())).map_err(map_sqlite)?,
                }
                stmt.bind((3, fingerprint.as_str())).map_err(map_sqlite)?;
                stmt.bind((4, reason.as_str())).map_err(map_sqlite)?;
                stmt.bind((5, source.as_str())).map_err(map_sqlite)?;
                stmt.bind((6, category.as_str())).map_err(map_sqlite)?;
                stmt.bind((7, if list_id.is_none() { 1 } else { 0 })).map_err(map_sqlite)?;
                stmt.bind((8, now.as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(is_new)
            })
            .await
    }

    /// Admin override: delete every entry with `fingerprint`, across
    /// every list.
    pub async fn remove(&self, fingerprint: String) -> StoreResult<()> {
        self.db
            .perform("remove entry", move |conn| {
                let mut stmt = conn
                    .prepare("DELETE FROM suppression_entries WHERE fingerprint = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, fingerprint.as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }

    /// Stream every fingerprint currently in the store. Used by the Hub
    /// at warmup; implemented as a bounded channel fed from a blocking
    /// sqlite cursor so that a store with hundreds of millions of rows
    /// never needs to be materialized into one `Vec`.
    pub fn export_fingerprints(&self) -> ReceiverStream<String> {
        let (tx, rx) = mpsc::channel(4096);
        let db = self.db.clone();
        tokio::spawn(async move {
            let result = db
                .perform("export_fingerprints", move |conn| {
                    let mut stmt = conn
                        .prepare("SELECT DISTINCT fingerprint FROM suppression_entries")
                        .map_err(map_sqlite)?;
                    while let Ok(sqlite::State::Row) = stmt.next() {
                        let fp: String = stmt.read(0).map_err(map_sqlite)?;
                        if tx.blocking_send(fp).is_err() {
                            // Receiver dropped (hub shutting down mid-warmup).
                            break;
                        }
                    }
                    Ok(())
                })
                .await;
            if let Err(err) = result {
                tracing::error!(%err, "export_fingerprints failed");
            }
        });
        ReceiverStream::new(rx)
    }

    /// Cheap, cached-aggregate stats: computed
    /// from the list table's cached `entry_count`s plus grouped counts
    /// over the entries table, never a full unindexed scan.
    pub async fn stats(&self) -> StoreResult<HubStatsResponse> {
        self.db
            .perform("stats", |conn| {
                let mut total_stmt = conn
                    .prepare("SELECT COALESCE(SUM(entry_count), 0) FROM suppression_lists")
                    .map_err(map_sqlite)?;
                total_stmt.next().map_err(map_sqlite)?;
                let total: i64 = total_stmt.read(0).map_err(map_sqlite)?;

                let per_category = group_count(conn, "category")?;
                let per_source = group_count(conn, "source")?;

                let mut recent_stmt = conn
                    .prepare(
                        "SELECT COUNT(*) FROM suppression_entries \
                         WHERE created_at >= datetime('now', '-1 day')",
                    )
                    .map_err(map_sqlite)?;
                recent_stmt.next().map_err(map_sqlite)?;
                let recent_24h: i64 = recent_stmt.read(0).map_err(map_sqlite)?;

                Ok(HubStatsResponse {
                    total: total.max(0) as usize,
                    per_category,
                    per_source,
                    recent_24h: recent_24h.max(0) as usize,
                })
            })
            .await
    }
}

impl Store {
    /// Count how many of `fingerprints` appear anywhere in `list_id`'s
    /// entries. Used by the cross-reference sampler to avoid pulling an entire list into memory just to check a
    /// few thousand sampled fingerprints against it. Batches the `IN`
    /// clause to stay under sqlite's bound-parameter limit.
    pub async fn count_fingerprints_in_list(
        &self,
        list_id: Uuid,
        fingerprints: Vec<String>,
    ) -> StoreResult<usize> {
        const BATCH: usize = 500;
        self.db
            .perform("count_fingerprints_in_list", move |conn| {
                let list_id_str = list_id.to_string();
                let mut total = 0usize;
                for chunk in fingerprints.chunks(BATCH) {
                    if chunk.is_empty() {
                        continue;
                    }
                    let placeholders = std::iter::repeat("?").take(chunk.len()).collect::<Vec<_>>().join(",");
                    let sql = format!(
                        "SELECT COUNT(DISTINCT fingerprint) FROM suppression_entries \
                         WHERE list_id = ? AND fingerprint IN ({placeholders})"
                    );
                    let mut stmt = conn.prepare(sql).map_err(map_sqlite)?;
                    stmt.bind((1, list_id_str.as_str())).map_err(map_sqlite)?;
                    for (i, fp) in chunk.iter().enumerate() {
                        stmt.bind((i + 2, fp.as_str())).map_err(map_sqlite)?;
                    }
                    stmt.next().map_err(map_sqlite)?;
                    let count: i64 = stmt.read(0).map_err(map_sqlite)?;
                    total += count.max(0) as usize;
                }
                Ok(total)
            })
            .await
    }
}

fn group_count(
    conn: &sqlite::ConnectionThreadSafe,
    column: &str,
) -> StoreResult<HashMap<String, usize>> {
    let sql = format!("SELECT {column}, COUNT(*) FROM suppression_entries GROUP BY {column}");
    let mut stmt = conn.prepare(sql).map_err(map_sqlite)?;
    let mut out = HashMap::new();
    while let Ok(sqlite::State::Row) = stmt.next() {
        let key: String = stmt.read(0).map_err(map_sqlite)?;
        let count: i64 = stmt.read(1).map_err(map_sqlite)?;
        out.insert(key, count.max(0) as usize);
    }
    Ok(out)
}

/// Deduplicate by fingerprint, first entry wins.
fn dedup_by_fingerprint(entries: Vec<NewEntry>) -> Vec<NewEntry> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        if seen.insert(entry.fingerprint.clone()) {
            out.push(entry);
        }
    }
    out
}

fn run_replace_transaction(
    conn: &sqlite::ConnectionThreadSafe,
    list_id: Uuid,
    deduped: &[NewEntry],
) -> StoreResult<ReplaceOutcome> {
    conn.execute("BEGIN IMMEDIATE").map_err(map_sqlite)?;

    let list_id_str = list_id.to_string();
    if let Err(err) = (|| -> StoreResult<()> {
        let mut delete = conn
            .prepare("DELETE FROM suppression_entries WHERE list_id = ?")
            .map_err(map_sqlite)?;
        delete.bind((1, list_id_str.as_str())).map_err(map_sqlite)?;
        delete.next().map_err(map_sqlite)?;
        Ok(())
    })() {
        let _ = conn.execute("ROLLBACK");
        return Err(err);
    }

    let now = Utc::now().to_rfc3339();
    let mut row_errors = 0usize;
    let mut logged = 0usize;
    let mut written = 0usize;

    for entry in deduped {
        let result = (|| -> Result<(), sqlite::Error> {
            let mut insert = conn.prepare(
                "INSERT INTO suppression_entries \
                 (list_id, email, fingerprint, reason, source, category, is_global, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
            )?;
            insert.bind((1, list_id_str.as_str()))?;
            match &entry.email {
                Some(e) => insert.bind((2, e.as_str()))?,
                None => insert.bind((2, ()))?,
            }
            insert.bind((3, entry.fingerprint.as_str()))?;
            insert.bind((4, entry.reason.as_str()))?;
            insert.bind((5, entry.source.as_str()))?;
            insert.bind((6, entry.category.as_str()))?;
            insert.bind((7, now.as_str()))?;
            insert.next()?;
            Ok(())
        })();

        match result {
            Ok(()) => written += 1,
            Err(err) => {
                row_errors += 1;
                if logged < 5 {
                    tracing::warn!(list_id = %list_id, %err, "row error during bulk load");
                    logged += 1;
                }
                if row_errors > MAX_TOLERATED_ROW_ERRORS {
                    let _ = conn.execute("ROLLBACK");
                    return Err(StoreError::BulkLoadRolledBack {
                        list_id,
                        cause: err.to_string(),
                        error_count: row_errors,
                    });
                }
            }
        }
    }

    conn.execute("COMMIT").map_err(map_sqlite)?;

    Ok(ReplaceOutcome {
        entries_written: written,
        entries_new: written,
        rows_errored: row_errors,
        index_rebuild_failed: false,
    })
}
