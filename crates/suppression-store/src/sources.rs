//! `RefreshSource` CRUD.

use crate::db::map_sqlite;
use crate::error::{StoreError, StoreResult};
use crate::Store;
use chrono::{DateTime, Utc};
use suppression_api_types::{ProviderTag, RefreshSource};
use uuid::Uuid;

/// Fields accepted by `upsert_source`; mirrors
/// `suppression_api_types::refresh::SourceUpsertRequest` but lives here
/// so the store crate does not need to depend on request DTOs beyond
/// what it already re-exports.
#[derive(Debug, Clone)]
pub struct SourceFields {
    pub offer_id: Option<String>,
    pub campaign_name: String,
    pub url: String,
    pub provider_tag: Option<ProviderTag>,
    pub ga_id: Option<String>,
    pub internal_list_id: Option<Uuid>,
    pub refresh_group: Option<Uuid>,
    pub priority: Option<i32>,
    pub is_active: bool,
}

impl Store {
    pub async fn list_sources(&self, only_active: bool) -> StoreResult<Vec<RefreshSource>> {
        self.db
            .perform("list_sources", move |conn| {
                let sql = if only_active {
                    "SELECT * FROM refresh_sources WHERE is_active = 1 ORDER BY priority ASC, campaign_name ASC"
                } else {
                    "SELECT * FROM refresh_sources ORDER BY priority ASC, campaign_name ASC"
                };
                let mut stmt = conn.prepare(sql).map_err(map_sqlite)?;
                let mut out = Vec::new();
                while matches!(stmt.next(), Ok(sqlite::State::Row)) {
                    out.push(read_source(&stmt)?);
                }
                Ok(out)
            })
            .await
    }

    pub async fn get_source(&self, id: Uuid) -> StoreResult<Option<RefreshSource>> {
        self.db
            .perform("get_source", move |conn| {
                let mut stmt = conn
                    .prepare("SELECT * FROM refresh_sources WHERE id = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                if matches!(stmt.next(), Ok(sqlite::State::Row)) {
                    Ok(Some(read_source(&stmt)?))
                } else {
                    Ok(None)
                }
            })
            .await
    }

    /// Create a source, or update an existing one matched by URL
    /// identity.
    pub async fn upsert_source_by_url(&self, fields: SourceFields) -> StoreResult<(Uuid, bool)> {
        self.db
            .perform("upsert_source_by_url", move |conn| {
                let mut find = conn
                    .prepare("SELECT id FROM refresh_sources WHERE url = ?")
                    .map_err(map_sqlite)?;
                find.bind((1, fields.url.as_str())).map_err(map_sqlite)?;
                let existing_id: Option<Uuid> = if matches!(find.next(), Ok(sqlite::State::Row)) {
                    let id: String = find.read(0).map_err(map_sqlite)?;
                    id.parse().ok()
                } else {
                    None
                };

                let provider_tag = fields
                    .provider_tag
                    .unwrap_or_else(|| ProviderTag::detect(&fields.url));

                match existing_id {
                    Some(id) => {
                        merge_update(conn, id, &fields, provider_tag)?;
                        Ok((id, false))
                    }
                    None => {
                        let id = Uuid::new_v4();
                        insert_source(conn, id, &fields, provider_tag)?;
                        Ok((id, true))
                    }
                }
            })
            .await
    }

    pub async fn set_source_active(&self, id: Uuid, is_active: bool) -> StoreResult<()> {
        self.db
            .perform("set_source_active", move |conn| {
                let mut stmt = conn
                    .prepare("UPDATE refresh_sources SET is_active = ? WHERE id = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, if is_active { 1 } else { 0 })).map_err(map_sqlite)?;
                stmt.bind((2, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }

    pub async fn link_source_list(&self, id: Uuid, list_id: Uuid) -> StoreResult<()> {
        self.db
            .perform("link_source_list", move |conn| {
                let mut stmt = conn
                    .prepare("UPDATE refresh_sources SET internal_list_id = ? WHERE id = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, list_id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.bind((2, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }

    /// Record the telemetry the engine measured for this source's most
    /// recent attempt.
    pub async fn record_source_attempt(
        &self,
        id: Uuid,
        status: &'static str,
        error: Option<String>,
        entries_downloaded: Option<i64>,
    ) -> StoreResult<()> {
        self.db
            .perform("record_source_attempt", move |conn| {
                let now = Utc::now().to_rfc3339();
                let mut stmt = conn
                    .prepare(
                        "UPDATE refresh_sources SET last_run_at = ?, last_status = ?, \
                         last_error = ?, last_entries_downloaded = ? WHERE id = ?",
                    )
                    .map_err(map_sqlite)?;
                stmt.bind((1, now.as_str())).map_err(map_sqlite)?;
                stmt.bind((2, status)).map_err(map_sqlite)?;
                match &error {
                    Some(e) => stmt.bind((3, e.as_str())).map_err(map_sqlite)?,
                    None => stmt.bind((3, ())).map_err(map_sqlite)?,
                }
                match entries_downloaded {
                    Some(n) => stmt.bind((4, n)).map_err(map_sqlite)?,
                    None => stmt.bind((4, ())).map_err(map_sqlite)?,
                }
                stmt.bind((5, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }

    pub async fn delete_source(&self, id: Uuid) -> StoreResult<()> {
        self.db
            .perform("delete_source", move |conn| {
                let mut stmt = conn
                    .prepare("DELETE FROM refresh_sources WHERE id = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }
}

fn insert_source(
    conn: &sqlite::ConnectionThreadSafe,
    id: Uuid,
    fields: &SourceFields,
    provider_tag: ProviderTag,
) -> StoreResult<()> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO refresh_sources \
             (id, offer_id, campaign_name, url, provider_tag, ga_id, internal_list_id, \
              refresh_group, priority, is_active) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .map_err(map_sqlite)?;
    stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
    bind_opt_str(&mut stmt, 2, fields.offer_id.as_deref())?;
    stmt.bind((3, fields.campaign_name.as_str())).map_err(map_sqlite)?;
    stmt.bind((4, fields.url.as_str())).map_err(map_sqlite)?;
    stmt.bind((5, provider_tag.as_str())).map_err(map_sqlite)?;
    bind_opt_str(&mut stmt, 6, fields.ga_id.as_deref())?;
    bind_opt_uuid(&mut stmt, 7, fields.internal_list_id)?;
    bind_opt_uuid(&mut stmt, 8, fields.refresh_group)?;
    stmt.bind((9, fields.priority.unwrap_or(0) as i64)).map_err(map_sqlite)?;
    stmt.bind((10, if fields.is_active { 1 } else { 0 })).map_err(map_sqlite)?;
    stmt.next().map_err(map_sqlite)?;
    Ok(())
}

/// Merge non-empty fields from `fields` into the existing row matched
/// by URL; a re-import never clears a field the new row leaves blank.
fn merge_update(
    conn: &sqlite::ConnectionThreadSafe,
    id: Uuid,
    fields: &SourceFields,
    provider_tag: ProviderTag,
) -> StoreResult<()> {
    let existing = {
        let mut stmt = conn
            .prepare("SELECT * FROM refresh_sources WHERE id = ?")
            .map_err(map_sqlite)?;
        stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
        stmt.next().map_err(map_sqlite)?;
        read_source(&stmt)?
    };

    let campaign_name = if fields.campaign_name.is_empty() {
        existing.campaign_name
    } else {
        fields.campaign_name.clone()
    };
    let offer_id = fields.offer_id.clone().or(existing.offer_id);
    let ga_id = fields.ga_id.clone().or(existing.ga_id);
    let internal_list_id = fields.internal_list_id.or(existing.internal_list_id);
    let refresh_group = fields.refresh_group.or(existing.refresh_group);
    let priority = fields.priority.unwrap_or(existing.priority);

    let mut stmt = conn
        .prepare(
            "UPDATE refresh_sources SET offer_id = ?, campaign_name = ?, provider_tag = ?, \
             ga_id = ?, internal_list_id = ?, refresh_group = ?, priority = ?, is_active = ? \
             WHERE id = ?",
        )
        .map_err(map_sqlite)?;
    bind_opt_str(&mut stmt, 1, offer_id.as_deref())?;
    stmt.bind((2, campaign_name.as_str())).map_err(map_sqlite)?;
    stmt.bind((3, provider_tag.as_str())).map_err(map_sqlite)?;
    bind_opt_str(&mut stmt, 4, ga_id.as_deref())?;
    bind_opt_uuid(&mut stmt, 5, internal_list_id)?;
    bind_opt_uuid(&mut stmt, 6, refresh_group)?;
    stmt.bind((7, priority as i64)).map_err(map_sqlite)?;
    stmt.bind((8, if fields.is_active { 1 } else { 0 })).map_err(map_sqlite)?;
    stmt.bind((9, id.to_string().as_str())).map_err(map_sqlite)?;
    stmt.next().map_err(map_sqlite)?;
    Ok(())
}

fn bind_opt_str(stmt: &mut sqlite::Statement, index: usize, value: Option<&str>) -> StoreResult<()> {
    match value {
        Some(v) if !v.is_empty() => stmt.bind((index, v)).map_err(map_sqlite)?,
        _ => stmt.bind((index, ())).map_err(map_sqlite)?,
    }
    Ok(())
}

fn bind_opt_uuid(stmt: &mut sqlite::Statement, index: usize, value: Option<Uuid>) -> StoreResult<()> {
    match value {
        Some(v) => stmt.bind((index, v.to_string().as_str())).map_err(map_sqlite)?,
        None => stmt.bind((index, ())).map_err(map_sqlite)?,
    }
    Ok(())
}

/// Column order produced by `SELECT * FROM refresh_sources`, matching
/// the `CREATE TABLE` order in `db::SCHEMA`. `read()` on this crate's
/// `sqlite` dependency is positional, so the two must be kept in sync.
fn read_source(stmt: &sqlite::Statement) -> StoreResult<RefreshSource> {
    let id: String = stmt.read(0).map_err(map_sqlite)?;
    let offer_id: Option<String> = stmt.read(1).map_err(map_sqlite)?;
    let campaign_name: String = stmt.read(2).map_err(map_sqlite)?;
    let url: String = stmt.read(3).map_err(map_sqlite)?;
    let provider_tag: String = stmt.read(4).map_err(map_sqlite)?;
    let ga_id: Option<String> = stmt.read(5).map_err(map_sqlite)?;
    let internal_list_id: Option<String> = stmt.read(6).map_err(map_sqlite)?;
    let refresh_group: Option<String> = stmt.read(7).map_err(map_sqlite)?;
    let priority: i64 = stmt.read(8).map_err(map_sqlite)?;
    let is_active: i64 = stmt.read(9).map_err(map_sqlite)?;
    let last_run_at: Option<String> = stmt.read(10).map_err(map_sqlite)?;
    let last_status: Option<String> = stmt.read(11).map_err(map_sqlite)?;
    let last_error: Option<String> = stmt.read(12).map_err(map_sqlite)?;
    let last_entries_downloaded: Option<i64> = stmt.read(13).map_err(map_sqlite)?;

    Ok(RefreshSource {
        id: id
            .parse()
            .map_err(|_| StoreError::SourceNotFound(Uuid::nil()))?,
        offer_id,
        campaign_name,
        url,
        provider_tag: provider_tag_from_str(&provider_tag),
        ga_id,
        internal_list_id: internal_list_id.and_then(|s| s.parse().ok()),
        refresh_group: refresh_group.and_then(|s| s.parse().ok()),
        priority: priority as i32,
        is_active: is_active != 0,
        last_run_at: last_run_at.and_then(|s| s.parse::<DateTime<Utc>>().ok()),
        last_status,
        last_error,
        last_entries_downloaded,
    })
}

fn provider_tag_from_str(s: &str) -> ProviderTag {
    match s {
        "optizmo" => ProviderTag::Optizmo,
        "unsubcentral" => ProviderTag::UnsubCentral,
        "ezepo" => ProviderTag::Ezepo,
        "unsubscribemaster" => ProviderTag::UnsubscribeMaster,
        "unsub-optr" => ProviderTag::UnsubOptr,
        "unsub-bmv" => ProviderTag::UnsubBmv,
        _ => ProviderTag::Other,
    }
}
