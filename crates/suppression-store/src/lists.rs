//! `SuppressionList` CRUD.

use crate::db::map_sqlite;
use crate::error::StoreResult;
use crate::Store;
use chrono::{DateTime, Utc};
use suppression_api_types::{SuppressionList, SuppressionScope};
use uuid::Uuid;

impl Store {
    /// Fetch a list by id, if it exists.
    pub async fn get_list(&self, id: Uuid) -> StoreResult<Option<SuppressionList>> {
        self.db
            .perform("get_list", move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, name, source_tag, entry_count, scope, organization_id, updated_at \
                         FROM suppression_lists WHERE id = ?",
                    )
                    .map_err(map_sqlite)?;
                stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                if matches!(stmt.next(), Ok(sqlite::State::Row)) {
                    Ok(Some(read_list(&stmt)?))
                } else {
                    Ok(None)
                }
            })
            .await
    }

    /// Create a new list under `organization_id`, returning its id.
    /// Used by the engine when a source has no `internal_list_id` yet.
    pub async fn create_list(
        &self,
        name: String,
        source_tag: String,
        scope: SuppressionScope,
        organization_id: Uuid,
    ) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.db
            .perform("create_list", move |conn| {
                let now = Utc::now().to_rfc3339();
                let scope_str = match scope {
                    SuppressionScope::Organization => "organization",
                    SuppressionScope::Global => "global",
                };
                let mut stmt = conn
                    .prepare(
                        "INSERT INTO suppression_lists \
                         (id, name, source_tag, entry_count, scope, organization_id, updated_at) \
                         VALUES (?, ?, ?, 0, ?, ?, ?)",
                    )
                    .map_err(map_sqlite)?;
                stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.bind((2, name.as_str())).map_err(map_sqlite)?;
                stmt.bind((3, source_tag.as_str())).map_err(map_sqlite)?;
                stmt.bind((4, scope_str)).map_err(map_sqlite)?;
                stmt.bind((5, organization_id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.bind((6, now.as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await?;
        Ok(id)
    }
}

fn read_list(stmt: &sqlite::Statement) -> StoreResult<SuppressionList> {
    let id: String = stmt.read(0).map_err(map_sqlite)?;
    let name: String = stmt.read(1).map_err(map_sqlite)?;
    let source_tag: String = stmt.read(2).map_err(map_sqlite)?;
    let entry_count: i64 = stmt.read(3).map_err(map_sqlite)?;
    let scope: String = stmt.read(4).map_err(map_sqlite)?;
    let organization_id: String = stmt.read(5).map_err(map_sqlite)?;
    let updated_at: String = stmt.read(6).map_err(map_sqlite)?;

    Ok(SuppressionList {
        id: id.parse().unwrap_or_default(),
        name,
        source_tag,
        entry_count,
        scope: if scope == "global" {
            SuppressionScope::Global
        } else {
            SuppressionScope::Organization
        },
        organization_id: organization_id.parse().unwrap_or_default(),
        updated_at: updated_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}
