//! Organization resolution for auto-provisioned lists.
//!
//! The CRM/tenant system that owns the authoritative organizations
//! table is an external collaborator, so this crate only
//! keeps a minimal local mirror good enough to satisfy the fallback:
//! if a row is already known locally, use it; otherwise the caller
//! supplies the configured default organization id.

use crate::db::map_sqlite;
use crate::error::StoreResult;
use crate::Store;
use uuid::Uuid;

impl Store {
    /// True if `id` is a known organization. Used before auto-creating
    /// a list so the fallback chain can prefer a real org over the
    /// configured default.
    pub async fn organization_exists(&self, id: Uuid) -> StoreResult<bool> {
        self.db
            .perform("organization_exists", move |conn| {
                let mut stmt = conn
                    .prepare("SELECT 1 FROM organizations WHERE id = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                Ok(matches!(stmt.next(), Ok(sqlite::State::Row)))
            })
            .await
    }

    /// Record an organization so later fallback lookups can find it.
    /// Idempotent: re-registering the same id is a no-op.
    pub async fn upsert_organization(&self, id: Uuid, name: String) -> StoreResult<()> {
        self.db
            .perform("upsert_organization", move |conn| {
                let mut stmt = conn
                    .prepare(
                        "INSERT INTO organizations (id, name) VALUES (?, ?) \
                         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                    )
                    .map_err(map_sqlite)?;
                stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.bind((2, name.as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }
}
