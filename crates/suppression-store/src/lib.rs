//! The persistent, multi-list suppression repository.
//!
//! Owns every durable [`suppression_api_types::SuppressionEntryRecord`]
//! and the refresh bookkeeping tables (`RefreshSource`, `RefreshCycle`,
//! `RefreshLog`, `RefreshGroup`). The [`crate::hub`] crate holds a
//! non-authoritative in-memory mirror of the entries half of this store;
//! everything here is the one source of truth.

pub mod cycles;
pub mod db;
pub mod entries;
pub mod error;
pub mod groups;
pub mod lists;
pub mod logs;
pub mod organizations;
pub mod sources;

pub use db::Database;
pub use entries::{NewEntry, ReplaceOutcome};
pub use error::{StoreError, StoreResult};

/// Handle to the full persistent store. Cheap to clone; every clone
/// shares the same underlying sqlite connection via [`Database`].
#[derive(Clone)]
pub struct Store {
    pub(crate) db: Database,
}

impl Store {
    pub fn open(path: &str) -> StoreResult<Self> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
mod test {
    use super::*;

    pub fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suppression.db");
        let store = Store::open(path.to_str().unwrap()).unwrap();
        (dir, store)
    }
}
