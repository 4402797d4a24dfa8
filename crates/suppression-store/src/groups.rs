//! `RefreshGroup` CRUD.

use crate::db::map_sqlite;
use crate::error::{StoreError, StoreResult};
use crate::Store;
use suppression_api_types::RefreshGroup;
use uuid::Uuid;

impl Store {
    pub async fn list_groups(&self) -> StoreResult<Vec<RefreshGroup>> {
        self.db
            .perform("list_groups", |conn| {
                let mut stmt = conn
                    .prepare("SELECT id, name, description FROM refresh_groups ORDER BY name ASC")
                    .map_err(map_sqlite)?;
                let mut out = Vec::new();
                while matches!(stmt.next(), Ok(sqlite::State::Row)) {
                    out.push(read_group(&stmt)?);
                }
                Ok(out)
            })
            .await
    }

    /// Create a group. Fails if the name already exists.
    pub async fn create_group(&self, name: String, description: Option<String>) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.db
            .perform("create_group", move |conn| {
                let mut existing = conn
                    .prepare("SELECT 1 FROM refresh_groups WHERE name = ?")
                    .map_err(map_sqlite)?;
                existing.bind((1, name.as_str())).map_err(map_sqlite)?;
                if matches!(existing.next(), Ok(sqlite::State::Row)) {
                    return Err(StoreError::DuplicateGroupName(name.clone()));
                }

                let mut stmt = conn
                    .prepare("INSERT INTO refresh_groups (id, name, description) VALUES (?, ?, ?)")
                    .map_err(map_sqlite)?;
                stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.bind((2, name.as_str())).map_err(map_sqlite)?;
                match &description {
                    Some(d) => stmt.bind((3, d.as_str())).map_err(map_sqlite)?,
                    None => stmt.bind((3, ())).map_err(map_sqlite)?,
                }
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await?;
        Ok(id)
    }

    /// Update a group's name/description. Fails if `id` does not
    /// exist, or if `name` collides with a *different* group.
    pub async fn update_group(&self, id: Uuid, name: String, description: Option<String>) -> StoreResult<()> {
        self.db
            .perform("update_group", move |conn| {
                let mut existing = conn
                    .prepare("SELECT 1 FROM refresh_groups WHERE id = ?")
                    .map_err(map_sqlite)?;
                existing.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                if !matches!(existing.next(), Ok(sqlite::State::Row)) {
                    return Err(StoreError::GroupNotFound(id));
                }

                let mut clash = conn
                    .prepare("SELECT 1 FROM refresh_groups WHERE name = ? AND id != ?")
                    .map_err(map_sqlite)?;
                clash.bind((1, name.as_str())).map_err(map_sqlite)?;
                clash.bind((2, id.to_string().as_str())).map_err(map_sqlite)?;
                if matches!(clash.next(), Ok(sqlite::State::Row)) {
                    return Err(StoreError::DuplicateGroupName(name.clone()));
                }

                let mut stmt = conn
                    .prepare("UPDATE refresh_groups SET name = ?, description = ? WHERE id = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, name.as_str())).map_err(map_sqlite)?;
                match &description {
                    Some(d) => stmt.bind((2, d.as_str())).map_err(map_sqlite)?,
                    None => stmt.bind((2, ())).map_err(map_sqlite)?,
                }
                stmt.bind((3, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }

    pub async fn delete_group(&self, id: Uuid) -> StoreResult<()> {
        self.db
            .perform("delete_group", move |conn| {
                let mut stmt = conn
                    .prepare("DELETE FROM refresh_groups WHERE id = ?")
                    .map_err(map_sqlite)?;
                stmt.bind((1, id.to_string().as_str())).map_err(map_sqlite)?;
                stmt.next().map_err(map_sqlite)?;
                Ok(())
            })
            .await
    }
}

fn read_group(stmt: &sqlite::Statement) -> StoreResult<RefreshGroup> {
    let id: String = stmt.read(0).map_err(map_sqlite)?;
    let name: String = stmt.read(1).map_err(map_sqlite)?;
    let description: Option<String> = stmt.read(2).map_err(map_sqlite)?;
    Ok(RefreshGroup {
        id: id.parse().unwrap_or_default(),
        name,
        description,
    })
}
