//! Thin pass-through for `RefreshGroup` CRUD. The store already owns
//! the table and its invariants
//! (duplicate-name rejection); this just gives the daemon one place to
//! reach every refresh-control operation through the engine handle
//! instead of depending on `suppression-store` directly.

use crate::error::EngineResult;
use crate::scheduler::Engine;
use suppression_api_types::RefreshGroup;
use uuid::Uuid;

impl Engine {
    pub async fn list_groups(&self) -> EngineResult<Vec<RefreshGroup>> {
        Ok(self.store().list_groups().await?)
    }

    pub async fn create_group(&self, name: String, description: Option<String>) -> EngineResult<Uuid> {
        Ok(self.store().create_group(name, description).await?)
    }

    pub async fn update_group(&self, id: Uuid, name: String, description: Option<String>) -> EngineResult<()> {
        Ok(self.store().update_group(id, name, description).await?)
    }

    pub async fn delete_group(&self, id: Uuid) -> EngineResult<()> {
        Ok(self.store().delete_group(id).await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::EngineConfig;
    use suppression_store::Store;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suppression.db");
        (dir, Store::open(path.to_str().unwrap()).unwrap())
    }

    #[tokio::test]
    async fn create_then_list_group() {
        let (_dir, store) = temp_store();
        let config = EngineConfig::new("UTC", "test-token", Uuid::nil());
        let engine = Engine::new(store, config);
        let id = engine.create_group("VIP".to_string(), None).await.unwrap();
        let groups = engine.list_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, id);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let (_dir, store) = temp_store();
        let config = EngineConfig::new("UTC", "test-token", Uuid::nil());
        let engine = Engine::new(store, config);
        engine.create_group("VIP".to_string(), None).await.unwrap();
        let result = engine.create_group("VIP".to_string(), None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn update_renames_group() {
        let (_dir, store) = temp_store();
        let config = EngineConfig::new("UTC", "test-token", Uuid::nil());
        let engine = Engine::new(store, config);
        let id = engine.create_group("VIP".to_string(), None).await.unwrap();
        engine
            .update_group(id, "VIP Renamed".to_string(), Some("top tier".to_string()))
            .await
            .unwrap();
        let groups = engine.list_groups().await.unwrap();
        assert_eq!(groups[0].name, "VIP Renamed");
        assert_eq!(groups[0].description.as_deref(), Some("top tier"));
    }

    #[tokio::test]
    async fn update_unknown_group_fails() {
        let (_dir, store) = temp_store();
        let config = EngineConfig::new("UTC", "test-token", Uuid::nil());
        let engine = Engine::new(store, config);
        let result = engine.update_group(Uuid::new_v4(), "Ghost".to_string(), None).await;
        assert!(result.is_err());
    }
}
