//! In-memory storage implementation

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Thread-safe in-memory storage keyed by the entity's string key
///
/// Data is lost when the process terminates.
#[derive(Debug)]
pub struct InMemoryStorage<E>
where
    E: StorageEntity,
{
    entities: RwLock<HashMap<String, E>>,
}

impl<E> Default for InMemoryStorage<E>
where
    E: StorageEntity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InMemoryStorage<E>
where
    E: StorageEntity,
{
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, E>>, DomainError> {
        self.entities
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, E>>, DomainError> {
        self.entities
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl<E> Storage<E> for InMemoryStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        Ok(self.read()?.get(key.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        Ok(self.read()?.values().cloned().collect())
    }

    async fn create(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut entities = self.write()?;

        if entities.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "Entity with key '{}' already exists",
                key
            )));
        }

        entities.insert(key, entity.clone());
        Ok(entity)
    }

    async fn update(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut entities = self.write()?;

        match entities.get_mut(&key) {
            Some(existing) => {
                *existing = entity.clone();
                Ok(entity)
            }
            None => Err(DomainError::not_found(format!(
                "Entity with key '{}' not found",
                key
            ))),
        }
    }

    async fn update_if(
        &self,
        entity: E,
        condition: &(dyn for<'c> Fn(&'c E) -> bool + Send + Sync),
    ) -> Result<Option<E>, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut entities = self.write()?;

        match entities.get_mut(&key) {
            Some(existing) if condition(existing) => {
                *existing = entity.clone();
                Ok(Some(entity))
            }
            Some(_) => Ok(None),
            None => Err(DomainError::not_found(format!(
                "Entity with key '{}' not found",
                key
            ))),
        }
    }

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.read()?.contains_key(key.as_str()))
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.read()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{MetricKind, Test, TestId};

    fn test(id: &str, name: &str) -> Test {
        Test::new(TestId::new(id).unwrap(), name, "click", MetricKind::Rate)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let storage: InMemoryStorage<Test> = InMemoryStorage::new();
        storage.create(test("t-1", "First")).await.unwrap();

        let fetched = storage.get(&TestId::new("t-1").unwrap()).await.unwrap();
        assert_eq!(fetched.unwrap().name(), "First");
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let storage: InMemoryStorage<Test> = InMemoryStorage::new();
        storage.create(test("t-1", "First")).await.unwrap();

        let result = storage.create(test("t-1", "Again")).await;
        assert!(matches!(result.unwrap_err(), DomainError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_update() {
        let storage: InMemoryStorage<Test> = InMemoryStorage::new();
        storage.create(test("t-1", "First")).await.unwrap();
        storage.update(test("t-1", "Renamed")).await.unwrap();

        let fetched = storage.get(&TestId::new("t-1").unwrap()).await.unwrap();
        assert_eq!(fetched.unwrap().name(), "Renamed");
    }

    #[tokio::test]
    async fn test_update_not_found() {
        let storage: InMemoryStorage<Test> = InMemoryStorage::new();
        let result = storage.update(test("t-1", "Missing")).await;
        assert!(matches!(result.unwrap_err(), DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_if_checks_stored_entity() {
        let storage: InMemoryStorage<Test> = InMemoryStorage::new();
        storage.create(test("t-1", "First")).await.unwrap();

        let written = storage
            .update_if(test("t-1", "Renamed"), &|stored: &Test| stored.name() == "First")
            .await
            .unwrap();
        assert!(written.is_some());

        let skipped = storage
            .update_if(test("t-1", "Again"), &|stored: &Test| stored.name() == "First")
            .await
            .unwrap();
        assert!(skipped.is_none());

        let fetched = storage.get(&TestId::new("t-1").unwrap()).await.unwrap();
        assert_eq!(fetched.unwrap().name(), "Renamed");

        let missing = storage.update_if(test("t-9", "x"), &|_: &Test| true).await;
        assert!(matches!(missing.unwrap_err(), DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_count_exists() {
        let storage: InMemoryStorage<Test> = InMemoryStorage::new();

        for i in 1..=3 {
            storage.create(test(&format!("t-{}", i), "x")).await.unwrap();
        }

        assert_eq!(storage.list().await.unwrap().len(), 3);
        assert_eq!(storage.count().await.unwrap(), 3);
        assert!(storage.exists(&TestId::new("t-2").unwrap()).await.unwrap());
        assert!(!storage.exists(&TestId::new("t-9").unwrap()).await.unwrap());
    }
}
