//! Storage trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::StorageEntity;

/// Lookup and insert capability for one entity type
#[async_trait]
pub trait Storage<E>: Send + Sync + Debug
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError>;

    async fn list(&self) -> Result<Vec<E>, DomainError>;

    /// Inserts a new entity, `Conflict` if the key is taken
    async fn create(&self, entity: E) -> Result<E, DomainError>;

    /// Replaces an existing entity, `NotFound` if the key is unknown
    async fn update(&self, entity: E) -> Result<E, DomainError>;

    /// Replaces an existing entity only while `condition` holds for the stored
    /// one. The check and the write happen under one lock; `Ok(None)` means the
    /// condition failed and nothing was written.
    async fn update_if(
        &self,
        entity: E,
        condition: &(dyn for<'c> Fn(&'c E) -> bool + Send + Sync),
    ) -> Result<Option<E>, DomainError>;

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.list().await?.len())
    }
}
