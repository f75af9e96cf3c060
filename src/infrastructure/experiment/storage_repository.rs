//! Storage-backed test repository

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::experiment::{Test, TestId, TestQuery, TestRepository, TestStatus};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

/// Storage-backed implementation of TestRepository
#[derive(Debug)]
pub struct StorageTestRepository {
    storage: Arc<dyn Storage<Test>>,
}

impl StorageTestRepository {
    pub fn new(storage: Arc<dyn Storage<Test>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TestRepository for StorageTestRepository {
    async fn create(&self, test: Test) -> Result<Test, DomainError> {
        if self.storage.exists(test.id()).await? {
            return Err(DomainError::conflict(format!(
                "Test '{}' already exists",
                test.id()
            )));
        }

        self.storage.create(test).await
    }

    async fn get(&self, id: &TestId) -> Result<Option<Test>, DomainError> {
        self.storage.get(id).await
    }

    async fn update(&self, test: Test) -> Result<Test, DomainError> {
        if !self.storage.exists(test.id()).await? {
            return Err(DomainError::not_found(format!(
                "Test '{}' not found",
                test.id()
            )));
        }

        self.storage.update(test).await
    }

    async fn transition(&self, test: Test, from: TestStatus) -> Result<Test, DomainError> {
        let id = test.id().clone();
        let to = test.status();

        match self
            .storage
            .update_if(test, &move |stored: &Test| stored.status() == from)
            .await?
        {
            Some(updated) => Ok(updated),
            None => Err(DomainError::invalid_state(format!(
                "Cannot move test '{}' from {} to {}: it is no longer {}",
                id, from, to, from
            ))),
        }
    }

    async fn list(&self, query: &TestQuery) -> Result<Vec<Test>, DomainError> {
        Ok(query.apply(self.storage.list().await?))
    }

    async fn exists(&self, id: &TestId) -> Result<bool, DomainError> {
        self.storage.exists(id).await
    }
}
