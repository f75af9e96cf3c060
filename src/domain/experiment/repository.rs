//! Experiment repository traits and query types

use async_trait::async_trait;
use std::fmt::Debug;

use super::assignment::{Assignment, AssignmentAudit, AssignmentKey};
use super::entity::{Test, TestId, TestStatus};
use super::event::Event;
use crate::domain::DomainError;

// ============================================================================
// TestQuery
// ============================================================================

/// Query parameters for listing tests
#[derive(Debug, Clone, Default)]
pub struct TestQuery {
    /// Filter by status
    pub status: Option<TestStatus>,
    /// Maximum number of results
    pub limit: Option<usize>,
    /// Number of results to skip
    pub offset: Option<usize>,
}

impl TestQuery {
    /// Create a new query with no filters
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by status
    pub fn with_status(mut self, status: TestStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set maximum number of results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set number of results to skip
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Apply filters, newest-first ordering and pagination to a set of tests
    pub fn apply(&self, tests: impl IntoIterator<Item = Test>) -> Vec<Test> {
        let mut results: Vec<_> = tests
            .into_iter()
            .filter(|t| self.status.is_none_or(|status| t.status() == status))
            .collect();

        results.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().as_str().cmp(b.id().as_str()))
        });

        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);

        results.into_iter().skip(offset).take(limit).collect()
    }
}

// ============================================================================
// TestRepository
// ============================================================================

/// Repository trait for test definitions
#[async_trait]
pub trait TestRepository: Send + Sync + Debug {
    /// Create a new test
    async fn create(&self, test: Test) -> Result<Test, DomainError>;

    /// Get a test by ID
    async fn get(&self, id: &TestId) -> Result<Option<Test>, DomainError>;

    /// Update an existing test
    async fn update(&self, test: Test) -> Result<Test, DomainError>;

    /// Persist a lifecycle transition of `test` out of `from`.
    ///
    /// The write lands only if the stored test is still in `from`, checked
    /// atomically with the write; otherwise `InvalidState` and nothing changes.
    async fn transition(&self, test: Test, from: TestStatus) -> Result<Test, DomainError>;

    /// List tests with optional filters
    async fn list(&self, query: &TestQuery) -> Result<Vec<Test>, DomainError>;

    /// Tests currently accepting traffic
    async fn list_active(&self) -> Result<Vec<Test>, DomainError> {
        self.list(&TestQuery::new().with_status(TestStatus::Active))
            .await
    }

    /// Check if a test exists
    async fn exists(&self, id: &TestId) -> Result<bool, DomainError> {
        Ok(self.get(id).await?.is_some())
    }
}

// ============================================================================
// AssignmentRepository
// ============================================================================

/// Repository trait for user assignments
///
/// Implementations must make `insert_if_absent` and `force` atomic per key so
/// that concurrent callers for the same (test, user) observe a single winner.
#[async_trait]
pub trait AssignmentRepository: Send + Sync + Debug {
    /// Get the stored assignment for a key
    async fn get(&self, key: &AssignmentKey) -> Result<Option<Assignment>, DomainError>;

    /// Store the assignment unless one already exists; returns the stored one
    async fn insert_if_absent(&self, assignment: Assignment) -> Result<Assignment, DomainError>;

    /// Store a forced assignment unconditionally and audit the replacement.
    /// Returns the assignment that was replaced, if any.
    async fn force(&self, assignment: Assignment) -> Result<Option<Assignment>, DomainError>;

    /// All assignments of a test
    async fn list_by_test(&self, test_id: &TestId) -> Result<Vec<Assignment>, DomainError>;

    /// Number of assigned users in a test
    async fn count_by_test(&self, test_id: &TestId) -> Result<usize, DomainError> {
        Ok(self.list_by_test(test_id).await?.len())
    }

    /// Override audit trail of a test, oldest first
    async fn audit_log(&self, test_id: &TestId) -> Result<Vec<AssignmentAudit>, DomainError>;
}

// ============================================================================
// EventLog
// ============================================================================

/// Append-only log of outcome events
#[async_trait]
pub trait EventLog: Send + Sync + Debug {
    /// Append an event; returns it with its sequence number set
    async fn append(&self, event: Event) -> Result<Event, DomainError>;

    /// Append unless the test's log already holds an event for the same user
    /// and metric. Returns `None` for a duplicate.
    async fn append_unique(&self, event: Event) -> Result<Option<Event>, DomainError>;

    /// All events of a test in append order
    async fn list_by_test(&self, test_id: &TestId) -> Result<Vec<Event>, DomainError>;

    /// Number of events of a test
    async fn count_by_test(&self, test_id: &TestId) -> Result<usize, DomainError> {
        Ok(self.list_by_test(test_id).await?.len())
    }
}

#[cfg(test)]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    /// Mock test repository for testing
    #[derive(Debug, Default)]
    pub struct MockTestRepository {
        tests: RwLock<HashMap<String, Test>>,
        should_fail: RwLock<bool>,
    }

    impl MockTestRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_error(self) -> Self {
            *self.should_fail.write().unwrap() = true;
            self
        }

        fn check_should_fail(&self) -> Result<(), DomainError> {
            if *self.should_fail.read().unwrap() {
                Err(DomainError::storage("Mock error"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl TestRepository for MockTestRepository {
        async fn create(&self, test: Test) -> Result<Test, DomainError> {
            self.check_should_fail()?;
            let id = test.id().as_str().to_string();
            let mut tests = self.tests.write().unwrap();

            if tests.contains_key(&id) {
                return Err(DomainError::conflict(format!(
                    "Test '{}' already exists",
                    id
                )));
            }

            tests.insert(id, test.clone());
            Ok(test)
        }

        async fn get(&self, id: &TestId) -> Result<Option<Test>, DomainError> {
            self.check_should_fail()?;
            Ok(self.tests.read().unwrap().get(id.as_str()).cloned())
        }

        async fn update(&self, test: Test) -> Result<Test, DomainError> {
            self.check_should_fail()?;
            let id = test.id().as_str().to_string();
            let mut tests = self.tests.write().unwrap();

            if !tests.contains_key(&id) {
                return Err(DomainError::not_found(format!("Test '{}' not found", id)));
            }

            tests.insert(id, test.clone());
            Ok(test)
        }

        async fn transition(&self, test: Test, from: TestStatus) -> Result<Test, DomainError> {
            self.check_should_fail()?;
            let id = test.id().as_str().to_string();
            let mut tests = self.tests.write().unwrap();

            match tests.get(&id).map(Test::status) {
                None => Err(DomainError::not_found(format!("Test '{}' not found", id))),
                Some(stored) if stored != from => Err(DomainError::invalid_state(format!(
                    "Test '{}' is {}, expected {}",
                    id, stored, from
                ))),
                Some(_) => {
                    tests.insert(id, test.clone());
                    Ok(test)
                }
            }
        }

        async fn list(&self, query: &TestQuery) -> Result<Vec<Test>, DomainError> {
            self.check_should_fail()?;
            let tests = self.tests.read().unwrap();
            Ok(query.apply(tests.values().cloned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use crate::domain::experiment::{ContentPayload, MetricKind, Variation, VariationRole};

    fn create_test(id: &str) -> Test {
        Test::new(TestId::new(id).unwrap(), format!("Test {}", id), "open", MetricKind::Rate)
            .with_variation(Variation::for_role(
                VariationRole::Control,
                ContentPayload::new("Hello"),
            ))
            .with_variation(Variation::for_role(
                VariationRole::variant(0),
                ContentPayload::new("Hello!"),
            ))
    }

    #[tokio::test]
    async fn test_mock_repository_crud() {
        let repo = MockTestRepository::new();

        let created = repo.create(create_test("test-1")).await.unwrap();
        assert_eq!(created.id().as_str(), "test-1");

        let id = TestId::new("test-1").unwrap();
        let mut fetched = repo.get(&id).await.unwrap().unwrap();

        fetched.start().unwrap();
        let updated = repo.update(fetched).await.unwrap();
        assert_eq!(updated.status(), TestStatus::Active);

        assert!(repo.exists(&id).await.unwrap());
        assert!(repo.create(create_test("test-1")).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_mock_transition_requires_stored_status() {
        let repo = MockTestRepository::new();
        repo.create(create_test("test-1")).await.unwrap();

        let mut started = create_test("test-1");
        started.start().unwrap();
        repo.transition(started.clone(), TestStatus::Draft).await.unwrap();

        let err = repo.transition(started, TestStatus::Draft).await.unwrap_err();
        assert!(err.is_invalid_state());
    }

    #[tokio::test]
    async fn test_list_active_filters_by_status() {
        let repo = MockTestRepository::new();

        for i in 1..=4 {
            let mut test = create_test(&format!("test-{}", i));
            if i % 2 == 0 {
                test.start().unwrap();
            }
            repo.create(test).await.unwrap();
        }

        assert_eq!(repo.list(&TestQuery::new()).await.unwrap().len(), 4);

        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|t| t.status() == TestStatus::Active));
    }

    #[tokio::test]
    async fn test_query_pagination() {
        let repo = MockTestRepository::new();

        for i in 1..=5 {
            repo.create(create_test(&format!("test-{}", i))).await.unwrap();
        }

        let page = repo
            .list(&TestQuery::new().with_offset(1).with_limit(3))
            .await
            .unwrap();
        assert_eq!(page.len(), 3);

        let tail = repo
            .list(&TestQuery::new().with_offset(4).with_limit(3))
            .await
            .unwrap();
        assert_eq!(tail.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_error_propagates() {
        let repo = MockTestRepository::new().with_error();
        let err = repo.get(&TestId::new("test-1").unwrap()).await.unwrap_err();
        assert!(matches!(err, DomainError::Storage { .. }));
    }
}
