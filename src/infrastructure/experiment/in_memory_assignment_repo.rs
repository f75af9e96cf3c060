//! In-memory implementation of the assignment repository

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::experiment::{
    Assignment, AssignmentAudit, AssignmentKey, AssignmentRepository, TestId,
};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct AssignmentState {
    assignments: HashMap<AssignmentKey, Assignment>,
    audit: Vec<AssignmentAudit>,
}

/// In-memory assignment repository
///
/// Every write happens under one write lock, which makes the
/// check-then-insert of `insert_if_absent` and the replace-and-audit of
/// `force` atomic per key.
#[derive(Debug, Default)]
pub struct InMemoryAssignmentRepository {
    state: RwLock<AssignmentState>,
}

impl InMemoryAssignmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryAssignmentRepository {
    async fn get(&self, key: &AssignmentKey) -> Result<Option<Assignment>, DomainError> {
        let state = self
            .state
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(state.assignments.get(key).cloned())
    }

    async fn insert_if_absent(&self, assignment: Assignment) -> Result<Assignment, DomainError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        let stored = state
            .assignments
            .entry(assignment.key())
            .or_insert(assignment);

        Ok(stored.clone())
    }

    async fn force(&self, assignment: Assignment) -> Result<Option<Assignment>, DomainError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        let previous = state
            .assignments
            .insert(assignment.key(), assignment.clone());

        state
            .audit
            .push(AssignmentAudit::for_override(previous.as_ref(), &assignment));

        Ok(previous)
    }

    async fn list_by_test(&self, test_id: &TestId) -> Result<Vec<Assignment>, DomainError> {
        let state = self
            .state
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut assignments: Vec<_> = state
            .assignments
            .values()
            .filter(|a| &a.test_id == test_id)
            .cloned()
            .collect();

        assignments.sort_by(|a, b| {
            a.assigned_at
                .cmp(&b.assigned_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        Ok(assignments)
    }

    async fn count_by_test(&self, test_id: &TestId) -> Result<usize, DomainError> {
        let state = self
            .state
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(state
            .assignments
            .keys()
            .filter(|k| &k.test_id == test_id)
            .count())
    }

    async fn audit_log(&self, test_id: &TestId) -> Result<Vec<AssignmentAudit>, DomainError> {
        let state = self
            .state
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(state
            .audit
            .iter()
            .filter(|a| &a.test_id == test_id)
            .cloned()
            .collect())
    }
}
