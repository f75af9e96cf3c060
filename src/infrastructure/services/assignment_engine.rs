//! Assignment engine
//!
//! Maps (test, user) onto a variation. The natural path is a pure function of
//! the test ID, user ID, traffic allocation and variation weights; forced
//! overrides are written explicitly and win over it for good.

use std::sync::Arc;

use tracing::{debug, info};

use super::load_test;
use crate::domain::experiment::{
    validate_user_id, Assignment, AssignmentAudit, AssignmentKey, AssignmentRepository,
    ExperimentValidationError, Test, TestRepository, Variation,
};
use crate::domain::DomainError;
use crate::infrastructure::experiment::StableHasher;
use crate::infrastructure::observability::record_assignment;

/// Service assigning users to test variations
#[derive(Debug, Clone)]
pub struct AssignmentEngine {
    tests: Arc<dyn TestRepository>,
    assignments: Arc<dyn AssignmentRepository>,
}

impl AssignmentEngine {
    pub fn new(tests: Arc<dyn TestRepository>, assignments: Arc<dyn AssignmentRepository>) -> Self {
        Self { tests, assignments }
    }

    /// Assign a user, optionally forcing a variation
    ///
    /// Returns `None` when the test is not active or the user falls outside
    /// the traffic allocation. Neither case is an error.
    pub async fn assign(
        &self,
        test_id: &str,
        user_id: &str,
        force_variation_id: Option<&str>,
    ) -> Result<Option<Assignment>, DomainError> {
        validate_user_id(user_id)?;
        let test = load_test(self.tests.as_ref(), test_id).await?;

        if !test.status().accepts_traffic() {
            debug!(
                test_id = %test_id,
                user_id = %user_id,
                status = %test.status(),
                "Assignment skipped, test not active"
            );
            record_assignment(test_id, "inactive");
            return Ok(None);
        }

        let key = AssignmentKey::new(test.id().clone(), user_id);

        if let Some(forced_id) = force_variation_id {
            return self.force(&test, key, forced_id).await.map(Some);
        }

        if let Some(existing) = self.assignments.get(&key).await? {
            return Ok(Some(existing));
        }

        let Some(variation) = Self::natural_variation(&test, user_id) else {
            debug!(test_id = %test_id, user_id = %user_id, "User outside traffic allocation");
            record_assignment(test_id, "excluded");
            return Ok(None);
        };

        let stored = self
            .assignments
            .insert_if_absent(Assignment::new(
                test.id().clone(),
                user_id,
                variation.id().clone(),
            ))
            .await?;

        debug!(
            test_id = %test_id,
            user_id = %user_id,
            variation_id = %stored.variation_id,
            "User assigned"
        );
        record_assignment(test_id, "assigned");

        Ok(Some(stored))
    }

    /// Stored assignment of a user, without side effects
    pub async fn get_assignment(
        &self,
        test_id: &str,
        user_id: &str,
    ) -> Result<Option<Assignment>, DomainError> {
        let test = load_test(self.tests.as_ref(), test_id).await?;
        self.assignments
            .get(&AssignmentKey::new(test.id().clone(), user_id))
            .await
    }

    /// All assignments of a test
    pub async fn list_assignments(&self, test_id: &str) -> Result<Vec<Assignment>, DomainError> {
        let test = load_test(self.tests.as_ref(), test_id).await?;
        self.assignments.list_by_test(test.id()).await
    }

    /// Forced-override audit trail of a test
    pub async fn audit_log(&self, test_id: &str) -> Result<Vec<AssignmentAudit>, DomainError> {
        let test = load_test(self.tests.as_ref(), test_id).await?;
        self.assignments.audit_log(test.id()).await
    }

    /// Hash-derived variation of a user, or `None` when excluded by allocation
    pub fn natural_variation<'a>(test: &'a Test, user_id: &str) -> Option<&'a Variation> {
        let test_id = test.id().as_str();

        if !StableHasher::is_included(test_id, user_id, test.traffic_allocation_pct()) {
            return None;
        }

        let bucket = StableHasher::variation_bucket(test_id, user_id, test.total_weight());
        test.variation_for_bucket(bucket)
    }

    async fn force(
        &self,
        test: &Test,
        key: AssignmentKey,
        forced_id: &str,
    ) -> Result<Assignment, DomainError> {
        let variation = test.variation_by_str(forced_id).ok_or_else(|| {
            DomainError::from(ExperimentValidationError::UnknownVariation(
                forced_id.to_string(),
            ))
        })?;

        if let Some(existing) = self.assignments.get(&key).await? {
            if existing.variation_id == *variation.id() {
                return Ok(existing);
            }
        }

        let forced = Assignment::forced(key.test_id, key.user_id, variation.id().clone());
        let previous = self.assignments.force(forced.clone()).await?;

        info!(
            test_id = %forced.test_id,
            user_id = %forced.user_id,
            variation_id = %forced.variation_id,
            previous_variation_id = ?previous.as_ref().map(|a| a.variation_id.as_str()),
            "Forced assignment stored"
        );
        record_assignment(forced.test_id.as_str(), "forced");

        Ok(forced)
    }
}
