//! Assignment types binding a user to a variation within a test

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::{TestId, VariationId};

/// Composite key of an assignment: one per (test, user)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentKey {
    pub test_id: TestId,
    pub user_id: String,
}

impl AssignmentKey {
    pub fn new(test_id: TestId, user_id: impl Into<String>) -> Self {
        Self {
            test_id,
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for AssignmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.test_id, self.user_id)
    }
}

/// The durable binding of a user to a variation within one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub test_id: TestId,
    pub user_id: String,
    pub variation_id: VariationId,
    pub assigned_at: DateTime<Utc>,
    /// Set when the assignment came from an explicit override
    pub forced: bool,
}

impl Assignment {
    /// Create a natural (hash-derived) assignment
    pub fn new(test_id: TestId, user_id: impl Into<String>, variation_id: VariationId) -> Self {
        Self {
            test_id,
            user_id: user_id.into(),
            variation_id,
            assigned_at: Utc::now(),
            forced: false,
        }
    }

    /// Create a forced assignment
    pub fn forced(test_id: TestId, user_id: impl Into<String>, variation_id: VariationId) -> Self {
        Self {
            forced: true,
            ..Self::new(test_id, user_id, variation_id)
        }
    }

    pub fn key(&self) -> AssignmentKey {
        AssignmentKey::new(self.test_id.clone(), self.user_id.clone())
    }
}

/// Audit record written whenever a forced override is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentAudit {
    pub test_id: TestId,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_variation_id: Option<VariationId>,
    pub previous_forced: bool,
    pub new_variation_id: VariationId,
    pub at: DateTime<Utc>,
}

impl AssignmentAudit {
    /// Build the audit entry for replacing `previous` with `forced`
    pub fn for_override(previous: Option<&Assignment>, forced: &Assignment) -> Self {
        Self {
            test_id: forced.test_id.clone(),
            user_id: forced.user_id.clone(),
            previous_variation_id: previous.map(|a| a.variation_id.clone()),
            previous_forced: previous.is_some_and(|a| a.forced),
            new_variation_id: forced.variation_id.clone(),
            at: forced.assigned_at,
        }
    }
}
