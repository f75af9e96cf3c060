//! Event recorder
//!
//! Append-only ingestion of outcome events. Events are only accepted for
//! users already assigned in an active test; everything else is rejected
//! quietly with a [`RejectReason`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::load_test;
use crate::domain::experiment::{
    validate_metric_name, validate_user_id, AssignmentKey, AssignmentRepository, Event, EventLog,
    TestRepository,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_event;

// ============================================================================
// Request / Outcome Types
// ============================================================================

/// Request to record an outcome event
#[derive(Debug, Clone)]
pub struct TrackEventRequest {
    pub test_id: String,
    pub user_id: String,
    pub metric_name: String,
    /// Defaults to 1
    pub value: Option<f64>,
    pub metadata: Option<Map<String, Value>>,
}

impl TrackEventRequest {
    pub fn new(
        test_id: impl Into<String>,
        user_id: impl Into<String>,
        metric_name: impl Into<String>,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            user_id: user_id.into(),
            metric_name: metric_name.into(),
            value: None,
            metadata: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Why an event was not recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The test is not accepting traffic
    Inactive,
    /// The user has no assignment in the test
    Unassigned,
    /// An event for the same user and metric exists and de-duplication is on
    Duplicate,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Unassigned => "unassigned",
            Self::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a track call
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Recorded(Event),
    Rejected(RejectReason),
}

impl TrackOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }

    pub fn event(&self) -> Option<&Event> {
        match self {
            Self::Recorded(event) => Some(event),
            Self::Rejected(_) => None,
        }
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Recorded(_) => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

// ============================================================================
// Event Recorder
// ============================================================================

/// Service recording outcome events against assignments
#[derive(Debug, Clone)]
pub struct EventRecorder {
    tests: Arc<dyn TestRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    events: Arc<dyn EventLog>,
    deduplicate: bool,
}

impl EventRecorder {
    pub fn new(
        tests: Arc<dyn TestRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        events: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            tests,
            assignments,
            events,
            deduplicate: false,
        }
    }

    /// Reject a second event for the same (test, user, metric)
    pub fn with_deduplication(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    /// Record an event; never creates an assignment
    pub async fn track(&self, request: TrackEventRequest) -> Result<TrackOutcome, DomainError> {
        validate_user_id(&request.user_id)?;
        validate_metric_name(&request.metric_name)?;

        let value = request.value.unwrap_or(1.0);
        if !value.is_finite() {
            return Err(DomainError::validation(format!(
                "Event value must be finite, got {}",
                value
            )));
        }

        let test = load_test(self.tests.as_ref(), &request.test_id).await?;

        if !test.status().accepts_traffic() {
            return Ok(self.reject(&request, RejectReason::Inactive));
        }

        let key = AssignmentKey::new(test.id().clone(), request.user_id.as_str());
        let Some(assignment) = self.assignments.get(&key).await? else {
            return Ok(self.reject(&request, RejectReason::Unassigned));
        };

        let mut event = Event::new(
            assignment.test_id,
            assignment.user_id,
            assignment.variation_id,
            request.metric_name.as_str(),
        )
        .with_value(value);

        if let Some(metadata) = request.metadata.clone() {
            event = event.with_metadata(metadata);
        }

        let stored = if self.deduplicate {
            match self.events.append_unique(event).await? {
                Some(stored) => stored,
                None => return Ok(self.reject(&request, RejectReason::Duplicate)),
            }
        } else {
            self.events.append(event).await?
        };

        debug!(
            test_id = %stored.test_id,
            user_id = %stored.user_id,
            variation_id = %stored.variation_id,
            metric = %stored.metric_name,
            sequence = stored.sequence,
            "Event recorded"
        );
        record_event(&request.test_id, "recorded");

        Ok(TrackOutcome::Recorded(stored))
    }

    /// Events of a test in append order
    pub async fn list_events(&self, test_id: &str) -> Result<Vec<Event>, DomainError> {
        let test = load_test(self.tests.as_ref(), test_id).await?;
        self.events.list_by_test(test.id()).await
    }

    fn reject(&self, request: &TrackEventRequest, reason: RejectReason) -> TrackOutcome {
        debug!(
            test_id = %request.test_id,
            user_id = %request.user_id,
            metric = %request.metric_name,
            reason = %reason,
            "Event rejected"
        );
        record_event(&request.test_id, reason.as_str());

        TrackOutcome::Rejected(reason)
    }
}
