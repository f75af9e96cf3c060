//! Experiment domain module for content A/B testing
//!
//! Tests pit a control piece of content against generated variations,
//! assign users deterministically and collect outcome events for analysis.

mod assignment;
mod entity;
mod event;
mod repository;
mod result;
mod validation;

// Re-export all public types
pub use assignment::{Assignment, AssignmentAudit, AssignmentKey};
pub use entity::{
    ContentPayload, GenerationMethod, MetricDirection, MetricKind, Test, TestId, TestStatus,
    Variation, VariationId, VariationRole, DEFAULT_MIN_SAMPLE_SIZE,
    DEFAULT_SIGNIFICANCE_THRESHOLD, DEFAULT_TRAFFIC_ALLOCATION_PCT,
};
pub use event::{Event, EventId};
pub use repository::{AssignmentRepository, EventLog, TestQuery, TestRepository};
pub use result::{
    ConfidenceInterval, Participation, Performance, SignificanceMethod, SignificanceResult,
    SignificanceStatus, TestAnalytics, TestInfo, TestResults, VariationMetrics, VariationSummary,
    WinnerDecision,
};
pub use validation::{
    validate_metric_name, validate_test_id, validate_user_id, validate_variation_id,
    ExperimentValidationError,
};

#[cfg(test)]
pub use repository::mock::MockTestRepository;
