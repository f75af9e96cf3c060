//! Infrastructure services
//!
//! The experiment components, each over injected stores, and the
//! [`ExperimentService`] facade that combines them.

mod analytics_reporter;
mod assignment_engine;
mod event_recorder;
mod experiment_service;
mod lifecycle_controller;
mod statistical_analyzer;
mod variation_generator;

pub use analytics_reporter::AnalyticsReporter;
pub use assignment_engine::AssignmentEngine;
pub use event_recorder::{EventRecorder, RejectReason, TrackEventRequest, TrackOutcome};
pub use experiment_service::ExperimentService;
pub use lifecycle_controller::{CreateTestRequest, LifecycleController, VariationSource};
pub use statistical_analyzer::{
    aggregate, analyze, confidence_interval, determine_winner, significance, StatisticalAnalyzer,
    VariationSample,
};
pub use variation_generator::{
    rule_based_content, GenerationOutcome, GenerationRequest, VariationGenerator,
    DEFAULT_ENHANCEMENT_TIMEOUT, DEFAULT_MAX_CONTENT_CHARS,
};

use crate::domain::experiment::{Test, TestId, TestRepository};
use crate::domain::DomainError;

/// Load a test by its raw ID, mapping absence to `NotFound`
async fn load_test(tests: &dyn TestRepository, id: &str) -> Result<Test, DomainError> {
    let test_id = TestId::new(id)?;

    tests
        .get(&test_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Test '{}' not found", id)))
}
