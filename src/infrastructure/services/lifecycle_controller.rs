//! Lifecycle controller
//!
//! State machine of a test: Draft -> Active -> Completed | Stopped. Invalid
//! transitions are caller errors and leave the stored test unchanged. Writes
//! are compare-and-set on the stored status, so a stale read cannot undo a
//! newer transition.

use std::sync::Arc;

use tracing::{debug, info};

use super::load_test;
use super::variation_generator::{GenerationRequest, VariationGenerator};
use crate::config::ExperimentDefaults;
use crate::domain::experiment::{
    validate_metric_name, MetricDirection, MetricKind, Test, TestId, TestQuery, TestRepository,
    Variation,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_lifecycle_transition;

// ============================================================================
// Request Types
// ============================================================================

/// Where the variations of a new test come from
#[derive(Debug, Clone)]
pub enum VariationSource {
    /// Caller-supplied variations, including the control
    Explicit(Vec<Variation>),
    /// Produced by the variation generator
    Generated(GenerationRequest),
}

/// Request to create a new test
#[derive(Debug, Clone)]
pub struct CreateTestRequest {
    /// Generated when absent
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub primary_metric: String,
    pub metric_kind: MetricKind,
    pub metric_direction: MetricDirection,
    pub significance_threshold: Option<f64>,
    pub min_sample_size: Option<u64>,
    pub traffic_allocation_pct: Option<u8>,
    pub variations: VariationSource,
}

impl CreateTestRequest {
    pub fn new(
        name: impl Into<String>,
        primary_metric: impl Into<String>,
        metric_kind: MetricKind,
        variations: VariationSource,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            primary_metric: primary_metric.into(),
            metric_kind,
            metric_direction: MetricDirection::default(),
            significance_threshold: None,
            min_sample_size: None,
            traffic_allocation_pct: None,
            variations,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metric_direction(mut self, direction: MetricDirection) -> Self {
        self.metric_direction = direction;
        self
    }

    pub fn with_significance_threshold(mut self, threshold: f64) -> Self {
        self.significance_threshold = Some(threshold);
        self
    }

    pub fn with_min_sample_size(mut self, min_sample_size: u64) -> Self {
        self.min_sample_size = Some(min_sample_size);
        self
    }

    pub fn with_traffic_allocation_pct(mut self, pct: u8) -> Self {
        self.traffic_allocation_pct = Some(pct);
        self
    }
}

// ============================================================================
// Lifecycle Controller
// ============================================================================

/// Service owning test creation and status transitions
#[derive(Debug, Clone)]
pub struct LifecycleController {
    tests: Arc<dyn TestRepository>,
    generator: VariationGenerator,
    defaults: ExperimentDefaults,
}

impl LifecycleController {
    pub fn new(tests: Arc<dyn TestRepository>, generator: VariationGenerator) -> Self {
        Self {
            tests,
            generator,
            defaults: ExperimentDefaults::default(),
        }
    }

    /// Defaults applied to create requests that omit a setting
    pub fn with_defaults(mut self, defaults: ExperimentDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Create a test in Draft status
    pub async fn create(&self, request: CreateTestRequest) -> Result<Test, DomainError> {
        let test_id = match request.id.as_deref() {
            Some(id) => TestId::new(id)?,
            None => TestId::generate(),
        };

        debug!(test_id = %test_id, "Creating test");

        validate_metric_name(&request.primary_metric)?;

        let variations = match request.variations {
            VariationSource::Explicit(variations) => variations,
            VariationSource::Generated(generation) => self.generator.generate(&generation).await,
        };

        let mut test = Test::new(
            test_id,
            request.name,
            request.primary_metric,
            request.metric_kind,
        )
        .with_variations(variations)
        .with_metric_direction(request.metric_direction)
        .with_significance_threshold(
            request
                .significance_threshold
                .unwrap_or(self.defaults.significance_threshold),
        )
        .with_min_sample_size(request.min_sample_size.unwrap_or(self.defaults.min_sample_size))
        .with_traffic_allocation_pct(
            request
                .traffic_allocation_pct
                .unwrap_or(self.defaults.traffic_allocation_pct),
        );

        if let Some(description) = request.description {
            test = test.with_description(description);
        }

        test.validate_definition()?;

        let created = self.tests.create(test).await?;
        info!(
            test_id = %created.id(),
            variations = created.variations().len(),
            "Test created"
        );
        record_lifecycle_transition("draft");

        Ok(created)
    }

    /// Draft -> Active
    pub async fn start(&self, test_id: &str) -> Result<Test, DomainError> {
        let mut test = load_test(self.tests.as_ref(), test_id).await?;
        let from = test.status();
        test.start()?;

        let updated = self.tests.transition(test, from).await?;
        info!(test_id = %test_id, "Test started");
        record_lifecycle_transition("active");

        Ok(updated)
    }

    /// Active -> Completed
    pub async fn stop(&self, test_id: &str, reason: &str) -> Result<Test, DomainError> {
        let mut test = load_test(self.tests.as_ref(), test_id).await?;
        let from = test.status();
        test.stop(reason)?;

        let updated = self.tests.transition(test, from).await?;
        info!(test_id = %test_id, reason = %reason, "Test completed");
        record_lifecycle_transition("completed");

        Ok(updated)
    }

    /// Active -> Stopped, for a test ended early
    pub async fn abort(&self, test_id: &str, reason: &str) -> Result<Test, DomainError> {
        let mut test = load_test(self.tests.as_ref(), test_id).await?;
        let from = test.status();
        test.abort(reason)?;

        let updated = self.tests.transition(test, from).await?;
        info!(test_id = %test_id, reason = %reason, "Test stopped");
        record_lifecycle_transition("stopped");

        Ok(updated)
    }

    pub async fn get(&self, test_id: &str) -> Result<Test, DomainError> {
        load_test(self.tests.as_ref(), test_id).await
    }

    pub async fn list(&self, query: &TestQuery) -> Result<Vec<Test>, DomainError> {
        self.tests.list(query).await
    }

    pub async fn list_active(&self) -> Result<Vec<Test>, DomainError> {
        self.tests.list_active().await
    }
}
