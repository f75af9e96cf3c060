//! Experiment service for content A/B testing
//!
//! Single entry point over the lifecycle, assignment, event, analysis and
//! reporting components. Holds no state of its own beyond the injected stores.

use std::sync::Arc;

use crate::config::ExperimentDefaults;
use crate::domain::experiment::{
    Assignment, AssignmentAudit, AssignmentRepository, EventLog, Test, TestAnalytics, TestQuery,
    TestRepository, TestResults, Variation, WinnerDecision,
};
use crate::domain::DomainError;
use crate::infrastructure::experiment::{
    InMemoryAssignmentRepository, InMemoryEventLog, StorageTestRepository,
};
use crate::infrastructure::storage::InMemoryStorage;

use super::analytics_reporter::AnalyticsReporter;
use super::assignment_engine::AssignmentEngine;
use super::event_recorder::{EventRecorder, TrackEventRequest, TrackOutcome};
use super::lifecycle_controller::{CreateTestRequest, LifecycleController};
use super::statistical_analyzer::StatisticalAnalyzer;
use super::variation_generator::{GenerationRequest, VariationGenerator};

/// Service exposing the experiment operations
#[derive(Debug, Clone)]
pub struct ExperimentService {
    generator: VariationGenerator,
    lifecycle: LifecycleController,
    assignments: AssignmentEngine,
    recorder: EventRecorder,
    analyzer: StatisticalAnalyzer,
    reporter: AnalyticsReporter,
}

impl ExperimentService {
    /// Create a service over the given stores
    pub fn new(
        tests: Arc<dyn TestRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        events: Arc<dyn EventLog>,
        generator: VariationGenerator,
    ) -> Self {
        Self {
            lifecycle: LifecycleController::new(tests.clone(), generator.clone()),
            assignments: AssignmentEngine::new(tests.clone(), assignments.clone()),
            recorder: EventRecorder::new(tests.clone(), assignments.clone(), events.clone()),
            analyzer: StatisticalAnalyzer::new(tests.clone(), assignments.clone(), events.clone()),
            reporter: AnalyticsReporter::new(tests, assignments, events),
            generator,
        }
    }

    /// Create a service backed by in-memory stores
    pub fn in_memory(generator: VariationGenerator) -> Self {
        let storage = Arc::new(InMemoryStorage::<Test>::new());

        Self::new(
            Arc::new(StorageTestRepository::new(storage)),
            Arc::new(InMemoryAssignmentRepository::new()),
            Arc::new(InMemoryEventLog::new()),
            generator,
        )
    }

    /// Apply configured defaults and the event de-duplication knob
    pub fn with_defaults(mut self, defaults: ExperimentDefaults) -> Self {
        self.recorder = self.recorder.with_deduplication(defaults.deduplicate_events);
        self.lifecycle = self.lifecycle.with_defaults(defaults);
        self
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub async fn create_test(&self, request: CreateTestRequest) -> Result<Test, DomainError> {
        self.lifecycle.create(request).await
    }

    pub async fn start_test(&self, test_id: &str) -> Result<Test, DomainError> {
        self.lifecycle.start(test_id).await
    }

    /// Complete an active test
    pub async fn stop_test(&self, test_id: &str, reason: &str) -> Result<Test, DomainError> {
        self.lifecycle.stop(test_id, reason).await
    }

    /// End an active test early
    pub async fn abort_test(&self, test_id: &str, reason: &str) -> Result<Test, DomainError> {
        self.lifecycle.abort(test_id, reason).await
    }

    pub async fn get_test(&self, test_id: &str) -> Result<Test, DomainError> {
        self.lifecycle.get(test_id).await
    }

    pub async fn list_tests(&self, query: &TestQuery) -> Result<Vec<Test>, DomainError> {
        self.lifecycle.list(query).await
    }

    pub async fn list_active_tests(&self) -> Result<Vec<Test>, DomainError> {
        self.lifecycle.list_active().await
    }

    // ========================================================================
    // Traffic
    // ========================================================================

    /// Assign a user; `None` when the test is inactive or the user is excluded
    pub async fn assign_user(
        &self,
        test_id: &str,
        user_id: &str,
        force_variation_id: Option<&str>,
    ) -> Result<Option<Assignment>, DomainError> {
        self.assignments
            .assign(test_id, user_id, force_variation_id)
            .await
    }

    pub async fn get_assignment(
        &self,
        test_id: &str,
        user_id: &str,
    ) -> Result<Option<Assignment>, DomainError> {
        self.assignments.get_assignment(test_id, user_id).await
    }

    pub async fn assignment_audit(
        &self,
        test_id: &str,
    ) -> Result<Vec<AssignmentAudit>, DomainError> {
        self.assignments.audit_log(test_id).await
    }

    pub async fn track_event(
        &self,
        request: TrackEventRequest,
    ) -> Result<TrackOutcome, DomainError> {
        self.recorder.track(request).await
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    pub async fn get_results(&self, test_id: &str) -> Result<TestResults, DomainError> {
        self.analyzer.get_results(test_id).await
    }

    pub async fn determine_winner(&self, test_id: &str) -> Result<WinnerDecision, DomainError> {
        self.analyzer.determine_winner(test_id).await
    }

    pub async fn get_analytics(&self, test_id: &str) -> Result<TestAnalytics, DomainError> {
        self.reporter.get_test_analytics(test_id).await
    }

    /// Preview generated variations without creating a test
    pub async fn generate_variations(&self, request: &GenerationRequest) -> Vec<Variation> {
        self.generator.generate(request).await
    }
}
