//! Analytics reporter - read-only reporting view of a test

use std::collections::BTreeMap;
use std::sync::Arc;

use super::load_test;
use super::statistical_analyzer::analyze;
use crate::domain::experiment::{
    Assignment, AssignmentRepository, EventLog, Participation, Performance, Test, TestAnalytics,
    TestInfo, TestRepository,
};
use crate::domain::DomainError;

/// Service composing test details, participation and performance
#[derive(Debug, Clone)]
pub struct AnalyticsReporter {
    tests: Arc<dyn TestRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    events: Arc<dyn EventLog>,
}

impl AnalyticsReporter {
    pub fn new(
        tests: Arc<dyn TestRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        events: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            tests,
            assignments,
            events,
        }
    }

    /// Recomputed from the stores on every call
    pub async fn get_test_analytics(&self, test_id: &str) -> Result<TestAnalytics, DomainError> {
        let test = load_test(self.tests.as_ref(), test_id).await?;
        let assignments = self.assignments.list_by_test(test.id()).await?;
        let events = self.events.list_by_test(test.id()).await?;

        let mut participation = participation(&test, &assignments);
        participation.total_events = events.len() as u64;

        Ok(TestAnalytics {
            test_info: TestInfo::from(&test),
            participation,
            performance: Performance::from(analyze(&test, &assignments, &events)),
        })
    }
}

fn participation(test: &Test, assignments: &[Assignment]) -> Participation {
    let mut per_variation_counts: BTreeMap<_, u64> = test
        .variations()
        .iter()
        .map(|v| (v.id().clone(), 0))
        .collect();

    for assignment in assignments {
        *per_variation_counts
            .entry(assignment.variation_id.clone())
            .or_default() += 1;
    }

    Participation {
        total_assigned: assignments.len() as u64,
        forced_assignments: assignments.iter().filter(|a| a.forced).count() as u64,
        per_variation_counts,
        total_events: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{Event, TestId, VariationId};
    use crate::infrastructure::experiment::{InMemoryAssignmentRepository, InMemoryEventLog};
    use crate::infrastructure::services::test_support::{active_test, test_repository};

    #[tokio::test]
    async fn test_analytics_composition() {
        let tests = test_repository(vec![active_test("spring-sale", 2, 100)]).await;
        let assignments = Arc::new(InMemoryAssignmentRepository::new());
        let events = Arc::new(InMemoryEventLog::new());
        let test_id = TestId::new("spring-sale").unwrap();
        let control = VariationId::new("control").unwrap();
        let variant = VariationId::new("variant-a").unwrap();

        assignments
            .insert_if_absent(Assignment::new(test_id.clone(), "user-1", control.clone()))
            .await
            .unwrap();
        assignments
            .insert_if_absent(Assignment::new(test_id.clone(), "user-2", control.clone()))
            .await
            .unwrap();
        assignments
            .force(Assignment::forced(test_id.clone(), "user-3", variant.clone()))
            .await
            .unwrap();

        events
            .append(Event::new(test_id.clone(), "user-1", control.clone(), "conversion"))
            .await
            .unwrap();
        events
            .append(Event::new(test_id.clone(), "user-3", variant.clone(), "click"))
            .await
            .unwrap();

        let reporter = AnalyticsReporter::new(tests, assignments, events);
        let analytics = reporter.get_test_analytics("spring-sale").await.unwrap();

        assert_eq!(analytics.test_info.id, "spring-sale");
        assert_eq!(analytics.test_info.variations.len(), 3);

        let participation = &analytics.participation;
        assert_eq!(participation.total_assigned, 3);
        assert_eq!(participation.forced_assignments, 1);
        assert_eq!(participation.total_events, 2);
        assert_eq!(participation.per_variation_counts[&control], 2);
        assert_eq!(participation.per_variation_counts[&variant], 1);
        assert_eq!(
            participation.per_variation_counts[&VariationId::new("variant-b").unwrap()],
            0
        );

        let performance = &analytics.performance;
        assert_eq!(performance.per_variation_metrics.len(), 3);
        assert_eq!(performance.significance.len(), 2);
        assert_eq!(performance.per_variation_metrics[0].value, Some(0.5));
        assert!(!performance.winner.has_winner());
    }

    #[tokio::test]
    async fn test_analytics_serialize_to_json() {
        let reporter = AnalyticsReporter::new(
            test_repository(vec![active_test("spring-sale", 1, 100)]).await,
            Arc::new(InMemoryAssignmentRepository::new()),
            Arc::new(InMemoryEventLog::new()),
        );

        let analytics = reporter.get_test_analytics("spring-sale").await.unwrap();
        let json = serde_json::to_value(&analytics).unwrap();

        assert_eq!(json["test_info"]["status"], "active");
        assert_eq!(json["participation"]["total_assigned"], 0);
        assert!(json["performance"]["winner"]["winner_variation_id"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_test_is_not_found() {
        let reporter = AnalyticsReporter::new(
            test_repository(vec![]).await,
            Arc::new(InMemoryAssignmentRepository::new()),
            Arc::new(InMemoryEventLog::new()),
        );

        assert!(reporter.get_test_analytics("missing").await.unwrap_err().is_not_found());
    }
}
