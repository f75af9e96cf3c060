//! Statistical analyzer
//!
//! Aggregates the primary metric per variation and compares every candidate
//! against control. Rate metrics use a two-proportion z-test; sum and average
//! metrics use Welch's t-test. Guarded cases (no data, small samples, zero
//! variance) produce a not-significant result instead of an error.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::load_test;
use crate::domain::experiment::{
    Assignment, AssignmentRepository, ConfidenceInterval, Event, EventLog, MetricDirection,
    MetricKind, SignificanceMethod, SignificanceResult, SignificanceStatus, Test, TestRepository,
    TestResults, VariationId, VariationMetrics, WinnerDecision,
};
use crate::domain::DomainError;
use crate::infrastructure::experiment::{
    critical_z, mean, mean_margin, proportion_margin, std_dev, two_proportion_z_test,
    two_tailed_p_value, welch_t_test,
};

/// Aggregated metrics of a variation plus the per-sample values behind them
#[derive(Debug, Clone)]
pub struct VariationSample {
    pub metrics: VariationMetrics,
    /// Per-user totals for sum metrics, event values for average metrics,
    /// empty for rate metrics
    pub values: Vec<f64>,
}

/// Service computing test results on demand
#[derive(Debug, Clone)]
pub struct StatisticalAnalyzer {
    tests: Arc<dyn TestRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    events: Arc<dyn EventLog>,
}

impl StatisticalAnalyzer {
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

    /// Compute the full results of a test
    pub async fn get_results(&self, test_id: &str) -> Result<TestResults, DomainError> {
        let test = load_test(self.tests.as_ref(), test_id).await?;
        let assignments = self.assignments.list_by_test(test.id()).await?;
        let events = self.events.list_by_test(test.id()).await?;

        let results = analyze(&test, &assignments, &events);

        debug!(
            test_id = %test_id,
            assignments = assignments.len(),
            events = events.len(),
            winner = ?results.winner.winner_variation_id.as_ref().map(|v| v.as_str()),
            "Computed test results"
        );

        Ok(results)
    }

    /// Winner decision of a test
    pub async fn determine_winner(&self, test_id: &str) -> Result<WinnerDecision, DomainError> {
        Ok(self.get_results(test_id).await?.winner)
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Compute results from a snapshot of assignments and events
pub fn analyze(test: &Test, assignments: &[Assignment], events: &[Event]) -> TestResults {
    let alpha = test.significance_threshold();
    let z = critical_z(alpha);
    let samples = aggregate(test, assignments, events);

    let confidence_intervals = samples
        .iter()
        .filter_map(|sample| {
            confidence_interval(test.metric_kind(), &sample.metrics, z, 1.0 - alpha)
                .map(|ci| (sample.metrics.variation_id.clone(), ci))
        })
        .collect::<BTreeMap<_, _>>();

    let mut comparisons = Vec::new();

    if let Some(control) = samples.iter().find(|s| s.metrics.is_control()) {
        for candidate in samples.iter().filter(|s| !s.metrics.is_control()) {
            comparisons.push(significance(
                test.metric_kind(),
                control,
                candidate,
                alpha,
                test.min_sample_size(),
            ));
        }
    }

    let variation_metrics: Vec<VariationMetrics> =
        samples.into_iter().map(|s| s.metrics).collect();
    let winner = determine_winner(&variation_metrics, &comparisons, test.metric_direction());

    TestResults {
        test_id: test.id().to_string(),
        status: test.status(),
        primary_metric: test.primary_metric().to_string(),
        metric_kind: test.metric_kind(),
        metric_direction: test.metric_direction(),
        variation_metrics,
        confidence_intervals,
        comparisons,
        winner,
        computed_at: Utc::now(),
    }
}

/// Aggregate the primary metric per variation, in the test's variation order
///
/// Only events whose metric is the test's primary metric qualify, and only
/// from users currently assigned to the variation they were recorded under.
/// Events left behind by a forced move count for neither variation.
pub fn aggregate(
    test: &Test,
    assignments: &[Assignment],
    events: &[Event],
) -> Vec<VariationSample> {
    let mut assigned: HashMap<&VariationId, HashSet<&str>> = HashMap::new();
    for assignment in assignments {
        assigned
            .entry(&assignment.variation_id)
            .or_default()
            .insert(assignment.user_id.as_str());
    }

    let mut qualifying: HashMap<&VariationId, Vec<&Event>> = HashMap::new();
    for event in events.iter().filter(|e| e.is_for_metric(test.primary_metric())) {
        qualifying.entry(&event.variation_id).or_default().push(event);
    }

    test.variations()
        .iter()
        .map(|variation| {
            let users = assigned.get(variation.id()).cloned().unwrap_or_default();
            let variation_events: Vec<&Event> = qualifying
                .get(variation.id())
                .map(|events| {
                    events
                        .iter()
                        .copied()
                        .filter(|e| users.contains(e.user_id.as_str()))
                        .collect()
                })
                .unwrap_or_default();

            let converted: HashSet<&str> =
                variation_events.iter().map(|e| e.user_id.as_str()).collect();

            let mut metrics = VariationMetrics::new(
                variation.id().clone(),
                variation.role(),
                variation.generation_method(),
            );
            metrics.assigned_users = users.len() as u64;
            metrics.event_count = variation_events.len() as u64;
            metrics.converted_users = converted.len() as u64;

            let values = match test.metric_kind() {
                MetricKind::Rate => {
                    metrics.sample_size = metrics.assigned_users;
                    if metrics.assigned_users > 0 {
                        metrics.value =
                            Some(metrics.converted_users as f64 / metrics.assigned_users as f64);
                    }
                    Vec::new()
                }
                MetricKind::Sum => {
                    let mut per_user: BTreeMap<&str, f64> =
                        users.iter().map(|user| (*user, 0.0)).collect();
                    for event in &variation_events {
                        *per_user.entry(event.user_id.as_str()).or_default() += event.value;
                    }

                    let values: Vec<f64> = per_user.into_values().collect();
                    metrics.sample_size = values.len() as u64;
                    if !values.is_empty() {
                        metrics.value =
                            Some(variation_events.iter().fold(0.0, |total, e| total + e.value));
                    }
                    values
                }
                MetricKind::Average => {
                    let values: Vec<f64> = variation_events.iter().map(|e| e.value).collect();
                    metrics.sample_size = values.len() as u64;
                    if !values.is_empty() {
                        metrics.value = Some(mean(&values));
                    }
                    values
                }
            };

            if values.len() >= 2 {
                metrics.std_dev = Some(std_dev(&values));
            }

            VariationSample { metrics, values }
        })
        .collect()
}

/// Confidence interval of a variation's value at critical value `z`
///
/// Rates use the proportion standard error. Averages use the sample standard
/// deviation over `sqrt(n)`, and sums scale that per-user interval by `n`;
/// both are normal approximations.
pub fn confidence_interval(
    kind: MetricKind,
    metrics: &VariationMetrics,
    z: f64,
    confidence_level: f64,
) -> Option<ConfidenceInterval> {
    let value = metrics.value?;
    let n = metrics.sample_size;

    let margin = match kind {
        MetricKind::Rate => proportion_margin(value, n, z)?,
        MetricKind::Average => mean_margin(metrics.std_dev?, n, z)?,
        MetricKind::Sum => mean_margin(metrics.std_dev?, n, z)? * n as f64,
    };

    Some(ConfidenceInterval::new(value, margin, confidence_level))
}

/// Compare a candidate against control
///
/// Below `min_sample_size` on either side the result is never significant,
/// though the statistic is still reported when it can be computed.
pub fn significance(
    kind: MetricKind,
    control: &VariationSample,
    candidate: &VariationSample,
    alpha: f64,
    min_sample_size: u64,
) -> SignificanceResult {
    let method = match kind {
        MetricKind::Rate => SignificanceMethod::TwoProportionZTest,
        MetricKind::Sum | MetricKind::Average => SignificanceMethod::WelchTTest,
    };

    let control_samples = control.metrics.sample_size;
    let candidate_samples = candidate.metrics.sample_size;

    let guarded = |status| {
        SignificanceResult::not_computed(
            control.metrics.variation_id.clone(),
            candidate.metrics.variation_id.clone(),
            method,
            status,
            alpha,
            control_samples,
            candidate_samples,
        )
    };

    if control_samples == 0 || candidate_samples == 0 {
        return guarded(SignificanceStatus::NoData);
    }

    let computed = match kind {
        MetricKind::Rate => two_proportion_z_test(
            control.metrics.converted_users,
            control_samples,
            candidate.metrics.converted_users,
            candidate_samples,
        )
        .map(|z_stat| {
            let p_value = two_tailed_p_value(z_stat);
            (z_stat, p_value, z_stat.abs() >= critical_z(alpha))
        }),
        MetricKind::Sum | MetricKind::Average => welch_t_test(&control.values, &candidate.values)
            .map(|welch| (welch.t, welch.p_value, welch.p_value < alpha)),
    };

    let Some((statistic, p_value, passes)) = computed else {
        return guarded(SignificanceStatus::ZeroVariance);
    };

    let enough_samples = control_samples >= min_sample_size && candidate_samples >= min_sample_size;

    let mut result = guarded(if enough_samples {
        SignificanceStatus::Computed
    } else {
        SignificanceStatus::InsufficientSample
    });
    result.statistic = Some(statistic);
    result.p_value = Some(p_value);
    result.significant = enough_samples && passes;
    result
}

/// Pick the best candidate and declare it winner only if it is significant
/// and better than control in the metric's direction
///
/// Candidates without primary-metric events are not considered.
pub fn determine_winner(
    metrics: &[VariationMetrics],
    comparisons: &[SignificanceResult],
    direction: MetricDirection,
) -> WinnerDecision {
    let control = metrics.iter().find(|m| m.is_control());

    let best = metrics
        .iter()
        .filter(|m| !m.is_control() && m.has_events())
        .filter_map(|m| m.value.map(|value| (m, value)))
        .fold(None, |best: Option<(&VariationMetrics, f64)>, (m, value)| match best {
            Some((_, best_value)) if !direction.is_better(value, best_value) => best,
            _ => Some((m, value)),
        });

    let Some((best, best_value)) = best else {
        return WinnerDecision::none();
    };

    let control_value = control.and_then(|c| c.value);
    let comparison = comparisons
        .iter()
        .find(|c| c.candidate_variation_id == best.variation_id)
        .cloned();

    let improvement_pct = control_value
        .filter(|c| *c != 0.0)
        .map(|c| (best_value - c) / c * 100.0);

    let improves = control_value.is_some_and(|c| direction.is_better(best_value, c));
    let significant = improves && comparison.as_ref().is_some_and(|c| c.significant);

    WinnerDecision {
        winner_variation_id: significant.then(|| best.variation_id.clone()),
        best_candidate_id: Some(best.variation_id.clone()),
        significant,
        improvement_pct,
        comparison,
    }
}
