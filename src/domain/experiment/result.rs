//! Derived result types for metrics and statistical analysis
//!
//! Nothing here is persisted; every value is recomputed from assignments and
//! events on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::entity::{
    GenerationMethod, MetricDirection, MetricKind, Test, TestStatus, VariationId, VariationRole,
};

// ============================================================================
// VariationMetrics
// ============================================================================

/// Aggregated primary-metric figures for one variation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationMetrics {
    pub variation_id: VariationId,
    pub role: VariationRole,
    pub generation_method: GenerationMethod,
    /// Distinct users assigned to the variation
    pub assigned_users: u64,
    /// Primary-metric events of users currently assigned to the variation
    pub event_count: u64,
    /// Distinct users with at least one primary-metric event
    pub converted_users: u64,
    /// Aggregated value per the test's metric kind, `None` when no data backs it
    pub value: Option<f64>,
    /// Sample standard deviation backing the value, when defined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    /// Number of samples behind `value` (users for rate/sum, events for average)
    pub sample_size: u64,
}

impl VariationMetrics {
    /// Empty metrics for a variation
    pub fn new(
        variation_id: VariationId,
        role: VariationRole,
        generation_method: GenerationMethod,
    ) -> Self {
        Self {
            variation_id,
            role,
            generation_method,
            assigned_users: 0,
            event_count: 0,
            converted_users: 0,
            value: None,
            std_dev: None,
            sample_size: 0,
        }
    }

    /// Whether any primary-metric event contributed to this variation
    pub fn has_events(&self) -> bool {
        self.event_count > 0
    }

    pub fn is_control(&self) -> bool {
        self.role.is_control()
    }
}

// ============================================================================
// ConfidenceInterval
// ============================================================================

/// Symmetric confidence interval around a point estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
    pub margin: f64,
    /// Confidence level, e.g. 0.95
    pub confidence_level: f64,
}

impl ConfidenceInterval {
    pub fn new(estimate: f64, margin: f64, confidence_level: f64) -> Self {
        Self {
            estimate,
            lower: estimate - margin,
            upper: estimate + margin,
            margin,
            confidence_level,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

// ============================================================================
// SignificanceResult
// ============================================================================

/// Hypothesis test used for a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceMethod {
    TwoProportionZTest,
    WelchTTest,
}

/// Why a comparison did or did not produce a test statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceStatus {
    /// The statistic was computed
    Computed,
    /// At least one side is below the minimum sample size
    InsufficientSample,
    /// The standard error is zero, so no difference can be tested
    ZeroVariance,
    /// A side has no data at all
    NoData,
}

/// Result of comparing one candidate variation against control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    pub control_variation_id: VariationId,
    pub candidate_variation_id: VariationId,
    pub method: SignificanceMethod,
    pub status: SignificanceStatus,
    /// z or t statistic, candidate minus control
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    pub significant: bool,
    pub alpha: f64,
    pub control_samples: u64,
    pub candidate_samples: u64,
}

impl SignificanceResult {
    /// A guarded, not-significant result carrying the reason
    pub fn not_computed(
        control_variation_id: VariationId,
        candidate_variation_id: VariationId,
        method: SignificanceMethod,
        status: SignificanceStatus,
        alpha: f64,
        control_samples: u64,
        candidate_samples: u64,
    ) -> Self {
        Self {
            control_variation_id,
            candidate_variation_id,
            method,
            status,
            statistic: None,
            p_value: None,
            significant: false,
            alpha,
            control_samples,
            candidate_samples,
        }
    }
}

// ============================================================================
// WinnerDecision
// ============================================================================

/// Outcome of winner selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WinnerDecision {
    /// Winning variation, only set when the best candidate is significant
    pub winner_variation_id: Option<VariationId>,
    /// Best-performing candidate regardless of significance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_candidate_id: Option<VariationId>,
    pub significant: bool,
    /// Relative change of the best candidate over control, `None` if control is 0
    pub improvement_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<SignificanceResult>,
}

impl WinnerDecision {
    /// No candidate had data to compare
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has_winner(&self) -> bool {
        self.winner_variation_id.is_some()
    }
}

// ============================================================================
// TestResults
// ============================================================================

/// Complete statistical results for a test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResults {
    pub test_id: String,
    pub status: TestStatus,
    pub primary_metric: String,
    pub metric_kind: MetricKind,
    pub metric_direction: MetricDirection,
    pub variation_metrics: Vec<VariationMetrics>,
    pub confidence_intervals: BTreeMap<VariationId, ConfidenceInterval>,
    pub comparisons: Vec<SignificanceResult>,
    pub winner: WinnerDecision,
    pub computed_at: DateTime<Utc>,
}

impl TestResults {
    /// Get metrics for a specific variation
    pub fn metrics_for(&self, variation_id: &str) -> Option<&VariationMetrics> {
        self.variation_metrics
            .iter()
            .find(|m| m.variation_id.as_str() == variation_id)
    }

    /// Get the comparison of a candidate against control
    pub fn comparison_for(&self, candidate_id: &str) -> Option<&SignificanceResult> {
        self.comparisons
            .iter()
            .find(|c| c.candidate_variation_id.as_str() == candidate_id)
    }

    /// Check if any comparison reached significance
    pub fn has_significant_result(&self) -> bool {
        self.comparisons.iter().any(|c| c.significant)
    }
}

// ============================================================================
// TestAnalytics
// ============================================================================

/// Summary of a variation for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationSummary {
    pub id: VariationId,
    pub role: VariationRole,
    pub generation_method: GenerationMethod,
    pub weight: u32,
}

/// Descriptive block of the analytics view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestInfo {
    pub id: String,
    pub name: String,
    pub status: TestStatus,
    pub primary_metric: String,
    pub metric_kind: MetricKind,
    pub traffic_allocation_pct: u8,
    pub significance_threshold: f64,
    pub min_sample_size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Hours between start and stop (or now, while active)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
    pub variations: Vec<VariationSummary>,
}

impl From<&Test> for TestInfo {
    fn from(test: &Test) -> Self {
        let duration_hours = test.started_at().map(|started| {
            let end = test.stopped_at().unwrap_or_else(Utc::now);
            (end - started).num_seconds() as f64 / 3600.0
        });

        Self {
            id: test.id().to_string(),
            name: test.name().to_string(),
            status: test.status(),
            primary_metric: test.primary_metric().to_string(),
            metric_kind: test.metric_kind(),
            traffic_allocation_pct: test.traffic_allocation_pct(),
            significance_threshold: test.significance_threshold(),
            min_sample_size: test.min_sample_size(),
            created_at: test.created_at(),
            started_at: test.started_at(),
            stopped_at: test.stopped_at(),
            stop_reason: test.stop_reason().map(str::to_string),
            duration_hours,
            variations: test
                .variations()
                .iter()
                .map(|v| VariationSummary {
                    id: v.id().clone(),
                    role: v.role(),
                    generation_method: v.generation_method(),
                    weight: v.weight(),
                })
                .collect(),
        }
    }
}

/// Participation block of the analytics view
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Participation {
    pub total_assigned: u64,
    pub forced_assignments: u64,
    pub per_variation_counts: BTreeMap<VariationId, u64>,
    /// Events of every metric, not only the primary one
    pub total_events: u64,
}

/// Performance block of the analytics view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Performance {
    pub per_variation_metrics: Vec<VariationMetrics>,
    pub significance: Vec<SignificanceResult>,
    pub confidence_intervals: BTreeMap<VariationId, ConfidenceInterval>,
    pub winner: WinnerDecision,
}

impl From<TestResults> for Performance {
    fn from(results: TestResults) -> Self {
        Self {
            per_variation_metrics: results.variation_metrics,
            significance: results.comparisons,
            confidence_intervals: results.confidence_intervals,
            winner: results.winner,
        }
    }
}

/// Read-only reporting view of a test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAnalytics {
    pub test_info: TestInfo,
    pub participation: Participation,
    pub performance: Performance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_interval_bounds() {
        let ci = ConfidenceInterval::new(0.2, 0.0784, 0.95);
        assert!((ci.lower - 0.1216).abs() < 1e-9);
        assert!((ci.upper - 0.2784).abs() < 1e-9);
        assert!(ci.contains(0.2));
        assert!(!ci.contains(0.3));
    }

    #[test]
    fn test_not_computed_is_never_significant() {
        let result = SignificanceResult::not_computed(
            VariationId::new("control").unwrap(),
            VariationId::new("variant-a").unwrap(),
            SignificanceMethod::TwoProportionZTest,
            SignificanceStatus::InsufficientSample,
            0.05,
            20,
            20,
        );

        assert!(!result.significant);
        assert!(result.statistic.is_none());
        assert!(result.p_value.is_none());
    }

    #[test]
    fn test_empty_winner_decision() {
        let decision = WinnerDecision::none();
        assert!(!decision.has_winner());
        assert!(!decision.significant);
        assert!(decision.improvement_pct.is_none());

        let json = serde_json::to_value(&decision).unwrap();
        assert!(json["winner_variation_id"].is_null());
        assert!(json["improvement_pct"].is_null());
    }

    #[test]
    fn test_variation_metrics_defaults() {
        let metrics = VariationMetrics::new(
            VariationId::new("variant-a").unwrap(),
            VariationRole::variant(0),
            GenerationMethod::AiAssisted,
        );

        assert!(!metrics.has_events());
        assert!(!metrics.is_control());
        assert!(metrics.value.is_none());
    }
}
