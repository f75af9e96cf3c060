//! Prometheus metrics infrastructure
//!
//! Counters are emitted through the `metrics` facade and are no-ops until a
//! recorder is installed.

use std::sync::Arc;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Prometheus metrics handle for exporting the current snapshot
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Metrics in the Prometheus text exposition format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::debug!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("content_experiments_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!("Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Count an assignment call (`assigned`, `forced`, `excluded` or `inactive`)
pub fn record_assignment(test_id: &str, outcome: &'static str) {
    counter!(
        "experiment_assignments_total",
        "test_id" => test_id.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Count a track call (`recorded`, `unassigned`, `inactive` or `duplicate`)
pub fn record_event(test_id: &str, outcome: &'static str) {
    counter!(
        "experiment_events_total",
        "test_id" => test_id.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Count a generated variation by generation method
pub fn record_variation_generated(method: &str) {
    counter!("experiment_variations_generated_total", "method" => method.to_string())
        .increment(1);
}

/// Count a lifecycle transition by target status
pub fn record_lifecycle_transition(to: &str) {
    counter!("experiment_lifecycle_transitions_total", "to" => to.to_string()).increment(1);
}
