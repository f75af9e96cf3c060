//! Observability infrastructure - Prometheus metrics

mod metrics;

pub use metrics::{
    init_metrics, record_assignment, record_event, record_lifecycle_transition,
    record_variation_generated, PrometheusMetrics,
};
