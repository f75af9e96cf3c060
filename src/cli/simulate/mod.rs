//! Simulate command - runs a synthetic experiment end to end
//!
//! Creates a test, starts it, assigns synthetic users, draws outcomes from a
//! seeded RNG, stops the test and prints its analytics as JSON.

use clap::{Args, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::domain::experiment::{ContentPayload, MetricKind};
use crate::infrastructure::observability::init_metrics;
use crate::infrastructure::services::{
    CreateTestRequest, ExperimentService, GenerationRequest, TrackEventRequest, VariationSource,
};

const SIMULATION_TEST_ID: &str = "simulation";

/// Metric kind of the simulated test
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SimulatedMetric {
    Rate,
    Sum,
    Average,
}

impl From<SimulatedMetric> for MetricKind {
    fn from(metric: SimulatedMetric) -> Self {
        match metric {
            SimulatedMetric::Rate => MetricKind::Rate,
            SimulatedMetric::Sum => MetricKind::Sum,
            SimulatedMetric::Average => MetricKind::Average,
        }
    }
}

/// Arguments for the simulate command
#[derive(Args, Clone)]
pub struct SimulateArgs {
    /// Number of synthetic users
    #[arg(long, default_value_t = 1000)]
    pub users: u32,

    /// Number of non-control variations
    #[arg(long, default_value_t = 1)]
    pub variants: u16,

    /// Traffic allocation percentage
    #[arg(long, default_value_t = 100)]
    pub allocation: u8,

    /// Conversion probability of the control
    #[arg(long, default_value_t = 0.10)]
    pub control_rate: f64,

    /// Relative lift of every variant over the control, e.g. 0.5 for +50%
    #[arg(long, default_value_t = 0.5)]
    pub lift: f64,

    /// Primary metric kind
    #[arg(long, value_enum, default_value_t = SimulatedMetric::Rate)]
    pub metric: SimulatedMetric,

    /// RNG seed for outcome draws
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Subject line of the control content
    #[arg(long, default_value = "Spring sale starts now")]
    pub subject: String,

    /// Generate variations with the configured content enhancer
    #[arg(long)]
    pub ai: bool,

    /// Log level (overrides config)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Run the simulate command
pub async fn run(args: SimulateArgs) -> anyhow::Result<()> {
    let config = super::init(args.log_level.as_deref());
    let metrics = init_metrics(&config.metrics);
    let service = crate::create_experiment_service(&config)?;

    let analytics = simulate(&service, &args).await?;
    println!("{}", serde_json::to_string_pretty(&analytics)?);

    if let Some(metrics) = metrics {
        eprintln!("{}", metrics.render());
    }

    Ok(())
}

/// Drive one synthetic test through its whole lifecycle
pub async fn simulate(
    service: &ExperimentService,
    args: &SimulateArgs,
) -> anyhow::Result<crate::domain::experiment::TestAnalytics> {
    let metric_kind = MetricKind::from(args.metric);

    let mut generation = GenerationRequest::new(
        ContentPayload::new("Our biggest sale of the season.")
            .with_subject(&args.subject)
            .with_call_to_action("Shop now"),
        args.variants,
    );
    if args.ai {
        generation = generation.with_ai_assistance();
    }

    let request = CreateTestRequest::new(
        "Simulated subject line test",
        "conversion",
        metric_kind,
        VariationSource::Generated(generation),
    )
    .with_id(SIMULATION_TEST_ID)
    .with_traffic_allocation_pct(args.allocation);

    service.create_test(request).await?;
    service.start_test(SIMULATION_TEST_ID).await?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut included = 0u32;

    for i in 0..args.users {
        let user_id = format!("user-{}", i);

        let Some(assignment) = service
            .assign_user(SIMULATION_TEST_ID, &user_id, None)
            .await?
        else {
            continue;
        };
        included += 1;

        let lift = if assignment.variation_id.as_str() == "control" {
            1.0
        } else {
            1.0 + args.lift
        };

        let probability = (args.control_rate * lift).clamp(0.0, 1.0);
        if !rng.gen_bool(probability) {
            continue;
        }

        let mut event = TrackEventRequest::new(SIMULATION_TEST_ID, &user_id, "conversion");
        if !matches!(metric_kind, MetricKind::Rate) {
            event = event.with_value(rng.gen_range(10.0..100.0) * lift);
        }

        service.track_event(event).await?;
    }

    service
        .stop_test(SIMULATION_TEST_ID, "simulation finished")
        .await?;

    info!(users = args.users, included, "Simulation finished");

    Ok(service.get_analytics(SIMULATION_TEST_ID).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use crate::domain::experiment::TestStatus;
    use crate::infrastructure::services::VariationGenerator;
    use clap::Parser;

    fn parse(extra: &[&str]) -> SimulateArgs {
        let mut argv = vec!["pmp-content-experiments", "simulate"];
        argv.extend_from_slice(extra);

        match Cli::parse_from(argv).command {
            Command::Simulate(args) => args,
            Command::Generate(_) => panic!("expected simulate command"),
        }
    }

    #[test]
    fn test_default_args() {
        let args = parse(&[]);
        assert_eq!(args.users, 1000);
        assert_eq!(args.allocation, 100);
        assert_eq!(args.seed, 42);
        assert!(matches!(args.metric, SimulatedMetric::Rate));
    }

    #[tokio::test]
    async fn test_simulation_completes_test() {
        let service = ExperimentService::in_memory(VariationGenerator::new());
        let args = parse(&["--users", "400", "--allocation", "50", "--lift", "2.0"]);

        let analytics = simulate(&service, &args).await.unwrap();

        assert_eq!(analytics.test_info.status, TestStatus::Completed);
        assert_eq!(analytics.test_info.stop_reason.as_deref(), Some("simulation finished"));

        let assigned = analytics.participation.total_assigned;
        assert!((150..=250).contains(&assigned), "assigned {}", assigned);
        assert!(analytics.participation.total_events > 0);
    }

    #[tokio::test]
    async fn test_simulation_is_reproducible() {
        let args = parse(&["--users", "200", "--metric", "sum", "--seed", "7"]);

        let first = simulate(&ExperimentService::in_memory(VariationGenerator::new()), &args)
            .await
            .unwrap();
        let second = simulate(&ExperimentService::in_memory(VariationGenerator::new()), &args)
            .await
            .unwrap();

        assert_eq!(
            first.participation.per_variation_counts,
            second.participation.per_variation_counts
        );
        assert_eq!(
            first.performance.per_variation_metrics,
            second.performance.per_variation_metrics
        );
    }
}
