//! CLI module for PMP Content Experiments
//!
//! Provides subcommands for exercising the engine locally:
//! - `simulate`: run a synthetic experiment end to end
//! - `generate`: print the variations generated for a piece of content

pub mod generate;
pub mod simulate;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// PMP Content Experiments - deterministic content A/B testing
#[derive(Parser)]
#[command(name = "pmp-content-experiments")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a synthetic experiment and print its analytics
    Simulate(simulate::SimulateArgs),

    /// Print generated variations for a piece of content
    Generate(generate::GenerateArgs),
}

/// Load `.env` and the layered configuration, then install logging
fn init(log_level: Option<&str>) -> AppConfig {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().unwrap_or_default();
    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }

    logging::init_logging(&config.logging);
    config
}
