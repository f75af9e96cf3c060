//! PMP Content Experiments
//!
//! Experimentation engine for content A/B tests:
//! - Rule-based and AI-assisted variation generation
//! - Deterministic, platform-independent user assignment
//! - Append-only outcome event tracking
//! - Significance testing, confidence intervals and winner selection

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use domain::DomainError;
use infrastructure::enhancement::{HttpClient, OpenAiEnhancer};
use infrastructure::services::{ExperimentService, VariationGenerator};

/// Create the experiment service over in-memory stores
pub fn create_experiment_service(config: &AppConfig) -> Result<ExperimentService, DomainError> {
    let generator = create_variation_generator(config)?;

    Ok(ExperimentService::in_memory(generator).with_defaults(config.experiments.clone()))
}

/// Create the variation generator, with the OpenAI enhancer when enabled
pub fn create_variation_generator(config: &AppConfig) -> Result<VariationGenerator, DomainError> {
    let enhancement = &config.enhancement;
    let timeout = Duration::from_millis(enhancement.timeout_ms);

    let generator = VariationGenerator::new()
        .with_timeout(timeout)
        .with_max_content_chars(enhancement.max_content_chars);

    if !enhancement.enabled {
        return Ok(generator);
    }

    let api_key = enhancement.api_key.as_deref().ok_or_else(|| {
        DomainError::configuration("enhancement.api_key is required when enhancement is enabled")
    })?;

    // the client timeout only backs up the per-slot timeout of the generator
    let client = HttpClient::with_timeout(timeout + Duration::from_secs(1))?;
    let enhancer = OpenAiEnhancer::with_base_url(client, api_key, &enhancement.base_url)
        .with_model(&enhancement.model);

    tracing::info!(model = %enhancement.model, "AI-assisted variation generation enabled");

    Ok(generator.with_enhancer(Arc::new(enhancer)))
}
