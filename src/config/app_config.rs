use serde::Deserialize;

use crate::domain::experiment::{
    DEFAULT_MIN_SAMPLE_SIZE, DEFAULT_SIGNIFICANCE_THRESHOLD, DEFAULT_TRAFFIC_ALLOCATION_PCT,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub experiments: ExperimentDefaults,
    #[serde(default)]
    pub enhancement: EnhancementConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Defaults applied to create requests that leave a field unset
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExperimentDefaults {
    pub significance_threshold: f64,
    pub min_sample_size: u64,
    pub traffic_allocation_pct: u8,
    /// Reject a second event for the same (test, user, metric)
    pub deduplicate_events: bool,
}

/// External content enhancer used for AI-assisted variations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Per-request bound; slower requests fall back to the rule-based transform
    pub timeout_ms: u64,
    /// Enhanced content longer than this is treated as malformed
    pub max_content_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder
    pub enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for ExperimentDefaults {
    fn default() -> Self {
        Self {
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            traffic_allocation_pct: DEFAULT_TRAFFIC_ALLOCATION_PCT,
            deduplicate_events: false,
        }
    }
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 2000,
            max_content_chars: 500,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
