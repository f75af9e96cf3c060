//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, EnhancementConfig, ExperimentDefaults, LogFormat, LoggingConfig, MetricsConfig,
};
