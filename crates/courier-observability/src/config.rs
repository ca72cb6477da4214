//! Observability configuration
//!
//! Built in code with the `with_*` helpers, or bridged from the `logging`
//! section of `courier.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name attached to the initialisation log line
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Builds the observability config from a loaded `courier.json`.
    pub fn from_courier_config(config: &courier_config::Config) -> Self {
        Self {
            app_name: config.bus.name.clone(),
            logging: LoggingConfig::from(&config.logging),
            metrics: MetricsConfig::default(),
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }

    pub fn with_json_format(mut self, json: bool) -> Self {
        self.logging.json_format = json;
        self
    }

    /// Adds a per-module level directive, e.g. `courier_router=debug`.
    pub fn with_module_level(mut self, module: impl Into<String>, level: impl Into<String>) -> Self {
        self.logging.module_levels.insert(module.into(), level.into());
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics.enabled = enabled;
        self
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive (trace, debug, info, warn, error, or a full filter)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_false")]
    pub json_format: bool,

    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    #[serde(default = "default_true")]
    pub ansi_colors: bool,

    #[serde(default = "default_true")]
    pub include_target: bool,

    #[serde(default = "default_false")]
    pub include_thread_id: bool,

    #[serde(default = "default_true")]
    pub include_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            module_levels: HashMap::new(),
            ansi_colors: true,
            include_target: true,
            include_thread_id: false,
            include_line_number: true,
        }
    }
}

impl From<&courier_config::LoggingConfig> for LoggingConfig {
    fn from(config: &courier_config::LoggingConfig) -> Self {
        Self {
            level: config.level.as_str().to_string(),
            json_format: config.json,
            ansi_colors: !config.json,
            ..Self::default()
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Install a Prometheus recorder (requires the `prometheus` feature)
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prometheus_enabled: true,
        }
    }
}

fn default_app_name() -> String {
    "courier".to_string()
}

fn default_log_level() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}
