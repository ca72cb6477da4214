//! Courier observability
//!
//! One-call setup for structured logging and bus metrics.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{Config, LoggingConfig, MetricsConfig};
pub use error::{ObservabilityError, Result};
pub use logging::{call_span, dispatch_span, LogManager};
pub use crate::metrics::{CallMetrics, DispatchMetrics, MetricsCollector};

use parking_lot::RwLock;
use std::sync::Arc;

/// Handle to the installed subscriber and recorder
#[derive(Debug)]
pub struct Observability {
    log_manager: Arc<RwLock<LogManager>>,
    metrics: Arc<MetricsCollector>,
    config: Config,
}

impl Observability {
    /// Installs the global subscriber and, if enabled, the metrics recorder.
    pub async fn init(config: Config) -> Result<Self> {
        let log_manager = Arc::new(RwLock::new(LogManager::new(&config).await?));
        let metrics = Arc::new(MetricsCollector::new(&config).await?);

        tracing::info!(
            target: "courier_observability",
            app = %config.app_name,
            "Observability initialized"
        );

        Ok(Self {
            log_manager,
            metrics,
            config,
        })
    }

    /// Convenience for `Observability::init(Config::from_courier_config(..))`.
    pub async fn from_courier_config(config: &courier_config::Config) -> Result<Self> {
        Self::init(Config::from_courier_config(config)).await
    }

    pub fn log_manager(&self) -> Arc<RwLock<LogManager>> {
        Arc::clone(&self.log_manager)
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn update_log_level(&self, level: &str) -> Result<()> {
        self.log_manager.write().update_level(level)
    }
}

pub mod prelude {
    pub use crate::{Config, Observability, Result};

    pub use tracing::{debug, error, info, instrument, trace, warn, Span};
}
