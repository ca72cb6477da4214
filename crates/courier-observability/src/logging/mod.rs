//! Structured logging
//!
//! Installs the global `tracing` subscriber and provides the spans the bus
//! opens around calls and dispatches.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing_subscriber::{
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::{Config, LoggingConfig};
use crate::error::{ObservabilityError, Result};

type ReloadHandle = Handle<EnvFilter, Registry>;

/// Owns the reloadable filter of the global subscriber
#[derive(Debug)]
pub struct LogManager {
    config: LoggingConfig,
    reload_handle: Option<Arc<RwLock<ReloadHandle>>>,
    initialized: bool,
}

impl LogManager {
    /// Installs the global subscriber.
    ///
    /// Fails with [`ObservabilityError::Init`] if another subscriber is
    /// already installed in this process.
    pub async fn new(config: &Config) -> Result<Self> {
        let mut manager = Self {
            config: config.logging.clone(),
            reload_handle: None,
            initialized: false,
        };

        manager.init()?;

        Ok(manager)
    }

    fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let filter = build_filter(&self.config)?;
        let (filter, reload_handle) = reload::Layer::new(filter);

        let registry = tracing_subscriber::registry().with(filter);

        let installed = if self.config.json_format {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(self.config.include_target)
                .with_thread_ids(self.config.include_thread_id)
                .with_line_number(self.config.include_line_number)
                .with_ansi(false);
            registry.with(layer).try_init()
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(self.config.include_target)
                .with_thread_ids(self.config.include_thread_id)
                .with_line_number(self.config.include_line_number)
                .with_ansi(self.config.ansi_colors);
            registry.with(layer).try_init()
        };
        installed.map_err(|e| ObservabilityError::init(e.to_string()))?;

        self.reload_handle = Some(Arc::new(RwLock::new(reload_handle)));
        self.initialized = true;

        tracing::info!(
            target: "courier_observability",
            "Log manager initialized with level: {}",
            self.config.level
        );

        Ok(())
    }

    /// Swaps the active filter without reinstalling the subscriber.
    pub fn update_level(&mut self, level: &str) -> Result<()> {
        let new_filter = EnvFilter::try_new(level)
            .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

        let Some(ref handle) = self.reload_handle else {
            return Err(ObservabilityError::logging("Log manager not initialized"));
        };

        handle
            .write()
            .modify(|filter| *filter = new_filter)
            .map_err(|e| ObservabilityError::logging(format!("Failed to update log level: {}", e)))?;

        self.config.level = level.to_string();

        tracing::info!(
            target: "courier_observability",
            "Log level updated to: {}",
            level
        );

        Ok(())
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Builds the `EnvFilter` for a logging config, including module overrides.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

    for (module, level) in &config.module_levels {
        filter = filter.add_directive(
            format!("{}={}", module, level)
                .parse()
                .map_err(|e| ObservabilityError::logging(format!("Invalid directive: {}", e)))?,
        );
    }

    Ok(filter)
}

/// Span for one outbound call
pub fn call_span(bus: &str, target: &str, path: &str, call_id: &str) -> tracing::Span {
    tracing::info_span!(
        "call",
        bus = %bus,
        target = %target,
        path = %path,
        call_id = %call_id,
    )
}

/// Span for one inbound dispatch
pub fn dispatch_span(bus: &str, source: &str, path: &str) -> tracing::Span {
    tracing::debug_span!(
        "dispatch",
        bus = %bus,
        source = %source,
        path = %path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_manager_init_and_update() {
        let config = Config::default()
            .with_log_level("debug")
            .with_json_format(false);

        let mut manager = LogManager::new(&config).await.unwrap();
        assert!(manager.is_initialized());

        manager.update_level("warn").unwrap();
        assert_eq!(manager.config().level, "warn");

        assert!(manager.update_level("courier_router=verbose").is_err());

        // The global subscriber is already taken now
        let second = LogManager::new(&config).await;
        assert!(matches!(second, Err(ObservabilityError::Init { .. })));
    }

    #[test]
    fn test_build_filter_with_modules() {
        let config = Config::default()
            .with_log_level("info")
            .with_module_level("courier_router", "trace");
        let filter = build_filter(&config.logging).unwrap();
        assert!(filter.to_string().contains("courier_router=trace"));
    }

    #[test]
    fn test_bad_module_directive() {
        let config = Config::default()
            .with_log_level("info")
            .with_module_level("courier_router", "verbose");
        assert!(build_filter(&config.logging).is_err());
    }

    #[test]
    fn test_create_spans() {
        let span = call_span("popup", "background", "tabs/list", "c-1");
        assert_eq!(span.metadata().map(|m| m.name()), Some("call"));

        let span = dispatch_span("background", "popup", "tabs/list");
        assert_eq!(span.metadata().map(|m| m.name()), Some("dispatch"));
    }
}
