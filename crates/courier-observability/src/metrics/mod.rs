//! Bus metrics
//!
//! Counters are recorded through the `metrics` facade; they are no-ops until
//! a recorder is installed, e.g. by [`MetricsCollector`].

use ::metrics::{describe_counter, Unit};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::{Config, MetricsConfig};
#[cfg(feature = "prometheus")]
use crate::error::ObservabilityError;
use crate::error::Result;

pub const CALLS_TOTAL: &str = "courier_calls_total";
pub const CALL_ERRORS_TOTAL: &str = "courier_call_errors_total";
pub const DISPATCH_TOTAL: &str = "courier_dispatch_total";
pub const DISPATCH_IGNORED_TOTAL: &str = "courier_dispatch_ignored_total";
pub const HANDLER_ERRORS_TOTAL: &str = "courier_handler_errors_total";
pub const EXTERNAL_REJECTED_TOTAL: &str = "courier_external_rejected_total";

/// Owns the installed recorder
pub struct MetricsCollector {
    #[cfg(feature = "prometheus")]
    handle: Option<PrometheusHandle>,
    config: MetricsConfig,
    initialized: bool,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("config", &self.config)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl MetricsCollector {
    pub async fn new(config: &Config) -> Result<Self> {
        let mut collector = Self {
            #[cfg(feature = "prometheus")]
            handle: None,
            config: config.metrics.clone(),
            initialized: false,
        };

        collector.init()?;

        Ok(collector)
    }

    fn init(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        #[cfg(feature = "prometheus")]
        if self.config.prometheus_enabled {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();

            ::metrics::set_global_recorder(recorder).map_err(|e| {
                ObservabilityError::metrics(format!("Failed to set global recorder: {}", e))
            })?;

            self.handle = Some(handle);
        }

        register_descriptions();
        self.initialized = true;

        tracing::info!(
            target: "courier_observability",
            "Metrics collector initialized"
        );

        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.handle.as_ref().map(|h| h.render()).unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

fn register_descriptions() {
    describe_counter!(CALLS_TOTAL, Unit::Count, "Outbound calls started");
    describe_counter!(
        CALL_ERRORS_TOTAL,
        Unit::Count,
        "Outbound calls that ended in an error, by code"
    );
    describe_counter!(DISPATCH_TOTAL, Unit::Count, "Inbound requests accepted");
    describe_counter!(
        DISPATCH_IGNORED_TOTAL,
        Unit::Count,
        "Inbound messages left unanswered"
    );
    describe_counter!(HANDLER_ERRORS_TOTAL, Unit::Count, "Handlers that failed");
    describe_counter!(
        EXTERNAL_REJECTED_TOTAL,
        Unit::Count,
        "External calls refused by policy"
    );
}

/// Outbound call metrics
pub struct CallMetrics;

impl CallMetrics {
    /// `address` is one of `runtime`, `tab`, `extension`.
    pub fn record_call(bus: &str, address: &'static str) {
        ::metrics::counter!(CALLS_TOTAL, "bus" => bus.to_string(), "address" => address)
            .increment(1);
    }

    pub fn record_error(bus: &str, code: &'static str) {
        ::metrics::counter!(CALL_ERRORS_TOTAL, "bus" => bus.to_string(), "code" => code)
            .increment(1);
    }
}

/// Inbound dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    pub fn record_dispatch(bus: &str) {
        ::metrics::counter!(DISPATCH_TOTAL, "bus" => bus.to_string()).increment(1);
    }

    pub fn record_ignored(bus: &str) {
        ::metrics::counter!(DISPATCH_IGNORED_TOTAL, "bus" => bus.to_string()).increment(1);
    }

    pub fn record_handler_error(bus: &str) {
        ::metrics::counter!(HANDLER_ERRORS_TOTAL, "bus" => bus.to_string()).increment(1);
    }

    pub fn record_external_rejected(bus: &str) {
        ::metrics::counter!(EXTERNAL_REJECTED_TOTAL, "bus" => bus.to_string()).increment(1);
    }
}
