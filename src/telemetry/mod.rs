//! Telemetry module
//!
//! Metrics and structured logging

mod logging;
mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{publish_metrics, record_risk_event, set_gauge, GaugeMetric};

use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Guard that cleans up telemetry on drop
pub struct TelemetryGuard {
    _priv: (),
}

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, config.log_format)?;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()?;
    tracing::info!(port = config.metrics_port, "prometheus exporter listening");

    Ok(TelemetryGuard { _priv: () })
}
