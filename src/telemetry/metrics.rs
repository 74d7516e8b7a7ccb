//! Prometheus metrics

use crate::portfolio::RiskMetrics;

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Total notional exposure
    TotalExposure,
    /// Portfolio value (exposure + unrealized P&L)
    PortfolioValue,
    /// Unrealized P&L
    UnrealizedPnl,
    /// Realized P&L for the session
    DailyPnl,
    /// 95% Value-at-Risk
    Var95,
    /// Open position count
    OpenPositions,
    /// Circuit breaker latch (0/1)
    CircuitBreaker,
    /// Emergency shutdown latch (0/1)
    EmergencyShutdown,
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::TotalExposure => "capguard_total_exposure_usd",
            GaugeMetric::PortfolioValue => "capguard_portfolio_value_usd",
            GaugeMetric::UnrealizedPnl => "capguard_unrealized_pnl_usd",
            GaugeMetric::DailyPnl => "capguard_daily_pnl_usd",
            GaugeMetric::Var95 => "capguard_var_95_usd",
            GaugeMetric::OpenPositions => "capguard_open_positions",
            GaugeMetric::CircuitBreaker => "capguard_circuit_breaker_triggered",
            GaugeMetric::EmergencyShutdown => "capguard_emergency_shutdown_triggered",
        }
    }
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Count a circuit-breaker or emergency-shutdown transition
pub fn record_risk_event() {
    metrics::counter!("capguard_risk_events_total").increment(1);
}

/// Publish the full per-cycle metrics snapshot. The only place monetary
/// values are converted to float, for export.
pub fn publish_metrics(snapshot: &RiskMetrics) {
    set_gauge(GaugeMetric::TotalExposure, snapshot.total_exposure.to_f64_lossy());
    set_gauge(GaugeMetric::PortfolioValue, snapshot.portfolio_value.to_f64_lossy());
    set_gauge(GaugeMetric::UnrealizedPnl, snapshot.unrealized_pnl.to_f64_lossy());
    set_gauge(GaugeMetric::DailyPnl, snapshot.daily_pnl.to_f64_lossy());
    set_gauge(GaugeMetric::Var95, snapshot.var_95.to_f64_lossy());
    set_gauge(GaugeMetric::OpenPositions, snapshot.open_positions as f64);
    set_gauge(
        GaugeMetric::CircuitBreaker,
        if snapshot.circuit_breaker_triggered { 1.0 } else { 0.0 },
    );
    set_gauge(
        GaugeMetric::EmergencyShutdown,
        if snapshot.emergency_shutdown_triggered { 1.0 } else { 0.0 },
    );
}
