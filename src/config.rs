//! Configuration types for capguard

use crate::money::Money;
use crate::telemetry::LogFormat;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limits: RiskLimits,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Hard risk limits, constructed once at startup and shared read-only.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RiskLimits {
    /// Maximum notional value of a single position
    #[serde(default = "default_max_position_size")]
    pub max_position_size: Money,

    /// Maximum combined notional value of all open positions
    #[serde(default = "default_max_portfolio_exposure")]
    pub max_portfolio_exposure: Money,

    /// Maximum realized loss per session before the breaker trips
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: Money,

    /// Maximum drawdown from the session peak, in percent
    #[serde(default = "default_max_drawdown_percent")]
    pub max_drawdown_percent: Decimal,

    /// Maximum account leverage
    #[serde(default = "default_max_leverage")]
    pub max_leverage: Decimal,

    /// Maximum share of open positions in one base asset (0..1)
    #[serde(default = "default_max_correlation_exposure")]
    pub max_correlation_exposure: Decimal,

    /// Alert threshold for 95% Value-at-Risk
    #[serde(default = "default_var_95_limit")]
    pub var_95_limit: Money,

    /// Maximum number of concurrently open positions
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,

    /// Minimum profit target for sizing callers, in percent
    #[serde(default = "default_min_profit_target_percent")]
    pub min_profit_target_percent: Decimal,
}

fn default_max_position_size() -> Money {
    Money::from(Decimal::new(1_000, 0))
}
fn default_max_portfolio_exposure() -> Money {
    Money::from(Decimal::new(10_000, 0))
}
fn default_max_daily_loss() -> Money {
    Money::from(Decimal::new(500, 0))
}
fn default_max_drawdown_percent() -> Decimal {
    Decimal::new(15, 0)
}
fn default_max_leverage() -> Decimal {
    Decimal::new(3, 0)
}
fn default_max_correlation_exposure() -> Decimal {
    Decimal::new(7, 1) // 0.7
}
fn default_var_95_limit() -> Money {
    Money::from(Decimal::new(1_000, 0))
}
fn default_max_open_positions() -> usize {
    10
}
fn default_min_profit_target_percent() -> Decimal {
    Decimal::new(5, 1) // 0.5%
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: default_max_position_size(),
            max_portfolio_exposure: default_max_portfolio_exposure(),
            max_daily_loss: default_max_daily_loss(),
            max_drawdown_percent: default_max_drawdown_percent(),
            max_leverage: default_max_leverage(),
            max_correlation_exposure: default_max_correlation_exposure(),
            var_95_limit: default_var_95_limit(),
            max_open_positions: default_max_open_positions(),
            min_profit_target_percent: default_min_profit_target_percent(),
        }
    }
}

/// Monitoring loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Interval between monitoring cycles in milliseconds
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,

    /// Trailing percent assigned to every new position by default
    #[serde(default = "default_trailing_percent")]
    pub default_trailing_percent: Decimal,

    /// Depth of the intent queue feeding the monitoring loop
    #[serde(default = "default_intent_queue_depth")]
    pub intent_queue_depth: usize,
}

fn default_monitor_interval_ms() -> u64 {
    1_000
}
fn default_trailing_percent() -> Decimal {
    Decimal::new(5, 0)
}
fn default_intent_queue_depth() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monitor_interval_ms: default_monitor_interval_ms(),
            default_trailing_percent: default_trailing_percent(),
            intent_queue_depth: default_intent_queue_depth(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

fn default_metrics_port() -> u16 {
    9090
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
