//! Risk management controller
//!
//! The public-facing orchestrator: pre-trade validation, position lifecycle,
//! and the per-cycle monitoring step. All mutable session state lives here,
//! behind a single owner; see [`engine`] for the channel facade that
//! preserves the single-writer invariant across threads.

mod engine;

pub use engine::{Intent, PriceTick, RiskEngine, RiskEngineHandle};

use crate::breaker::{CircuitBreaker, RiskEvent, TripReason};
use crate::config::{Config, RiskLimits};
use crate::money::{ArithmeticOverflow, Money};
use crate::portfolio::{self, RiskMetrics};
use crate::position::{Position, PositionKey, Side};
use crate::stops::{StopLoss, StopLossError, StopLossManager, StopLossSpec};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// How urgently a rejection should be surfaced by alerting. Not used for
/// control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Why a trade intent was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("emergency shutdown active")]
    EmergencyShutdownActive,
    #[error("circuit breaker active")]
    CircuitBreakerActive,
    #[error("intent malformed: price {price}, quantity {quantity}")]
    MalformedIntent { price: Money, quantity: Decimal },
    #[error("position value {value} exceeds limit {limit}")]
    PositionTooLarge { value: Money, limit: Money },
    #[error("exposure {current} + {additional} exceeds limit {limit}")]
    ExposureExceeded {
        current: Money,
        additional: Money,
        limit: Money,
    },
    #[error("{open} positions already open, limit {limit}")]
    MaxOpenPositions { open: usize, limit: usize },
    #[error("daily loss {daily_pnl} breaches limit {limit}")]
    DailyLossLimitReached { daily_pnl: Money, limit: Money },
    #[error("correlated exposure ratio {ratio} exceeds limit {limit}")]
    CorrelationTooHigh { ratio: Decimal, limit: Decimal },
    #[error("position already open for this key")]
    DuplicatePosition,
    #[error("default stop-loss rejected: {0}")]
    InvalidStopLoss(StopLossError),
    /// Risk arithmetic failed mid-validation; refusing the trade is the
    /// fail-safe outcome.
    #[error("risk computation failed: {0}")]
    Arithmetic(#[from] ArithmeticOverflow),
}

/// A rejected trade: expected data, not a fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("trade rejected ({severity:?}): {reason}")]
pub struct TradeRejection {
    pub reason: RejectReason,
    pub severity: Severity,
}

impl TradeRejection {
    pub fn new(reason: RejectReason) -> Self {
        let severity = match &reason {
            RejectReason::EmergencyShutdownActive
            | RejectReason::CircuitBreakerActive
            | RejectReason::Arithmetic(_) => Severity::Critical,
            RejectReason::PositionTooLarge { .. }
            | RejectReason::ExposureExceeded { .. }
            | RejectReason::DailyLossLimitReached { .. }
            | RejectReason::MalformedIntent { .. } => Severity::High,
            RejectReason::InvalidStopLoss(_) => Severity::High,
            RejectReason::MaxOpenPositions { .. }
            | RejectReason::CorrelationTooHigh { .. }
            | RejectReason::DuplicatePosition => Severity::Medium,
        };
        Self { reason, severity }
    }
}

impl From<RejectReason> for TradeRejection {
    fn from(reason: RejectReason) -> Self {
        TradeRejection::new(reason)
    }
}

/// A proposed trade submitted for validation
#[derive(Debug, Clone)]
pub struct TradeIntent {
    pub symbol: String,
    pub venue: String,
    pub side: Side,
    pub price: Money,
    pub quantity: Decimal,
}

impl TradeIntent {
    pub fn key(&self) -> PositionKey {
        PositionKey::new(&self.venue, &self.symbol)
    }
}

/// Lifecycle operation errors
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("unknown position {0}")]
    UnknownPosition(PositionKey),
    #[error(transparent)]
    StopLoss(#[from] StopLossError),
    #[error(transparent)]
    Overflow(#[from] ArithmeticOverflow),
}

/// Outcome of one monitoring cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Positions whose stop fired this cycle, awaiting an explicit close
    pub triggered_stops: Vec<PositionKey>,
    /// Breaker transition, if one occurred this cycle
    pub tripped: Option<TripReason>,
    /// Metrics snapshot taken at the end of the cycle
    pub metrics: RiskMetrics,
}

/// Owns all mutable session state: open positions, realized P&L, the session
/// peak, and both latches. Exactly one writer at a time.
pub struct RiskController {
    limits: Arc<RiskLimits>,
    default_trailing_percent: Decimal,
    positions: HashMap<PositionKey, Position>,
    daily_pnl: Money,
    peak_portfolio_value: Money,
    breaker: CircuitBreaker,
    stops: StopLossManager,
}

impl RiskController {
    pub fn new(limits: Arc<RiskLimits>, default_trailing_percent: Decimal) -> Self {
        Self {
            limits,
            default_trailing_percent,
            positions: HashMap::new(),
            daily_pnl: Money::ZERO,
            peak_portfolio_value: Money::ZERO,
            breaker: CircuitBreaker::new(),
            stops: StopLossManager::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(config.limits.clone()),
            config.engine.default_trailing_percent,
        )
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn open_positions(&self) -> &HashMap<PositionKey, Position> {
        &self.positions
    }

    pub fn position(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn daily_pnl(&self) -> Money {
        self.daily_pnl
    }

    pub fn peak_portfolio_value(&self) -> Money {
        self.peak_portfolio_value
    }

    /// The append-only audit trail of breaker/shutdown transitions.
    pub fn risk_events(&self) -> &[RiskEvent] {
        self.breaker.events()
    }

    /// Pre-trade validation. Checks run in fixed order and the first failure
    /// wins: emergency shutdown, circuit breaker, input sanity, position
    /// size, post-trade exposure, open-position count, daily loss,
    /// correlation concentration.
    pub fn validate_new_trade(&self, intent: &TradeIntent) -> Result<(), TradeRejection> {
        match self.validate_inner(intent) {
            Ok(result) => result,
            // Arithmetic failure aborts validation; fail safe by refusing.
            Err(overflow) => Err(RejectReason::Arithmetic(overflow).into()),
        }
    }

    fn validate_inner(
        &self,
        intent: &TradeIntent,
    ) -> Result<Result<(), TradeRejection>, ArithmeticOverflow> {
        if self.breaker.is_emergency() {
            return Ok(Err(RejectReason::EmergencyShutdownActive.into()));
        }
        if self.breaker.is_tripped() {
            return Ok(Err(RejectReason::CircuitBreakerActive.into()));
        }

        if intent.price <= Money::ZERO || intent.quantity <= Decimal::ZERO {
            return Ok(Err(RejectReason::MalformedIntent {
                price: intent.price,
                quantity: intent.quantity,
            }
            .into()));
        }

        let value = intent.price.checked_mul_ratio(intent.quantity)?;
        if value > self.limits.max_position_size {
            return Ok(Err(RejectReason::PositionTooLarge {
                value,
                limit: self.limits.max_position_size,
            }
            .into()));
        }

        let exposure = portfolio::total_exposure(&self.positions)?;
        if exposure.checked_add(value)? > self.limits.max_portfolio_exposure {
            return Ok(Err(RejectReason::ExposureExceeded {
                current: exposure,
                additional: value,
                limit: self.limits.max_portfolio_exposure,
            }
            .into()));
        }

        if self.positions.len() >= self.limits.max_open_positions {
            return Ok(Err(RejectReason::MaxOpenPositions {
                open: self.positions.len(),
                limit: self.limits.max_open_positions,
            }
            .into()));
        }

        if self.daily_pnl < -self.limits.max_daily_loss {
            return Ok(Err(RejectReason::DailyLossLimitReached {
                daily_pnl: self.daily_pnl,
                limit: self.limits.max_daily_loss,
            }
            .into()));
        }

        let ratio = portfolio::correlation_risk(&self.positions, &intent.symbol);
        if ratio > self.limits.max_correlation_exposure {
            return Ok(Err(RejectReason::CorrelationTooHigh {
                ratio,
                limit: self.limits.max_correlation_exposure,
            }
            .into()));
        }

        Ok(Ok(()))
    }

    /// Validate and open a position. Validation is repeated here; callers
    /// are never trusted to have validated separately. On success the
    /// position receives the default trailing stop.
    pub fn add_position(
        &mut self,
        intent: &TradeIntent,
        entry_time: DateTime<Utc>,
    ) -> Result<PositionKey, TradeRejection> {
        self.validate_new_trade(intent)?;

        let key = intent.key();
        if self.positions.contains_key(&key) {
            return Err(RejectReason::DuplicatePosition.into());
        }

        // Default stop policy: trailing at the configured percent.
        let stop = StopLoss::trailing(self.default_trailing_percent, intent.side, intent.price)
            .map_err(|e| TradeRejection::from(RejectReason::InvalidStopLoss(e)))?;

        let position = Position::open(
            key.clone(),
            intent.side,
            intent.price,
            intent.quantity,
            entry_time,
            stop,
        );
        tracing::info!(
            key = %key,
            side = ?intent.side,
            price = %intent.price,
            quantity = %intent.quantity,
            "position opened"
        );
        self.positions.insert(key.clone(), position);
        Ok(key)
    }

    /// Mark a position at a new price. Pure mutation: stop evaluation and
    /// breaker checks happen in the monitoring cycle, never here.
    pub fn update_position_price(
        &mut self,
        key: &PositionKey,
        price: Money,
    ) -> Result<(), RiskError> {
        let position = self
            .positions
            .get_mut(key)
            .ok_or_else(|| RiskError::UnknownPosition(key.clone()))?;
        position.set_price(price);
        Ok(())
    }

    /// Reassign a position's stop-loss. The requested descriptor is
    /// validated before the existing one is replaced; a previously flagged
    /// trigger is cleared along with the old descriptor.
    pub fn set_stop_loss(
        &mut self,
        key: &PositionKey,
        spec: &StopLossSpec,
    ) -> Result<(), RiskError> {
        let position = self
            .positions
            .get_mut(key)
            .ok_or_else(|| RiskError::UnknownPosition(key.clone()))?;
        let stop = StopLoss::from_spec(spec, position.side, position.entry_price)?;
        position.stop = stop;
        self.stops.clear(key);
        Ok(())
    }

    /// Close a position at `exit_price`, committing its realized P&L into
    /// the session total. The realized amount is returned.
    pub fn close_position(
        &mut self,
        key: &PositionKey,
        exit_price: Money,
    ) -> Result<Money, RiskError> {
        let position = self
            .positions
            .get(key)
            .ok_or_else(|| RiskError::UnknownPosition(key.clone()))?;

        // Compute before mutating: an overflow leaves state untouched.
        let realized = position.pnl_at(exit_price)?;
        let updated_pnl = self.daily_pnl.checked_add(realized)?;

        self.daily_pnl = updated_pnl;
        self.positions.remove(key);
        self.stops.clear(key);
        tracing::info!(
            key = %key,
            exit_price = %exit_price,
            realized = %realized,
            daily_pnl = %self.daily_pnl,
            "position closed"
        );
        Ok(realized)
    }

    /// One monitoring cycle: advance trailing stops, evaluate stop triggers,
    /// evaluate the breaker, ratchet the session peak, snapshot metrics.
    ///
    /// Safe to call repeatedly: with unchanged inputs it appends no events
    /// and moves no ratchet. Triggered stops are reported for the caller to
    /// act on; closures land before the next cycle's breaker check.
    pub fn monitor_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport, ArithmeticOverflow> {
        StopLossManager::advance_trailing(&mut self.positions)?;

        let triggered_stops = self.stops.evaluate(&self.positions, now);
        for key in &triggered_stops {
            if let Some(position) = self.positions.get(key) {
                tracing::warn!(
                    key = %key,
                    price = %position.current_price,
                    stop = ?position.stop.stop_price(),
                    "stop-loss triggered"
                );
            }
        }

        let portfolio_value = portfolio::portfolio_value(&self.positions)?;
        let tripped = self.breaker.evaluate(
            self.daily_pnl,
            portfolio_value,
            self.peak_portfolio_value,
            &self.limits,
        )?;

        self.peak_portfolio_value = self.peak_portfolio_value.max(portfolio_value);

        let metrics = self.metrics_with(portfolio_value)?;
        if metrics.var_95 > self.limits.var_95_limit {
            tracing::warn!(
                var_95 = %metrics.var_95,
                limit = %self.limits.var_95_limit,
                "value-at-risk above configured limit"
            );
        }
        Ok(CycleReport {
            triggered_stops,
            tripped,
            metrics,
        })
    }

    /// Current metrics snapshot.
    pub fn get_risk_metrics(&self) -> Result<RiskMetrics, ArithmeticOverflow> {
        let portfolio_value = portfolio::portfolio_value(&self.positions)?;
        self.metrics_with(portfolio_value)
    }

    fn metrics_with(&self, portfolio_value: Money) -> Result<RiskMetrics, ArithmeticOverflow> {
        Ok(RiskMetrics {
            total_exposure: portfolio::total_exposure(&self.positions)?,
            portfolio_value,
            unrealized_pnl: portfolio::unrealized_pnl(&self.positions)?,
            daily_pnl: self.daily_pnl,
            var_95: portfolio::var_95(&self.positions)?,
            open_positions: self.positions.len(),
            circuit_breaker_triggered: self.breaker.is_tripped(),
            emergency_shutdown_triggered: self.breaker.is_emergency(),
        })
    }

    /// Force the session into emergency shutdown. Latches both flags and
    /// audits the transition.
    pub fn trigger_emergency_shutdown(&mut self) -> Result<(), ArithmeticOverflow> {
        let portfolio_value = portfolio::portfolio_value(&self.positions)?;
        self.breaker.trigger_emergency(self.daily_pnl, portfolio_value);
        Ok(())
    }

    /// Explicit, externally authorized breaker reset. Refused during
    /// emergency shutdown; returns whether the reset took effect.
    pub fn reset_circuit_breaker(&mut self) -> bool {
        self.breaker.reset()
    }

    /// Session boundary: zero the realized P&L and peak, clear both latches,
    /// the audit log, and stop flags. Open positions carry over.
    pub fn reset_session(&mut self) {
        self.daily_pnl = Money::ZERO;
        self.peak_portfolio_value = Money::ZERO;
        self.breaker.reset_session();
        self.stops.reset();
        tracing::info!("session state reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(value: Decimal) -> Money {
        Money::from(value)
    }

    fn controller() -> RiskController {
        RiskController::new(Arc::new(RiskLimits::default()), dec!(5))
    }

    fn controller_with(limits: RiskLimits) -> RiskController {
        RiskController::new(Arc::new(limits), dec!(5))
    }

    fn intent(symbol: &str, price: Decimal, quantity: Decimal) -> TradeIntent {
        TradeIntent {
            symbol: symbol.to_string(),
            venue: "binance".to_string(),
            side: Side::Long,
            price: money(price),
            quantity,
        }
    }

    #[test]
    fn test_accepts_valid_trade() {
        let controller = controller();
        assert!(controller
            .validate_new_trade(&intent("BTC/USDT", dec!(100), dec!(1)))
            .is_ok());
    }

    #[test]
    fn test_rejects_oversized_position() {
        let controller = controller(); // max_position_size 1000
        let rejection = controller
            .validate_new_trade(&intent("BTC/USDT", dec!(100), dec!(20)))
            .unwrap_err();
        assert!(matches!(
            rejection.reason,
            RejectReason::PositionTooLarge { .. }
        ));
        assert_eq!(rejection.severity, Severity::High);
    }

    #[test]
    fn test_rejects_exposure_breach_with_high_severity() {
        // current exposure $12,000, limit $13,000, new position $2,000
        let mut limits = RiskLimits::default();
        limits.max_portfolio_exposure = money(dec!(13000));
        limits.max_position_size = money(dec!(2000));
        limits.max_open_positions = 20;
        let mut controller = controller_with(limits);

        for i in 0..6 {
            let symbol = format!("AS{i}/USDT");
            controller
                .add_position(&intent(&symbol, dec!(1000), dec!(2)), Utc::now())
                .unwrap();
        }
        let exposure = portfolio::total_exposure(controller.open_positions()).unwrap();
        assert_eq!(exposure, money(dec!(12000)));

        let rejection = controller
            .validate_new_trade(&intent("NEW/USDT", dec!(1000), dec!(2)))
            .unwrap_err();
        assert!(matches!(
            rejection.reason,
            RejectReason::ExposureExceeded { .. }
        ));
        assert_eq!(rejection.severity, Severity::High);

        // portfolio exposure unchanged by the rejection
        let after = portfolio::total_exposure(controller.open_positions()).unwrap();
        assert_eq!(after, exposure);
    }

    #[test]
    fn test_rejects_when_max_positions_reached() {
        let mut limits = RiskLimits::default();
        limits.max_open_positions = 2;
        limits.max_portfolio_exposure = money(dec!(100000));
        let mut controller = controller_with(limits);

        controller
            .add_position(&intent("AAA/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap();
        controller
            .add_position(&intent("BBB/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap();

        let rejection = controller
            .validate_new_trade(&intent("CCC/USDT", dec!(100), dec!(1)))
            .unwrap_err();
        assert!(matches!(
            rejection.reason,
            RejectReason::MaxOpenPositions { open: 2, limit: 2 }
        ));
    }

    #[test]
    fn test_rejects_correlation_concentration() {
        let mut limits = RiskLimits::default();
        limits.max_correlation_exposure = dec!(0.4);
        let mut controller = controller_with(limits);

        controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap();
        controller
            .add_position(&intent("ETH/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap();
        controller
            .add_position(&intent("SOL/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap();
        // second BTC exposure: 1 of 3 open positions, still under the limit
        controller
            .add_position(&intent("BTC-PERP", dec!(100), dec!(1)), Utc::now())
            .unwrap();

        // 2 of 4 open positions are BTC: ratio 0.5 > 0.4
        let rejection = controller
            .validate_new_trade(&intent("BTC/EUR", dec!(100), dec!(1)))
            .unwrap_err();
        assert!(matches!(
            rejection.reason,
            RejectReason::CorrelationTooHigh { .. }
        ));
        assert_eq!(rejection.severity, Severity::Medium);
    }

    #[test]
    fn test_rejects_malformed_intent() {
        let controller = controller();
        let rejection = controller
            .validate_new_trade(&intent("BTC/USDT", dec!(100), dec!(0)))
            .unwrap_err();
        assert!(matches!(
            rejection.reason,
            RejectReason::MalformedIntent { .. }
        ));
    }

    #[test]
    fn test_add_position_assigns_default_trailing_stop() {
        let mut controller = controller();
        let key = controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap();

        let position = controller.position(&key).unwrap();
        match &position.stop {
            StopLoss::Trailing { percent, .. } => assert_eq!(*percent, dec!(5)),
            other => panic!("expected trailing stop, got {other:?}"),
        }
        assert_eq!(position.stop.stop_price(), Some(money(dec!(95))));
    }

    #[test]
    fn test_add_duplicate_position_rejected() {
        let mut controller = controller();
        controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap();
        let rejection = controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap_err();
        assert!(matches!(rejection.reason, RejectReason::DuplicatePosition));
    }

    #[test]
    fn test_close_commits_realized_pnl() {
        let mut controller = controller();
        let key = controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(5)), Utc::now())
            .unwrap();

        let realized = controller.close_position(&key, money(dec!(90))).unwrap();
        assert_eq!(realized, money(dec!(-50)));
        assert_eq!(controller.daily_pnl(), money(dec!(-50)));
        assert!(controller.open_positions().is_empty());
    }

    #[test]
    fn test_unknown_position_operations() {
        let mut controller = controller();
        let key = PositionKey::new("binance", "NOPE/USDT");
        assert!(matches!(
            controller.update_position_price(&key, money(dec!(1))),
            Err(RiskError::UnknownPosition(_))
        ));
        assert!(matches!(
            controller.close_position(&key, money(dec!(1))),
            Err(RiskError::UnknownPosition(_))
        ));
    }

    #[test]
    fn test_daily_loss_trips_breaker_next_cycle() {
        let mut controller = controller(); // max_daily_loss 500
        let key = controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(10)), Utc::now())
            .unwrap();
        // realize a loss of exactly 500.01
        controller
            .close_position(&key, money(dec!(49.999))) // (49.999-100)*10
            .unwrap();
        assert_eq!(controller.daily_pnl(), money(dec!(-500.01)));

        let report = controller.monitor_cycle(Utc::now()).unwrap();
        assert_eq!(report.tripped, Some(TripReason::DailyLossLimit));
        assert!(report.metrics.circuit_breaker_triggered);
    }

    #[test]
    fn test_daily_loss_boundary_does_not_trip() {
        let mut controller = controller();
        let key = controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(10)), Utc::now())
            .unwrap();
        controller.close_position(&key, money(dec!(50))).unwrap();
        assert_eq!(controller.daily_pnl(), money(dec!(-500)));

        let report = controller.monitor_cycle(Utc::now()).unwrap();
        assert_eq!(report.tripped, None);
        assert!(!report.metrics.circuit_breaker_triggered);
    }

    #[test]
    fn test_tripped_breaker_rejects_everything_until_reset() {
        let mut controller = controller();
        let key = controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(10)), Utc::now())
            .unwrap();
        controller.close_position(&key, money(dec!(40))).unwrap();
        controller.monitor_cycle(Utc::now()).unwrap();

        for symbol in ["AAA/USDT", "BBB/USDT", "CCC/USDT"] {
            let rejection = controller
                .validate_new_trade(&intent(symbol, dec!(1), dec!(1)))
                .unwrap_err();
            assert!(matches!(
                rejection.reason,
                RejectReason::CircuitBreakerActive
            ));
            assert_eq!(rejection.severity, Severity::Critical);
        }

        assert!(controller.reset_circuit_breaker());
        // daily loss is still breached, so the dedicated check now fires
        let rejection = controller
            .validate_new_trade(&intent("DDD/USDT", dec!(1), dec!(1)))
            .unwrap_err();
        assert!(matches!(
            rejection.reason,
            RejectReason::DailyLossLimitReached { .. }
        ));
    }

    #[test]
    fn test_emergency_shutdown_rejects_and_blocks_reset() {
        let mut controller = controller();
        controller.trigger_emergency_shutdown().unwrap();

        let rejection = controller
            .validate_new_trade(&intent("BTC/USDT", dec!(100), dec!(1)))
            .unwrap_err();
        assert!(matches!(
            rejection.reason,
            RejectReason::EmergencyShutdownActive
        ));
        assert_eq!(rejection.severity, Severity::Critical);

        assert!(!controller.reset_circuit_breaker());
        assert_eq!(controller.risk_events().len(), 1);
    }

    #[test]
    fn test_monitor_cycle_is_idempotent() {
        let mut controller = controller();
        let key = controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap();
        controller
            .update_position_price(&key, money(dec!(110)))
            .unwrap();

        let first = controller.monitor_cycle(Utc::now()).unwrap();
        let peak = controller.peak_portfolio_value();
        let events = controller.risk_events().len();

        // no intervening price change
        let second = controller.monitor_cycle(Utc::now()).unwrap();
        assert_eq!(controller.peak_portfolio_value(), peak);
        assert_eq!(controller.risk_events().len(), events);
        assert!(second.triggered_stops.is_empty());
        assert_eq!(
            second.metrics.portfolio_value,
            first.metrics.portfolio_value
        );
    }

    #[test]
    fn test_monitor_cycle_reports_triggered_stop_once() {
        let mut controller = controller();
        let key = controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap();
        // drop below the 5% trailing stop
        controller
            .update_position_price(&key, money(dec!(90)))
            .unwrap();

        let report = controller.monitor_cycle(Utc::now()).unwrap();
        assert_eq!(report.triggered_stops, vec![key.clone()]);

        let repeat = controller.monitor_cycle(Utc::now()).unwrap();
        assert!(repeat.triggered_stops.is_empty());

        // acting on the detection is a separate, explicit step
        controller.close_position(&key, money(dec!(90))).unwrap();
        assert!(controller.open_positions().is_empty());
    }

    #[test]
    fn test_peak_ratchets_monotonically() {
        let mut controller = controller();
        let key = controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap();

        controller.monitor_cycle(Utc::now()).unwrap();
        let initial_peak = controller.peak_portfolio_value();

        controller
            .update_position_price(&key, money(dec!(150)))
            .unwrap();
        controller.monitor_cycle(Utc::now()).unwrap();
        let higher_peak = controller.peak_portfolio_value();
        assert!(higher_peak > initial_peak);

        controller
            .update_position_price(&key, money(dec!(120)))
            .unwrap();
        controller.monitor_cycle(Utc::now()).unwrap();
        assert_eq!(controller.peak_portfolio_value(), higher_peak);
    }

    #[test]
    fn test_set_stop_loss_replaces_descriptor() {
        let mut controller = controller();
        let key = controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(1)), Utc::now())
            .unwrap();

        controller
            .set_stop_loss(&key, &StopLossSpec::FixedPrice(money(dec!(80))))
            .unwrap();
        assert_eq!(
            controller.position(&key).unwrap().stop.stop_price(),
            Some(money(dec!(80)))
        );

        let result = controller.set_stop_loss(&key, &StopLossSpec::Trailing(dec!(-1)));
        assert!(matches!(result, Err(RiskError::StopLoss(_))));
    }

    #[test]
    fn test_reset_session() {
        let mut controller = controller();
        let key = controller
            .add_position(&intent("BTC/USDT", dec!(100), dec!(10)), Utc::now())
            .unwrap();
        controller.close_position(&key, money(dec!(40))).unwrap();
        controller.monitor_cycle(Utc::now()).unwrap();
        controller.trigger_emergency_shutdown().unwrap();

        controller.reset_session();
        assert_eq!(controller.daily_pnl(), Money::ZERO);
        assert_eq!(controller.peak_portfolio_value(), Money::ZERO);
        assert!(controller.risk_events().is_empty());
        assert!(controller
            .validate_new_trade(&intent("BTC/USDT", dec!(100), dec!(1)))
            .is_ok());
    }
}
