//! Circuit breaker and emergency shutdown
//!
//! Session-wide latches that halt new risk-taking. The breaker trips on
//! realized daily loss or drawdown from the session peak and stays tripped
//! until an explicit reset. Emergency shutdown is strictly stronger: it
//! implies the breaker, suppresses the reset path, and ends only with the
//! session. Every transition is recorded in an append-only audit log.

use crate::config::RiskLimits;
use crate::money::{ArithmeticOverflow, Money};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a latch transitioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripReason {
    /// Realized session loss breached the daily loss limit
    DailyLossLimit,
    /// Portfolio value fell too far below the session peak
    DrawdownLimit,
    /// Emergency shutdown was invoked
    EmergencyShutdown,
}

impl std::fmt::Display for TripReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TripReason::DailyLossLimit => "daily loss limit exceeded",
            TripReason::DrawdownLimit => "drawdown exceeded",
            TripReason::EmergencyShutdown => "emergency shutdown",
        };
        f.write_str(text)
    }
}

/// One immutable entry in the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub reason: TripReason,
    /// Realized session P&L at trigger time
    pub daily_pnl: Money,
    /// Portfolio value at trigger time
    pub portfolio_value: Money,
}

/// Latched halt state for the session
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    tripped: bool,
    emergency: bool,
    events: Vec<RiskEvent>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the breaker is latched.
    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Whether emergency shutdown has been invoked this session.
    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    /// The ordered, append-only audit trail.
    pub fn events(&self) -> &[RiskEvent] {
        &self.events
    }

    /// Evaluate trip conditions in fixed priority order:
    /// 1. `daily_pnl < -max_daily_loss` (strict; a loss of exactly the limit
    ///    does not trip),
    /// 2. drawdown from `peak` above `max_drawdown_percent` (strict; only
    ///    when the peak is positive).
    ///
    /// Once latched, evaluation is a no-op until reset; no duplicate events
    /// are appended.
    pub fn evaluate(
        &mut self,
        daily_pnl: Money,
        portfolio_value: Money,
        peak_portfolio_value: Money,
        limits: &RiskLimits,
    ) -> Result<Option<TripReason>, ArithmeticOverflow> {
        if self.tripped {
            return Ok(None);
        }

        if daily_pnl < -limits.max_daily_loss {
            self.trip(TripReason::DailyLossLimit, daily_pnl, portfolio_value);
            return Ok(Some(TripReason::DailyLossLimit));
        }

        if peak_portfolio_value > Money::ZERO {
            let drawdown = drawdown_percent(portfolio_value, peak_portfolio_value)?;
            if drawdown > limits.max_drawdown_percent {
                self.trip(TripReason::DrawdownLimit, daily_pnl, portfolio_value);
                return Ok(Some(TripReason::DrawdownLimit));
            }
        }

        Ok(None)
    }

    /// Invoke emergency shutdown. Latches both flags; repeat invocations are
    /// no-ops and append nothing.
    pub fn trigger_emergency(&mut self, daily_pnl: Money, portfolio_value: Money) {
        if self.emergency {
            return;
        }
        self.emergency = true;
        self.trip(TripReason::EmergencyShutdown, daily_pnl, portfolio_value);
    }

    /// Clear the breaker latch. Refused while emergency shutdown is active;
    /// returns whether the reset took effect.
    pub fn reset(&mut self) -> bool {
        if self.emergency {
            tracing::warn!("circuit breaker reset refused: emergency shutdown active");
            return false;
        }
        if self.tripped {
            tracing::warn!("circuit breaker reset: trading re-enabled");
        }
        self.tripped = false;
        true
    }

    /// Session boundary: clear both latches and the event log.
    pub fn reset_session(&mut self) {
        self.tripped = false;
        self.emergency = false;
        self.events.clear();
    }

    fn trip(&mut self, reason: TripReason, daily_pnl: Money, portfolio_value: Money) {
        self.tripped = true;
        tracing::error!(
            reason = %reason,
            daily_pnl = %daily_pnl,
            portfolio_value = %portfolio_value,
            "circuit breaker tripped: halting new risk-taking"
        );
        self.events.push(RiskEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            reason,
            daily_pnl,
            portfolio_value,
        });
    }
}

/// Drawdown from the session peak, in percent. Zero when no peak exists yet.
pub fn drawdown_percent(
    portfolio_value: Money,
    peak_portfolio_value: Money,
) -> Result<Decimal, ArithmeticOverflow> {
    if peak_portfolio_value <= Money::ZERO {
        return Ok(Decimal::ZERO);
    }
    let decline = peak_portfolio_value.checked_sub(portfolio_value)?;
    decline
        .checked_div(peak_portfolio_value)?
        .checked_mul(dec!(100))
        .ok_or(ArithmeticOverflow)
}
