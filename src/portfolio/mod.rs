//! Portfolio-level risk aggregation
//!
//! Pure functions over the open position set. Cross-position aggregates
//! (exposure, VaR, correlation) always see one consistent snapshot because
//! the orchestrator owns all mutation.

use crate::money::{ArithmeticOverflow, Money};
use crate::position::{base_asset, Position, PositionKey};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;

/// Snapshot of portfolio risk, published every monitoring cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RiskMetrics {
    pub total_exposure: Money,
    pub portfolio_value: Money,
    pub unrealized_pnl: Money,
    pub daily_pnl: Money,
    pub var_95: Money,
    pub open_positions: usize,
    pub circuit_breaker_triggered: bool,
    pub emergency_shutdown_triggered: bool,
}

/// Sum of current notional values over all open positions.
pub fn total_exposure(
    positions: &HashMap<PositionKey, Position>,
) -> Result<Money, ArithmeticOverflow> {
    positions
        .values()
        .try_fold(Money::ZERO, |acc, p| acc.checked_add(p.current_value()?))
}

/// Sum of unrealized P&L over all open positions.
pub fn unrealized_pnl(
    positions: &HashMap<PositionKey, Position>,
) -> Result<Money, ArithmeticOverflow> {
    positions
        .values()
        .try_fold(Money::ZERO, |acc, p| acc.checked_add(p.pnl()?))
}

/// Portfolio value: exposure plus unrealized P&L.
pub fn portfolio_value(
    positions: &HashMap<PositionKey, Position>,
) -> Result<Money, ArithmeticOverflow> {
    total_exposure(positions)?.checked_add(unrealized_pnl(positions)?)
}

/// 95% historical Value-at-Risk over per-position unrealized P&L.
///
/// The 5th percentile of the P&L distribution, linearly interpolated between
/// order statistics, reported as an absolute value. An empty portfolio has
/// zero risk by definition.
pub fn var_95(positions: &HashMap<PositionKey, Position>) -> Result<Money, ArithmeticOverflow> {
    let mut pnls: Vec<Decimal> = positions
        .values()
        .map(|p| p.pnl().map(|m| m.as_decimal()))
        .collect::<Result<_, _>>()?;

    if pnls.is_empty() {
        return Ok(Money::ZERO);
    }
    pnls.sort();

    let n = pnls.len();
    let rank = Decimal::from(n - 1)
        .checked_mul(dec!(0.05))
        .ok_or(ArithmeticOverflow)?;
    let lower = rank.floor();
    let index = lower.to_usize().unwrap_or_default();
    let fraction = rank - lower;

    let base = pnls[index];
    let percentile = if index + 1 < n {
        let step = pnls[index + 1]
            .checked_sub(base)
            .and_then(|d| d.checked_mul(fraction))
            .ok_or(ArithmeticOverflow)?;
        base.checked_add(step).ok_or(ArithmeticOverflow)?
    } else {
        base
    };

    Ok(Money::from_decimal(percentile.abs()))
}

/// Share of open positions concentrated in `candidate_symbol`'s base asset.
///
/// A grouping proxy over base-asset prefixes, not a covariance estimate.
/// Zero when the portfolio is empty.
pub fn correlation_risk(
    positions: &HashMap<PositionKey, Position>,
    candidate_symbol: &str,
) -> Decimal {
    if positions.is_empty() {
        return Decimal::ZERO;
    }

    let candidate_base = base_asset(candidate_symbol);
    let correlated = positions
        .values()
        .filter(|p| p.base_asset() == candidate_base)
        .count();

    Decimal::from(correlated) / Decimal::from(positions.len())
}
