//! Stop-loss descriptors
//!
//! Each variant carries exactly the state it needs; invalid configurations
//! are rejected at construction time and never reach evaluation.

use crate::money::{ArithmeticOverflow, Money};
use crate::position::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stop-loss construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StopLossError {
    /// Percent must lie strictly between 0 and 100
    #[error("invalid stop-loss configuration: percent {0} out of range (0, 100)")]
    PercentOutOfRange(Decimal),
    /// Stop prices must be positive
    #[error("invalid stop-loss configuration: non-positive price {0}")]
    NonPositivePrice(Money),
    #[error(transparent)]
    Overflow(#[from] ArithmeticOverflow),
}

/// Caller-facing request to (re)assign a stop-loss on an open position.
/// Resolved against the position's side and entry price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StopLossSpec {
    /// Fixed stop at an explicit price
    FixedPrice(Money),
    /// Fixed stop offset from the entry price by a percentage
    FixedPercent(Decimal),
    /// Trailing stop with the given percentage
    Trailing(Decimal),
    /// Externally computed stop price
    Dynamic(Money),
    /// Stop that fires on wall-clock time
    TimeBased(DateTime<Utc>),
}

/// Active stop-loss state attached to a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopLoss {
    /// Set once; never mutates afterward
    Fixed { price: Money },
    /// Ratchets in the position's favor, never retreats
    Trailing {
        percent: Decimal,
        high_watermark: Money,
        low_watermark: Money,
        stop_price: Money,
    },
    /// Price recomputed by an external policy; stored and evaluated here
    Dynamic { price: Money },
    /// Fires when wall-clock time reaches the deadline
    TimeBased { deadline: DateTime<Utc> },
}

fn validate_percent(percent: Decimal) -> Result<(), StopLossError> {
    if percent <= Decimal::ZERO || percent >= dec!(100) {
        return Err(StopLossError::PercentOutOfRange(percent));
    }
    Ok(())
}

fn validate_price(price: Money) -> Result<(), StopLossError> {
    if price.is_zero() || price.is_negative() {
        return Err(StopLossError::NonPositivePrice(price));
    }
    Ok(())
}

impl StopLoss {
    /// Fixed stop at an explicit price.
    pub fn fixed(price: Money) -> Result<Self, StopLossError> {
        validate_price(price)?;
        Ok(StopLoss::Fixed { price })
    }

    /// Fixed stop offset from the entry price: below entry for Long, above
    /// entry for Short.
    pub fn fixed_from_percent(
        percent: Decimal,
        side: Side,
        entry_price: Money,
    ) -> Result<Self, StopLossError> {
        validate_percent(percent)?;
        validate_price(entry_price)?;
        let price = entry_price.checked_mul_ratio(offset_ratio(side, percent))?;
        Ok(StopLoss::Fixed { price })
    }

    /// Trailing stop anchored at the entry price. The watermark tracked is
    /// determined by `side`, so the descriptor can never disagree with the
    /// position's direction.
    pub fn trailing(
        percent: Decimal,
        side: Side,
        entry_price: Money,
    ) -> Result<Self, StopLossError> {
        validate_percent(percent)?;
        validate_price(entry_price)?;
        let stop_price = entry_price.checked_mul_ratio(offset_ratio(side, percent))?;
        Ok(StopLoss::Trailing {
            percent,
            high_watermark: entry_price,
            low_watermark: entry_price,
            stop_price,
        })
    }

    /// Dynamic stop at an externally computed price.
    pub fn dynamic(price: Money) -> Result<Self, StopLossError> {
        validate_price(price)?;
        Ok(StopLoss::Dynamic { price })
    }

    /// Time-based stop firing at `deadline`.
    pub fn time_based(deadline: DateTime<Utc>) -> Self {
        StopLoss::TimeBased { deadline }
    }

    /// Resolve a caller-facing request against the position's side and entry.
    pub fn from_spec(
        spec: &StopLossSpec,
        side: Side,
        entry_price: Money,
    ) -> Result<Self, StopLossError> {
        match spec {
            StopLossSpec::FixedPrice(price) => Self::fixed(*price),
            StopLossSpec::FixedPercent(percent) => {
                Self::fixed_from_percent(*percent, side, entry_price)
            }
            StopLossSpec::Trailing(percent) => Self::trailing(*percent, side, entry_price),
            StopLossSpec::Dynamic(price) => Self::dynamic(*price),
            StopLossSpec::TimeBased(deadline) => Ok(Self::time_based(*deadline)),
        }
    }

    /// The current stop price, if this descriptor has one.
    pub fn stop_price(&self) -> Option<Money> {
        match self {
            StopLoss::Fixed { price } | StopLoss::Dynamic { price } => Some(*price),
            StopLoss::Trailing { stop_price, .. } => Some(*stop_price),
            StopLoss::TimeBased { .. } => None,
        }
    }

    /// Ratchet a trailing stop toward the current price. For Long the high
    /// watermark only moves up; for Short the low watermark only moves down.
    /// All other variants are untouched.
    pub fn advance(&mut self, side: Side, current_price: Money) -> Result<(), ArithmeticOverflow> {
        if let StopLoss::Trailing {
            percent,
            high_watermark,
            low_watermark,
            stop_price,
        } = self
        {
            match side {
                Side::Long => {
                    if current_price > *high_watermark {
                        *high_watermark = current_price;
                        *stop_price =
                            current_price.checked_mul_ratio(offset_ratio(side, *percent))?;
                    }
                }
                Side::Short => {
                    if current_price < *low_watermark {
                        *low_watermark = current_price;
                        *stop_price =
                            current_price.checked_mul_ratio(offset_ratio(side, *percent))?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether this stop fires at the given price and wall-clock time.
    pub fn is_triggered(&self, side: Side, current_price: Money, now: DateTime<Utc>) -> bool {
        match self {
            StopLoss::TimeBased { deadline } => now >= *deadline,
            other => match other.stop_price() {
                Some(stop) => match side {
                    Side::Long => current_price <= stop,
                    Side::Short => current_price >= stop,
                },
                None => false,
            },
        }
    }
}

fn offset_ratio(side: Side, percent: Decimal) -> Decimal {
    match side {
        Side::Long => Decimal::ONE - percent / dec!(100),
        Side::Short => Decimal::ONE + percent / dec!(100),
    }
}
