//! Open positions and their derived valuations

use crate::money::{ArithmeticOverflow, Money};
use crate::stops::StopLoss;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

/// Composite key identifying one open exposure: a venue plus a symbol.
///
/// Compiler-checked uniqueness; displayed as `venue:symbol` in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub venue: String,
    pub symbol: String,
}

impl PositionKey {
    pub fn new(venue: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.venue, self.symbol)
    }
}

/// A single open exposure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Venue + symbol key
    pub key: PositionKey,
    /// Trade side
    pub side: Side,
    /// Entry price
    pub entry_price: Money,
    /// Latest marked price
    pub current_price: Money,
    /// Position quantity
    pub quantity: Decimal,
    /// Entry timestamp
    pub entry_time: DateTime<Utc>,
    /// Active stop-loss descriptor; exactly one at any time
    pub stop: StopLoss,
}

impl Position {
    /// Open a position at `entry_price` with the given stop descriptor.
    pub fn open(
        key: PositionKey,
        side: Side,
        entry_price: Money,
        quantity: Decimal,
        entry_time: DateTime<Utc>,
        stop: StopLoss,
    ) -> Self {
        Self {
            key,
            side,
            entry_price,
            current_price: entry_price,
            quantity,
            entry_time,
            stop,
        }
    }

    /// Mark the position at a new price. Pure mutation: watermark and stop
    /// maintenance happen in the monitoring cycle.
    pub fn set_price(&mut self, price: Money) {
        self.current_price = price;
    }

    /// Notional value at the current price.
    pub fn current_value(&self) -> Result<Money, ArithmeticOverflow> {
        self.current_price.checked_mul_ratio(self.quantity)
    }

    /// Unrealized P&L at the current price.
    pub fn pnl(&self) -> Result<Money, ArithmeticOverflow> {
        self.pnl_at(self.current_price)
    }

    /// P&L the position would realize at `price`.
    pub fn pnl_at(&self, price: Money) -> Result<Money, ArithmeticOverflow> {
        let diff = match self.side {
            Side::Long => price.checked_sub(self.entry_price)?,
            Side::Short => self.entry_price.checked_sub(price)?,
        };
        diff.checked_mul_ratio(self.quantity)
    }

    /// Unrealized P&L as a percentage of the entry basis.
    ///
    /// Zero basis yields zero rather than reaching the arithmetic layer.
    pub fn pnl_percent(&self) -> Result<Decimal, ArithmeticOverflow> {
        let basis = self.entry_price.checked_mul_ratio(self.quantity)?;
        if basis.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let ratio = self.pnl()?.checked_div(basis)?;
        ratio.checked_mul(dec!(100)).ok_or(ArithmeticOverflow)
    }

    /// Base asset of this position's symbol, for correlation grouping.
    pub fn base_asset(&self) -> &str {
        base_asset(&self.key.symbol)
    }
}

/// Base asset prefix of a trading symbol.
///
/// Splits on the first separator; otherwise strips a known quote suffix.
/// A simplified grouping proxy, not a full instrument database.
pub fn base_asset(symbol: &str) -> &str {
    if let Some(idx) = symbol.find(['/', '-', '_', ':']) {
        return &symbol[..idx];
    }
    for quote in ["USDT", "USDC", "BUSD", "USD", "EUR", "BTC", "ETH"] {
        if let Some(base) = symbol.strip_suffix(quote) {
            if !base.is_empty() {
                return base;
            }
        }
    }
    symbol
}
