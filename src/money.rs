//! Fixed-point monetary values
//!
//! Every price, exposure, and P&L figure in the engine is a [`Money`]: an
//! exact decimal carried at eight fractional digits with banker's rounding.
//! Arithmetic is checked: overflow surfaces as [`ArithmeticOverflow`]
//! rather than truncating.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Neg;
use thiserror::Error;

/// Fractional digits carried by every [`Money`] value.
pub const SCALE: u32 = 8;

/// A monetary operation exceeded the representable range of the fixed-point
/// storage. Fatal to the operation that produced it; never silently truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("monetary arithmetic overflow")]
pub struct ArithmeticOverflow;

/// An exact monetary amount with [`SCALE`] fractional digits.
///
/// Results are quantized with round-half-even, so no operation loses
/// precision beyond the configured scale. There is no implicit conversion to
/// binary float; telemetry uses the explicitly named [`Money::to_f64_lossy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    /// Zero, the additive identity.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Construct from an integer count of 10^-[`SCALE`] units.
    pub fn from_scaled_units(units: i128) -> Result<Self, ArithmeticOverflow> {
        Decimal::try_from_i128_with_scale(units, SCALE)
            .map(Money)
            .map_err(|_| ArithmeticOverflow)
    }

    /// Construct from a decimal, quantizing to [`SCALE`] digits.
    pub fn from_decimal(value: Decimal) -> Self {
        Money(value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointNearestEven))
    }

    /// The underlying decimal. Lossless; used for ratio math.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Checked addition.
    pub fn checked_add(self, rhs: Self) -> Result<Self, ArithmeticOverflow> {
        self.0
            .checked_add(rhs.0)
            .map(Self::from_decimal)
            .ok_or(ArithmeticOverflow)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, rhs: Self) -> Result<Self, ArithmeticOverflow> {
        self.0
            .checked_sub(rhs.0)
            .map(Self::from_decimal)
            .ok_or(ArithmeticOverflow)
    }

    /// Checked multiplication by a unitless ratio (quantity, percentage, ...).
    pub fn checked_mul_ratio(self, ratio: Decimal) -> Result<Self, ArithmeticOverflow> {
        self.0
            .checked_mul(ratio)
            .map(Self::from_decimal)
            .ok_or(ArithmeticOverflow)
    }

    /// Checked division, yielding the unitless quotient of two amounts.
    ///
    /// Callers guard zero divisors; a zero divisor is reported as
    /// [`ArithmeticOverflow`] rather than allowed to reach the decimal layer.
    pub fn checked_div(self, rhs: Self) -> Result<Decimal, ArithmeticOverflow> {
        self.0.checked_div(rhs.0).ok_or(ArithmeticOverflow)
    }

    /// Absolute value.
    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    /// Returns `true` if the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` if the amount is strictly negative.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Lossy conversion for reporting and telemetry only.
    pub fn to_f64_lossy(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::from_decimal(value)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Serialize::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Deserialize::deserialize(deserializer).map(Money::from_decimal)
    }
}
