//! Position sizing
//!
//! Pure, stateless sizing functions. Every result is clamped to the
//! configured maximum position size; degenerate inputs fail safe (zero for
//! Kelly, the configured maximum for risk parity) instead of erroring.

use crate::money::{ArithmeticOverflow, Money};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fractional Kelly dampening applied to the raw Kelly fraction.
pub const KELLY_DAMPENING: Decimal = dec!(0.25);

/// Hard cap on the dampened Kelly fraction of capital.
pub const KELLY_CAP: Decimal = dec!(0.10);

/// Default risk percentage for fixed fractional sizing.
pub const DEFAULT_RISK_PERCENT: Decimal = dec!(2);

/// Kelly criterion size from historical win/loss statistics.
///
/// `kelly = win_rate - (1 - win_rate) / (avg_win / avg_loss)`, dampened by
/// [`KELLY_DAMPENING`] and clamped to `[0, KELLY_CAP]` before applying to
/// `capital`. A zero `avg_loss` (no loss history) returns zero so that
/// division by zero never reaches the arithmetic layer.
pub fn kelly_size(
    win_rate: Decimal,
    avg_win: Money,
    avg_loss: Money,
    capital: Money,
    max_position_size: Money,
) -> Result<Money, ArithmeticOverflow> {
    if avg_loss.is_zero() || avg_loss.is_negative() || avg_win.is_negative() {
        return Ok(Money::ZERO);
    }

    let payoff_ratio = avg_win.checked_div(avg_loss)?;
    if payoff_ratio <= Decimal::ZERO {
        return Ok(Money::ZERO);
    }

    let lose_rate = Decimal::ONE - win_rate;
    let kelly = win_rate - lose_rate.checked_div(payoff_ratio).ok_or(ArithmeticOverflow)?;

    let fraction = (kelly * KELLY_DAMPENING).clamp(Decimal::ZERO, KELLY_CAP);
    let size = capital.checked_mul_ratio(fraction)?;

    Ok(size.max(Money::ZERO).min(max_position_size))
}

/// Fixed fractional size: `capital * risk_percent / 100`.
pub fn fixed_fractional(
    capital: Money,
    risk_percent: Decimal,
    max_position_size: Money,
) -> Result<Money, ArithmeticOverflow> {
    let size = capital.checked_mul_ratio(risk_percent / dec!(100))?;
    Ok(size.min(max_position_size))
}

/// Risk parity size: `target_risk / volatility`.
///
/// Zero (or non-positive) volatility returns the configured maximum rather
/// than an unbounded size. Surprising but deliberate; see DESIGN.md.
pub fn risk_parity(
    target_risk: Money,
    volatility: Decimal,
    max_position_size: Money,
) -> Result<Money, ArithmeticOverflow> {
    if volatility <= Decimal::ZERO {
        return Ok(max_position_size);
    }

    let raw = target_risk
        .as_decimal()
        .checked_div(volatility)
        .ok_or(ArithmeticOverflow)?;
    Ok(Money::from_decimal(raw).min(max_position_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(value: Decimal) -> Money {
        Money::from(value)
    }

    #[test]
    fn test_kelly_basic() {
        // win_rate 0.6, payoff 2:1 -> kelly = 0.6 - 0.4/2 = 0.4
        // quarter Kelly = 0.1, exactly at the cap
        let size = kelly_size(
            dec!(0.6),
            money(dec!(200)),
            money(dec!(100)),
            money(dec!(10000)),
            money(dec!(5000)),
        )
        .unwrap();
        assert_eq!(size, money(dec!(1000)));
    }

    #[test]
    fn test_kelly_clamped_to_cap() {
        // very favorable stats: raw fraction well above the 10% cap
        let size = kelly_size(
            dec!(0.9),
            money(dec!(500)),
            money(dec!(100)),
            money(dec!(10000)),
            money(dec!(5000)),
        )
        .unwrap();
        assert_eq!(size, money(dec!(1000))); // 10% of capital
    }

    #[test]
    fn test_kelly_negative_edge_returns_zero() {
        // win_rate 0.3, payoff 1:1 -> kelly = 0.3 - 0.7 < 0
        let size = kelly_size(
            dec!(0.3),
            money(dec!(100)),
            money(dec!(100)),
            money(dec!(10000)),
            money(dec!(5000)),
        )
        .unwrap();
        assert_eq!(size, Money::ZERO);
    }

    #[test]
    fn test_kelly_zero_avg_loss_fails_safe() {
        let size = kelly_size(
            dec!(0.9),
            money(dec!(100)),
            Money::ZERO,
            money(dec!(10000)),
            money(dec!(5000)),
        )
        .unwrap();
        assert_eq!(size, Money::ZERO);
    }

    #[test]
    fn test_kelly_respects_max_position_size() {
        let size = kelly_size(
            dec!(0.9),
            money(dec!(500)),
            money(dec!(100)),
            money(dec!(100000)),
            money(dec!(2000)),
        )
        .unwrap();
        assert_eq!(size, money(dec!(2000)));
    }

    #[test]
    fn test_fixed_fractional_example() {
        // $100,000 capital at 2% -> exactly $2,000
        let size = fixed_fractional(money(dec!(100000)), DEFAULT_RISK_PERCENT, money(dec!(5000)))
            .unwrap();
        assert_eq!(size, money(dec!(2000)));
    }

    #[test]
    fn test_fixed_fractional_clamped() {
        let size =
            fixed_fractional(money(dec!(100000)), DEFAULT_RISK_PERCENT, money(dec!(1500))).unwrap();
        assert_eq!(size, money(dec!(1500)));
    }

    #[test]
    fn test_risk_parity() {
        let size = risk_parity(money(dec!(100)), dec!(0.25), money(dec!(5000))).unwrap();
        assert_eq!(size, money(dec!(400)));
    }

    #[test]
    fn test_risk_parity_zero_volatility_returns_max() {
        let size = risk_parity(money(dec!(100)), Decimal::ZERO, money(dec!(5000))).unwrap();
        assert_eq!(size, money(dec!(5000)));
    }

    #[test]
    fn test_risk_parity_clamped() {
        let size = risk_parity(money(dec!(1000)), dec!(0.01), money(dec!(5000))).unwrap();
        assert_eq!(size, money(dec!(5000)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn kelly_size_is_bounded(
                win_rate_pct in 0u32..=100,
                avg_win_cents in 1i64..=1_000_000,
                avg_loss_cents in 1i64..=1_000_000,
                capital_cents in 0i64..=10_000_000_000,
            ) {
                let max = money(dec!(5000));
                let size = kelly_size(
                    Decimal::new(win_rate_pct as i64, 2),
                    money(Decimal::new(avg_win_cents, 2)),
                    money(Decimal::new(avg_loss_cents, 2)),
                    money(Decimal::new(capital_cents, 2)),
                    max,
                )
                .unwrap();

                prop_assert!(size >= Money::ZERO);
                prop_assert!(size <= max);
            }
        }
    }
}
