//! Conversions between the human decimal unit and the ledger's minor unit.
//!
//! The ledger only ever sees integer amounts scaled by 10^9. Conversions use
//! round-to-nearest scaling, so a round trip is exact up to one minor unit.

use crate::error::GameError;

pub const DECIMALS: u32 = 9;
pub const NANOS_PER_UNIT: u64 = 1_000_000_000;
pub const TICKER: &str = "CKIE";

/// Negative inputs and NaN become zero; amounts past `u64::MAX` minor units
/// (including `+inf`) clamp to `u64::MAX`. Use [`checked_nanos`] for input.
pub fn decimal_to_nanos(amount: f64) -> u64 {
    (amount * NANOS_PER_UNIT as f64).round() as u64
}

/// `None` for negative, non-finite or unrepresentable amounts.
pub fn checked_nanos(amount: f64) -> Option<u64> {
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    let scaled = (amount * NANOS_PER_UNIT as f64).round();
    // u64::MAX as f64 rounds up to 2^64, which is itself out of range
    if scaled >= u64::MAX as f64 {
        return None;
    }
    Some(scaled as u64)
}

pub fn nanos_to_decimal(nanos: u64) -> f64 {
    nanos as f64 / NANOS_PER_UNIT as f64
}

/// Amount credited for a cash-out: the full wager scaled by the multiplier.
pub fn payout_nanos(wager: u64, multiplier: f64) -> u64 {
    (wager as f64 * multiplier).round() as u64
}

pub fn parse_amount(text: &str) -> Result<u64, GameError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GameError::InvalidAmount("amount is empty".to_string()));
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| GameError::InvalidAmount(format!("'{trimmed}' is not a number")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(GameError::InvalidAmount(format!(
            "'{trimmed}' must be a non-negative number"
        )));
    }
    checked_nanos(value)
        .ok_or_else(|| GameError::InvalidAmount(format!("'{trimmed}' is too large")))
}

pub fn format_amount(nanos: u64) -> String {
    format!("{:.2} {TICKER}", nanos_to_decimal(nanos))
}

pub fn format_multiplier(multiplier: f64) -> String {
    format!("{multiplier:.2}x")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decimal_to_nanos__minimum_wager__is_exact() {
        assert_eq!(decimal_to_nanos(0.1), 100_000_000);
        assert_eq!(decimal_to_nanos(100.0), 100_000_000_000);
    }

    #[test]
    fn decimal_to_nanos__negative_or_nan__saturates_to_zero() {
        assert_eq!(decimal_to_nanos(-1.0), 0);
        assert_eq!(decimal_to_nanos(f64::NAN), 0);
    }

    #[test]
    fn payout_nanos__applies_multiplier_to_full_wager() {
        // given
        let wager = decimal_to_nanos(0.1);

        // when
        let payout = payout_nanos(wager, 1.4);

        // then
        assert_eq!(payout, 140_000_000);
    }

    #[test]
    fn parse_amount__rejects_garbage_and_negatives() {
        assert!(matches!(parse_amount(""), Err(GameError::InvalidAmount(_))));
        assert!(matches!(parse_amount("abc"), Err(GameError::InvalidAmount(_))));
        assert!(matches!(parse_amount("-0.5"), Err(GameError::InvalidAmount(_))));
        assert!(matches!(parse_amount("inf"), Err(GameError::InvalidAmount(_))));
    }

    #[test]
    fn parse_amount__beyond_minor_unit_range__rejected() {
        // given
        let inputs = ["1e30", "18446744074"];

        // when
        let results: Vec<_> = inputs.iter().map(|raw| parse_amount(raw)).collect();

        // then
        for result in results {
            assert!(matches!(result, Err(GameError::InvalidAmount(_))), "{result:?}");
        }
        assert!(parse_amount("18446744073").is_ok());
    }

    #[test]
    fn decimal_to_nanos__infinite__clamps_to_max() {
        assert_eq!(decimal_to_nanos(f64::INFINITY), u64::MAX);
        assert_eq!(checked_nanos(f64::INFINITY), None);
    }

    #[test]
    fn parse_amount__trims_and_scales() {
        assert_eq!(parse_amount(" 2.5 ").unwrap(), 2_500_000_000);
    }

    #[test]
    fn format_amount__uses_two_fraction_digits() {
        assert_eq!(format_amount(140_000_000), "0.14 CKIE");
        assert_eq!(format_multiplier(1.4), "1.40x");
    }

    proptest! {
        #[test]
        fn round_trip__stays_within_one_minor_unit(cents in 0u64..100_000_000) {
            let amount = cents as f64 / 100.0;
            let back = nanos_to_decimal(decimal_to_nanos(amount));
            prop_assert!((back - amount).abs() <= 1.0 / NANOS_PER_UNIT as f64);
        }
    }
}
