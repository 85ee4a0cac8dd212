//! # Payout Split Calculation
//!
//! Splits a claimed SLP balance into the admin fee, the scholar share and the
//! academy share.
//!
//! ## Rounding Policy
//!
//! ```text
//! fee       = floor(balance   * fee_percentage)
//! remainder = balance - fee
//! scholar   = ceil(remainder  * scholar_percentage)
//! academy   = remainder - scholar
//! ```
//!
//! The fee is floored, the scholar share is ceiled, and the academy absorbs
//! whatever is left. `fee + scholar + academy == balance` holds for every
//! input; no unit is lost to truncation.
//!
//! ## Fixed-Point Percentages
//!
//! Percentages arrive from configuration as `f64` fractions. They are
//! converted once into parts-per-billion ([`Percentage`]) so the floor/ceil
//! steps are exact integer arithmetic on `u128`. `0.7` becomes exactly
//! `700_000_000`, which makes `ceil(950 * 0.7) == 665` independent of binary
//! floating-point representation.

use std::fmt;

use thiserror::Error;

/// Denominator of [`Percentage`] (parts per billion).
pub const PERCENT_SCALE: u64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplitError {
    #[error("percentage {value} is outside [0, 1]")]
    InvalidPercentage { value: f64 },

    #[error("balance is zero, nothing to split")]
    ZeroBalance,
}

// ════════════════════════════════════════════════════════════════════════════════
// PERCENTAGE
// ════════════════════════════════════════════════════════════════════════════════

/// A fraction in `[0, 1]` stored as parts per billion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percentage(u64);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);
    pub const ONE: Percentage = Percentage(PERCENT_SCALE);

    /// Converts a configuration fraction. Rejects NaN, infinities and values
    /// outside `[0, 1]`.
    pub fn from_fraction(value: f64) -> Result<Self, SplitError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(SplitError::InvalidPercentage { value });
        }
        // In range [0, 1e9] after the check above; the cast cannot truncate.
        let parts = (value * PERCENT_SCALE as f64).round() as u64;
        Ok(Self(parts.min(PERCENT_SCALE)))
    }

    pub const fn from_parts_per_billion(parts: u64) -> Option<Self> {
        if parts > PERCENT_SCALE {
            None
        } else {
            Some(Self(parts))
        }
    }

    pub const fn parts_per_billion(&self) -> u64 {
        self.0
    }

    /// `floor(amount * self)`. Never exceeds `amount`.
    pub fn floor_of(&self, amount: u64) -> u64 {
        let product = u128::from(amount) * u128::from(self.0);
        (product / u128::from(PERCENT_SCALE)) as u64
    }

    /// `ceil(amount * self)`. Never exceeds `amount`.
    pub fn ceil_of(&self, amount: u64) -> u64 {
        let scale = u128::from(PERCENT_SCALE);
        let product = u128::from(amount) * u128::from(self.0);
        ((product + scale - 1) / scale) as u64
    }
}

/// Renders as a percentage rounded to two decimals, trailing zeros dropped:
/// `0.57` prints `57%`, `0.125` prints `12.5%`.
impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hundredths = (self.0 + 50_000) / 100_000;
        let (whole, frac) = (hundredths / 100, hundredths % 100);
        if frac == 0 {
            write!(f, "{}%", whole)
        } else if frac % 10 == 0 {
            write!(f, "{}.{}%", whole, frac / 10)
        } else {
            write!(f, "{}.{:02}%", whole, frac)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// SPLIT
// ════════════════════════════════════════════════════════════════════════════════

/// The three payout amounts derived from one balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutSplit {
    pub balance: u64,
    pub scholar_amount: u64,
    pub academy_amount: u64,
    pub fee_amount: u64,
}

impl PayoutSplit {
    pub fn total(&self) -> u128 {
        u128::from(self.scholar_amount) + u128::from(self.academy_amount) + u128::from(self.fee_amount)
    }
}

/// Splits `balance` using already-validated percentages.
pub fn split_payout(
    balance: u64,
    fee_percentage: Percentage,
    scholar_percentage: Percentage,
) -> Result<PayoutSplit, SplitError> {
    if balance == 0 {
        return Err(SplitError::ZeroBalance);
    }

    let fee_amount = fee_percentage.floor_of(balance);
    let remainder = balance - fee_amount;
    let scholar_amount = scholar_percentage.ceil_of(remainder);
    let academy_amount = remainder - scholar_amount;

    let split = PayoutSplit {
        balance,
        scholar_amount,
        academy_amount,
        fee_amount,
    };
    debug_assert_eq!(split.total(), u128::from(balance));
    Ok(split)
}

/// Splits `balance` from raw configuration fractions.
///
/// Checks run in the order the payout command needs them: a zero balance is
/// reported before percentages are inspected.
pub fn compute_split(
    balance: u64,
    fee_percentage: f64,
    scholar_percentage: f64,
) -> Result<PayoutSplit, SplitError> {
    if balance == 0 {
        return Err(SplitError::ZeroBalance);
    }
    let fee = Percentage::from_fraction(fee_percentage)?;
    let scholar = Percentage::from_fraction(scholar_percentage)?;
    split_payout(balance, fee, scholar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reference_split() {
        let split = compute_split(1000, 0.05, 0.7).unwrap();
        assert_eq!(split.fee_amount, 50);
        assert_eq!(split.scholar_amount, 665);
        assert_eq!(split.academy_amount, 285);
        assert_eq!(split.total(), 1000);
    }

    #[test]
    fn scholar_rounds_up_academy_absorbs() {
        // fee = floor(7 * 0.1) = 0, scholar = ceil(7 * 0.5) = 4, academy = 3
        let split = compute_split(7, 0.1, 0.5).unwrap();
        assert_eq!((split.fee_amount, split.scholar_amount, split.academy_amount), (0, 4, 3));
    }

    #[test]
    fn fee_rounds_down() {
        // fee = floor(99 * 0.15) = floor(14.85) = 14
        let split = compute_split(99, 0.15, 0.0).unwrap();
        assert_eq!(split.fee_amount, 14);
        assert_eq!(split.scholar_amount, 0);
        assert_eq!(split.academy_amount, 85);
    }

    #[test]
    fn full_percentages() {
        let split = compute_split(500, 1.0, 1.0).unwrap();
        assert_eq!((split.fee_amount, split.scholar_amount, split.academy_amount), (500, 0, 0));

        let split = compute_split(500, 0.0, 1.0).unwrap();
        assert_eq!((split.fee_amount, split.scholar_amount, split.academy_amount), (0, 500, 0));
    }

    #[test]
    fn zero_balance_rejected_before_percentages() {
        assert_eq!(compute_split(0, 0.05, 0.7), Err(SplitError::ZeroBalance));
        assert_eq!(compute_split(0, 2.0, -1.0), Err(SplitError::ZeroBalance));
    }

    #[test]
    fn out_of_range_percentage_rejected() {
        assert!(matches!(
            compute_split(100, 0.05, 1.01),
            Err(SplitError::InvalidPercentage { .. })
        ));
        assert!(matches!(
            compute_split(100, -0.01, 0.5),
            Err(SplitError::InvalidPercentage { .. })
        ));
        assert!(matches!(
            compute_split(100, 0.05, f64::NAN),
            Err(SplitError::InvalidPercentage { .. })
        ));
    }

    #[test]
    fn max_balance_does_not_overflow() {
        let split = compute_split(u64::MAX, 0.333333, 0.777777).unwrap();
        assert_eq!(split.total(), u128::from(u64::MAX));
    }

    #[test]
    fn percentage_parts() {
        assert_eq!(Percentage::from_fraction(0.7).unwrap().parts_per_billion(), 700_000_000);
        assert_eq!(Percentage::from_parts_per_billion(PERCENT_SCALE + 1), None);
    }

    #[test]
    fn percentage_display_is_exact() {
        let shown = |v: f64| Percentage::from_fraction(v).unwrap().to_string();
        assert_eq!(shown(0.57), "57%");
        assert_eq!(shown(0.125), "12.5%");
        assert_eq!(shown(0.0333), "3.33%");
        assert_eq!(shown(0.05), "5%");
        assert_eq!(shown(1.0), "100%");
        assert_eq!(shown(0.0), "0%");
        assert_eq!(Percentage::ONE.ceil_of(17), 17);
        assert_eq!(Percentage::ZERO.floor_of(17), 0);
    }

    proptest! {
        #[test]
        fn split_is_exact_and_non_negative(
            balance in 1u64..=u64::MAX,
            fee in 0.0f64..=1.0,
            scholar in 0.0f64..=1.0,
        ) {
            let split = compute_split(balance, fee, scholar).unwrap();
            prop_assert_eq!(split.total(), u128::from(balance));
            prop_assert!(split.scholar_amount + split.academy_amount <= balance);
            prop_assert!(split.fee_amount <= balance);
        }
    }
}
