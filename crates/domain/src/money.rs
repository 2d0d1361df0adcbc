//! Monetary amounts.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places in the settlement currency.
pub const CURRENCY_SCALE: u32 = 2;

/// A monetary amount backed by an exact decimal.
///
/// Catalog prices keep whatever precision the catalog gives them. Rounding to
/// currency precision happens only on totals, through [`Money::round_to_cents`],
/// which always rounds half-up (midpoint away from zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero money.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Creates a money amount from an exact decimal.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Creates a money amount from minor units (e.g. 1999 = 19.99).
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, CURRENCY_SCALE))
    }

    /// Returns the underlying decimal amount.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is below zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies by a quantity. The result is exact.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0 * Decimal::from(quantity))
    }

    /// Rounds to currency precision, half-up.
    ///
    /// `0.125` becomes `0.13` and `1.005` becomes `1.01`. The result always
    /// carries exactly two decimal places.
    pub fn round_to_cents(&self) -> Money {
        let mut rounded = self
            .0
            .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(CURRENCY_SCALE);
        Money(rounded)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rounded = self.round_to_cents().0;
        if rounded.is_sign_negative() && !rounded.is_zero() {
            write!(f, "-${}", rounded.abs())
        } else {
            write!(f, "${rounded}")
        }
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}
