//! Fixed-point currency amounts.
//!
//! Every amount carries exactly two fractional digits. Arithmetic is exact
//! decimal arithmetic (`rust_decimal`); binary floating point never touches a
//! stored value.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};

/// Number of fractional digits kept for every amount.
pub const MONEY_SCALE: u32 = 2;

/// Amounts must stay strictly below this many whole units in magnitude.
///
/// Every `i64` cent count fits, and sums of bounded amounts stay far from the
/// 28-digit limit of `Decimal`.
pub const MONEY_MAX_UNITS: u64 = 100_000_000_000_000_000;

/// A signed currency amount with two-decimal precision.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Build an amount from a decimal, rejecting sub-cent precision and
    /// magnitudes of [`MONEY_MAX_UNITS`] or more.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.normalize().scale() > MONEY_SCALE {
            return Err(DomainError::validation(format!(
                "amount {value} has more than {MONEY_SCALE} fractional digits"
            )));
        }
        if value.abs() >= Decimal::from(MONEY_MAX_UNITS) {
            return Err(DomainError::validation(format!(
                "amount {value} is out of range"
            )));
        }
        let mut value = value;
        value.rescale(MONEY_SCALE);
        Ok(Self(value))
    }

    /// Build an amount from an integer number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, MONEY_SCALE))
    }

    /// Parse a decimal string such as `"1250.50"` or `"-3"`.
    pub fn parse(s: &str) -> DomainResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("amount must not be blank"));
        }
        let value = Decimal::from_str(trimmed)
            .map_err(|e| DomainError::validation(format!("invalid amount '{trimmed}': {e}")))?;
        Self::new(value)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Addition that fails with `Validation` when the result leaves the
    /// representable range.
    pub fn checked_add(self, rhs: Money) -> DomainResult<Money> {
        self.0
            .checked_add(rhs.0)
            .ok_or_else(|| DomainError::validation(format!("{self} + {rhs} overflows")))
            .and_then(Money::new)
    }

    pub fn checked_sub(self, rhs: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(rhs.0)
            .ok_or_else(|| DomainError::validation(format!("{self} - {rhs} overflows")))
            .and_then(Money::new)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount with at most two fractional digits")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Money::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        Money::new(Decimal::from(v)).map_err(E::custom)
    }

    // JSON numbers arrive as f64; their shortest round-trip text is the literal the
    // client sent, so parse that text instead of converting the binary value.
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() {
            return Err(E::custom("amount must be finite"));
        }
        Money::parse(&v.to_string()).map_err(E::custom)
    }
}
