//! Money amounts
//!
//! Amounts are whole cents in an `i64`. Positive values are inflows (or
//! asset balances), negative values are outflows (or amounts owed).
//!
//! Amounts accepted from clients are limited to [`MAX_AMOUNT_CENTS`] either
//! way. Arithmetic saturates, so totals over stored data never panic.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Largest accepted magnitude: one hundred billion currency units
pub const MAX_AMOUNT_CENTS: i64 = 10_000_000_000_000;

/// An amount in cents; serializes as a bare integer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

/// Error from [`Money::parse`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid money amount: '{0}'")]
pub struct MoneyParseError(String);

impl Money {
    /// ```
    /// use envelope_server::models::Money;
    /// assert_eq!(Money::from_cents(1050).to_string(), "$10.50");
    /// ```
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub const fn abs(&self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// True when the magnitude is at most [`MAX_AMOUNT_CENTS`]
    pub const fn is_within_limit(&self) -> bool {
        self.0.unsigned_abs() <= MAX_AMOUNT_CENTS as u64
    }

    /// Share of `total` as a percentage; 0.0 when total is zero
    pub fn percent_of(&self, total: Money) -> f64 {
        if total.is_zero() {
            return 0.0;
        }
        self.0 as f64 / total.0 as f64 * 100.0
    }

    /// One of `parts` equal shares, rounded up for positive amounts
    ///
    /// A non-positive `parts` returns the amount unchanged.
    pub fn div_ceil(&self, parts: i64) -> Self {
        if parts <= 0 {
            return *self;
        }
        let share = self.0 / parts;
        if self.0 > 0 && self.0 % parts != 0 {
            Self(share + 1)
        } else {
            Self(share)
        }
    }

    /// The amount, or zero if it is negative
    pub fn non_negative(&self) -> Self {
        Self(self.0.max(0))
    }

    /// Parse a decimal amount in currency units
    ///
    /// Accepts an optional leading `-`, an optional `$`, thousands
    /// separators and up to two decimal places: `"1,234.5"`, `"-$10"`,
    /// `"0.05"`. Digits past the second decimal place are dropped.
    pub fn parse(s: &str) -> Result<Self, MoneyParseError> {
        let invalid = || MoneyParseError(s.trim().to_string());

        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let digits: String = rest
            .strip_prefix('$')
            .unwrap_or(rest)
            .chars()
            .filter(|c| *c != ',')
            .collect();

        let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(fraction) {
            return Err(invalid());
        }

        let units: i64 = whole.parse().map_err(|_| invalid())?;
        let cents = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction[..2].parse::<i64>().map_err(|_| invalid())?,
        };

        let total = units
            .checked_mul(100)
            .and_then(|c| c.checked_add(cents))
            .filter(|c| *c <= MAX_AMOUNT_CENTS)
            .ok_or_else(invalid)?;
        Ok(Self(if negative { -total } else { total }))
    }

    /// `-$12.34` style formatting with any symbol (or none)
    pub fn format_with_symbol(&self, symbol: &str) -> String {
        let sign = if self.is_negative() { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{}{}{}.{:02}", sign, symbol, abs / 100, abs % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_with_symbol("$"))
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1050).to_string(), "$10.50");
        assert_eq!(Money::zero().to_string(), "$0.00");
        assert_eq!(Money::from_cents(-1050).to_string(), "-$10.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-$0.05");
        assert_eq!(Money::from_cents(-123_456).format_with_symbol(""), "-1234.56");
    }

    #[test]
    fn test_parse() {
        assert_eq!(Money::parse("10.50").unwrap().cents(), 1050);
        assert_eq!(Money::parse(" $10.5 ").unwrap().cents(), 1050);
        assert_eq!(Money::parse("-$10").unwrap().cents(), -1000);
        assert_eq!(Money::parse("1,234.567").unwrap().cents(), 123_456);
        assert_eq!(Money::parse("0.05").unwrap().cents(), 5);
        assert_eq!(Money::parse("7.").unwrap().cents(), 700);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "-", "$", "abc", "1.2.3", ".50", "1e3", "--5", "99999999999999999999"] {
            assert!(Money::parse(input).is_err(), "{:?} should not parse", input);
        }
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);
        assert_eq!((a + b).cents(), 1500);
        assert_eq!((b - a).cents(), -500);
        assert_eq!((-a).cents(), -1000);
        assert!(a > b);

        let total: Money = [100, 200, 300].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 600);
    }

    #[test]
    fn test_limit_and_saturation() {
        assert!(Money::from_cents(-MAX_AMOUNT_CENTS).is_within_limit());
        assert!(!Money::from_cents(MAX_AMOUNT_CENTS + 1).is_within_limit());
        assert!(!Money::from_cents(i64::MIN).is_within_limit());
        assert!(Money::parse("100000000000").is_ok());
        assert!(Money::parse("100000000000.01").is_err());

        let min = Money::from_cents(i64::MIN);
        assert_eq!(min.abs().cents(), i64::MAX);
        assert_eq!((-min).cents(), i64::MAX);
        assert_eq!((min - Money::from_cents(1)).cents(), i64::MIN);
        assert_eq!((Money::from_cents(i64::MAX) + Money::from_cents(1)).cents(), i64::MAX);
    }

    #[test]
    fn test_shares() {
        assert_eq!(Money::from_cents(2500).percent_of(Money::from_cents(10_000)), 25.0);
        assert_eq!(Money::from_cents(2500).percent_of(Money::zero()), 0.0);
        assert_eq!(Money::from_cents(1000).div_ceil(3).cents(), 334);
        assert_eq!(Money::from_cents(900).div_ceil(3).cents(), 300);
        assert_eq!(Money::from_cents(-1000).div_ceil(3).cents(), -333);
        assert_eq!(Money::from_cents(900).div_ceil(0).cents(), 900);
        assert_eq!(Money::from_cents(-1).non_negative(), Money::zero());
    }

    #[test]
    fn test_serializes_as_cents() {
        let json = serde_json::to_string(&Money::from_cents(1050)).unwrap();
        assert_eq!(json, "1050");
        assert_eq!(serde_json::from_str::<Money>("-75").unwrap().cents(), -75);
    }
}
