//! Spending targets
//!
//! A target caps what one category should spend. Whatever its cadence, the
//! tracking summary compares spending against the target's share for a
//! single calendar month.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BudgetId, CategoryId, TargetId};
use super::money::Money;
use super::month::Month;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetCadence {
    Weekly,
    #[default]
    Monthly,
    Yearly,
    /// Repeats every `days` days
    Custom { days: u32 },
    /// Save the whole amount before `target_date`
    ByDate { target_date: NaiveDate },
}

fn scale(amount: Money, factor: f64) -> Money {
    Money::from_cents((amount.cents() as f64 * factor).round() as i64)
}

impl TargetCadence {
    /// The part of `amount` that falls in `month`
    ///
    /// Weekly and custom cadences scale by the month's length in days.
    /// Dated targets spread what is left over the remaining months and drop
    /// to zero once the date has passed.
    pub fn share_of(&self, amount: Money, month: Month) -> Money {
        let days = month.days() as f64;
        match *self {
            Self::Monthly => amount,
            Self::Yearly => Money::from_cents(amount.cents() / 12),
            Self::Weekly => scale(amount, days / 7.0),
            Self::Custom { days: 0 } => Money::zero(),
            Self::Custom { days: every } => scale(amount, days / f64::from(every)),
            Self::ByDate { target_date } if target_date < month.start_date() => Money::zero(),
            Self::ByDate { target_date } if target_date <= month.end_date() => amount,
            Self::ByDate { target_date } => {
                let months_left = month.months_until(Month::of(target_date)) + 1;
                amount.div_ceil(i64::from(months_left))
            }
        }
    }
}

impl fmt::Display for TargetCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekly => f.write_str("Weekly"),
            Self::Monthly => f.write_str("Monthly"),
            Self::Yearly => f.write_str("Yearly"),
            Self::Custom { days } => write!(f, "Every {} days", days),
            Self::ByDate { target_date } => write!(f, "By {}", target_date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetValidationError {
    #[error("Target amount must be greater than zero")]
    NotPositive,
    #[error("Target amount is out of range")]
    OutOfRange,
    #[error("Custom interval must be at least 1 day")]
    InvalidCustomInterval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingTarget {
    pub id: TargetId,
    pub budget_id: BudgetId,
    pub category_id: CategoryId,
    pub amount: Money,
    #[serde(default)]
    pub cadence: TargetCadence,
    #[serde(default = "active_by_default")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn active_by_default() -> bool {
    true
}

impl SpendingTarget {
    pub fn new(
        budget_id: BudgetId,
        category_id: CategoryId,
        amount: Money,
        cadence: TargetCadence,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TargetId::new(),
            budget_id,
            category_id,
            amount,
            cadence,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn monthly(budget_id: BudgetId, category_id: CategoryId, amount: Money) -> Self {
        Self::new(budget_id, category_id, amount, TargetCadence::Monthly)
    }

    /// Zero for inactive targets
    pub fn monthly_amount(&self, month: Month) -> Money {
        if self.active {
            self.cadence.share_of(self.amount, month)
        } else {
            Money::zero()
        }
    }

    /// Replace amount and cadence; an inactive target comes back to life
    pub fn update(&mut self, amount: Money, cadence: TargetCadence) {
        self.amount = amount;
        self.cadence = cadence;
        self.active = true;
        self.updated_at = Utc::now();
    }

    pub fn validate(&self) -> Result<(), TargetValidationError> {
        if !self.amount.is_positive() {
            return Err(TargetValidationError::NotPositive);
        }
        if !self.amount.is_within_limit() {
            return Err(TargetValidationError::OutOfRange);
        }
        if self.cadence == (TargetCadence::Custom { days: 0 }) {
            return Err(TargetValidationError::InvalidCustomInterval);
        }
        Ok(())
    }
}

impl fmt::Display for SpendingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.cadence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    fn share(cents: i64, cadence: TargetCadence, m: Month) -> i64 {
        cadence.share_of(Money::from_cents(cents), m).cents()
    }

    #[test]
    fn test_fixed_cadences() {
        assert_eq!(share(50_000, TargetCadence::Monthly, month(2025, 1)), 50_000);
        assert_eq!(share(120_000, TargetCadence::Yearly, month(2025, 6)), 10_000);
        assert_eq!(share(100, TargetCadence::Yearly, month(2025, 6)), 8);
    }

    #[test]
    fn test_day_based_cadences_follow_month_length() {
        assert_eq!(share(7_000, TargetCadence::Weekly, month(2025, 2)), 28_000);
        assert_eq!(share(7_000, TargetCadence::Weekly, month(2024, 2)), 29_000);
        assert_eq!(share(3_000, TargetCadence::Custom { days: 15 }, month(2025, 4)), 6_000);
        assert_eq!(share(3_000, TargetCadence::Custom { days: 0 }, month(2025, 4)), 0);
    }

    #[test]
    fn test_dated_target_spreads_over_remaining_months() {
        let by = TargetCadence::ByDate {
            target_date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
        };
        // January through March
        assert_eq!(share(100_000, by.clone(), month(2025, 1)), 33_334);
        assert_eq!(share(100_000, by.clone(), month(2025, 3)), 100_000);
        assert_eq!(share(100_000, by, month(2025, 4)), 0);
    }

    #[test]
    fn test_inactive_and_update() {
        let mut target = SpendingTarget::monthly(BudgetId::new(), CategoryId::new(), Money::from_cents(500));
        target.active = false;
        assert!(target.monthly_amount(month(2025, 1)).is_zero());

        target.update(Money::from_cents(900), TargetCadence::Yearly);
        assert!(target.active);
        assert_eq!(target.monthly_amount(month(2025, 1)).cents(), 75);
        assert_eq!(target.to_string(), "$9.00 Yearly");
    }

    #[test]
    fn test_validation() {
        let target = |cents, cadence| {
            SpendingTarget::new(BudgetId::new(), CategoryId::new(), Money::from_cents(cents), cadence)
        };
        assert!(target(100, TargetCadence::Monthly).validate().is_ok());
        assert_eq!(
            target(0, TargetCadence::Monthly).validate(),
            Err(TargetValidationError::NotPositive)
        );
        assert_eq!(
            target(-5, TargetCadence::Weekly).validate(),
            Err(TargetValidationError::NotPositive)
        );
        assert_eq!(
            target(i64::MAX, TargetCadence::Yearly).validate(),
            Err(TargetValidationError::OutOfRange)
        );
        assert_eq!(
            target(100, TargetCadence::Custom { days: 0 }).validate(),
            Err(TargetValidationError::InvalidCustomInterval)
        );
    }

    #[test]
    fn test_cadence_wire_format() {
        let json = serde_json::to_string(&TargetCadence::Custom { days: 14 }).unwrap();
        assert_eq!(json, r#"{"type":"custom","days":14}"#);
        let cadence: TargetCadence = serde_json::from_str(r#"{"type":"by_date","target_date":"2025-12-01"}"#).unwrap();
        assert_eq!(cadence.to_string(), "By 2025-12-01");
    }
}
