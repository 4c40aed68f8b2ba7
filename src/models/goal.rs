//! Savings and debt payoff goals
//!
//! A goal follows one account. Progress is measured from the account balance
//! captured when the goal was created.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, BudgetId, GoalId};
use super::money::Money;
use super::month::Month;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    /// Grow an asset account by the target amount
    Savings,
    /// Pay down a liability account by the target amount
    Debt,
}

impl fmt::Display for GoalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Savings => write!(f, "savings"),
            Self::Debt => write!(f, "debt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub budget_id: BudgetId,
    pub account_id: AccountId,
    pub name: String,
    pub kind: GoalKind,
    pub target_amount: Money,
    pub target_date: Option<NaiveDate>,

    /// Account balance when the goal was created
    pub starting_balance: Money,

    #[serde(default)]
    pub archived: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(
        budget_id: BudgetId,
        account_id: AccountId,
        name: impl Into<String>,
        kind: GoalKind,
        target_amount: Money,
        starting_balance: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: GoalId::new(),
            budget_id,
            account_id,
            name: name.into(),
            kind,
            target_amount,
            target_date: None,
            starting_balance,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the goal as of `today`
    pub fn validate(&self, today: NaiveDate) -> Result<(), GoalValidationError> {
        if self.name.trim().is_empty() {
            return Err(GoalValidationError::EmptyName);
        }

        if self.name.len() > 100 {
            return Err(GoalValidationError::NameTooLong(self.name.len()));
        }

        if !self.target_amount.is_positive() {
            return Err(GoalValidationError::NonPositiveTarget);
        }

        if !self.target_amount.is_within_limit() {
            return Err(GoalValidationError::TargetOutOfRange);
        }

        if let Some(date) = self.target_date {
            if date <= today {
                return Err(GoalValidationError::DateNotInFuture(date));
            }
        }

        Ok(())
    }

    /// Compute progress given the account's current balance
    pub fn progress(&self, current_balance: Money, today: NaiveDate) -> GoalProgress {
        let current = match self.kind {
            GoalKind::Savings => current_balance - self.starting_balance,
            GoalKind::Debt => self.starting_balance.abs() - current_balance.abs(),
        }
        .non_negative();

        let remaining = (self.target_amount - current).non_negative();
        let completed = remaining.is_zero();
        let percent = current.percent_of(self.target_amount).clamp(0.0, 100.0);

        let monthly_needed = self.target_date.map(|date| {
            if completed {
                return Money::zero();
            }
            let months_left = Month::of(today).months_until(Month::of(date)) + 1;
            if months_left <= 0 {
                remaining
            } else {
                remaining.div_ceil(months_left as i64)
            }
        });

        let on_track = completed
            || match self.target_date {
                None => true,
                Some(date) => {
                    let start = self.created_at.date_naive();
                    let total_days = (date - start).num_days().max(1);
                    let elapsed = (today - start).num_days().clamp(0, total_days);
                    let expected = self.target_amount.cents() as f64 * elapsed as f64
                        / total_days as f64;
                    current.cents() as f64 >= expected.floor()
                }
            };

        GoalProgress {
            current,
            remaining,
            percent,
            monthly_needed,
            on_track,
            completed,
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.kind, self.target_amount)
    }
}

/// Computed progress toward a goal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalProgress {
    /// Saved so far (savings) or paid down so far (debt)
    pub current: Money,
    pub remaining: Money,
    /// 0 to 100
    pub percent: f64,
    /// Per-month amount needed to hit the target date
    pub monthly_needed: Option<Money>,
    pub on_track: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalValidationError {
    EmptyName,
    NameTooLong(usize),
    NonPositiveTarget,
    TargetOutOfRange,
    DateNotInFuture(NaiveDate),
}

impl fmt::Display for GoalValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Goal name cannot be empty"),
            Self::NameTooLong(len) => write!(f, "Goal name too long ({} chars, max 100)", len),
            Self::NonPositiveTarget => write!(f, "Goal target must be greater than zero"),
            Self::TargetOutOfRange => write!(f, "Goal target is out of range"),
            Self::DateNotInFuture(d) => write!(f, "Goal target date {} must be in the future", d),
        }
    }
}

impl std::error::Error for GoalValidationError {}
