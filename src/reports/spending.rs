//! Spending trend
//!
//! Month-by-month income and spending over a trailing window.

use serde::Serialize;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{BudgetId, Money, Month};
use crate::services::TrackingService;
use crate::storage::Storage;

/// Longest window the trend covers
pub const MAX_TREND_MONTHS: usize = 24;

/// Window used when the caller does not give one
pub const DEFAULT_TREND_MONTHS: usize = 6;

/// Totals for one month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthSpending {
    pub month: Month,
    pub income: Money,
    pub spending: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpendingTrend {
    pub months: Vec<MonthSpending>,
    pub total_spending: Money,
    /// Spending averaged over the window, rounded up to the cent
    pub average_spending: Money,
}

impl SpendingTrend {
    /// The `count` months ending at `end`, oldest first
    pub fn generate(storage: &Storage, budget_id: BudgetId, end: Month, count: usize) -> EnvelopeResult<Self> {
        if count == 0 || count > MAX_TREND_MONTHS {
            return Err(EnvelopeError::Validation(format!(
                "months must be between 1 and {}",
                MAX_TREND_MONTHS
            )));
        }

        let tracking = TrackingService::new(storage);
        let months = end
            .trailing(count)
            .into_iter()
            .map(|month| {
                let summary = tracking.month_summary(budget_id, month)?;
                Ok(MonthSpending {
                    month,
                    income: summary.total_income,
                    spending: summary.total_spent,
                })
            })
            .collect::<EnvelopeResult<Vec<_>>>()?;

        let total_spending: Money = months.iter().map(|m| m.spending).sum();
        Ok(Self {
            average_spending: total_spending.div_ceil(count as i64),
            total_spending,
            months,
        })
    }
}
