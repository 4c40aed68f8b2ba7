//! Budget overview
//!
//! The dashboard figures for one month: net worth, month income and
//! spending, the biggest spending categories and goal progress.

use serde::Serialize;

use crate::error::EnvelopeResult;
use crate::models::{BudgetId, CategorySpending, Money, Month};
use crate::reports::NetWorth;
use crate::services::{AccountService, BudgetAccess, GoalService, TrackingService};
use crate::storage::Storage;

/// How many categories the overview lists
pub const TOP_CATEGORY_COUNT: usize = 5;

/// Goal counts for the overview
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GoalCounts {
    /// Goals that are not archived
    pub active: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetOverview {
    pub budget_id: BudgetId,
    pub month: Month,
    pub net_worth: NetWorth,
    pub income: Money,
    pub spending: Money,
    pub total_target: Money,
    pub left_to_spend: Money,
    pub uncategorized_count: usize,
    pub top_categories: Vec<CategorySpending>,
    pub goals: GoalCounts,
}

impl BudgetOverview {
    pub fn generate(storage: &Storage, access: &BudgetAccess, month: Month) -> EnvelopeResult<Self> {
        let accounts = AccountService::new(storage).list(access, false)?;
        let summary = TrackingService::new(storage).month_summary(access.budget_id(), month)?;

        let goals = GoalService::new(storage).list(access, false)?;
        let goal_counts = GoalCounts {
            active: goals.len(),
            completed: goals.iter().filter(|g| g.progress.completed).count(),
        };

        Ok(Self {
            budget_id: access.budget_id(),
            month,
            net_worth: NetWorth::from_accounts(&accounts),
            income: summary.total_income,
            spending: summary.total_spent,
            total_target: summary.total_target,
            left_to_spend: summary.left_to_spend,
            uncategorized_count: summary.uncategorized_count,
            top_categories: summary
                .top_categories(TOP_CATEGORY_COUNT)
                .into_iter()
                .cloned()
                .collect(),
            goals: goal_counts,
        })
    }
}
