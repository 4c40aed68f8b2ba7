//! Monthly spending tracking snapshot
//!
//! A `MonthSummary` aggregates one month of transactions against the
//! category targets. Summaries are stored and recomputed whenever the
//! underlying data changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::account::Account;
use super::category::{Category, CategoryGroup};
use super::ids::{AccountId, BudgetId, CategoryGroupId, CategoryId};
use super::money::Money;
use super::month::Month;
use super::target::SpendingTarget;
use super::transaction::Transaction;

/// Tracking figures for one category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySpending {
    pub category_id: CategoryId,
    pub name: String,
    /// Target converted to this month (zero when no target)
    pub target: Money,
    /// Outflows minus refunds, as a positive figure
    pub spent: Money,
    pub remaining: Money,
    pub percent_used: f64,
    pub over_budget: bool,
    pub transaction_count: usize,
}

impl CategorySpending {
    fn new(category: &Category, target: Money, spent: Money, transaction_count: usize) -> Self {
        Self {
            category_id: category.id,
            name: category.name.clone(),
            target,
            spent,
            remaining: target - spent,
            percent_used: spent.percent_of(target),
            over_budget: target.is_positive() && spent > target,
            transaction_count,
        }
    }
}

/// Tracking totals for a category group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupSpending {
    pub group_id: CategoryGroupId,
    pub name: String,
    pub target: Money,
    pub spent: Money,
    pub remaining: Money,
    pub categories: Vec<CategorySpending>,
}

/// One month of spending against targets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthSummary {
    pub budget_id: BudgetId,
    pub month: Month,
    pub groups: Vec<GroupSpending>,
    pub total_income: Money,
    pub total_target: Money,
    pub total_spent: Money,
    pub uncategorized_spending: Money,
    pub uncategorized_count: usize,
    pub left_to_spend: Money,
    pub transaction_count: usize,
    pub calculated_at: DateTime<Utc>,
}

/// Everything needed to compute a summary
pub struct TrackingInput<'a> {
    pub groups: &'a [CategoryGroup],
    pub categories: &'a [Category],
    pub targets: &'a [SpendingTarget],
    pub accounts: &'a [Account],
    pub transactions: &'a [Transaction],
}

impl MonthSummary {
    /// Aggregate one month
    ///
    /// Excluded transactions and transactions in off-budget accounts are
    /// skipped. Inflows count as income when uncategorized or categorized into
    /// a system group; inflows into any other category reduce its spending.
    pub fn compute(budget_id: BudgetId, month: Month, input: TrackingInput<'_>) -> Self {
        let on_budget: HashSet<AccountId> = input
            .accounts
            .iter()
            .filter(|a| a.on_budget)
            .map(|a| a.id)
            .collect();

        let income_groups: HashSet<CategoryGroupId> = input
            .groups
            .iter()
            .filter(|g| g.system)
            .map(|g| g.id)
            .collect();

        let income_categories: HashSet<CategoryId> = input
            .categories
            .iter()
            .filter(|c| income_groups.contains(&c.group_id))
            .map(|c| c.id)
            .collect();

        let known_categories: HashSet<CategoryId> =
            input.categories.iter().map(|c| c.id).collect();

        let mut spent_by_category: HashMap<CategoryId, (Money, usize)> = HashMap::new();
        let mut total_income = Money::zero();
        let mut uncategorized_spending = Money::zero();
        let mut uncategorized_count = 0;
        let mut transaction_count = 0;

        for txn in input.transactions {
            if txn.excluded || !month.contains(txn.date) || !on_budget.contains(&txn.account_id) {
                continue;
            }
            transaction_count += 1;

            let category = txn.category_id.filter(|id| known_categories.contains(id));
            match category {
                Some(id) if income_categories.contains(&id) => {
                    total_income += txn.amount;
                }
                Some(id) => {
                    let entry = spent_by_category.entry(id).or_insert((Money::zero(), 0));
                    entry.0 -= txn.amount;
                    entry.1 += 1;
                }
                None if txn.is_inflow() => {
                    total_income += txn.amount;
                }
                None => {
                    uncategorized_spending -= txn.amount;
                    uncategorized_count += 1;
                }
            }
        }

        let target_by_category: HashMap<CategoryId, Money> = input
            .targets
            .iter()
            .filter(|t| t.active)
            .map(|t| (t.category_id, t.monthly_amount(month)))
            .collect();

        let mut sorted_groups: Vec<&CategoryGroup> = input
            .groups
            .iter()
            .filter(|g| !income_groups.contains(&g.id))
            .collect();
        sorted_groups.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));

        let mut groups = Vec::with_capacity(sorted_groups.len());
        for group in sorted_groups {
            let mut members: Vec<&Category> = input
                .categories
                .iter()
                .filter(|c| c.group_id == group.id)
                .collect();
            members.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));

            let categories: Vec<CategorySpending> = members
                .into_iter()
                .map(|category| {
                    let (spent, count) = spent_by_category
                        .get(&category.id)
                        .copied()
                        .unwrap_or((Money::zero(), 0));
                    let target = target_by_category
                        .get(&category.id)
                        .copied()
                        .unwrap_or_else(Money::zero);
                    CategorySpending::new(category, target, spent, count)
                })
                .collect();

            let target: Money = categories.iter().map(|c| c.target).sum();
            let spent: Money = categories.iter().map(|c| c.spent).sum();
            groups.push(GroupSpending {
                group_id: group.id,
                name: group.name.clone(),
                target,
                spent,
                remaining: target - spent,
                categories,
            });
        }

        let total_target: Money = groups.iter().map(|g| g.target).sum();
        let total_spent: Money = groups.iter().map(|g| g.spent).sum::<Money>() + uncategorized_spending;

        Self {
            budget_id,
            month,
            groups,
            total_income,
            total_target,
            total_spent,
            uncategorized_spending,
            uncategorized_count,
            left_to_spend: total_target - total_spent,
            transaction_count,
            calculated_at: Utc::now(),
        }
    }

    /// Find a category's figures
    pub fn category(&self, id: CategoryId) -> Option<&CategorySpending> {
        self.groups
            .iter()
            .flat_map(|g| g.categories.iter())
            .find(|c| c.category_id == id)
    }

    /// Categories with the most spending, largest first
    pub fn top_categories(&self, count: usize) -> Vec<&CategorySpending> {
        let mut all: Vec<&CategorySpending> = self
            .groups
            .iter()
            .flat_map(|g| g.categories.iter())
            .filter(|c| c.spent.is_positive())
            .collect();
        all.sort_by(|a, b| b.spent.cmp(&a.spent));
        all.truncate(count);
        all
    }
}
