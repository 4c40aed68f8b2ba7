//! Transaction queries

use chrono::NaiveDate;

use crate::error::EnvelopeError;
use crate::models::{AccountId, BudgetId, CategoryId, CategorySource, Money, Month, Transaction};

use super::collection::Collection;

impl Collection<Transaction> {
    /// Get transactions for an account, sorted by date
    pub fn get_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>, EnvelopeError> {
        let mut txns = self.filter(|t| t.account_id == account_id)?;
        txns.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
        Ok(txns)
    }

    /// Get transactions assigned to a category
    pub fn get_by_category(&self, category_id: CategoryId) -> Result<Vec<Transaction>, EnvelopeError> {
        self.filter(|t| t.category_id == Some(category_id))
    }

    /// Get a budget's transactions in a date range (inclusive)
    pub fn get_by_date_range(
        &self,
        budget_id: BudgetId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>, EnvelopeError> {
        self.filter(|t| t.budget_id == budget_id && t.date >= start && t.date <= end)
    }

    /// Get a budget's transactions in a month
    pub fn get_by_month(&self, budget_id: BudgetId, month: Month) -> Result<Vec<Transaction>, EnvelopeError> {
        self.get_by_date_range(budget_id, month.start_date(), month.end_date())
    }

    /// Find an aggregator transaction by its external id within an account
    pub fn find_by_external_id(
        &self,
        account_id: AccountId,
        external_id: &str,
    ) -> Result<Option<Transaction>, EnvelopeError> {
        self.find(|t| t.account_id == account_id && t.external_id.as_deref() == Some(external_id))
    }

    /// Insert a transaction unless one with the same external id exists in its account
    pub fn insert_external(&self, txn: Transaction) -> Result<Result<(), Transaction>, EnvelopeError> {
        self.insert_unique(txn, |existing, new| {
            existing.account_id == new.account_id
                && new.external_id.is_some()
                && existing.external_id == new.external_id
        })
    }

    /// Clear the category from every transaction that uses it
    pub fn uncategorize(&self, category_id: CategoryId) -> Result<Vec<Transaction>, EnvelopeError> {
        let affected = self.get_by_category(category_id)?;
        self.update_where(
            |t| t.category_id == Some(category_id),
            |t| t.assign_category(None, CategorySource::None),
        )?;
        Ok(affected)
    }

    /// Sum of non-excluded transactions in an account
    pub fn account_total(&self, account_id: AccountId) -> Result<Money, EnvelopeError> {
        Ok(self
            .filter(|t| t.account_id == account_id && !t.excluded)?
            .iter()
            .map(|t| t.amount)
            .sum())
    }
}
