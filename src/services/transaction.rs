//! Transaction service
//!
//! Provides business logic for transaction management: filtered listing
//! with names resolved, manual entry, edits, and bulk categorization.
//! Every mutation refreshes the tracking snapshot of the months it touched.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::audit::EntityType;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    Account, AccountId, BudgetId, CategoryId, CategorySource, Money, Month, Transaction,
    TransactionId,
};
use crate::services::access::BudgetAccess;
use crate::services::{RuleEngine, TrackingService};
use crate::storage::Storage;

/// Default page size for listings
pub const DEFAULT_LIMIT: usize = 100;

/// Largest page size a caller may request
pub const MAX_LIMIT: usize = 500;

/// Service for transaction management
pub struct TransactionService<'a> {
    storage: &'a Storage,
}

/// Options for filtering transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Filter by account
    pub account_id: Option<AccountId>,
    /// Filter by category
    pub category_id: Option<CategoryId>,
    /// Only transactions without a category
    pub uncategorized: bool,
    /// Filter by month; takes precedence over the date range
    pub month: Option<Month>,
    /// Filter by date range start
    pub start_date: Option<NaiveDate>,
    /// Filter by date range end
    pub end_date: Option<NaiveDate>,
    /// Case-insensitive search over payee, description and notes
    pub search: Option<String>,
    pub pending: Option<bool>,
    /// Maximum number of transactions to return
    pub limit: Option<usize>,
    pub offset: usize,
}

impl TransactionFilter {
    /// Create a new empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by account
    pub fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    /// Filter by category
    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn month(mut self, month: Month) -> Self {
        self.month = Some(month);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Limit results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    fn date_bounds(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match self.month {
            Some(month) => (Some(month.start_date()), Some(month.end_date())),
            None => (self.start_date, self.end_date),
        }
    }

    fn matches(&self, txn: &Transaction, needle: Option<&str>) -> bool {
        let (start, end) = self.date_bounds();

        self.account_id.map_or(true, |id| txn.account_id == id)
            && self.category_id.map_or(true, |id| txn.category_id == Some(id))
            && (!self.uncategorized || !txn.is_categorized())
            && start.map_or(true, |d| txn.date >= d)
            && end.map_or(true, |d| txn.date <= d)
            && self.pending.map_or(true, |p| txn.pending == p)
            && needle.map_or(true, |n| {
                txn.payee.to_lowercase().contains(n)
                    || txn.description.to_lowercase().contains(n)
                    || txn.notes.to_lowercase().contains(n)
            })
    }
}

/// A transaction with its account and category names resolved
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub account_name: String,
    pub category_name: Option<String>,
    pub group_name: Option<String>,
}

/// One page of a transaction listing
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionView>,
    /// Matches before paging
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Input for creating a new transaction
#[derive(Debug, Clone)]
pub struct CreateTransactionInput {
    pub account_id: AccountId,
    pub date: NaiveDate,
    pub amount: Money,
    pub payee: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub notes: Option<String>,
}

/// Fields that may be changed on a transaction
///
/// `category_id: Some(None)` clears the category.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub category_id: Option<Option<CategoryId>>,
    pub notes: Option<String>,
    pub payee: Option<String>,
    pub excluded: Option<bool>,
    pub date: Option<NaiveDate>,
    pub amount: Option<Money>,
}

/// Names used to decorate transaction rows
pub(crate) struct NameIndex {
    accounts: HashMap<AccountId, String>,
    categories: HashMap<CategoryId, (String, Option<String>)>,
}

impl NameIndex {
    pub(crate) fn load(storage: &Storage, budget_id: BudgetId) -> EnvelopeResult<Self> {
        let groups: HashMap<_, _> = storage
            .groups
            .for_budget(budget_id)?
            .into_iter()
            .map(|g| (g.id, g.name))
            .collect();
        let categories = storage
            .categories
            .for_budget(budget_id)?
            .into_iter()
            .map(|c| {
                let group = groups.get(&c.group_id).cloned();
                (c.id, (c.name, group))
            })
            .collect();
        let accounts = storage
            .accounts
            .for_budget(budget_id)?
            .into_iter()
            .map(|a| (a.id, a.name))
            .collect();

        Ok(Self {
            accounts,
            categories,
        })
    }

    pub(crate) fn account(&self, id: AccountId) -> &str {
        self.accounts.get(&id).map(String::as_str).unwrap_or_default()
    }

    pub(crate) fn view(&self, transaction: Transaction) -> TransactionView {
        let (category_name, group_name) = transaction
            .category_id
            .and_then(|id| self.categories.get(&id).cloned())
            .map(|(category, group)| (Some(category), group))
            .unwrap_or((None, None));

        TransactionView {
            account_name: self.account(transaction.account_id).to_string(),
            category_name,
            group_name,
            transaction,
        }
    }
}

impl<'a> TransactionService<'a> {
    /// Create a new transaction service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Matching transactions, newest first
    pub fn list(&self, access: &BudgetAccess, filter: &TransactionFilter) -> EnvelopeResult<TransactionPage> {
        let budget_id = access.budget_id();
        let needle = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut matches = self
            .storage
            .transactions
            .filter(|t| t.budget_id == budget_id && filter.matches(t, needle.as_deref()))?;
        matches.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));

        let total = matches.len();
        let limit = filter.effective_limit();
        let names = NameIndex::load(self.storage, budget_id)?;
        let transactions = matches
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .map(|t| names.view(t))
            .collect();

        Ok(TransactionPage {
            transactions,
            total,
            limit,
            offset: filter.offset,
        })
    }

    /// Get a transaction in the budget
    pub fn get(&self, access: &BudgetAccess, id: TransactionId) -> EnvelopeResult<Transaction> {
        self.storage
            .transactions
            .get_in_budget(access.budget_id(), id)?
            .ok_or_else(|| EnvelopeError::not_found("Transaction", id.to_string()))
    }

    /// Enter a transaction on a manual account
    ///
    /// Rules run when no category is given.
    pub fn create_manual(
        &self,
        access: &BudgetAccess,
        input: CreateTransactionInput,
    ) -> EnvelopeResult<Transaction> {
        let budget_id = access.budget_id();
        let account = self.manual_account(budget_id, input.account_id)?;
        if account.archived {
            return Err(EnvelopeError::Validation(
                "Cannot add transactions to an archived account".into(),
            ));
        }
        if let Some(category_id) = input.category_id {
            self.require_category(budget_id, category_id)?;
        }

        let mut txn = Transaction::new(budget_id, account.id, input.date, input.amount);
        txn.payee = input.payee.trim().to_string();
        if let Some(description) = input.description {
            txn.description = description.trim().to_string();
        }
        if let Some(notes) = input.notes {
            txn.notes = notes.trim().to_string();
        }

        match input.category_id {
            Some(category_id) => txn.assign_category(Some(category_id), CategorySource::Manual),
            None => {
                RuleEngine::load(self.storage, budget_id)?.categorize(&mut txn);
            }
        }

        txn.validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        self.storage.transactions.upsert(txn.clone())?;
        self.storage.transactions.save()?;

        self.storage.log_create(
            access.scope(),
            EntityType::Transaction,
            txn.id,
            Some(txn.payee.clone()),
            &txn,
        )?;
        info!(transaction_id = %txn.id, account_id = %account.id, "Transaction created");

        TrackingService::new(self.storage).recalculate(budget_id, Month::of(txn.date))?;
        Ok(txn)
    }

    /// Update a transaction
    ///
    /// Date, amount and payee of synced transactions belong to the bank.
    pub fn update(
        &self,
        access: &BudgetAccess,
        id: TransactionId,
        changes: TransactionUpdate,
    ) -> EnvelopeResult<Transaction> {
        let budget_id = access.budget_id();
        let before = self.get(access, id)?;
        let mut txn = before.clone();

        let touches_bank_fields =
            changes.date.is_some() || changes.amount.is_some() || changes.payee.is_some();
        if touches_bank_fields && !txn.is_user_editable() {
            return Err(EnvelopeError::Conflict(
                "Date, amount and payee of synced transactions cannot be edited".into(),
            ));
        }

        if let Some(category_id) = changes.category_id {
            if let Some(category_id) = category_id {
                self.require_category(budget_id, category_id)?;
            }
            txn.assign_category(category_id, CategorySource::Manual);
        }
        if let Some(notes) = changes.notes {
            txn.notes = notes.trim().to_string();
        }
        if let Some(payee) = changes.payee {
            txn.payee = payee.trim().to_string();
        }
        if let Some(excluded) = changes.excluded {
            txn.excluded = excluded;
        }
        if let Some(date) = changes.date {
            txn.date = date;
        }
        if let Some(amount) = changes.amount {
            txn.amount = amount;
        }

        txn.validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        txn.updated_at = Utc::now();

        self.storage.transactions.upsert(txn.clone())?;
        self.storage.transactions.save()?;

        self.storage.log_update(
            access.scope(),
            EntityType::Transaction,
            txn.id,
            Some(txn.payee.clone()),
            &before,
            &txn,
        )?;

        TrackingService::new(self.storage)
            .recalculate_months(budget_id, [Month::of(before.date), Month::of(txn.date)])?;
        Ok(txn)
    }

    /// Delete a manual or imported transaction
    pub fn delete(&self, access: &BudgetAccess, id: TransactionId) -> EnvelopeResult<()> {
        let txn = self.get(access, id)?;
        if !txn.is_user_editable() {
            return Err(EnvelopeError::Conflict(
                "Synced transactions cannot be deleted; exclude them instead".into(),
            ));
        }

        self.storage.transactions.delete(id)?;
        self.storage.transactions.save()?;

        self.storage.log_delete(
            access.scope(),
            EntityType::Transaction,
            txn.id,
            Some(txn.payee.clone()),
            &txn,
        )?;

        TrackingService::new(self.storage).recalculate(access.budget_id(), Month::of(txn.date))?;
        Ok(())
    }

    /// Set (or clear) the category of many transactions at once
    ///
    /// Nothing changes unless every id belongs to the budget.
    pub fn bulk_categorize(
        &self,
        access: &BudgetAccess,
        ids: &[TransactionId],
        category_id: Option<CategoryId>,
    ) -> EnvelopeResult<usize> {
        let budget_id = access.budget_id();
        if let Some(category_id) = category_id {
            self.require_category(budget_id, category_id)?;
        }

        let mut txns = Vec::with_capacity(ids.len());
        for id in ids {
            txns.push(self.get(access, *id)?);
        }

        let mut months = BTreeSet::new();
        let mut updated = Vec::with_capacity(txns.len());
        for before in txns {
            let mut txn = before.clone();
            txn.assign_category(category_id, CategorySource::Manual);
            months.insert(Month::of(txn.date));

            self.storage.log_update(
                access.scope(),
                EntityType::Transaction,
                txn.id,
                Some(txn.payee.clone()),
                &before,
                &txn,
            )?;
            updated.push(txn);
        }

        let count = updated.len();
        self.storage.transactions.upsert_many(updated)?;
        self.storage.transactions.save()?;
        info!(budget_id = %budget_id, count, "Transactions categorized");

        TrackingService::new(self.storage).recalculate_months(budget_id, months)?;
        Ok(count)
    }

    fn manual_account(&self, budget_id: BudgetId, account_id: AccountId) -> EnvelopeResult<Account> {
        let account = self
            .storage
            .accounts
            .get_in_budget(budget_id, account_id)?
            .ok_or_else(|| EnvelopeError::not_found("Account", account_id.to_string()))?;
        if account.is_linked() {
            return Err(EnvelopeError::Conflict(
                "Transactions on linked accounts come from the bank".into(),
            ));
        }
        Ok(account)
    }

    fn require_category(&self, budget_id: BudgetId, category_id: CategoryId) -> EnvelopeResult<()> {
        self.storage
            .categories
            .get_in_budget(budget_id, category_id)?
            .map(|_| ())
            .ok_or_else(|| EnvelopeError::not_found("Category", category_id.to_string()))
    }
}
