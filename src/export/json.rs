//! JSON export
//!
//! A versioned snapshot of one budget. Aggregator access tokens never leave
//! the server; institutions are exported as summaries.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    Account, Budget, Category, CategoryGroup, Goal, InstitutionSummary, Rule, SpendingTarget,
    Transaction,
};
use crate::models::rule::sort_for_evaluation;
use crate::storage::Storage;

/// Current export schema version
pub const EXPORT_SCHEMA_VERSION: &str = "2.0.0";

/// Everything a budget contains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetExport {
    pub schema_version: String,
    pub exported_at: DateTime<Utc>,
    /// Server version that produced the export
    pub app_version: String,
    pub budget: Budget,
    pub institutions: Vec<InstitutionSummary>,
    pub accounts: Vec<Account>,
    pub category_groups: Vec<CategoryGroup>,
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,
    pub rules: Vec<Rule>,
    pub goals: Vec<Goal>,
    pub targets: Vec<SpendingTarget>,
    pub metadata: ExportMetadata,
}

/// Counts and date range, for a quick look at an export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub account_count: usize,
    pub transaction_count: usize,
    pub category_count: usize,
    pub rule_count: usize,
    pub goal_count: usize,
    pub earliest_transaction: Option<String>,
    pub latest_transaction: Option<String>,
}

impl BudgetExport {
    pub fn from_storage(storage: &Storage, budget: &Budget) -> EnvelopeResult<Self> {
        let budget_id = budget.id;

        let institutions = storage
            .institutions
            .for_budget(budget_id)?
            .iter()
            .map(|i| i.summary())
            .collect();
        let mut accounts = storage.accounts.for_budget(budget_id)?;
        accounts.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        let category_groups = storage.groups.ordered(budget_id)?;
        let mut categories = storage.categories.for_budget(budget_id)?;
        categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        let mut transactions = storage.transactions.for_budget(budget_id)?;
        transactions.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
        let mut rules = storage.rules.for_budget(budget_id)?;
        sort_for_evaluation(&mut rules);
        let goals = storage.goals.for_budget(budget_id)?;
        let targets = storage.targets.for_budget(budget_id)?;

        let metadata = ExportMetadata {
            account_count: accounts.len(),
            transaction_count: transactions.len(),
            category_count: categories.len(),
            rule_count: rules.len(),
            goal_count: goals.len(),
            earliest_transaction: transactions.first().map(|t| t.date.to_string()),
            latest_transaction: transactions.last().map(|t| t.date.to_string()),
        };

        Ok(Self {
            schema_version: EXPORT_SCHEMA_VERSION.to_string(),
            exported_at: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            budget: budget.clone(),
            institutions,
            accounts,
            category_groups,
            categories,
            transactions,
            rules,
            goals,
            targets,
            metadata,
        })
    }
}

/// Write the budget snapshot as pretty-printed JSON
pub fn export_budget_json<W: Write>(storage: &Storage, budget: &Budget, writer: &mut W) -> EnvelopeResult<()> {
    let export = BudgetExport::from_storage(storage, budget)?;
    serde_json::to_writer_pretty(writer, &export).map_err(|e| EnvelopeError::Export(e.to_string()))
}
