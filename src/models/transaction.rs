//! Transaction model
//!
//! Represents financial transactions imported from the aggregator, a CSV
//! file, or entered by hand, along with how their category was assigned.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, BudgetId, CategoryId, TransactionId};
use super::money::Money;

/// Where a transaction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSource {
    /// Synced from the aggregator
    Linked,
    /// Entered by a user
    #[default]
    Manual,
    /// Imported from a CSV file
    Csv,
}

/// How the current category was assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategorySource {
    /// Not categorized
    #[default]
    None,
    /// Chosen by a user; never overwritten automatically
    Manual,
    /// Assigned by an auto-categorization rule
    Rule,
    /// Mapped from the aggregator's suggested category
    Import,
}

/// A financial transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier
    pub id: TransactionId,

    /// Budget the transaction belongs to
    pub budget_id: BudgetId,

    /// The account this transaction belongs to
    pub account_id: AccountId,

    /// Transaction date
    pub date: NaiveDate,

    /// Amount (positive for inflow, negative for outflow)
    pub amount: Money,

    /// Payee name shown to the user
    #[serde(default)]
    pub payee: String,

    /// Merchant name reported by the aggregator
    #[serde(default)]
    pub merchant_name: Option<String>,

    /// Raw bank description
    #[serde(default)]
    pub description: String,

    /// Category ID (None when uncategorized)
    pub category_id: Option<CategoryId>,

    #[serde(default)]
    pub category_source: CategorySource,

    /// Notes entered by the user
    #[serde(default)]
    pub notes: String,

    /// Not yet posted by the bank
    #[serde(default)]
    pub pending: bool,

    /// Excluded from spending tracking and balances
    #[serde(default)]
    pub excluded: bool,

    #[serde(default)]
    pub source: TransactionSource,

    /// Aggregator transaction identifier
    #[serde(default)]
    pub external_id: Option<String>,

    /// Import ID for duplicate detection during CSV import
    #[serde(default)]
    pub import_id: Option<String>,

    /// When the transaction was created
    pub created_at: DateTime<Utc>,

    /// When the transaction was last modified
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new manual transaction
    pub fn new(budget_id: BudgetId, account_id: AccountId, date: NaiveDate, amount: Money) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            budget_id,
            account_id,
            date,
            amount,
            payee: String::new(),
            merchant_name: None,
            description: String::new(),
            category_id: None,
            category_source: CategorySource::None,
            notes: String::new(),
            pending: false,
            excluded: false,
            source: TransactionSource::Manual,
            external_id: None,
            import_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a transaction with all common fields
    pub fn with_details(
        budget_id: BudgetId,
        account_id: AccountId,
        date: NaiveDate,
        amount: Money,
        payee: impl Into<String>,
        category_id: Option<CategoryId>,
    ) -> Self {
        let mut txn = Self::new(budget_id, account_id, date, amount);
        txn.payee = payee.into();
        if let Some(category_id) = category_id {
            txn.assign_category(Some(category_id), CategorySource::Manual);
        }
        txn
    }

    /// Check if this is an inflow (positive amount)
    pub fn is_inflow(&self) -> bool {
        self.amount.is_positive()
    }

    /// Check if this is an outflow (negative amount)
    pub fn is_outflow(&self) -> bool {
        self.amount.is_negative()
    }

    /// Check if this transaction has a category
    pub fn is_categorized(&self) -> bool {
        self.category_id.is_some()
    }

    /// Whether the user chose the category by hand
    pub fn has_manual_category(&self) -> bool {
        self.category_id.is_some() && self.category_source == CategorySource::Manual
    }

    /// Whether date, amount and payee may be edited by users
    pub fn is_user_editable(&self) -> bool {
        self.source != TransactionSource::Linked
    }

    /// Set or clear the category, recording how it was chosen
    pub fn assign_category(&mut self, category_id: Option<CategoryId>, source: CategorySource) {
        self.category_id = category_id;
        self.category_source = if category_id.is_some() {
            source
        } else {
            CategorySource::None
        };
        self.updated_at = Utc::now();
    }

    /// Text used by rules and search: payee, merchant and description
    pub fn searchable_text(&self) -> String {
        let mut text = self.payee.to_lowercase();
        if let Some(merchant) = &self.merchant_name {
            text.push(' ');
            text.push_str(&merchant.to_lowercase());
        }
        text.push(' ');
        text.push_str(&self.description.to_lowercase());
        text.push(' ');
        text.push_str(&self.notes.to_lowercase());
        text
    }

    /// Validate the transaction
    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if self.amount.is_zero() && self.source == TransactionSource::Manual {
            return Err(TransactionValidationError::ZeroAmount);
        }

        if !self.amount.is_within_limit() {
            return Err(TransactionValidationError::AmountOutOfRange);
        }

        if self.payee.len() > 200 {
            return Err(TransactionValidationError::PayeeTooLong(self.payee.len()));
        }

        if self.notes.len() > 1000 {
            return Err(TransactionValidationError::NotesTooLong(self.notes.len()));
        }

        if self.source == TransactionSource::Linked && self.external_id.is_none() {
            return Err(TransactionValidationError::LinkedWithoutExternalId);
        }

        Ok(())
    }

    /// Duplicate-detection key for an imported row; must stay stable across
    /// builds since it is persisted
    pub fn generate_import_id(date: NaiveDate, amount: Money, payee: &str) -> String {
        format!("csv:{}:{}:{}", date, amount.cents(), payee.trim().to_lowercase())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.date.format("%Y-%m-%d"),
            self.payee,
            self.amount
        )
    }
}

/// Validation errors for transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    ZeroAmount,
    AmountOutOfRange,
    PayeeTooLong(usize),
    NotesTooLong(usize),
    LinkedWithoutExternalId,
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAmount => write!(f, "Transaction amount cannot be zero"),
            Self::AmountOutOfRange => write!(f, "Transaction amount is out of range"),
            Self::PayeeTooLong(len) => write!(f, "Payee too long ({} chars, max 200)", len),
            Self::NotesTooLong(len) => write!(f, "Notes too long ({} chars, max 1000)", len),
            Self::LinkedWithoutExternalId => {
                write!(f, "Linked transactions need an external id")
            }
        }
    }
}

impl std::error::Error for TransactionValidationError {}
