//! Auto-categorization rules
//!
//! A rule is a list of conditions over transaction fields. When the
//! conditions match, the rule assigns its category and may rename the payee.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, BudgetId, CategoryId, RuleId};
use super::money::Money;
use super::transaction::{CategorySource, Transaction};

/// Transaction field a condition inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    Payee,
    Description,
    Merchant,
    Amount,
    Account,
}

/// Comparison applied to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
}

impl RuleOperator {
    /// Operators that only make sense on amounts
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::GreaterThan | Self::LessThan)
    }
}

/// A single condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: RuleField,
    pub operator: RuleOperator,
    pub value: String,
}

impl RuleCondition {
    pub fn new(field: RuleField, operator: RuleOperator, value: impl Into<String>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
        }
    }

    /// Check the condition against a transaction
    ///
    /// Text comparisons ignore case. Amount comparisons use absolute cents so
    /// "greater than 50.00" matches a 75.00 purchase.
    pub fn matches(&self, txn: &Transaction) -> bool {
        match self.field {
            RuleField::Amount => {
                let Ok(value) = Money::parse(&self.value) else {
                    return false;
                };
                let amount = txn.amount.abs().cents();
                let value = value.abs().cents();
                match self.operator {
                    RuleOperator::Equals => amount == value,
                    RuleOperator::GreaterThan => amount > value,
                    RuleOperator::LessThan => amount < value,
                    _ => false,
                }
            }
            RuleField::Account => match self.operator {
                RuleOperator::Equals => self
                    .value
                    .trim()
                    .parse::<AccountId>()
                    .map(|id| id == txn.account_id)
                    .unwrap_or(false),
                _ => false,
            },
            RuleField::Payee => self.matches_text(&txn.payee),
            RuleField::Description => self.matches_text(&txn.description),
            RuleField::Merchant => txn
                .merchant_name
                .as_deref()
                .map(|m| self.matches_text(m))
                .unwrap_or(false),
        }
    }

    fn matches_text(&self, haystack: &str) -> bool {
        let haystack = haystack.to_lowercase();
        let needle = self.value.trim().to_lowercase();
        match self.operator {
            RuleOperator::Contains => haystack.contains(&needle),
            RuleOperator::Equals => haystack.trim() == needle,
            RuleOperator::StartsWith => haystack.trim_start().starts_with(&needle),
            RuleOperator::EndsWith => haystack.trim_end().ends_with(&needle),
            RuleOperator::GreaterThan | RuleOperator::LessThan => false,
        }
    }

    fn validate(&self) -> Result<(), RuleValidationError> {
        if self.value.trim().is_empty() {
            return Err(RuleValidationError::EmptyValue);
        }

        match self.field {
            RuleField::Amount => {
                if matches!(
                    self.operator,
                    RuleOperator::Contains | RuleOperator::StartsWith | RuleOperator::EndsWith
                ) {
                    return Err(RuleValidationError::OperatorMismatch(self.field, self.operator));
                }
                if Money::parse(&self.value).is_err() {
                    return Err(RuleValidationError::InvalidAmount(self.value.clone()));
                }
            }
            RuleField::Account => {
                if self.operator != RuleOperator::Equals {
                    return Err(RuleValidationError::OperatorMismatch(self.field, self.operator));
                }
                if self.value.trim().parse::<AccountId>().is_err() {
                    return Err(RuleValidationError::InvalidAccount(self.value.clone()));
                }
            }
            _ => {
                if self.operator.is_numeric() {
                    return Err(RuleValidationError::OperatorMismatch(self.field, self.operator));
                }
            }
        }

        Ok(())
    }
}

/// An auto-categorization rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub budget_id: BudgetId,
    pub name: String,

    /// Lower values run first
    pub priority: i32,

    pub conditions: Vec<RuleCondition>,

    /// Require every condition (true) or any condition (false)
    #[serde(default = "default_true")]
    pub match_all: bool,

    pub category_id: CategoryId,

    /// Replace the payee with this text when the rule fires
    #[serde(default)]
    pub rename_payee: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Rule {
    pub fn new(
        budget_id: BudgetId,
        name: impl Into<String>,
        category_id: CategoryId,
        conditions: Vec<RuleCondition>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RuleId::new(),
            budget_id,
            name: name.into(),
            priority: 0,
            conditions,
            match_all: true,
            category_id,
            rename_payee: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the rule fires for this transaction
    pub fn matches(&self, txn: &Transaction) -> bool {
        if !self.enabled || self.conditions.is_empty() {
            return false;
        }

        if self.match_all {
            self.conditions.iter().all(|c| c.matches(txn))
        } else {
            self.conditions.iter().any(|c| c.matches(txn))
        }
    }

    /// Apply the rule's effects to a transaction
    pub fn apply_to(&self, txn: &mut Transaction) {
        txn.assign_category(Some(self.category_id), CategorySource::Rule);
        if let Some(payee) = &self.rename_payee {
            txn.payee = payee.clone();
        }
    }

    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.name.trim().is_empty() {
            return Err(RuleValidationError::EmptyName);
        }

        if self.name.len() > 100 {
            return Err(RuleValidationError::NameTooLong(self.name.len()));
        }

        if self.conditions.is_empty() {
            return Err(RuleValidationError::NoConditions);
        }

        for condition in &self.conditions {
            condition.validate()?;
        }

        if let Some(payee) = &self.rename_payee {
            if payee.trim().is_empty() {
                return Err(RuleValidationError::EmptyRename);
            }
        }

        Ok(())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Sort rules into evaluation order: priority, then creation time
pub fn sort_for_evaluation(rules: &mut [Rule]) {
    rules.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(a.created_at.cmp(&b.created_at))
    });
}

/// Find the first enabled rule matching the transaction
///
/// `rules` must already be in evaluation order.
pub fn first_match<'r>(rules: &'r [Rule], txn: &Transaction) -> Option<&'r Rule> {
    rules.iter().find(|rule| rule.matches(txn))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleValidationError {
    EmptyName,
    NameTooLong(usize),
    NoConditions,
    EmptyValue,
    EmptyRename,
    InvalidAmount(String),
    InvalidAccount(String),
    OperatorMismatch(RuleField, RuleOperator),
}

impl fmt::Display for RuleValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Rule name cannot be empty"),
            Self::NameTooLong(len) => write!(f, "Rule name too long ({} chars, max 100)", len),
            Self::NoConditions => write!(f, "Rule needs at least one condition"),
            Self::EmptyValue => write!(f, "Condition value cannot be empty"),
            Self::EmptyRename => write!(f, "Renamed payee cannot be empty"),
            Self::InvalidAmount(v) => write!(f, "Invalid amount in condition: {}", v),
            Self::InvalidAccount(v) => write!(f, "Invalid account id in condition: {}", v),
            Self::OperatorMismatch(field, op) => {
                write!(f, "Operator {:?} cannot be used with field {:?}", op, field)
            }
        }
    }
}

impl std::error::Error for RuleValidationError {}
