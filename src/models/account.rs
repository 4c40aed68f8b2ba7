//! Accounts
//!
//! An account is either linked (owned by an aggregator institution, with
//! transactions arriving through sync) or manual (transactions entered by
//! hand or imported from CSV).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AccountId, BudgetId, InstitutionId};
use super::money::Money;

pub const MAX_ACCOUNT_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    #[default]
    Checking,
    Savings,
    Credit,
    Cash,
    Investment,
    /// Mortgage, student or auto loan
    Loan,
    LineOfCredit,
    Other,
}

impl AccountType {
    /// Balances on these accounts are money owed
    pub fn is_liability(&self) -> bool {
        matches!(self, Self::Credit | Self::Loan | Self::LineOfCredit)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Checking => "Checking",
            Self::Savings => "Savings",
            Self::Credit => "Credit Card",
            Self::Cash => "Cash",
            Self::Investment => "Investment",
            Self::Loan => "Loan",
            Self::LineOfCredit => "Line of Credit",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountSource {
    Linked,
    #[default]
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountValidationError {
    #[error("Account name cannot be empty")]
    EmptyName,
    #[error("Account name too long ({0} chars, max 100)")]
    NameTooLong(usize),
    #[error("Linked accounts need an institution and external id")]
    LinkedWithoutInstitution,
    #[error("Account balance is out of range")]
    BalanceOutOfRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub budget_id: BudgetId,
    pub institution_id: Option<InstitutionId>,
    /// The aggregator's id for this account
    pub external_id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    #[serde(default)]
    pub source: AccountSource,
    /// Trailing digits of the account number
    #[serde(default)]
    pub mask: Option<String>,
    /// Off-budget accounts are left out of spending tracking
    pub on_budget: bool,
    #[serde(default)]
    pub hidden: bool,
    pub archived: bool,
    pub starting_balance: Money,
    /// Institution-reported balance from the last sync
    #[serde(default)]
    pub current_balance: Option<Money>,
    #[serde(default)]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A manual account with a zero starting balance
    ///
    /// Investment accounts start off-budget.
    pub fn new(budget_id: BudgetId, name: impl Into<String>, account_type: AccountType) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            budget_id,
            institution_id: None,
            external_id: None,
            name: name.into(),
            account_type,
            source: AccountSource::Manual,
            mask: None,
            on_budget: account_type != AccountType::Investment,
            hidden: false,
            archived: false,
            starting_balance: Money::zero(),
            current_balance: None,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn manual(
        budget_id: BudgetId,
        name: impl Into<String>,
        account_type: AccountType,
        starting_balance: Money,
    ) -> Self {
        Self {
            starting_balance,
            ..Self::new(budget_id, name, account_type)
        }
    }

    pub fn linked(
        budget_id: BudgetId,
        institution_id: InstitutionId,
        external_id: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        Self {
            institution_id: Some(institution_id),
            external_id: Some(external_id.into()),
            source: AccountSource::Linked,
            ..Self::new(budget_id, name, account_type)
        }
    }

    pub fn is_linked(&self) -> bool {
        self.source == AccountSource::Linked
    }

    pub fn set_archived(&mut self, archived: bool) {
        if self.archived != archived {
            self.archived = archived;
            self.updated_at = Utc::now();
        }
    }

    pub fn set_current_balance(&mut self, balance: Money) {
        self.current_balance = Some(balance);
        self.updated_at = Utc::now();
    }

    pub fn validate(&self) -> Result<(), AccountValidationError> {
        let len = self.name.trim().len();
        if len == 0 {
            return Err(AccountValidationError::EmptyName);
        }
        if len > MAX_ACCOUNT_NAME_LEN {
            return Err(AccountValidationError::NameTooLong(len));
        }
        if self.is_linked() && (self.institution_id.is_none() || self.external_id.is_none()) {
            return Err(AccountValidationError::LinkedWithoutInstitution);
        }
        let in_range = |b: Money| b.is_within_limit();
        if !in_range(self.starting_balance) || !self.current_balance.map_or(true, in_range) {
            return Err(AccountValidationError::BalanceOutOfRange);
        }
        Ok(())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.name, self.account_type)?;
        if let Some(mask) = &self.mask {
            write!(f, " ••{}", mask)?;
        }
        f.write_str(")")
    }
}
