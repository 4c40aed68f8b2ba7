//! Net worth
//!
//! Account balances grouped by account type, with assets and liabilities
//! totalled separately.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{AccountId, AccountType, Money};
use crate::services::AccountSummary;

/// One account's contribution
#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub account_name: String,
    pub on_budget: bool,
    pub balance: Money,
}

/// Accounts of one type
#[derive(Debug, Clone, Serialize)]
pub struct AccountTypeGroup {
    pub account_type: AccountType,
    pub accounts: Vec<AccountBalance>,
    pub total_balance: Money,
}

impl AccountTypeGroup {
    fn new(account_type: AccountType) -> Self {
        Self {
            account_type,
            accounts: Vec::new(),
            total_balance: Money::zero(),
        }
    }

    fn add_account(&mut self, account: AccountBalance) {
        self.total_balance += account.balance;
        self.accounts.push(account);
    }
}

/// Net worth across the budget's open accounts
#[derive(Debug, Clone, Serialize)]
pub struct NetWorth {
    pub groups: Vec<AccountTypeGroup>,
    /// Sum of non-liability balances
    pub total_assets: Money,
    /// Amount owed on liability accounts, as a positive figure
    pub total_liabilities: Money,
    /// Assets minus liabilities
    pub net_worth: Money,
    /// Balance of on-budget accounts
    pub on_budget_total: Money,
    pub off_budget_total: Money,
}

impl NetWorth {
    /// Summarize accounts; archived ones are skipped
    pub fn from_accounts(accounts: &[AccountSummary]) -> Self {
        let mut groups: BTreeMap<u8, AccountTypeGroup> = BTreeMap::new();
        let mut total_assets = Money::zero();
        let mut total_liabilities = Money::zero();
        let mut on_budget_total = Money::zero();
        let mut off_budget_total = Money::zero();

        for summary in accounts.iter().filter(|s| !s.account.archived) {
            let account = &summary.account;

            if account.account_type.is_liability() {
                total_liabilities -= summary.balance;
            } else {
                total_assets += summary.balance;
            }
            if account.on_budget {
                on_budget_total += summary.balance;
            } else {
                off_budget_total += summary.balance;
            }

            groups
                .entry(account_type_sort_order(account.account_type))
                .or_insert_with(|| AccountTypeGroup::new(account.account_type))
                .add_account(AccountBalance {
                    account_id: account.id,
                    account_name: account.name.clone(),
                    on_budget: account.on_budget,
                    balance: summary.balance,
                });
        }

        Self {
            groups: groups.into_values().collect(),
            total_assets,
            total_liabilities,
            net_worth: total_assets - total_liabilities,
            on_budget_total,
            off_budget_total,
        }
    }
}

fn account_type_sort_order(account_type: AccountType) -> u8 {
    match account_type {
        AccountType::Checking => 0,
        AccountType::Savings => 1,
        AccountType::Cash => 2,
        AccountType::Investment => 3,
        AccountType::Credit => 4,
        AccountType::LineOfCredit => 5,
        AccountType::Loan => 6,
        AccountType::Other => 7,
    }
}
