//! Account service
//!
//! Provides business logic for account management including CRUD operations,
//! balance calculation, and validation.

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::audit::EntityType;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{Account, AccountId, AccountType, Money};
use crate::services::access::BudgetAccess;
use crate::services::TrackingService;
use crate::storage::Storage;

/// Service for account management
pub struct AccountService<'a> {
    storage: &'a Storage,
}

/// Summary of an account with computed fields
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    #[serde(flatten)]
    pub account: Account,
    /// Reported balance for linked accounts, otherwise starting balance plus transactions
    pub balance: Money,
    pub transaction_count: usize,
}

/// Fields that may be changed on an account
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub on_budget: Option<bool>,
    pub hidden: Option<bool>,
    pub archived: Option<bool>,
}

impl<'a> AccountService<'a> {
    /// Create a new account service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create a manual account
    pub fn create_manual(
        &self,
        access: &BudgetAccess,
        name: &str,
        account_type: AccountType,
        starting_balance: Money,
        on_budget: bool,
    ) -> EnvelopeResult<Account> {
        let budget_id = access.budget_id();
        let mut account =
            Account::manual(budget_id, name.trim(), account_type, starting_balance);
        account.on_budget = on_budget;
        account.sort_order = self.storage.accounts.count_where(|a| a.budget_id == budget_id)? as i32;

        account
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        if self.storage.accounts.insert_named(account.clone())?.is_err() {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Account",
                identifier: account.name,
            });
        }
        self.storage.accounts.save()?;

        self.storage.log_create(
            access.scope(),
            EntityType::Account,
            account.id,
            Some(account.name.clone()),
            &account,
        )?;
        info!(account_id = %account.id, budget_id = %budget_id, "Account created");

        Ok(account)
    }

    /// Get an account in the budget
    pub fn get(&self, access: &BudgetAccess, id: AccountId) -> EnvelopeResult<Account> {
        self.storage
            .accounts
            .get_in_budget(access.budget_id(), id)?
            .ok_or_else(|| EnvelopeError::not_found("Account", id.to_string()))
    }

    /// Accounts in the budget with computed balances
    pub fn list(
        &self,
        access: &BudgetAccess,
        include_archived: bool,
    ) -> EnvelopeResult<Vec<AccountSummary>> {
        let mut accounts = self.storage.accounts.for_budget(access.budget_id())?;
        accounts.retain(|a| include_archived || !a.archived);
        accounts.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));

        accounts.into_iter().map(|a| self.summarize(a)).collect()
    }

    /// Compute the balance and transaction count of an account
    pub fn summarize(&self, account: Account) -> EnvelopeResult<AccountSummary> {
        let balance = self.balance(&account)?;
        let transaction_count = self
            .storage
            .transactions
            .count_where(|t| t.account_id == account.id)?;

        Ok(AccountSummary {
            account,
            balance,
            transaction_count,
        })
    }

    /// Current balance of an account
    pub fn balance(&self, account: &Account) -> EnvelopeResult<Money> {
        match account.current_balance {
            Some(reported) if account.is_linked() => Ok(reported),
            _ => Ok(account.starting_balance + self.storage.transactions.account_total(account.id)?),
        }
    }

    /// Update an account
    pub fn update(
        &self,
        access: &BudgetAccess,
        id: AccountId,
        changes: AccountUpdate,
    ) -> EnvelopeResult<Account> {
        let before = self.get(access, id)?;
        let mut account = before.clone();

        if let Some(name) = &changes.name {
            account.name = name.trim().to_string();
        }
        if let Some(on_budget) = changes.on_budget {
            account.on_budget = on_budget;
        }
        if let Some(hidden) = changes.hidden {
            account.hidden = hidden;
        }
        if let Some(archived) = changes.archived {
            account.set_archived(archived);
        }

        account
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        account.updated_at = Utc::now();

        if self.storage.accounts.insert_named(account.clone())?.is_err() {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Account",
                identifier: account.name,
            });
        }
        self.storage.accounts.save()?;

        self.storage.log_update(
            access.scope(),
            EntityType::Account,
            account.id,
            Some(account.name.clone()),
            &before,
            &account,
        )?;

        // Moving an account on or off budget changes every month it touched
        if before.on_budget != account.on_budget {
            TrackingService::new(self.storage).invalidate(access.budget_id())?;
        }

        Ok(account)
    }

    /// Delete a manual account with its transactions and goals
    ///
    /// Linked accounts go away with their institution.
    pub fn delete(&self, access: &BudgetAccess, id: AccountId) -> EnvelopeResult<()> {
        let account = self.get(access, id)?;
        if account.is_linked() {
            return Err(EnvelopeError::Conflict(
                "Linked accounts are removed by removing their institution".into(),
            ));
        }

        let cascade = self.storage.delete_accounts_cascade(&[account.id])?;

        self.storage.log_delete(
            access.scope(),
            EntityType::Account,
            account.id,
            Some(account.name.clone()),
            &account,
        )?;
        info!(
            account_id = %account.id,
            transactions = cascade.transactions.len(),
            goals = cascade.goals.len(),
            "Account deleted"
        );

        TrackingService::new(self.storage)
            .recalculate_months(access.budget_id(), cascade.affected_months())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InstitutionId, Transaction};
    use crate::services::test_support::{create_manual_account, create_test_storage, date, setup_budget};

    #[test]
    fn test_create_and_list() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let service = AccountService::new(&storage);

        let account = create_manual_account(&access, &storage, "Checking", 100_000);
        storage
            .transactions
            .upsert(Transaction::new(access.budget_id(), account.id, date(2025, 1, 3), Money::from_cents(-2_500)))
            .unwrap();

        let listed = service.list(&access, false).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].balance.cents(), 97_500);
        assert_eq!(listed[0].transaction_count, 1);
    }

    #[test]
    fn test_duplicate_name() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        create_manual_account(&access, &storage, "Checking", 0);

        let err = AccountService::new(&storage)
            .create_manual(&access, " checking ", AccountType::Savings, Money::zero(), true)
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_update_and_archive() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let service = AccountService::new(&storage);
        let account = create_manual_account(&access, &storage, "Checking", 0);

        let updated = service
            .update(
                &access,
                account.id,
                AccountUpdate {
                    name: Some("Main".into()),
                    archived: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Main");
        assert!(updated.archived);

        assert!(service.list(&access, false).unwrap().is_empty());
        assert_eq!(service.list(&access, true).unwrap().len(), 1);
    }

    #[test]
    fn test_linked_balance_uses_reported_value() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let mut account = Account::linked(
            access.budget_id(),
            InstitutionId::new(),
            "ext-1",
            "Linked",
            AccountType::Checking,
        );
        account.set_current_balance(Money::from_cents(4_200));
        storage.accounts.upsert(account.clone()).unwrap();

        let service = AccountService::new(&storage);
        assert_eq!(service.balance(&account).unwrap().cents(), 4_200);

        let err = service.delete(&access, account.id).unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_delete_cascades() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let account = create_manual_account(&access, &storage, "Cash", 0);
        storage
            .transactions
            .upsert(Transaction::new(access.budget_id(), account.id, date(2025, 2, 1), Money::from_cents(-100)))
            .unwrap();

        AccountService::new(&storage).delete(&access, account.id).unwrap();
        assert_eq!(storage.transactions.count().unwrap(), 0);
        assert_eq!(
            AccountService::new(&storage).get(&access, account.id).unwrap_err().status_code(),
            404
        );
    }
}
