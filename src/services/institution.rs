//! Institution service
//!
//! Linking banks through the aggregator and keeping their accounts and
//! transactions in step with it. Sync is cursor based: every page of
//! changes since the stored cursor is fetched before anything is applied.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use crate::aggregator::{Aggregator, AggregatorAccount, AggregatorError, AggregatorTransaction, LinkToken, SyncPage};
use crate::audit::EntityType;
use crate::crypto::TokenCipher;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    Account, AccountId, BudgetId, Category, CategorySource, Institution, InstitutionId,
    InstitutionStatus, InstitutionSummary, Month, Transaction, TransactionSource,
};
use crate::services::access::BudgetAccess;
use crate::services::{AccountService, AccountSummary, RuleEngine, TrackingService};
use crate::storage::Storage;

/// Name used when the client does not say which bank was linked
pub const DEFAULT_INSTITUTION_NAME: &str = "Linked Institution";

/// Counts from one sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub categorized_by_rules: usize,
}

/// Outcome of linking an institution
#[derive(Debug, Clone, Serialize)]
pub struct LinkResult {
    pub institution: InstitutionSummary,
    pub accounts: Vec<Account>,
    /// Missing when the initial sync failed
    pub sync: Option<SyncResult>,
    pub sync_error: Option<String>,
}

/// An institution with its accounts
#[derive(Debug, Clone, Serialize)]
pub struct InstitutionView {
    #[serde(flatten)]
    pub institution: InstitutionSummary,
    pub accounts: Vec<AccountSummary>,
}

/// Service for linked institutions
pub struct InstitutionService<'a, A: Aggregator> {
    storage: &'a Storage,
    aggregator: &'a A,
    cipher: &'a TokenCipher,
}

impl<'a, A: Aggregator> InstitutionService<'a, A> {
    pub fn new(storage: &'a Storage, aggregator: &'a A, cipher: &'a TokenCipher) -> Self {
        Self {
            storage,
            aggregator,
            cipher,
        }
    }

    /// Start the aggregator's link flow for the caller
    pub async fn create_link_token(&self, access: &BudgetAccess) -> EnvelopeResult<LinkToken> {
        let token = self
            .aggregator
            .create_link_token(&access.user_id.as_uuid().to_string())
            .await?;
        Ok(token)
    }

    pub fn list(&self, access: &BudgetAccess) -> EnvelopeResult<Vec<InstitutionView>> {
        let accounts = AccountService::new(self.storage);
        let mut institutions = self.storage.institutions.for_budget(access.budget_id())?;
        institutions.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        institutions
            .into_iter()
            .map(|institution| {
                let linked = self
                    .storage
                    .accounts
                    .filter(|a| a.institution_id == Some(institution.id))?
                    .into_iter()
                    .map(|a| accounts.summarize(a))
                    .collect::<EnvelopeResult<Vec<_>>>()?;
                Ok(InstitutionView {
                    institution: institution.summary(),
                    accounts: linked,
                })
            })
            .collect()
    }

    pub fn get(&self, access: &BudgetAccess, id: InstitutionId) -> EnvelopeResult<Institution> {
        self.storage
            .institutions
            .get_in_budget(access.budget_id(), id)?
            .ok_or_else(|| EnvelopeError::not_found("Institution", id.to_string()))
    }

    /// Link an institution from a public token and run the first sync
    ///
    /// A failed first sync does not undo the link; the error is reported in
    /// the result and the next sync picks up from the start.
    pub async fn link(
        &self,
        access: &BudgetAccess,
        public_token: &str,
        name: Option<&str>,
    ) -> EnvelopeResult<LinkResult> {
        let budget_id = access.budget_id();
        let exchange = self.aggregator.exchange_public_token(public_token).await?;
        let remote_accounts = self
            .aggregator
            .get_accounts(exchange.access_token.as_str())
            .await?;

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_INSTITUTION_NAME);
        let sealed = self.cipher.seal(exchange.access_token.as_str())?;
        let institution = Institution::new(budget_id, name, &exchange.item_id, sealed);

        let inserted = self.storage.institutions.insert_unique(institution.clone(), |existing, new| {
            existing.budget_id == new.budget_id && existing.external_id == new.external_id
        })?;
        if let Err(existing) = inserted {
            return Err(EnvelopeError::Conflict(format!(
                "Institution '{}' is already linked to this budget",
                existing.name
            )));
        }
        self.storage.institutions.save()?;

        self.storage.log_create(
            access.scope(),
            EntityType::Institution,
            institution.id,
            Some(institution.name.clone()),
            &institution.summary(),
        )?;

        let accounts = self.upsert_accounts(access, &institution, &remote_accounts)?;
        info!(
            institution_id = %institution.id,
            budget_id = %budget_id,
            accounts = accounts.len(),
            "Institution linked"
        );

        let (sync, sync_error) = match self.sync(access, institution.id).await {
            Ok(result) => (Some(result), None),
            Err(e) => {
                warn!(institution_id = %institution.id, error = %e, "Initial sync failed");
                (None, Some(e.to_string()))
            }
        };

        let institution = self.get(access, institution.id)?;
        let accounts = self
            .storage
            .accounts
            .filter(|a| a.institution_id == Some(institution.id))?;

        Ok(LinkResult {
            institution: institution.summary(),
            accounts,
            sync,
            sync_error,
        })
    }

    /// Pull every change since the last sync and apply it
    pub async fn sync(&self, access: &BudgetAccess, id: InstitutionId) -> EnvelopeResult<SyncResult> {
        let institution = self.get(access, id)?;
        let token = self.cipher.open(&institution.access_token)?;

        let mut cursor = institution.sync_cursor.clone();
        let mut changes = SyncPage::default();
        loop {
            let page = self
                .aggregator
                .sync_transactions(token.as_str(), cursor.as_deref())
                .await
                .map_err(|e| self.aggregator_failure(&institution, e))?;
            changes.added.extend(page.added);
            changes.modified.extend(page.modified);
            changes.removed.extend(page.removed);
            cursor = Some(page.next_cursor);
            if !page.has_more {
                break;
            }
        }

        let remote_accounts = self
            .aggregator
            .get_accounts(token.as_str())
            .await
            .map_err(|e| self.aggregator_failure(&institution, e))?;

        self.upsert_accounts(access, &institution, &remote_accounts)?;
        let (result, months) = self.apply_changes(access.budget_id(), &institution, changes)?;

        self.storage
            .institutions
            .update(institution.id, |i| i.mark_synced(cursor))?;
        self.storage.institutions.save()?;

        TrackingService::new(self.storage).recalculate_months(access.budget_id(), months)?;

        info!(
            institution_id = %institution.id,
            added = result.added,
            modified = result.modified,
            removed = result.removed,
            categorized_by_rules = result.categorized_by_rules,
            "Institution synced"
        );
        Ok(result)
    }

    /// Unlink an institution, deleting its accounts, transactions and goals
    pub fn remove(&self, access: &BudgetAccess, id: InstitutionId) -> EnvelopeResult<()> {
        self.get(access, id)?;
        let (institution, cascade) = self.storage.delete_institution_cascade(id)?;
        let institution = institution.ok_or_else(|| EnvelopeError::not_found("Institution", id.to_string()))?;

        self.storage.log_delete(
            access.scope(),
            EntityType::Institution,
            institution.id,
            Some(institution.name.clone()),
            &institution.summary(),
        )?;
        info!(
            institution_id = %institution.id,
            accounts = cascade.accounts.len(),
            transactions = cascade.transactions.len(),
            "Institution removed"
        );

        TrackingService::new(self.storage)
            .recalculate_months(access.budget_id(), cascade.affected_months())
    }

    /// Create accounts the aggregator reports for the first time and refresh
    /// balances of known ones
    fn upsert_accounts(
        &self,
        access: &BudgetAccess,
        institution: &Institution,
        remote: &[AggregatorAccount],
    ) -> EnvelopeResult<Vec<Account>> {
        let budget_id = access.budget_id();
        let mut accounts = Vec::with_capacity(remote.len());

        for remote_account in remote {
            let existing = self.storage.accounts.find(|a| {
                a.budget_id == budget_id
                    && a.external_id.as_deref() == Some(remote_account.account_id.as_str())
            })?;

            let account = match existing {
                Some(mut account) => {
                    if let Some(balance) = remote_account.current_balance {
                        account.set_current_balance(balance);
                    }
                    self.storage.accounts.upsert(account.clone())?;
                    account
                }
                None => {
                    let name = self.unique_account_name(
                        budget_id,
                        remote_account.name.trim(),
                        remote_account.mask.as_deref(),
                    )?;
                    let mut account = Account::linked(
                        budget_id,
                        institution.id,
                        &remote_account.account_id,
                        name,
                        remote_account.account_type,
                    );
                    account.mask = remote_account.mask.clone();
                    account.current_balance = remote_account.current_balance;

                    if self.storage.accounts.insert_named(account.clone())?.is_err() {
                        return Err(EnvelopeError::Duplicate {
                            entity_type: "Account",
                            identifier: account.name,
                        });
                    }
                    self.storage.log_create(
                        access.scope(),
                        EntityType::Account,
                        account.id,
                        Some(account.name.clone()),
                        &account,
                    )?;
                    account
                }
            };
            accounts.push(account);
        }

        self.storage.accounts.save()?;
        Ok(accounts)
    }

    fn unique_account_name(&self, budget_id: BudgetId, base: &str, mask: Option<&str>) -> EnvelopeResult<String> {
        let is_free = |name: &str| -> EnvelopeResult<bool> {
            Ok(self.storage.accounts.find_by_name(budget_id, name)?.is_none())
        };

        if is_free(base)? {
            return Ok(base.to_string());
        }
        if let Some(mask) = mask {
            let masked = format!("{} ({})", base, mask);
            if is_free(&masked)? {
                return Ok(masked);
            }
        }
        let mut n = 2;
        loop {
            let numbered = format!("{} {}", base, n);
            if is_free(&numbered)? {
                return Ok(numbered);
            }
            n += 1;
        }
    }

    fn apply_changes(
        &self,
        budget_id: BudgetId,
        institution: &Institution,
        changes: SyncPage,
    ) -> EnvelopeResult<(SyncResult, BTreeSet<Month>)> {
        let accounts: HashMap<String, AccountId> = self
            .storage
            .accounts
            .filter(|a| a.institution_id == Some(institution.id))?
            .into_iter()
            .filter_map(|a| a.external_id.map(|ext| (ext, a.id)))
            .collect();
        let rules = RuleEngine::load(self.storage, budget_id)?;
        let categories = self.storage.categories.for_budget(budget_id)?;

        let mut result = SyncResult::default();
        let mut months = BTreeSet::new();

        let incoming = changes.added.into_iter().chain(changes.modified);
        for remote in incoming {
            let Some(&account_id) = accounts.get(&remote.account_id) else {
                warn!(
                    institution_id = %institution.id,
                    account = %remote.account_id,
                    "Skipping transaction for unknown account"
                );
                continue;
            };

            let existing = self
                .storage
                .transactions
                .find_by_external_id(account_id, &remote.transaction_id)?;

            let mut txn = match existing {
                Some(existing) => {
                    months.insert(Month::of(existing.date));
                    result.modified += 1;
                    existing
                }
                None => {
                    let mut txn = Transaction::new(budget_id, account_id, remote.date, remote.amount);
                    txn.source = TransactionSource::Linked;
                    txn.external_id = Some(remote.transaction_id.clone());
                    result.added += 1;
                    txn
                }
            };

            apply_remote(&mut txn, &remote);
            if auto_categorize(&mut txn, &rules, &categories, remote.category.as_deref()) {
                result.categorized_by_rules += 1;
            }

            months.insert(Month::of(txn.date));
            self.storage.transactions.upsert(txn)?;
        }

        let account_ids: Vec<AccountId> = accounts.values().copied().collect();
        for external_id in &changes.removed {
            let removed = self.storage.transactions.delete_where(|t| {
                account_ids.contains(&t.account_id) && t.external_id.as_deref() == Some(external_id.as_str())
            })?;
            for txn in removed {
                months.insert(Month::of(txn.date));
                result.removed += 1;
            }
        }

        self.storage.transactions.save()?;
        Ok((result, months))
    }

    /// Turn an aggregator error into ours, flagging the institution when the
    /// bank wants the user to log in again
    fn aggregator_failure(&self, institution: &Institution, err: AggregatorError) -> EnvelopeError {
        if err == AggregatorError::LoginRequired {
            warn!(institution_id = %institution.id, "Institution requires login");
            let marked = self
                .storage
                .institutions
                .update(institution.id, |i| i.status = InstitutionStatus::LoginRequired)
                .and_then(|_| self.storage.institutions.save());
            if let Err(e) = marked {
                return e;
            }
        }
        err.into()
    }
}

/// Copy bank-owned fields onto a local transaction
///
/// Category and notes are left untouched.
fn apply_remote(txn: &mut Transaction, remote: &AggregatorTransaction) {
    txn.date = remote.date;
    txn.amount = remote.amount;
    txn.payee = remote
        .merchant_name
        .clone()
        .unwrap_or_else(|| remote.name.clone());
    txn.merchant_name = remote.merchant_name.clone();
    txn.description = remote.name.clone();
    txn.pending = remote.pending;
    txn.updated_at = chrono::Utc::now();
}

/// Categorize an uncategorized synced transaction
///
/// Rules go first; otherwise the aggregator's suggestion is used when it
/// names one of the budget's categories. Returns whether a rule matched.
fn auto_categorize(
    txn: &mut Transaction,
    rules: &RuleEngine,
    categories: &[Category],
    suggestion: Option<&str>,
) -> bool {
    if txn.is_categorized() {
        return false;
    }
    if rules.categorize(txn) {
        return true;
    }
    if let Some(suggestion) = suggestion.map(str::trim) {
        if let Some(category) = categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(suggestion))
        {
            txn.assign_category(Some(category.id), CategorySource::Import);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::SandboxAggregator;
    use crate::crypto::KeyDerivationParams;
    use crate::models::{AccountType, Money, RuleCondition, RuleField, RuleOperator};
    use crate::services::test_support::{create_manual_account, create_test_storage, setup_budget};
    use crate::services::{RuleInput, RuleService, TransactionService, TransactionUpdate};

    fn cipher() -> TokenCipher {
        TokenCipher::from_secret("test-secret", &KeyDerivationParams::insecure_fast()).unwrap()
    }

    fn find_txn(storage: &Storage, external_id: &str) -> Transaction {
        storage
            .transactions
            .find(|t| t.external_id.as_deref() == Some(external_id))
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_link_creates_accounts_and_syncs() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let sandbox = SandboxAggregator::new();
        let cipher = cipher();
        let service = InstitutionService::new(&storage, &sandbox, &cipher);

        let linked = service
            .link(&access, "public-sandbox-first", Some("Platypus Bank"))
            .await
            .unwrap();
        assert_eq!(linked.institution.name, "Platypus Bank");
        assert_eq!(linked.accounts.len(), 3);
        assert!(linked.accounts.iter().all(|a| a.is_linked()));
        assert!(linked.institution.last_synced_at.is_some());

        let sync = linked.sync.unwrap();
        assert_eq!(sync.added, 6);
        assert_eq!(sync.categorized_by_rules, 0);

        // The aggregator's category names map onto budget categories
        let grocer = find_txn(&storage, "sbx-first-grocer");
        assert_eq!(grocer.category_source, CategorySource::Import);
        assert_eq!(grocer.payee, "Fresh Market");
        assert!(!find_txn(&storage, "sbx-first-power").is_categorized());

        let credit = linked
            .accounts
            .iter()
            .find(|a| a.account_type == AccountType::Credit)
            .unwrap();
        assert_eq!(
            AccountService::new(&storage).balance(credit).unwrap().cents(),
            -2_074
        );

        // The stored token is sealed
        let stored = storage.institutions.get(linked.institution.id).unwrap().unwrap();
        assert!(!stored.access_token.ciphertext.contains("access-sandbox"));

        let again = service.link(&access, "public-sandbox-first", None).await.unwrap_err();
        assert_eq!(again.status_code(), 409);
    }

    #[tokio::test]
    async fn test_incremental_sync_preserves_user_edits() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let sandbox = SandboxAggregator::new();
        let cipher = cipher();
        let service = InstitutionService::new(&storage, &sandbox, &cipher);
        let linked = service.link(&access, "public-sandbox-edit", None).await.unwrap();
        let token = "access-sandbox-edit";

        let dining = storage
            .categories
            .find_by_name(access.budget_id(), "Dining Out")
            .unwrap()
            .unwrap();
        let coffee = find_txn(&storage, "sbx-edit-coffee");
        TransactionService::new(&storage)
            .update(
                &access,
                coffee.id,
                TransactionUpdate {
                    category_id: Some(Some(dining.id)),
                    notes: Some("with Sam".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        RuleService::new(&storage)
            .create(
                &access,
                RuleInput {
                    name: "Books".into(),
                    conditions: vec![RuleCondition::new(RuleField::Payee, RuleOperator::Contains, "book")],
                    match_all: true,
                    category_id: dining.id,
                    rename_payee: None,
                    enabled: true,
                    priority: None,
                },
            )
            .unwrap();

        let mut revised = AggregatorTransaction {
            transaction_id: "sbx-edit-coffee".into(),
            account_id: "sbx-edit-credit".into(),
            date: coffee.date,
            amount: Money::from_cents(-525),
            name: "BLUE BOTTLE".into(),
            merchant_name: Some("Blue Bottle Coffee".into()),
            pending: false,
            category: None,
        };
        sandbox.modify_transaction(token, revised.clone()).unwrap();
        revised.transaction_id = "sbx-edit-books".into();
        revised.merchant_name = Some("Corner Bookshop".into());
        sandbox.add_transaction(token, revised).unwrap();
        sandbox.remove_transaction(token, "sbx-edit-stream").unwrap();

        let result = service.sync(&access, linked.institution.id).await.unwrap();
        assert_eq!(
            result,
            SyncResult {
                added: 1,
                modified: 1,
                removed: 1,
                categorized_by_rules: 1,
            }
        );

        let coffee = find_txn(&storage, "sbx-edit-coffee");
        assert_eq!(coffee.amount.cents(), -525);
        assert_eq!(coffee.category_id, Some(dining.id));
        assert_eq!(coffee.category_source, CategorySource::Manual);
        assert_eq!(coffee.notes, "with Sam");

        assert_eq!(find_txn(&storage, "sbx-edit-books").category_source, CategorySource::Rule);
        assert!(storage
            .transactions
            .find(|t| t.external_id.as_deref() == Some("sbx-edit-stream"))
            .unwrap()
            .is_none());

        // Nothing new on the next sync
        let idle = service.sync(&access, linked.institution.id).await.unwrap();
        assert_eq!(idle, SyncResult::default());
    }

    #[tokio::test]
    async fn test_login_required_marks_institution() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let sandbox = SandboxAggregator::new();
        let cipher = cipher();
        let service = InstitutionService::new(&storage, &sandbox, &cipher);
        let linked = service.link(&access, "public-sandbox-expired", None).await.unwrap();

        sandbox.require_login("access-sandbox-expired").unwrap();
        let err = service.sync(&access, linked.institution.id).await.unwrap_err();
        assert_eq!(err.status_code(), 409);

        let stored = service.get(&access, linked.institution.id).unwrap();
        assert_eq!(stored.status, InstitutionStatus::LoginRequired);
    }

    #[tokio::test]
    async fn test_bad_public_token_is_an_aggregator_error() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let sandbox = SandboxAggregator::new();
        let cipher = cipher();
        let service = InstitutionService::new(&storage, &sandbox, &cipher);

        let err = service.link(&access, "garbage", None).await.unwrap_err();
        assert_eq!(err.status_code(), 502);
        assert!(storage.institutions.for_budget(access.budget_id()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_collisions_and_remove() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        create_manual_account(&access, &storage, "Sandbox Checking", 0);
        let sandbox = SandboxAggregator::new();
        let cipher = cipher();
        let service = InstitutionService::new(&storage, &sandbox, &cipher);

        let linked = service.link(&access, "public-sandbox-dupe", None).await.unwrap();
        assert!(linked.accounts.iter().any(|a| a.name == "Sandbox Checking (0000)"));

        let listed = service.list(&access).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].accounts.len(), 3);

        service.remove(&access, linked.institution.id).unwrap();
        assert_eq!(storage.accounts.for_budget(access.budget_id()).unwrap().len(), 1);
        assert!(storage
            .transactions
            .for_budget(access.budget_id())
            .unwrap()
            .is_empty());
        assert_eq!(
            service.remove(&access, linked.institution.id).unwrap_err().status_code(),
            404
        );
    }
}
