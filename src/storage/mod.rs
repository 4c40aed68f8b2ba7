//! Storage layer for the budgeting server
//!
//! Each collection lives in its own JSON file under `<base>/data/`, loaded
//! into memory at startup and written atomically after every change. The
//! coordinator also owns the audit log and the cascade deletes that keep
//! collections consistent with each other.

pub mod categories;
pub mod collection;
pub mod file_io;
pub mod init;
pub mod records;
pub mod transactions;

pub use collection::{Collection, Record};
pub use file_io::{read_json, write_json_atomic};
pub use init::initialize_storage;
pub use records::{BudgetScoped, UniqueName};

use std::collections::BTreeSet;
use std::fmt::Display;

use serde::Serialize;

use crate::audit::{generate_diff, AuditEntry, AuditLogger, EntityType, Operation};
use crate::config::paths::EnvelopePaths;
use crate::error::EnvelopeError;
use crate::models::{
    Account, AccountId, Budget, BudgetId, BudgetMember, Category, CategoryGroup, CategoryId, Goal,
    Institution, InstitutionId, Month, MonthSummary, OnboardingState, Rule, SpendingTarget,
    Transaction, User, UserId,
};

/// Who performed a change and which budget it belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditScope {
    pub actor: Option<UserId>,
    pub budget_id: Option<BudgetId>,
}

impl AuditScope {
    pub fn user(actor: UserId) -> Self {
        Self {
            actor: Some(actor),
            budget_id: None,
        }
    }

    pub fn budget(actor: UserId, budget_id: BudgetId) -> Self {
        Self {
            actor: Some(actor),
            budget_id: Some(budget_id),
        }
    }
}

/// What a category delete removed or changed
#[derive(Debug, Default)]
pub struct CategoryCascade {
    pub uncategorized: Vec<Transaction>,
    pub targets: Vec<SpendingTarget>,
    pub rules: Vec<Rule>,
}

/// What an account delete removed
#[derive(Debug, Default)]
pub struct AccountCascade {
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    pub goals: Vec<Goal>,
}

impl AccountCascade {
    /// Months whose tracking figures changed
    pub fn affected_months(&self) -> BTreeSet<Month> {
        self.transactions.iter().map(|t| Month::of(t.date)).collect()
    }
}

/// Main storage coordinator that provides access to all collections
pub struct Storage {
    paths: EnvelopePaths,
    pub users: Collection<User>,
    pub budgets: Collection<Budget>,
    pub members: Collection<BudgetMember>,
    pub institutions: Collection<Institution>,
    pub accounts: Collection<Account>,
    pub transactions: Collection<Transaction>,
    pub groups: Collection<CategoryGroup>,
    pub categories: Collection<Category>,
    pub rules: Collection<Rule>,
    pub goals: Collection<Goal>,
    pub targets: Collection<SpendingTarget>,
    pub summaries: Collection<MonthSummary>,
    pub onboarding: Collection<OnboardingState>,
    audit: AuditLogger,
}

impl Storage {
    /// Create a new Storage instance with empty collections
    pub fn new(paths: EnvelopePaths) -> Result<Self, EnvelopeError> {
        paths.ensure_directories()?;

        Ok(Self {
            users: Collection::new(paths.collection_file("users")),
            budgets: Collection::new(paths.collection_file("budgets")),
            members: Collection::new(paths.collection_file("members")),
            institutions: Collection::new(paths.collection_file("institutions")),
            accounts: Collection::new(paths.collection_file("accounts")),
            transactions: Collection::new(paths.collection_file("transactions")),
            groups: Collection::new(paths.collection_file("category_groups")),
            categories: Collection::new(paths.collection_file("categories")),
            rules: Collection::new(paths.collection_file("rules")),
            goals: Collection::new(paths.collection_file("goals")),
            targets: Collection::new(paths.collection_file("targets")),
            summaries: Collection::new(paths.collection_file("month_summaries")),
            onboarding: Collection::new(paths.collection_file("onboarding")),
            audit: AuditLogger::new(paths.audit_log()),
            paths,
        })
    }

    /// Create storage and load everything from disk
    pub fn open(paths: EnvelopePaths) -> Result<Self, EnvelopeError> {
        let storage = Self::new(paths)?;
        storage.load_all()?;
        Ok(storage)
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Load all data from disk
    pub fn load_all(&self) -> Result<(), EnvelopeError> {
        self.users.load()?;
        self.budgets.load()?;
        self.members.load()?;
        self.institutions.load()?;
        self.accounts.load()?;
        self.transactions.load()?;
        self.groups.load()?;
        self.categories.load()?;
        self.rules.load()?;
        self.goals.load()?;
        self.targets.load()?;
        self.summaries.load()?;
        self.onboarding.load()?;
        Ok(())
    }

    /// Save all data to disk
    pub fn save_all(&self) -> Result<(), EnvelopeError> {
        self.users.save()?;
        self.budgets.save()?;
        self.members.save()?;
        self.institutions.save()?;
        self.accounts.save()?;
        self.transactions.save()?;
        self.groups.save()?;
        self.categories.save()?;
        self.rules.save()?;
        self.goals.save()?;
        self.targets.save()?;
        self.summaries.save()?;
        self.onboarding.save()?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.paths.is_initialized()
    }

    pub fn log_create<T: Serialize>(
        &self,
        scope: AuditScope,
        entity_type: EntityType,
        entity_id: impl Display,
        entity_name: Option<String>,
        entity: &T,
    ) -> Result<(), EnvelopeError> {
        let entry = AuditEntry::create(entity_type, entity_id.to_string(), entity_name, entity)
            .by(scope.actor)
            .in_budget(scope.budget_id);
        self.audit.log(&entry)
    }

    /// Log an update with a diff of the two snapshots
    pub fn log_update<T: Serialize>(
        &self,
        scope: AuditScope,
        entity_type: EntityType,
        entity_id: impl Display,
        entity_name: Option<String>,
        before: &T,
        after: &T,
    ) -> Result<(), EnvelopeError> {
        let diff = match (serde_json::to_value(before), serde_json::to_value(after)) {
            (Ok(b), Ok(a)) => generate_diff(&b, &a),
            _ => None,
        };
        let entry = AuditEntry::new(Operation::Update, entity_type, entity_id.to_string(), entity_name)
            .before(before)
            .after(after)
            .with_diff(diff)
            .by(scope.actor)
            .in_budget(scope.budget_id);
        self.audit.log(&entry)
    }

    pub fn log_delete<T: Serialize>(
        &self,
        scope: AuditScope,
        entity_type: EntityType,
        entity_id: impl Display,
        entity_name: Option<String>,
        entity: &T,
    ) -> Result<(), EnvelopeError> {
        let entry = AuditEntry::new(Operation::Delete, entity_type, entity_id.to_string(), entity_name)
            .before(entity)
            .by(scope.actor)
            .in_budget(scope.budget_id);
        self.audit.log(&entry)
    }

    /// Remove a budget and everything it owns
    pub fn delete_budget_cascade(&self, budget_id: BudgetId) -> Result<Option<Budget>, EnvelopeError> {
        let budget = self.budgets.delete(budget_id)?;

        self.members.delete_for_budget(budget_id)?;
        self.institutions.delete_for_budget(budget_id)?;
        self.accounts.delete_for_budget(budget_id)?;
        self.transactions.delete_for_budget(budget_id)?;
        self.groups.delete_for_budget(budget_id)?;
        self.categories.delete_for_budget(budget_id)?;
        self.rules.delete_for_budget(budget_id)?;
        self.goals.delete_for_budget(budget_id)?;
        self.targets.delete_for_budget(budget_id)?;
        self.summaries.delete_for_budget(budget_id)?;
        self.onboarding.update_where(
            |s| s.budget_id == Some(budget_id),
            |s| s.budget_id = None,
        )?;

        self.save_all()?;
        Ok(budget)
    }

    /// Remove accounts along with their transactions and goals
    pub fn delete_accounts_cascade(&self, account_ids: &[AccountId]) -> Result<AccountCascade, EnvelopeError> {
        let accounts = self.accounts.delete_where(|a| account_ids.contains(&a.id))?;
        let transactions = self
            .transactions
            .delete_where(|t| account_ids.contains(&t.account_id))?;
        let goals = self.goals.delete_where(|g| account_ids.contains(&g.account_id))?;

        self.accounts.save()?;
        self.transactions.save()?;
        self.goals.save()?;

        Ok(AccountCascade {
            accounts,
            transactions,
            goals,
        })
    }

    /// Remove an institution and every account linked through it
    pub fn delete_institution_cascade(
        &self,
        institution_id: InstitutionId,
    ) -> Result<(Option<Institution>, AccountCascade), EnvelopeError> {
        let institution = self.institutions.delete(institution_id)?;
        self.institutions.save()?;

        let account_ids: Vec<AccountId> = self
            .accounts
            .filter(|a| a.institution_id == Some(institution_id))?
            .iter()
            .map(|a| a.id)
            .collect();
        let cascade = self.delete_accounts_cascade(&account_ids)?;

        Ok((institution, cascade))
    }

    /// Remove a category, clearing it from transactions and dropping its targets and rules
    pub fn delete_category_cascade(&self, category_id: CategoryId) -> Result<CategoryCascade, EnvelopeError> {
        self.categories.delete(category_id)?;
        let uncategorized = self.transactions.uncategorize(category_id)?;
        let targets = self.targets.delete_where(|t| t.category_id == category_id)?;
        let rules = self.rules.delete_where(|r| r.category_id == category_id)?;

        self.categories.save()?;
        self.transactions.save()?;
        self.targets.save()?;
        self.rules.save()?;

        Ok(CategoryCascade {
            uncategorized,
            targets,
            rules,
        })
    }
}
