//! Goal service
//!
//! Savings and debt payoff goals tied to an account, with progress computed
//! from the account's current balance.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::audit::EntityType;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{Account, AccountId, Goal, GoalId, GoalKind, GoalProgress, Money};
use crate::services::access::BudgetAccess;
use crate::services::AccountService;
use crate::storage::Storage;

/// A goal with its progress
#[derive(Debug, Clone, Serialize)]
pub struct GoalView {
    #[serde(flatten)]
    pub goal: Goal,
    pub account_name: String,
    pub progress: GoalProgress,
}

/// Input for creating a goal
#[derive(Debug, Clone)]
pub struct GoalInput {
    pub name: String,
    pub kind: GoalKind,
    pub account_id: AccountId,
    pub target_amount: Money,
    pub target_date: Option<NaiveDate>,
}

/// Fields that may be changed on a goal
///
/// `target_date: Some(None)` removes the date.
#[derive(Debug, Clone, Default)]
pub struct GoalUpdate {
    pub name: Option<String>,
    pub target_amount: Option<Money>,
    pub target_date: Option<Option<NaiveDate>>,
    pub archived: Option<bool>,
}

/// Service for goal management
pub struct GoalService<'a> {
    storage: &'a Storage,
}

impl<'a> GoalService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub fn list(&self, access: &BudgetAccess, include_archived: bool) -> EnvelopeResult<Vec<GoalView>> {
        let mut goals = self.storage.goals.for_budget(access.budget_id())?;
        goals.retain(|g| include_archived || !g.archived);
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        goals.into_iter().map(|g| self.view(g)).collect()
    }

    pub fn get(&self, access: &BudgetAccess, id: GoalId) -> EnvelopeResult<GoalView> {
        self.view(self.find(access, id)?)
    }

    pub fn create(&self, access: &BudgetAccess, input: GoalInput) -> EnvelopeResult<GoalView> {
        let budget_id = access.budget_id();
        let account = self
            .storage
            .accounts
            .get_in_budget(budget_id, input.account_id)?
            .ok_or_else(|| EnvelopeError::not_found("Account", input.account_id.to_string()))?;
        if input.kind == GoalKind::Debt && !account.account_type.is_liability() {
            return Err(EnvelopeError::Validation(format!(
                "Debt goals need a credit or loan account; '{}' is {}",
                account.name, account.account_type
            )));
        }

        let starting_balance = AccountService::new(self.storage).balance(&account)?;
        let mut goal = Goal::new(
            budget_id,
            account.id,
            input.name.trim(),
            input.kind,
            input.target_amount,
            starting_balance,
        );
        goal.target_date = input.target_date;

        goal.validate(today())
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        self.store(&goal)?;

        self.storage.log_create(
            access.scope(),
            EntityType::Goal,
            goal.id,
            Some(goal.name.clone()),
            &goal,
        )?;
        info!(goal_id = %goal.id, budget_id = %budget_id, kind = %goal.kind, "Goal created");

        self.view(goal)
    }

    pub fn update(&self, access: &BudgetAccess, id: GoalId, changes: GoalUpdate) -> EnvelopeResult<GoalView> {
        let before = self.find(access, id)?;
        let mut goal = before.clone();

        if let Some(name) = changes.name {
            goal.name = name.trim().to_string();
        }
        if let Some(target_amount) = changes.target_amount {
            goal.target_amount = target_amount;
        }
        if let Some(target_date) = changes.target_date {
            goal.target_date = target_date;
        }
        if let Some(archived) = changes.archived {
            goal.archived = archived;
        }

        // An unchanged past date on an old goal is not an error
        let check_date = if goal.target_date == before.target_date {
            NaiveDate::MIN
        } else {
            today()
        };
        goal.validate(check_date)
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        goal.updated_at = Utc::now();

        self.store(&goal)?;

        self.storage.log_update(
            access.scope(),
            EntityType::Goal,
            goal.id,
            Some(goal.name.clone()),
            &before,
            &goal,
        )?;

        self.view(goal)
    }

    pub fn delete(&self, access: &BudgetAccess, id: GoalId) -> EnvelopeResult<()> {
        let goal = self.find(access, id)?;
        self.storage.goals.delete(id)?;
        self.storage.goals.save()?;

        self.storage.log_delete(
            access.scope(),
            EntityType::Goal,
            goal.id,
            Some(goal.name.clone()),
            &goal,
        )
    }

    /// Progress of a goal as of today
    pub fn progress(&self, goal: &Goal, account: &Account) -> EnvelopeResult<GoalProgress> {
        let balance = AccountService::new(self.storage).balance(account)?;
        Ok(goal.progress(balance, today()))
    }

    fn find(&self, access: &BudgetAccess, id: GoalId) -> EnvelopeResult<Goal> {
        self.storage
            .goals
            .get_in_budget(access.budget_id(), id)?
            .ok_or_else(|| EnvelopeError::not_found("Goal", id.to_string()))
    }

    fn view(&self, goal: Goal) -> EnvelopeResult<GoalView> {
        let account = self
            .storage
            .accounts
            .get(goal.account_id)?
            .ok_or_else(|| EnvelopeError::not_found("Account", goal.account_id.to_string()))?;
        let progress = self.progress(&goal, &account)?;

        Ok(GoalView {
            account_name: account.name,
            progress,
            goal,
        })
    }

    fn store(&self, goal: &Goal) -> EnvelopeResult<()> {
        if self.storage.goals.insert_named(goal.clone())?.is_err() {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Goal",
                identifier: goal.name.clone(),
            });
        }
        self.storage.goals.save()
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
