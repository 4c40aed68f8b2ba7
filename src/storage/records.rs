//! Collection keys for each stored entity

use crate::models::{
    Account, AccountId, Budget, BudgetId, BudgetMember, Category, CategoryGroup,
    CategoryGroupId, CategoryId, Goal, GoalId, Institution, InstitutionId, Month, MonthSummary,
    OnboardingState, Rule, RuleId, SpendingTarget, TargetId, Transaction, TransactionId, User,
    UserId,
};

use crate::error::EnvelopeError;

use super::collection::{Collection, Record};

macro_rules! keyed_by_id {
    ($model:ty, $key:ty) => {
        impl Record for $model {
            type Key = $key;

            fn key(&self) -> $key {
                self.id
            }
        }
    };
}

keyed_by_id!(User, UserId);
keyed_by_id!(Budget, BudgetId);
keyed_by_id!(Institution, InstitutionId);
keyed_by_id!(Account, AccountId);
keyed_by_id!(Transaction, TransactionId);
keyed_by_id!(CategoryGroup, CategoryGroupId);
keyed_by_id!(Category, CategoryId);
keyed_by_id!(Rule, RuleId);
keyed_by_id!(Goal, GoalId);
keyed_by_id!(SpendingTarget, TargetId);

impl Record for BudgetMember {
    type Key = (BudgetId, UserId);

    fn key(&self) -> Self::Key {
        (self.budget_id, self.user_id)
    }
}

impl Record for MonthSummary {
    type Key = (BudgetId, Month);

    fn key(&self) -> Self::Key {
        (self.budget_id, self.month)
    }
}

impl Record for OnboardingState {
    type Key = UserId;

    fn key(&self) -> UserId {
        self.user_id
    }
}

/// Records that belong to exactly one budget
pub trait BudgetScoped {
    fn budget_id(&self) -> BudgetId;
}

macro_rules! budget_scoped {
    ($($model:ty),* $(,)?) => {
        $(
            impl BudgetScoped for $model {
                fn budget_id(&self) -> BudgetId {
                    self.budget_id
                }
            }
        )*
    };
}

budget_scoped!(
    BudgetMember,
    Institution,
    Account,
    Transaction,
    CategoryGroup,
    Category,
    Rule,
    Goal,
    SpendingTarget,
    MonthSummary,
);

impl<T: Record + BudgetScoped> Collection<T> {
    /// All records in a budget
    pub fn for_budget(&self, budget_id: BudgetId) -> Result<Vec<T>, EnvelopeError> {
        self.filter(|r| r.budget_id() == budget_id)
    }

    /// A record, only if it belongs to the given budget
    pub fn get_in_budget(&self, budget_id: BudgetId, key: T::Key) -> Result<Option<T>, EnvelopeError> {
        Ok(self.get(key)?.filter(|r| r.budget_id() == budget_id))
    }

    /// Remove everything a budget owns
    pub fn delete_for_budget(&self, budget_id: BudgetId) -> Result<Vec<T>, EnvelopeError> {
        self.delete_where(|r| r.budget_id() == budget_id)
    }
}

/// Records whose names are unique within a budget (case-insensitive)
pub trait UniqueName: BudgetScoped {
    fn name(&self) -> &str;
}

macro_rules! unique_name {
    ($($model:ty),* $(,)?) => {
        $(
            impl UniqueName for $model {
                fn name(&self) -> &str {
                    &self.name
                }
            }
        )*
    };
}

unique_name!(Account, CategoryGroup, Category, Rule, Goal);

impl<T: Record + UniqueName> Collection<T> {
    /// Find a record in a budget by name, ignoring case
    pub fn find_by_name(&self, budget_id: BudgetId, name: &str) -> Result<Option<T>, EnvelopeError> {
        let name = name.trim();
        self.find(|r| r.budget_id() == budget_id && r.name().eq_ignore_ascii_case(name))
    }

    /// Insert or replace a record, rejecting a name already used in its budget
    pub fn insert_named(&self, record: T) -> Result<Result<(), T>, EnvelopeError> {
        self.insert_unique(record, |existing, new| {
            existing.budget_id() == new.budget_id() && existing.name().eq_ignore_ascii_case(new.name())
        })
    }
}
