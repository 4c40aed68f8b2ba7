//! Core data models for the budgeting service
//!
//! This module contains all the data structures that represent the budgeting
//! domain: users, budgets, accounts, transactions, categories, rules, goals,
//! spending targets and onboarding.

pub mod account;
pub mod budget;
pub mod category;
pub mod goal;
pub mod ids;
pub mod institution;
pub mod money;
pub mod month;
pub mod onboarding;
pub mod rule;
pub mod target;
pub mod tracking;
pub mod transaction;
pub mod user;

pub use account::{Account, AccountSource, AccountType};
pub use budget::{Budget, BudgetMember, MemberRole};
pub use category::{Category, CategoryGroup, DefaultCategoryGroup};
pub use goal::{Goal, GoalKind, GoalProgress};
pub use ids::{
    AccountId, BudgetId, CategoryGroupId, CategoryId, GoalId, InstitutionId, RuleId, TargetId,
    TransactionId, UserId,
};
pub use institution::{Institution, InstitutionStatus, InstitutionSummary};
pub use money::{Money, MAX_AMOUNT_CENTS};
pub use month::Month;
pub use onboarding::{OnboardingError, OnboardingState, OnboardingStep};
pub use rule::{Rule, RuleCondition, RuleField, RuleOperator};
pub use target::{SpendingTarget, TargetCadence};
pub use tracking::{CategorySpending, GroupSpending, MonthSummary, TrackingInput};
pub use transaction::{CategorySource, Transaction, TransactionSource};
pub use user::{User, UserProfile};
