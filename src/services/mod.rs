//! Service layer
//!
//! Business logic on top of the storage layer: validation, authorization,
//! computed fields, cross-entity operations and audit logging. Every
//! budget-scoped operation takes a [`BudgetAccess`] obtained from
//! [`access::authorize`].

pub mod access;
pub mod account;
pub mod budget;
pub mod category;
pub mod goal;
pub mod import;
pub mod institution;
pub mod onboarding;
pub mod rule;
pub mod tracking;
pub mod transaction;
pub mod user;

#[cfg(test)]
pub mod test_support;

pub use access::{authorize, BudgetAccess, Permission};
pub use account::{AccountService, AccountSummary, AccountUpdate};
pub use budget::BudgetService;
pub use category::{CategoryGroupWithCategories, CategoryService, CategoryUpdate};
pub use goal::{GoalInput, GoalService, GoalUpdate, GoalView};
pub use import::{AmountColumns, ColumnMapping, ImportResult, ImportService};
pub use institution::{InstitutionService, InstitutionView, LinkResult, SyncResult};
pub use onboarding::OnboardingService;
pub use rule::{RuleEngine, RuleInput, RuleService, RuleUpdate};
pub use tracking::TrackingService;
pub use transaction::{
    CreateTransactionInput, TransactionFilter, TransactionPage, TransactionService, TransactionUpdate,
    TransactionView,
};
pub use user::UserService;
