//! Reports
//!
//! Read-only views computed from a budget's accounts, tracking summaries,
//! goals and audit log.

pub mod activity;
pub mod net_worth;
pub mod overview;
pub mod spending;

pub use activity::recent_activity;
pub use net_worth::{AccountBalance, AccountTypeGroup, NetWorth};
pub use overview::{BudgetOverview, GoalCounts};
pub use spending::{MonthSpending, SpendingTrend};
