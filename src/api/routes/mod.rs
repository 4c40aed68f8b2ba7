//! HTTP route handlers

pub mod accounts;
pub mod auth;
pub mod budgets;
pub mod categories;
pub mod goals;
pub mod health;
pub mod institutions;
pub mod onboarding;
pub mod reports;
pub mod rules;
pub mod tracking;
pub mod transactions;

#[cfg(test)]
pub(crate) mod test_support;
