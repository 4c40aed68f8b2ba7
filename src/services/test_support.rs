//! Shared fixtures for service tests

use chrono::NaiveDate;
use tempfile::TempDir;

use crate::config::{EnvelopePaths, Settings};
use crate::models::{Account, AccountType, Money, User};
use crate::services::access::{authorize, BudgetAccess, Permission};
use crate::services::{AccountService, BudgetService};
use crate::storage::Storage;

pub fn create_test_storage() -> (TempDir, Storage) {
    let temp_dir = TempDir::new().unwrap();
    let paths = EnvelopePaths::at(temp_dir.path());
    let storage = Storage::new(paths).unwrap();
    (temp_dir, storage)
}

/// Insert a user directly, skipping password hashing
pub fn create_user(storage: &Storage, email: &str) -> User {
    let user = User::new(email, email.split('@').next().unwrap_or("user"), "not-a-real-hash");
    storage.users.upsert(user.clone()).unwrap();
    user
}

/// A fresh owner with a seeded budget
pub fn setup_budget(storage: &Storage) -> BudgetAccess {
    let user = create_user(storage, &format!("owner-{}@example.com", uuid::Uuid::new_v4()));
    let budget = BudgetService::new(storage)
        .create(user.id, "Household", None, &Settings::default())
        .unwrap();
    authorize(storage, user.id, budget.id, Permission::Manage).unwrap()
}

pub fn create_manual_account(access: &BudgetAccess, storage: &Storage, name: &str, cents: i64) -> Account {
    AccountService::new(storage)
        .create_manual(access, name, AccountType::Checking, Money::from_cents(cents), true)
        .unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
