//! Categories and category groups
//!
//! Every budget has a protected "Income" group; transactions in its
//! categories count as income, everything else counts as spending.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BudgetId, CategoryGroupId, CategoryId};

/// Longest accepted category or group name, in bytes
pub const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CategoryValidationError {
    #[error("Category name cannot be empty")]
    EmptyName,
    #[error("Category name too long ({0} chars, max 50)")]
    NameTooLong(usize),
}

fn check_name(name: &str) -> Result<(), CategoryValidationError> {
    match name.trim().len() {
        0 => Err(CategoryValidationError::EmptyName),
        n if n > MAX_NAME_LEN => Err(CategoryValidationError::NameTooLong(n)),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub id: CategoryGroupId,
    pub budget_id: BudgetId,
    pub name: String,
    pub sort_order: i32,
    /// Collapsed in client listings
    #[serde(default)]
    pub hidden: bool,
    /// Protected: cannot be renamed, reordered away or deleted
    #[serde(default)]
    pub system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CategoryGroup {
    pub fn new(budget_id: BudgetId, name: impl Into<String>, sort_order: i32) -> Self {
        let now = Utc::now();
        Self {
            id: CategoryGroupId::new(),
            budget_id,
            name: name.into(),
            sort_order,
            hidden: false,
            system: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        check_name(&self.name)
    }
}

impl fmt::Display for CategoryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub budget_id: BudgetId,
    pub group_id: CategoryGroupId,
    pub name: String,
    /// Position within the group
    pub sort_order: i32,
    #[serde(default)]
    pub hidden: bool,
    /// Protected: cannot be renamed, moved or deleted
    #[serde(default)]
    pub system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn new(
        budget_id: BudgetId,
        group_id: CategoryGroupId,
        name: impl Into<String>,
        sort_order: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CategoryId::new(),
            budget_id,
            group_id,
            name: name.into(),
            sort_order,
            hidden: false,
            system: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn move_to_group(&mut self, group_id: CategoryGroupId, sort_order: i32) {
        self.group_id = group_id;
        self.sort_order = sort_order;
        self.updated_at = Utc::now();
    }

    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        check_name(&self.name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Starter groups seeded into every new budget, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultCategoryGroup {
    Income,
    Bills,
    Needs,
    Wants,
    Savings,
}

const TEMPLATE: [(DefaultCategoryGroup, &str, &[&str]); 5] = [
    (DefaultCategoryGroup::Income, "Income", &["Income"]),
    (
        DefaultCategoryGroup::Bills,
        "Bills",
        &["Rent/Mortgage", "Electric", "Water", "Internet", "Phone", "Insurance"],
    ),
    (
        DefaultCategoryGroup::Needs,
        "Needs",
        &["Groceries", "Transportation", "Medical", "Household"],
    ),
    (
        DefaultCategoryGroup::Wants,
        "Wants",
        &["Dining Out", "Entertainment", "Shopping", "Subscriptions"],
    ),
    (
        DefaultCategoryGroup::Savings,
        "Savings",
        &["Emergency Fund", "Vacation", "Large Purchases"],
    ),
];

impl DefaultCategoryGroup {
    pub fn all() -> [Self; 5] {
        TEMPLATE.map(|(group, _, _)| group)
    }

    fn entry(&self) -> (&'static str, &'static [&'static str]) {
        let (_, name, categories) = TEMPLATE[*self as usize];
        (name, categories)
    }

    pub fn name(&self) -> &'static str {
        self.entry().0
    }

    /// Seed the group and its categories into `budget_id`
    ///
    /// The Income group and its category come out flagged as system entries.
    pub fn build(&self, budget_id: BudgetId, sort_order: i32) -> (CategoryGroup, Vec<Category>) {
        let (name, category_names) = self.entry();
        let system = *self == Self::Income;

        let mut group = CategoryGroup::new(budget_id, name, sort_order);
        group.system = system;

        let categories = (0..)
            .zip(category_names)
            .map(|(position, name)| {
                let mut category = Category::new(budget_id, group.id, *name, position);
                category.system = system;
                category
            })
            .collect();

        (group, categories)
    }
}
