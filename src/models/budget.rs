//! Budget and membership models
//!
//! A budget groups linked accounts, categories and spending targets. Budgets
//! can be shared: every user with access has a `BudgetMember` row carrying
//! their role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{BudgetId, UserId};

/// A named budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    /// Unique identifier
    pub id: BudgetId,

    /// Budget name (e.g., "Household")
    pub name: String,

    /// ISO currency code used for display
    pub currency: String,

    /// User who created the budget
    pub owner_id: UserId,

    /// When the budget was created
    pub created_at: DateTime<Utc>,

    /// When the budget was last modified
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    /// Create a new budget owned by `owner_id`
    pub fn new(name: impl Into<String>, currency: impl Into<String>, owner_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: BudgetId::new(),
            name: name.into(),
            currency: currency.into().to_uppercase(),
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the budget
    pub fn validate(&self) -> Result<(), BudgetValidationError> {
        if self.name.trim().is_empty() {
            return Err(BudgetValidationError::EmptyName);
        }

        if self.name.len() > 100 {
            return Err(BudgetValidationError::NameTooLong(self.name.len()));
        }

        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(BudgetValidationError::InvalidCurrency(self.currency.clone()));
        }

        Ok(())
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.currency)
    }
}

/// What a member may do inside a budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Read-only access
    Viewer,
    /// May change accounts, transactions, categories, rules, goals
    Editor,
    /// Full control including sharing and deletion
    Owner,
}

impl MemberRole {
    /// Whether this role may mutate budget data
    pub fn can_write(&self) -> bool {
        matches!(self, Self::Editor | Self::Owner)
    }

    /// Whether this role may manage members and delete the budget
    pub fn can_manage(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Viewer => write!(f, "viewer"),
            Self::Editor => write!(f, "editor"),
            Self::Owner => write!(f, "owner"),
        }
    }
}

/// A user's membership in a budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetMember {
    pub budget_id: BudgetId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

impl BudgetMember {
    pub fn new(budget_id: BudgetId, user_id: UserId, role: MemberRole) -> Self {
        Self {
            budget_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}

/// Validation errors for budgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetValidationError {
    EmptyName,
    NameTooLong(usize),
    InvalidCurrency(String),
}

impl fmt::Display for BudgetValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Budget name cannot be empty"),
            Self::NameTooLong(len) => write!(f, "Budget name too long ({} chars, max 100)", len),
            Self::InvalidCurrency(c) => {
                write!(f, "Invalid currency code '{}' (expected e.g. USD)", c)
            }
        }
    }
}

impl std::error::Error for BudgetValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_budget_uppercases_currency() {
        let budget = Budget::new("Home", "usd", UserId::new());
        assert_eq!(budget.currency, "USD");
        assert!(budget.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut budget = Budget::new("Home", "USD", UserId::new());
        budget.name = "  ".into();
        assert_eq!(budget.validate(), Err(BudgetValidationError::EmptyName));

        budget.name = "Home".into();
        budget.currency = "DOLLARS".into();
        assert!(matches!(
            budget.validate(),
            Err(BudgetValidationError::InvalidCurrency(_))
        ));
    }

    #[test]
    fn test_role_permissions() {
        assert!(!MemberRole::Viewer.can_write());
        assert!(MemberRole::Editor.can_write());
        assert!(!MemberRole::Editor.can_manage());
        assert!(MemberRole::Owner.can_manage());
        assert!(MemberRole::Owner > MemberRole::Viewer);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&MemberRole::Editor).unwrap(), "\"editor\"");
        let role: MemberRole = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(role, MemberRole::Viewer);
    }
}
