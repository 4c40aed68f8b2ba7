//! Audit log records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{BudgetId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    User,
    Budget,
    Member,
    Institution,
    Account,
    Transaction,
    Category,
    CategoryGroup,
    Rule,
    Goal,
    Target,
    Onboarding,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug of a unit variant is its bare name
        write!(f, "{:?}", self)
    }
}

/// One create, update or delete of one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub entity_type: EntityType,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    /// The user whose request made the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_id: Option<BudgetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
    /// `field: old -> new` pairs for updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_summary: Option<String>,
}

impl AuditEntry {
    pub fn new(
        operation: Operation,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        entity_name: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            entity_type,
            entity_id: entity_id.into(),
            entity_name,
            actor: None,
            budget_id: None,
            before: None,
            after: None,
            diff_summary: None,
        }
    }

    /// A create entry carrying the new entity as its `after` snapshot
    pub fn create<T: Serialize>(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        entity_name: Option<String>,
        entity: &T,
    ) -> Self {
        Self::new(Operation::Create, entity_type, entity_id, entity_name).after(entity)
    }

    pub fn before<T: Serialize>(mut self, entity: &T) -> Self {
        self.before = serde_json::to_value(entity).ok();
        self
    }

    pub fn after<T: Serialize>(mut self, entity: &T) -> Self {
        self.after = serde_json::to_value(entity).ok();
        self
    }

    pub fn with_diff(mut self, diff_summary: Option<String>) -> Self {
        self.diff_summary = diff_summary;
        self
    }

    pub fn by(mut self, actor: Option<UserId>) -> Self {
        self.actor = actor;
        self
    }

    pub fn in_budget(mut self, budget_id: Option<BudgetId>) -> Self {
        self.budget_id = budget_id;
        self
    }
}

/// `2025-03-01 12:00:00 UPDATE Account acc-1 'Checking' by usr-1a2b3c4d`
impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.operation,
            self.entity_type,
            self.entity_id
        )?;
        if let Some(name) = &self.entity_name {
            write!(f, " '{}'", name)?;
        }
        if let Some(actor) = &self.actor {
            write!(f, " by {}", actor)?;
        }
        Ok(())
    }
}
