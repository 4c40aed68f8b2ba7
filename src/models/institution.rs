//! Institution model
//!
//! A financial institution linked through the banking aggregator. The
//! aggregator's access token is stored encrypted and never serialized back
//! to API clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BudgetId, InstitutionId};
use crate::crypto::EncryptedData;

/// Link health as last reported by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionStatus {
    #[default]
    Active,
    /// The user must re-authenticate with their bank before syncing again
    LoginRequired,
}

/// A linked institution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Institution {
    pub id: InstitutionId,
    pub budget_id: BudgetId,

    /// Institution display name (e.g., "First Platypus Bank")
    pub name: String,

    /// Aggregator-side item identifier
    pub external_id: String,

    /// Encrypted aggregator access token
    pub access_token: EncryptedData,

    /// Opaque cursor for incremental transaction sync
    #[serde(default)]
    pub sync_cursor: Option<String>,

    pub last_synced_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub status: InstitutionStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Institution {
    pub fn new(
        budget_id: BudgetId,
        name: impl Into<String>,
        external_id: impl Into<String>,
        access_token: EncryptedData,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: InstitutionId::new(),
            budget_id,
            name: name.into(),
            external_id: external_id.into(),
            access_token,
            sync_cursor: None,
            last_synced_at: None,
            status: InstitutionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a completed sync
    pub fn mark_synced(&mut self, cursor: Option<String>) {
        let now = Utc::now();
        self.sync_cursor = cursor;
        self.last_synced_at = Some(now);
        self.status = InstitutionStatus::Active;
        self.updated_at = now;
    }

    /// Public view without the access token
    pub fn summary(&self) -> InstitutionSummary {
        InstitutionSummary {
            id: self.id,
            budget_id: self.budget_id,
            name: self.name.clone(),
            status: self.status,
            last_synced_at: self.last_synced_at,
            created_at: self.created_at,
        }
    }
}

/// Institution data safe to return over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionSummary {
    pub id: InstitutionId,
    pub budget_id: BudgetId,
    pub name: String,
    pub status: InstitutionStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
