//! Budget activity feed, read back from the audit log

use crate::audit::AuditEntry;
use crate::error::EnvelopeResult;
use crate::services::BudgetAccess;
use crate::storage::Storage;

pub const DEFAULT_ACTIVITY_LIMIT: usize = 50;
pub const MAX_ACTIVITY_LIMIT: usize = 500;

/// Recent changes to the budget, newest first
pub fn recent_activity(
    storage: &Storage,
    access: &BudgetAccess,
    limit: Option<usize>,
) -> EnvelopeResult<Vec<AuditEntry>> {
    let limit = limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    storage.audit().read_for_budget(access.budget_id(), limit)
}
