//! Budget authorization
//!
//! Every budget-scoped operation starts by resolving the caller's membership.
//! Non-members get a not-found error so budget ids cannot be probed.

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{Budget, BudgetId, MemberRole, UserId};
use crate::storage::{AuditScope, Storage};

/// What the caller intends to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    Manage,
}

/// A verified membership in a budget
#[derive(Debug, Clone)]
pub struct BudgetAccess {
    pub budget: Budget,
    pub user_id: UserId,
    pub role: MemberRole,
}

impl BudgetAccess {
    pub fn budget_id(&self) -> BudgetId {
        self.budget.id
    }

    /// Audit attribution for changes made through this access
    pub fn scope(&self) -> AuditScope {
        AuditScope::budget(self.user_id, self.budget.id)
    }
}

/// Resolve the caller's access to a budget
pub fn authorize(
    storage: &Storage,
    user_id: UserId,
    budget_id: BudgetId,
    permission: Permission,
) -> EnvelopeResult<BudgetAccess> {
    let member = storage.members.get((budget_id, user_id))?;
    let budget = storage.budgets.get(budget_id)?;

    let (member, budget) = match (member, budget) {
        (Some(m), Some(b)) => (m, b),
        _ => return Err(EnvelopeError::not_found("Budget", budget_id.to_string())),
    };

    match permission {
        Permission::Read => {}
        Permission::Write if !member.role.can_write() => {
            return Err(EnvelopeError::Forbidden(
                "Viewers cannot modify this budget".into(),
            ));
        }
        Permission::Manage if !member.role.can_manage() => {
            return Err(EnvelopeError::Forbidden(
                "Only the budget owner can do this".into(),
            ));
        }
        _ => {}
    }

    Ok(BudgetAccess {
        budget,
        user_id,
        role: member.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BudgetMember;
    use crate::services::test_support::{create_test_storage, setup_budget};

    #[test]
    fn test_role_permissions() {
        let (_temp, storage) = create_test_storage();
        let owner = setup_budget(&storage);
        let budget_id = owner.budget_id();

        let viewer = UserId::new();
        let editor = UserId::new();
        storage
            .members
            .upsert(BudgetMember::new(budget_id, viewer, MemberRole::Viewer))
            .unwrap();
        storage
            .members
            .upsert(BudgetMember::new(budget_id, editor, MemberRole::Editor))
            .unwrap();

        assert!(authorize(&storage, viewer, budget_id, Permission::Read).is_ok());
        let err = authorize(&storage, viewer, budget_id, Permission::Write).unwrap_err();
        assert_eq!(err.status_code(), 403);

        assert!(authorize(&storage, editor, budget_id, Permission::Write).is_ok());
        let err = authorize(&storage, editor, budget_id, Permission::Manage).unwrap_err();
        assert_eq!(err.status_code(), 403);

        assert!(authorize(&storage, owner.user_id, budget_id, Permission::Manage).is_ok());
    }

    #[test]
    fn test_non_member_sees_not_found() {
        let (_temp, storage) = create_test_storage();
        let owner = setup_budget(&storage);

        let stranger = authorize(&storage, UserId::new(), owner.budget_id(), Permission::Read);
        let missing = authorize(&storage, owner.user_id, BudgetId::new(), Permission::Read);
        assert_eq!(stranger.unwrap_err().status_code(), 404);
        assert_eq!(missing.unwrap_err().status_code(), 404);
    }
}
