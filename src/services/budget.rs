//! Budget service
//!
//! Budgets, their default category template and membership.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::audit::EntityType;
use crate::config::Settings;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    Budget, BudgetId, BudgetMember, DefaultCategoryGroup, MemberRole, UserId,
};
use crate::services::access::BudgetAccess;
use crate::services::UserService;
use crate::storage::{AuditScope, Storage};

/// A budget with the caller's role in it
#[derive(Debug, Clone, Serialize)]
pub struct BudgetSummary {
    #[serde(flatten)]
    pub budget: Budget,
    pub role: MemberRole,
}

/// A member with their profile resolved
#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Service for budgets and members
pub struct BudgetService<'a> {
    storage: &'a Storage,
}

impl<'a> BudgetService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Budgets the user belongs to, oldest first
    pub fn list_for_user(&self, user_id: UserId) -> EnvelopeResult<Vec<BudgetSummary>> {
        let memberships = self.storage.members.filter(|m| m.user_id == user_id)?;
        let mut summaries = Vec::with_capacity(memberships.len());
        for member in memberships {
            if let Some(budget) = self.storage.budgets.get(member.budget_id)? {
                summaries.push(BudgetSummary {
                    budget,
                    role: member.role,
                });
            }
        }
        summaries.sort_by(|a, b| a.budget.created_at.cmp(&b.budget.created_at));
        Ok(summaries)
    }

    /// Create a budget owned by the user, seeded with the default categories
    pub fn create(
        &self,
        user_id: UserId,
        name: &str,
        currency: Option<&str>,
        settings: &Settings,
    ) -> EnvelopeResult<Budget> {
        let currency = currency.unwrap_or(&settings.default_currency);
        let budget = Budget::new(name.trim(), currency.trim(), user_id);
        budget
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        self.storage.budgets.upsert(budget.clone())?;
        self.storage
            .members
            .upsert(BudgetMember::new(budget.id, user_id, MemberRole::Owner))?;

        if settings.seed_default_categories {
            self.seed_categories(budget.id)?;
        } else {
            // The income group is always present so income can be tracked
            let (group, categories) = DefaultCategoryGroup::Income.build(budget.id, 0);
            self.storage.groups.upsert(group)?;
            self.storage.categories.upsert_many(categories)?;
        }

        self.storage.budgets.save()?;
        self.storage.members.save()?;
        self.storage.groups.save()?;
        self.storage.categories.save()?;

        self.storage.log_create(
            AuditScope::budget(user_id, budget.id),
            EntityType::Budget,
            budget.id,
            Some(budget.name.clone()),
            &budget,
        )?;
        info!(budget_id = %budget.id, user_id = %user_id, "Budget created");

        Ok(budget)
    }

    fn seed_categories(&self, budget_id: BudgetId) -> EnvelopeResult<()> {
        for (i, default_group) in DefaultCategoryGroup::all().iter().enumerate() {
            let (group, categories) = default_group.build(budget_id, i as i32);
            self.storage.groups.upsert(group)?;
            self.storage.categories.upsert_many(categories)?;
        }
        Ok(())
    }

    /// Rename or change the currency of a budget
    pub fn update(
        &self,
        access: &BudgetAccess,
        name: Option<&str>,
        currency: Option<&str>,
    ) -> EnvelopeResult<Budget> {
        let before = access.budget.clone();
        let mut budget = before.clone();

        if let Some(name) = name {
            budget.name = name.trim().to_string();
        }
        if let Some(currency) = currency {
            budget.currency = currency.trim().to_uppercase();
        }
        budget
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        budget.updated_at = Utc::now();

        self.storage.budgets.upsert(budget.clone())?;
        self.storage.budgets.save()?;

        self.storage.log_update(
            access.scope(),
            EntityType::Budget,
            budget.id,
            Some(budget.name.clone()),
            &before,
            &budget,
        )?;

        Ok(budget)
    }

    /// Delete a budget and everything in it
    pub fn delete(&self, access: &BudgetAccess) -> EnvelopeResult<()> {
        let budget = self
            .storage
            .delete_budget_cascade(access.budget_id())?
            .ok_or_else(|| EnvelopeError::not_found("Budget", access.budget_id().to_string()))?;

        self.storage.log_delete(
            access.scope(),
            EntityType::Budget,
            budget.id,
            Some(budget.name.clone()),
            &budget,
        )?;
        info!(budget_id = %budget.id, "Budget deleted");

        Ok(())
    }

    /// Members of a budget, owner first
    pub fn list_members(&self, access: &BudgetAccess) -> EnvelopeResult<Vec<MemberView>> {
        let mut members: Vec<MemberView> = self
            .storage
            .members
            .for_budget(access.budget_id())?
            .into_iter()
            .filter_map(|m| {
                let user = self.storage.users.get(m.user_id).ok().flatten()?;
                Some(MemberView {
                    user_id: m.user_id,
                    email: user.email,
                    name: user.name,
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect();
        members.sort_by(|a, b| b.role.cmp(&a.role).then(a.joined_at.cmp(&b.joined_at)));
        Ok(members)
    }

    /// Share the budget with an existing user
    pub fn add_member(
        &self,
        access: &BudgetAccess,
        email: &str,
        role: MemberRole,
    ) -> EnvelopeResult<BudgetMember> {
        if role == MemberRole::Owner {
            return Err(EnvelopeError::Validation(
                "A budget has exactly one owner".into(),
            ));
        }

        let user = UserService::new(self.storage)
            .find_by_email(email)?
            .ok_or_else(|| EnvelopeError::not_found("User", email.trim()))?;

        let member = BudgetMember::new(access.budget_id(), user.id, role);
        if !self.storage.members.insert_new(member.clone())? {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Member",
                identifier: user.email,
            });
        }
        self.storage.members.save()?;

        self.storage.log_create(
            access.scope(),
            EntityType::Member,
            user.id,
            Some(user.email.clone()),
            &member,
        )?;

        Ok(member)
    }

    /// Change a member's role
    pub fn update_member_role(
        &self,
        access: &BudgetAccess,
        user_id: UserId,
        role: MemberRole,
    ) -> EnvelopeResult<BudgetMember> {
        if role == MemberRole::Owner {
            return Err(EnvelopeError::Validation(
                "A budget has exactly one owner".into(),
            ));
        }

        let before = self.get_member(access.budget_id(), user_id)?;
        if before.role == MemberRole::Owner {
            return Err(EnvelopeError::Conflict(
                "The owner's role cannot be changed".into(),
            ));
        }

        let after = self
            .storage
            .members
            .update((access.budget_id(), user_id), |m| m.role = role)?
            .ok_or_else(|| EnvelopeError::not_found("User", user_id.to_string()))?;
        self.storage.members.save()?;

        self.storage.log_update(
            access.scope(),
            EntityType::Member,
            user_id,
            None,
            &before,
            &after,
        )?;

        Ok(after)
    }

    /// Remove a member, or leave the budget when removing oneself
    ///
    /// The caller must be the owner unless they are removing themself.
    pub fn remove_member(&self, access: &BudgetAccess, user_id: UserId) -> EnvelopeResult<()> {
        if user_id != access.user_id && !access.role.can_manage() {
            return Err(EnvelopeError::Forbidden(
                "Only the budget owner can remove other members".into(),
            ));
        }

        let member = self.get_member(access.budget_id(), user_id)?;
        if member.role == MemberRole::Owner {
            return Err(EnvelopeError::Conflict(
                "The budget owner cannot be removed".into(),
            ));
        }

        self.storage.members.delete((access.budget_id(), user_id))?;
        self.storage.members.save()?;

        self.storage.log_delete(
            access.scope(),
            EntityType::Member,
            user_id,
            None,
            &member,
        )?;

        Ok(())
    }

    fn get_member(&self, budget_id: BudgetId, user_id: UserId) -> EnvelopeResult<BudgetMember> {
        self.storage
            .members
            .get((budget_id, user_id))?
            .ok_or_else(|| EnvelopeError::NotFound {
                entity_type: "Member",
                identifier: user_id.to_string(),
            })
    }
}
