//! Category service
//!
//! Provides business logic for category and category group management
//! including CRUD operations, reordering, and moving categories between groups.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::audit::EntityType;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{BudgetId, Category, CategoryGroup, CategoryGroupId, CategoryId, Month};
use crate::services::access::BudgetAccess;
use crate::services::TrackingService;
use crate::storage::Storage;

/// Service for category management
pub struct CategoryService<'a> {
    storage: &'a Storage,
}

/// A category group with its categories
#[derive(Debug, Clone, Serialize)]
pub struct CategoryGroupWithCategories {
    #[serde(flatten)]
    pub group: CategoryGroup,
    pub categories: Vec<Category>,
}

/// Fields that may be changed on a category
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub group_id: Option<CategoryGroupId>,
    pub hidden: Option<bool>,
}

impl<'a> CategoryService<'a> {
    /// Create a new category service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Groups with their categories, in display order
    pub fn list(&self, access: &BudgetAccess) -> EnvelopeResult<Vec<CategoryGroupWithCategories>> {
        self.storage
            .groups
            .ordered(access.budget_id())?
            .into_iter()
            .map(|group| {
                let categories = self.storage.categories.get_categories_in_group(group.id)?;
                Ok(CategoryGroupWithCategories { group, categories })
            })
            .collect()
    }

    // === Group Operations ===

    /// Create a new category group
    pub fn create_group(&self, access: &BudgetAccess, name: &str) -> EnvelopeResult<CategoryGroup> {
        let budget_id = access.budget_id();
        let group = CategoryGroup::new(
            budget_id,
            name.trim(),
            self.storage.groups.next_sort_order(budget_id)?,
        );
        group
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        self.store_group(&group)?;

        self.storage.log_create(
            access.scope(),
            EntityType::CategoryGroup,
            group.id,
            Some(group.name.clone()),
            &group,
        )?;
        self.invalidate_tracking(access)?;

        Ok(group)
    }

    /// Get a group in the budget
    pub fn get_group(&self, access: &BudgetAccess, id: CategoryGroupId) -> EnvelopeResult<CategoryGroup> {
        self.storage
            .groups
            .get_in_budget(access.budget_id(), id)?
            .ok_or_else(|| EnvelopeError::not_found("Category Group", id.to_string()))
    }

    /// Rename a group
    pub fn rename_group(
        &self,
        access: &BudgetAccess,
        id: CategoryGroupId,
        name: &str,
    ) -> EnvelopeResult<CategoryGroup> {
        let before = self.get_group(access, id)?;
        if before.system {
            return Err(EnvelopeError::Conflict(format!(
                "The '{}' group cannot be renamed",
                before.name
            )));
        }

        let mut group = before.clone();
        group.name = name.trim().to_string();
        group
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        group.updated_at = Utc::now();

        self.store_group(&group)?;

        self.storage.log_update(
            access.scope(),
            EntityType::CategoryGroup,
            group.id,
            Some(group.name.clone()),
            &before,
            &group,
        )?;
        self.invalidate_tracking(access)?;

        Ok(group)
    }

    /// Set group display order
    ///
    /// Groups not listed keep their relative order after the listed ones.
    pub fn reorder_groups(
        &self,
        access: &BudgetAccess,
        ids: &[CategoryGroupId],
    ) -> EnvelopeResult<Vec<CategoryGroup>> {
        let budget_id = access.budget_id();
        let groups = self.storage.groups.ordered(budget_id)?;
        if let Some(missing) = ids.iter().find(|id| !groups.iter().any(|g| g.id == **id)) {
            return Err(EnvelopeError::not_found("Category Group", missing.to_string()));
        }

        let unlisted = groups.iter().filter(|g| !ids.contains(&g.id)).map(|g| g.id);
        let order: Vec<CategoryGroupId> = ids.iter().copied().chain(unlisted).collect();

        let now = Utc::now();
        for (sort_order, id) in order.iter().enumerate() {
            self.storage.groups.update(*id, |group| {
                group.sort_order = sort_order as i32;
                group.updated_at = now;
            })?;
        }
        self.storage.groups.save()?;
        self.invalidate_tracking(access)?;

        self.storage.groups.ordered(budget_id)
    }

    /// Delete a group
    ///
    /// A group with categories is only deleted with `force`, which deletes
    /// the categories too.
    pub fn delete_group(&self, access: &BudgetAccess, id: CategoryGroupId, force: bool) -> EnvelopeResult<()> {
        let group = self.get_group(access, id)?;
        if group.system {
            return Err(EnvelopeError::Conflict(format!(
                "The '{}' group cannot be deleted",
                group.name
            )));
        }

        let categories = self.storage.categories.get_categories_in_group(id)?;
        if !categories.is_empty() && !force {
            return Err(EnvelopeError::Conflict(format!(
                "Group '{}' has {} categories; delete them first or force the delete",
                group.name,
                categories.len()
            )));
        }

        let mut months = BTreeSet::new();
        for category in categories {
            months.extend(self.remove_category(access, category)?);
        }

        self.storage.groups.delete(id)?;
        self.storage.groups.save()?;

        self.storage.log_delete(
            access.scope(),
            EntityType::CategoryGroup,
            group.id,
            Some(group.name.clone()),
            &group,
        )?;
        info!(group_id = %group.id, "Category group deleted");

        self.refresh_tracking(access.budget_id(), months)
    }

    // === Category Operations ===

    /// Create a new category at the end of a group
    pub fn create_category(
        &self,
        access: &BudgetAccess,
        group_id: CategoryGroupId,
        name: &str,
    ) -> EnvelopeResult<Category> {
        let group = self.get_group(access, group_id)?;
        let category = Category::new(
            access.budget_id(),
            group.id,
            name.trim(),
            self.storage.categories.next_sort_order(group.id)?,
        );
        category
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        self.store_category(&category)?;

        self.storage.log_create(
            access.scope(),
            EntityType::Category,
            category.id,
            Some(category.name.clone()),
            &category,
        )?;
        self.invalidate_tracking(access)?;

        Ok(category)
    }

    /// Get a category in the budget
    pub fn get_category(&self, access: &BudgetAccess, id: CategoryId) -> EnvelopeResult<Category> {
        self.storage
            .categories
            .get_in_budget(access.budget_id(), id)?
            .ok_or_else(|| EnvelopeError::not_found("Category", id.to_string()))
    }

    /// Rename, move or hide a category
    pub fn update_category(
        &self,
        access: &BudgetAccess,
        id: CategoryId,
        changes: CategoryUpdate,
    ) -> EnvelopeResult<Category> {
        let before = self.get_category(access, id)?;
        let mut category = before.clone();

        if let Some(name) = &changes.name {
            let name = name.trim();
            if before.system && name != before.name {
                return Err(EnvelopeError::Conflict(format!(
                    "The '{}' category cannot be renamed",
                    before.name
                )));
            }
            category.name = name.to_string();
        }
        if let Some(group_id) = changes.group_id {
            if group_id != before.group_id {
                if before.system {
                    return Err(EnvelopeError::Conflict(format!(
                        "The '{}' category cannot be moved",
                        before.name
                    )));
                }
                let group = self.get_group(access, group_id)?;
                let position = self.storage.categories.next_sort_order(group.id)?;
                category.move_to_group(group.id, position);
            }
        }
        if let Some(hidden) = changes.hidden {
            category.hidden = hidden;
        }

        category
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        category.updated_at = Utc::now();

        self.store_category(&category)?;

        self.storage.log_update(
            access.scope(),
            EntityType::Category,
            category.id,
            Some(category.name.clone()),
            &before,
            &category,
        )?;

        self.invalidate_tracking(access)?;

        Ok(category)
    }

    /// Delete a category
    ///
    /// Its transactions become uncategorized; its targets and the rules that
    /// assign it are deleted.
    pub fn delete_category(&self, access: &BudgetAccess, id: CategoryId) -> EnvelopeResult<()> {
        let category = self.get_category(access, id)?;
        if category.system {
            return Err(EnvelopeError::Conflict(format!(
                "The '{}' category cannot be deleted",
                category.name
            )));
        }

        let months = self.remove_category(access, category)?;
        self.refresh_tracking(access.budget_id(), months)
    }

    /// Stored month snapshots carry group and category names and layout
    fn invalidate_tracking(&self, access: &BudgetAccess) -> EnvelopeResult<()> {
        TrackingService::new(self.storage).invalidate(access.budget_id())
    }

    fn remove_category(&self, access: &BudgetAccess, category: Category) -> EnvelopeResult<BTreeSet<Month>> {
        let cascade = self.storage.delete_category_cascade(category.id)?;

        self.storage.log_delete(
            access.scope(),
            EntityType::Category,
            category.id,
            Some(category.name.clone()),
            &category,
        )?;
        for rule in &cascade.rules {
            self.storage.log_delete(
                access.scope(),
                EntityType::Rule,
                rule.id,
                Some(rule.name.clone()),
                rule,
            )?;
        }
        info!(
            category_id = %category.id,
            uncategorized = cascade.uncategorized.len(),
            targets = cascade.targets.len(),
            rules = cascade.rules.len(),
            "Category deleted"
        );

        Ok(cascade.uncategorized.iter().map(|t| Month::of(t.date)).collect())
    }

    /// Drop stale snapshots, then recompute the months that lost transactions
    fn refresh_tracking(&self, budget_id: BudgetId, months: BTreeSet<Month>) -> EnvelopeResult<()> {
        let tracking = TrackingService::new(self.storage);
        tracking.invalidate(budget_id)?;
        tracking.recalculate_months(budget_id, months)
    }

    fn store_group(&self, group: &CategoryGroup) -> EnvelopeResult<()> {
        if self.storage.groups.insert_named(group.clone())?.is_err() {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Category Group",
                identifier: group.name.clone(),
            });
        }
        self.storage.groups.save()
    }

    fn store_category(&self, category: &Category) -> EnvelopeResult<()> {
        if self.storage.categories.insert_named(category.clone())?.is_err() {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Category",
                identifier: category.name.clone(),
            });
        }
        self.storage.categories.save()
    }
}
