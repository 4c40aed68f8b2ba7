//! Spending tracking service
//!
//! Spending targets and the per-month snapshot of spending against them.
//! Snapshots are recomputed after anything that changes a month's figures
//! and served from storage otherwise.

use std::collections::BTreeSet;

use tracing::debug;

use crate::audit::EntityType;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    BudgetId, CategoryId, Money, Month, MonthSummary, SpendingTarget, TargetCadence, TrackingInput,
};
use crate::services::access::BudgetAccess;
use crate::storage::Storage;

/// Service for targets and monthly tracking
pub struct TrackingService<'a> {
    storage: &'a Storage,
}

impl<'a> TrackingService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub fn list_targets(&self, access: &BudgetAccess) -> EnvelopeResult<Vec<SpendingTarget>> {
        let mut targets = self.storage.targets.for_budget(access.budget_id())?;
        targets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(targets)
    }

    /// Create or replace the target for a category
    ///
    /// Returns the target and whether it was newly created.
    pub fn set_target(
        &self,
        access: &BudgetAccess,
        category_id: CategoryId,
        amount: Money,
        cadence: TargetCadence,
    ) -> EnvelopeResult<(SpendingTarget, bool)> {
        let budget_id = access.budget_id();
        self.storage
            .categories
            .get_in_budget(budget_id, category_id)?
            .ok_or_else(|| EnvelopeError::not_found("Category", category_id.to_string()))?;

        let existing = self
            .storage
            .targets
            .find(|t| t.budget_id == budget_id && t.category_id == category_id)?;

        let (target, created) = match existing {
            Some(before) => {
                let mut target = before.clone();
                target.update(amount, cadence);
                target.active = true;
                target
                    .validate()
                    .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
                self.storage.targets.upsert(target.clone())?;
                self.storage.targets.save()?;
                self.storage.log_update(
                    access.scope(),
                    EntityType::Target,
                    target.id,
                    None,
                    &before,
                    &target,
                )?;
                (target, false)
            }
            None => {
                let target = SpendingTarget::new(budget_id, category_id, amount, cadence);
                target
                    .validate()
                    .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
                self.storage.targets.upsert(target.clone())?;
                self.storage.targets.save()?;
                self.storage.log_create(
                    access.scope(),
                    EntityType::Target,
                    target.id,
                    None,
                    &target,
                )?;
                (target, true)
            }
        };

        self.invalidate(budget_id)?;
        Ok((target, created))
    }

    /// Remove the target for a category
    pub fn delete_target(&self, access: &BudgetAccess, category_id: CategoryId) -> EnvelopeResult<()> {
        let budget_id = access.budget_id();
        let removed = self
            .storage
            .targets
            .delete_where(|t| t.budget_id == budget_id && t.category_id == category_id)?;
        let Some(target) = removed.into_iter().next() else {
            return Err(EnvelopeError::NotFound {
                entity_type: "Target",
                identifier: category_id.to_string(),
            });
        };
        self.storage.targets.save()?;

        self.storage
            .log_delete(access.scope(), EntityType::Target, target.id, None, &target)?;

        self.invalidate(budget_id)
    }

    /// The month's snapshot, computing it if none is stored
    pub fn month_summary(&self, budget_id: BudgetId, month: Month) -> EnvelopeResult<MonthSummary> {
        match self.storage.summaries.get((budget_id, month))? {
            Some(summary) => Ok(summary),
            None => self.recalculate(budget_id, month),
        }
    }

    /// Recompute and store the month's snapshot
    pub fn recalculate(&self, budget_id: BudgetId, month: Month) -> EnvelopeResult<MonthSummary> {
        let summary = self.compute(budget_id, month)?;
        self.storage.summaries.upsert(summary.clone())?;
        self.storage.summaries.save()?;
        debug!(budget_id = %budget_id, month = %month, "Month recalculated");
        Ok(summary)
    }

    /// Recompute every listed month
    pub fn recalculate_months(
        &self,
        budget_id: BudgetId,
        months: impl IntoIterator<Item = Month>,
    ) -> EnvelopeResult<()> {
        let months: BTreeSet<Month> = months.into_iter().collect();
        for month in months {
            let summary = self.compute(budget_id, month)?;
            self.storage.summaries.upsert(summary)?;
        }
        self.storage.summaries.save()
    }

    /// Drop stored snapshots so they are recomputed on next read
    pub fn invalidate(&self, budget_id: BudgetId) -> EnvelopeResult<()> {
        self.storage.summaries.delete_for_budget(budget_id)?;
        self.storage.summaries.save()
    }

    /// Compute a month's figures without storing them
    pub fn compute(&self, budget_id: BudgetId, month: Month) -> EnvelopeResult<MonthSummary> {
        let groups = self.storage.groups.for_budget(budget_id)?;
        let categories = self.storage.categories.for_budget(budget_id)?;
        let targets = self.storage.targets.for_budget(budget_id)?;
        let accounts = self.storage.accounts.for_budget(budget_id)?;
        let transactions = self.storage.transactions.get_by_month(budget_id, month)?;

        Ok(MonthSummary::compute(
            budget_id,
            month,
            TrackingInput {
                groups: &groups,
                categories: &categories,
                targets: &targets,
                accounts: &accounts,
                transactions: &transactions,
            },
        ))
    }
}
