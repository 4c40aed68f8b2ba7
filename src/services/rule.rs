//! Rule service
//!
//! CRUD for auto-categorization rules, plus the engine that runs them over
//! new and existing transactions.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;

use crate::audit::EntityType;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::rule::{first_match, sort_for_evaluation};
use crate::models::{BudgetId, CategoryId, Month, Rule, RuleCondition, RuleId, Transaction};
use crate::services::access::BudgetAccess;
use crate::services::TrackingService;
use crate::storage::Storage;

/// Enabled rules of a budget in evaluation order
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.retain(|r| r.enabled);
        sort_for_evaluation(&mut rules);
        Self { rules }
    }

    pub fn load(storage: &Storage, budget_id: BudgetId) -> EnvelopeResult<Self> {
        Ok(Self::new(storage.rules.for_budget(budget_id)?))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run the first matching rule on a transaction
    ///
    /// Manually categorized transactions are left alone. Returns whether
    /// the transaction changed.
    pub fn categorize(&self, txn: &mut Transaction) -> bool {
        if txn.has_manual_category() {
            return false;
        }
        let Some(rule) = first_match(&self.rules, txn) else {
            return false;
        };

        let before = (txn.category_id, txn.payee.clone());
        rule.apply_to(txn);
        before != (txn.category_id, txn.payee.clone())
    }
}

/// A rule as submitted by a client
#[derive(Debug, Clone)]
pub struct RuleInput {
    pub name: String,
    pub conditions: Vec<RuleCondition>,
    pub match_all: bool,
    pub category_id: CategoryId,
    pub rename_payee: Option<String>,
    pub enabled: bool,
    pub priority: Option<i32>,
}

/// Fields that may be changed on a rule
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub conditions: Option<Vec<RuleCondition>>,
    pub match_all: Option<bool>,
    pub category_id: Option<CategoryId>,
    pub rename_payee: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
}

/// Service for rule management
pub struct RuleService<'a> {
    storage: &'a Storage,
}

impl<'a> RuleService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Rules in evaluation order
    pub fn list(&self, access: &BudgetAccess) -> EnvelopeResult<Vec<Rule>> {
        let mut rules = self.storage.rules.for_budget(access.budget_id())?;
        sort_for_evaluation(&mut rules);
        Ok(rules)
    }

    pub fn get(&self, access: &BudgetAccess, id: RuleId) -> EnvelopeResult<Rule> {
        self.storage
            .rules
            .get_in_budget(access.budget_id(), id)?
            .ok_or_else(|| EnvelopeError::not_found("Rule", id.to_string()))
    }

    pub fn create(&self, access: &BudgetAccess, input: RuleInput) -> EnvelopeResult<Rule> {
        let budget_id = access.budget_id();
        let mut rule = Rule::new(budget_id, input.name.trim(), input.category_id, input.conditions);
        rule.match_all = input.match_all;
        rule.rename_payee = input.rename_payee.map(|p| p.trim().to_string());
        rule.enabled = input.enabled;
        rule.priority = match input.priority {
            Some(priority) => priority,
            None => self.next_priority(budget_id)?,
        };

        self.validate(budget_id, &rule)?;
        self.store(&rule)?;

        self.storage.log_create(
            access.scope(),
            EntityType::Rule,
            rule.id,
            Some(rule.name.clone()),
            &rule,
        )?;
        info!(rule_id = %rule.id, budget_id = %budget_id, "Rule created");

        Ok(rule)
    }

    pub fn update(&self, access: &BudgetAccess, id: RuleId, changes: RuleUpdate) -> EnvelopeResult<Rule> {
        let before = self.get(access, id)?;
        let mut rule = before.clone();

        if let Some(name) = changes.name {
            rule.name = name.trim().to_string();
        }
        if let Some(conditions) = changes.conditions {
            rule.conditions = conditions;
        }
        if let Some(match_all) = changes.match_all {
            rule.match_all = match_all;
        }
        if let Some(category_id) = changes.category_id {
            rule.category_id = category_id;
        }
        if let Some(rename) = changes.rename_payee {
            rule.rename_payee = rename.map(|p| p.trim().to_string());
        }
        if let Some(enabled) = changes.enabled {
            rule.enabled = enabled;
        }
        if let Some(priority) = changes.priority {
            rule.priority = priority;
        }
        rule.updated_at = Utc::now();

        self.validate(access.budget_id(), &rule)?;
        self.store(&rule)?;

        self.storage.log_update(
            access.scope(),
            EntityType::Rule,
            rule.id,
            Some(rule.name.clone()),
            &before,
            &rule,
        )?;

        Ok(rule)
    }

    pub fn delete(&self, access: &BudgetAccess, id: RuleId) -> EnvelopeResult<()> {
        let rule = self.get(access, id)?;
        self.storage.rules.delete(id)?;
        self.storage.rules.save()?;

        self.storage.log_delete(
            access.scope(),
            EntityType::Rule,
            rule.id,
            Some(rule.name.clone()),
            &rule,
        )
    }

    /// Set priorities from the given order
    ///
    /// Every id must be a rule in the budget. Rules not listed keep their
    /// relative order after the listed ones.
    pub fn reorder(&self, access: &BudgetAccess, ids: &[RuleId]) -> EnvelopeResult<Vec<Rule>> {
        let rules = self.list(access)?;
        if let Some(missing) = ids.iter().find(|id| !rules.iter().any(|r| r.id == **id)) {
            return Err(EnvelopeError::not_found("Rule", missing.to_string()));
        }

        let unlisted = rules.iter().filter(|r| !ids.contains(&r.id)).map(|r| r.id);
        let order: Vec<RuleId> = ids.iter().copied().chain(unlisted).collect();

        let now = Utc::now();
        for (priority, id) in order.iter().enumerate() {
            self.storage.rules.update(*id, |rule| {
                rule.priority = priority as i32;
                rule.updated_at = now;
            })?;
        }
        self.storage.rules.save()?;

        info!(budget_id = %access.budget_id(), count = order.len(), "Rules reordered");
        self.list(access)
    }

    /// Run rules over existing transactions
    ///
    /// With a rule id only that rule runs. Returns how many transactions
    /// changed.
    pub fn apply(
        &self,
        access: &BudgetAccess,
        rule_id: Option<RuleId>,
        only_uncategorized: bool,
    ) -> EnvelopeResult<usize> {
        let budget_id = access.budget_id();
        let engine = match rule_id {
            Some(id) => {
                let rule = self.get(access, id)?;
                if !rule.enabled {
                    return Err(EnvelopeError::Conflict(format!(
                        "Rule '{}' is disabled",
                        rule.name
                    )));
                }
                RuleEngine::new(vec![rule])
            }
            None => RuleEngine::load(self.storage, budget_id)?,
        };
        if engine.is_empty() {
            return Ok(0);
        }

        let mut months: BTreeSet<Month> = BTreeSet::new();
        let mut changed = Vec::new();
        for mut txn in self.storage.transactions.for_budget(budget_id)? {
            if only_uncategorized && txn.is_categorized() {
                continue;
            }
            if engine.categorize(&mut txn) {
                months.insert(Month::of(txn.date));
                changed.push(txn);
            }
        }

        let count = changed.len();
        if count > 0 {
            self.storage.transactions.upsert_many(changed)?;
            self.storage.transactions.save()?;
            TrackingService::new(self.storage).recalculate_months(budget_id, months)?;
        }

        info!(budget_id = %budget_id, changed = count, "Rules applied");
        Ok(count)
    }

    fn validate(&self, budget_id: BudgetId, rule: &Rule) -> EnvelopeResult<()> {
        rule.validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        if self
            .storage
            .categories
            .get_in_budget(budget_id, rule.category_id)?
            .is_none()
        {
            return Err(EnvelopeError::Validation(format!(
                "Category {} does not exist in this budget",
                rule.category_id
            )));
        }
        Ok(())
    }

    fn store(&self, rule: &Rule) -> EnvelopeResult<()> {
        if self.storage.rules.insert_named(rule.clone())?.is_err() {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Rule",
                identifier: rule.name.clone(),
            });
        }
        self.storage.rules.save()
    }

    fn next_priority(&self, budget_id: BudgetId) -> EnvelopeResult<i32> {
        Ok(self
            .storage
            .rules
            .for_budget(budget_id)?
            .iter()
            .map(|r| r.priority + 1)
            .max()
            .unwrap_or(0))
    }
}
