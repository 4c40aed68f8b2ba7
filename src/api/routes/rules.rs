//! Auto-categorization rules

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::{nullable, ApiJson, ApiPath, AppError, AppState, AuthUser};
use crate::models::{BudgetId, CategoryId, Rule, RuleCondition, RuleId};
use crate::services::{Permission, RuleInput, RuleService, RuleUpdate};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct CreateRuleRequest {
    name: String,
    conditions: Vec<RuleCondition>,
    #[serde(default = "default_true")]
    match_all: bool,
    category_id: CategoryId,
    rename_payee: Option<String>,
    #[serde(default = "default_true")]
    enabled: bool,
    /// Appended after existing rules when absent
    priority: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateRuleRequest {
    name: Option<String>,
    conditions: Option<Vec<RuleCondition>>,
    match_all: Option<bool>,
    category_id: Option<CategoryId>,
    #[serde(deserialize_with = "nullable")]
    rename_payee: Option<Option<String>>,
    enabled: Option<bool>,
    priority: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ReorderRulesRequest {
    rule_ids: Vec<RuleId>,
}

#[derive(Debug, Deserialize)]
struct ApplyRulesRequest {
    rule_id: Option<RuleId>,
    #[serde(default = "default_true")]
    only_uncategorized: bool,
}

#[derive(Debug, Serialize)]
struct UpdatedCount {
    updated: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/budgets/:budget/rules", get(list_rules).post(create_rule))
        .route("/api/budgets/:budget/rules/reorder", post(reorder_rules))
        .route("/api/budgets/:budget/rules/apply", post(apply_rules))
        .route(
            "/api/budgets/:budget/rules/:rule",
            patch(update_rule).delete(delete_rule),
        )
}

async fn list_rules(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
) -> Result<Json<Vec<Rule>>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    Ok(Json(RuleService::new(&state.storage).list(&access)?))
}

async fn create_rule(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<CreateRuleRequest>,
) -> Result<(StatusCode, Json<Rule>), AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let input = RuleInput {
        name: req.name,
        conditions: req.conditions,
        match_all: req.match_all,
        category_id: req.category_id,
        rename_payee: req.rename_payee,
        enabled: req.enabled,
        priority: req.priority,
    };
    let rule = RuleService::new(&state.storage).create(&access, input)?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_rule(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, rule_id)): ApiPath<(BudgetId, RuleId)>,
    ApiJson(req): ApiJson<UpdateRuleRequest>,
) -> Result<Json<Rule>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let changes = RuleUpdate {
        name: req.name,
        conditions: req.conditions,
        match_all: req.match_all,
        category_id: req.category_id,
        rename_payee: req.rename_payee,
        enabled: req.enabled,
        priority: req.priority,
    };
    let rule = RuleService::new(&state.storage).update(&access, rule_id, changes)?;
    Ok(Json(rule))
}

async fn delete_rule(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, rule_id)): ApiPath<(BudgetId, RuleId)>,
) -> Result<StatusCode, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    RuleService::new(&state.storage).delete(&access, rule_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_rules(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<ReorderRulesRequest>,
) -> Result<Json<Vec<Rule>>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    Ok(Json(RuleService::new(&state.storage).reorder(&access, &req.rule_ids)?))
}

async fn apply_rules(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<ApplyRulesRequest>,
) -> Result<Json<UpdatedCount>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let updated =
        RuleService::new(&state.storage).apply(&access, req.rule_id, req.only_uncategorized)?;
    Ok(Json(UpdatedCount { updated }))
}
