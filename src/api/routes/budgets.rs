//! Budgets and membership

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::{ApiJson, ApiPath, AppError, AppState, AuthUser};
use crate::models::{Budget, BudgetId, BudgetMember, MemberRole, UserId};
use crate::services::budget::{BudgetSummary, MemberView};
use crate::services::{BudgetService, Permission};

#[derive(Debug, Deserialize)]
struct CreateBudgetRequest {
    name: String,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateBudgetRequest {
    name: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddMemberRequest {
    email: String,
    role: MemberRole,
}

#[derive(Debug, Deserialize)]
struct UpdateMemberRequest {
    role: MemberRole,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/budgets", get(list_budgets).post(create_budget))
        .route(
            "/api/budgets/:budget",
            get(get_budget).patch(update_budget).delete(delete_budget),
        )
        .route("/api/budgets/:budget/members", get(list_members).post(add_member))
        .route(
            "/api/budgets/:budget/members/:user",
            patch(update_member).delete(remove_member),
        )
}

async fn list_budgets(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<BudgetSummary>>, AppError> {
    Ok(Json(BudgetService::new(&state.storage).list_for_user(user)?))
}

async fn create_budget(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateBudgetRequest>,
) -> Result<(StatusCode, Json<Budget>), AppError> {
    let budget = BudgetService::new(&state.storage).create(user, &req.name, req.currency.as_deref(), &state.settings)?;
    Ok((StatusCode::CREATED, Json(budget)))
}

async fn get_budget(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
) -> Result<Json<BudgetSummary>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    Ok(Json(BudgetSummary {
        budget: access.budget,
        role: access.role,
    }))
}

async fn update_budget(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<UpdateBudgetRequest>,
) -> Result<Json<Budget>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Manage)?;
    let budget = BudgetService::new(&state.storage).update(&access, req.name.as_deref(), req.currency.as_deref())?;
    Ok(Json(budget))
}

async fn delete_budget(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
) -> Result<StatusCode, AppError> {
    let access = state.authorize(user, budget_id, Permission::Manage)?;
    BudgetService::new(&state.storage).delete(&access)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
) -> Result<Json<Vec<MemberView>>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    Ok(Json(BudgetService::new(&state.storage).list_members(&access)?))
}

async fn add_member(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<AddMemberRequest>,
) -> Result<(StatusCode, Json<BudgetMember>), AppError> {
    let access = state.authorize(user, budget_id, Permission::Manage)?;
    let member = BudgetService::new(&state.storage).add_member(&access, &req.email, req.role)?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn update_member(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, member_id)): ApiPath<(BudgetId, UserId)>,
    ApiJson(req): ApiJson<UpdateMemberRequest>,
) -> Result<Json<BudgetMember>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Manage)?;
    let member = BudgetService::new(&state.storage).update_member_role(&access, member_id, req.role)?;
    Ok(Json(member))
}

/// Owners remove anyone; other members may only leave
async fn remove_member(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, member_id)): ApiPath<(BudgetId, UserId)>,
) -> Result<StatusCode, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    BudgetService::new(&state.storage).remove_member(&access, member_id)?;
    Ok(StatusCode::NO_CONTENT)
}
