//! Spending targets and monthly tracking

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::{ApiJson, ApiPath, AppError, AppState, AuthUser};
use crate::models::{BudgetId, CategoryId, Money, Month, MonthSummary, SpendingTarget, TargetCadence};
use crate::services::{Permission, TrackingService};

#[derive(Debug, Deserialize)]
struct SetTargetRequest {
    amount: Money,
    #[serde(default)]
    cadence: TargetCadence,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/budgets/:budget/targets", get(list_targets))
        .route(
            "/api/budgets/:budget/targets/:category",
            put(set_target).delete(delete_target),
        )
        .route("/api/budgets/:budget/tracking/:month", get(month_summary))
        .route("/api/budgets/:budget/tracking/:month/recalculate", post(recalculate))
}

async fn list_targets(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
) -> Result<Json<Vec<SpendingTarget>>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    Ok(Json(TrackingService::new(&state.storage).list_targets(&access)?))
}

/// 201 when the category had no target, 200 when one was replaced
async fn set_target(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, category_id)): ApiPath<(BudgetId, CategoryId)>,
    ApiJson(req): ApiJson<SetTargetRequest>,
) -> Result<(StatusCode, Json<SpendingTarget>), AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let (target, created) = TrackingService::new(&state.storage).set_target(
        &access,
        category_id,
        req.amount,
        req.cadence,
    )?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(target)))
}

async fn delete_target(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, category_id)): ApiPath<(BudgetId, CategoryId)>,
) -> Result<StatusCode, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    TrackingService::new(&state.storage).delete_target(&access, category_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn month_summary(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, month)): ApiPath<(BudgetId, Month)>,
) -> Result<Json<MonthSummary>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    let summary = TrackingService::new(&state.storage).month_summary(access.budget_id(), month)?;
    Ok(Json(summary))
}

async fn recalculate(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, month)): ApiPath<(BudgetId, Month)>,
) -> Result<Json<MonthSummary>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let summary = TrackingService::new(&state.storage).recalculate(access.budget_id(), month)?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_targets_drive_tracking() {
        let app = TestApp::new();
        let token = app.signup("tracking@example.com").await;
        let budget = app.create_budget(&token).await;
        let groceries = app.category_id(&token, &budget, "Groceries").await;
        let target_url = format!("/api/budgets/{}/targets/{}", budget, groceries);

        let (status, target) = app.put(&target_url, &token, json!({ "amount": 40_000 })).await;
        assert_eq!(status, StatusCode::CREATED, "{}", target);
        assert_eq!(target["cadence"]["type"], "monthly");

        let (status, _) = app
            .put(&target_url, &token, json!({ "amount": 50_000, "cadence": { "type": "monthly" } }))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, targets) = app.get(&format!("/api/budgets/{}/targets", budget), &token).await;
        assert_eq!(targets.as_array().unwrap().len(), 1);
        assert_eq!(targets[0]["amount"], 50_000);

        let (_, account) = app
            .post(&format!("/api/budgets/{}/accounts", budget), &token, json!({ "name": "Checking" }))
            .await;
        app.post(
            &format!("/api/budgets/{}/transactions", budget),
            &token,
            json!({
                "account_id": account["id"],
                "date": "2025-06-07",
                "amount": -12_500,
                "payee": "Market",
                "category_id": groceries,
            }),
        )
        .await;

        let (status, summary) = app
            .get(&format!("/api/budgets/{}/tracking/2025-06", budget), &token)
            .await;
        assert_eq!(status, StatusCode::OK, "{}", summary);
        assert_eq!(summary["month"], "2025-06");
        assert_eq!(summary["total_target"], 50_000);
        assert_eq!(summary["total_spent"], 12_500);

        let (status, fresh) = app
            .post(&format!("/api/budgets/{}/tracking/2025-06/recalculate", budget), &token, json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fresh["total_spent"], 12_500);

        let (status, _) = app
            .get(&format!("/api/budgets/{}/tracking/2025-13", budget), &token)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(app.delete(&target_url, &token).await, StatusCode::NO_CONTENT);
        assert_eq!(app.delete(&target_url, &token).await, StatusCode::NOT_FOUND);
    }
}
