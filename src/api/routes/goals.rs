//! Savings and debt goals

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::{nullable, ApiJson, ApiPath, ApiQuery, AppError, AppState, AuthUser};
use crate::models::{AccountId, BudgetId, GoalId, GoalKind, Money};
use crate::services::{GoalInput, GoalService, GoalUpdate, GoalView, Permission};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListQuery {
    include_archived: bool,
}

#[derive(Debug, Deserialize)]
struct CreateGoalRequest {
    name: String,
    kind: GoalKind,
    account_id: AccountId,
    target_amount: Money,
    target_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateGoalRequest {
    name: Option<String>,
    target_amount: Option<Money>,
    #[serde(deserialize_with = "nullable")]
    target_date: Option<Option<NaiveDate>>,
    archived: Option<bool>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/budgets/:budget/goals", get(list_goals).post(create_goal))
        .route(
            "/api/budgets/:budget/goals/:goal",
            get(get_goal).patch(update_goal).delete(delete_goal),
        )
}

async fn list_goals(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<GoalView>>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    Ok(Json(GoalService::new(&state.storage).list(&access, query.include_archived)?))
}

async fn create_goal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<CreateGoalRequest>,
) -> Result<(StatusCode, Json<GoalView>), AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let input = GoalInput {
        name: req.name,
        kind: req.kind,
        account_id: req.account_id,
        target_amount: req.target_amount,
        target_date: req.target_date,
    };
    let goal = GoalService::new(&state.storage).create(&access, input)?;
    Ok((StatusCode::CREATED, Json(goal)))
}

async fn get_goal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, goal_id)): ApiPath<(BudgetId, GoalId)>,
) -> Result<Json<GoalView>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    Ok(Json(GoalService::new(&state.storage).get(&access, goal_id)?))
}

async fn update_goal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, goal_id)): ApiPath<(BudgetId, GoalId)>,
    ApiJson(req): ApiJson<UpdateGoalRequest>,
) -> Result<Json<GoalView>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let changes = GoalUpdate {
        name: req.name,
        target_amount: req.target_amount,
        target_date: req.target_date,
        archived: req.archived,
    };
    Ok(Json(GoalService::new(&state.storage).update(&access, goal_id, changes)?))
}

async fn delete_goal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, goal_id)): ApiPath<(BudgetId, GoalId)>,
) -> Result<StatusCode, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    GoalService::new(&state.storage).delete(&access, goal_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};

    use crate::api::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_goal_lifecycle() {
        let app = TestApp::new();
        let token = app.signup("goals@example.com").await;
        let budget = app.create_budget(&token).await;
        let base = format!("/api/budgets/{}/goals", budget);
        let (_, account) = app
            .post(
                &format!("/api/budgets/{}/accounts", budget),
                &token,
                json!({ "name": "Savings", "account_type": "savings", "starting_balance": 20_000 }),
            )
            .await;

        let next_year = (Utc::now().date_naive() + Duration::days(365)).to_string();
        let (status, goal) = app
            .post(
                &base,
                &token,
                json!({
                    "name": "Emergency",
                    "kind": "savings",
                    "account_id": account["id"],
                    "target_amount": 100_000,
                    "target_date": next_year,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", goal);
        assert_eq!(goal["account_name"], "Savings");
        assert_eq!(goal["progress"]["completed"], false);
        let url = format!("{}/{}", base, goal["id"].as_str().unwrap());

        let (status, _) = app
            .post(
                &base,
                &token,
                json!({ "name": "Payoff", "kind": "debt", "account_id": account["id"], "target_amount": 100 }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, fetched) = app.get(&url, &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["name"], "Emergency");

        let (status, updated) = app.patch(&url, &token, json!({ "target_date": null })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["target_date"], Value::Null);
        assert_eq!(updated["target_amount"], 100_000);

        app.patch(&url, &token, json!({ "archived": true })).await;
        let (_, active) = app.get(&base, &token).await;
        assert!(active.as_array().unwrap().is_empty());
        let (_, all) = app.get(&format!("{}?include_archived=true", base), &token).await;
        assert_eq!(all.as_array().unwrap().len(), 1);

        assert_eq!(app.delete(&url, &token).await, StatusCode::NO_CONTENT);
        let (status, _) = app.get(&url, &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
