//! Onboarding progress for the current user

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::{ApiJson, AppError, AppState, AuthUser};
use crate::models::{BudgetId, OnboardingState};
use crate::services::OnboardingService;

#[derive(Debug, Default, Deserialize)]
struct AdvanceRequest {
    #[serde(default)]
    budget_id: Option<BudgetId>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/onboarding", get(get_state))
        .route("/api/onboarding/advance", post(advance))
        .route("/api/onboarding/back", post(back))
        .route("/api/onboarding/skip", post(skip))
        .route("/api/onboarding/reset", post(reset))
}

async fn get_state(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<OnboardingState>, AppError> {
    Ok(Json(OnboardingService::new(&state.storage).get(user)?))
}

async fn advance(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<AdvanceRequest>,
) -> Result<Json<OnboardingState>, AppError> {
    Ok(Json(OnboardingService::new(&state.storage).advance(user, req.budget_id)?))
}

async fn back(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<OnboardingState>, AppError> {
    Ok(Json(OnboardingService::new(&state.storage).back(user)?))
}

async fn skip(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<OnboardingState>, AppError> {
    Ok(Json(OnboardingService::new(&state.storage).skip(user)?))
}

async fn reset(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<OnboardingState>, AppError> {
    Ok(Json(OnboardingService::new(&state.storage).reset(user)?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::api::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_onboarding_flow() {
        let app = TestApp::new();
        let token = app.signup("new@example.com").await;

        let (status, body) = app.get("/api/onboarding", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "welcome");

        let (status, _) = app.send(Method::POST, "/api/onboarding/back", Some(&token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = app.post("/api/onboarding/advance", &token, json!({})).await;
        assert_eq!(body["step"], "create_budget");

        // Leaving the budget step without a budget is refused like any other transition
        let (status, body) = app.post("/api/onboarding/advance", &token, json!({})).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let budget = app.create_budget(&token).await;
        let (status, body) = app
            .post("/api/onboarding/advance", &token, json!({ "budget_id": budget }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "link_accounts");

        let (_, body) = app.send(Method::POST, "/api/onboarding/skip", Some(&token), None).await;
        assert_eq!(body["step"], "choose_categories");

        let (_, body) = app.send(Method::POST, "/api/onboarding/reset", Some(&token), None).await;
        assert_eq!(body["step"], "welcome");
    }
}
