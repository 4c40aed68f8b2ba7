//! Linked institutions

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::aggregator::LinkToken;
use crate::api::{ApiJson, ApiPath, AppError, AppState, AuthUser};
use crate::models::{BudgetId, InstitutionId};
use crate::services::{InstitutionService, InstitutionView, LinkResult, Permission, SyncResult};

#[derive(Debug, Deserialize)]
struct LinkRequest {
    public_token: String,
    /// Display name chosen in the link flow
    #[serde(alias = "name")]
    institution_name: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/budgets/:budget/institutions/link-token", post(create_link_token))
        .route(
            "/api/budgets/:budget/institutions",
            get(list_institutions).post(link_institution),
        )
        .route("/api/budgets/:budget/institutions/:institution/sync", post(sync_institution))
        .route("/api/budgets/:budget/institutions/:institution", delete(remove_institution))
}

fn service(state: &AppState) -> InstitutionService<'_, crate::aggregator::AggregatorClient> {
    InstitutionService::new(&state.storage, &state.aggregator, &state.cipher)
}

async fn create_link_token(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
) -> Result<Json<LinkToken>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    Ok(Json(service(&state).create_link_token(&access).await?))
}

async fn list_institutions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
) -> Result<Json<Vec<InstitutionView>>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    Ok(Json(service(&state).list(&access)?))
}

async fn link_institution(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<LinkRequest>,
) -> Result<(StatusCode, Json<LinkResult>), AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let result = service(&state)
        .link(&access, &req.public_token, req.institution_name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn sync_institution(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, institution_id)): ApiPath<(BudgetId, InstitutionId)>,
) -> Result<Json<SyncResult>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    Ok(Json(service(&state).sync(&access, institution_id).await?))
}

async fn remove_institution(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, institution_id)): ApiPath<(BudgetId, InstitutionId)>,
) -> Result<StatusCode, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    service(&state).remove(&access, institution_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::aggregator::AggregatorClient;
    use crate::api::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_link_sync_and_remove() {
        let app = TestApp::new();
        let token = app.signup("linker@example.com").await;
        let budget = app.create_budget(&token).await;
        let base = format!("/api/budgets/{}/institutions", budget);

        let (status, body) = app.post(&format!("{}/link-token", base), &token, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["link_token"].as_str().unwrap().starts_with("link-sandbox-"));

        let (status, linked) = app
            .post(
                &base,
                &token,
                json!({ "public_token": "public-sandbox-api", "institution_name": "Platypus Bank" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", linked);
        assert_eq!(linked["institution"]["name"], "Platypus Bank");
        assert_eq!(linked["accounts"].as_array().unwrap().len(), 3);
        assert_eq!(linked["sync"]["added"], 6);
        assert!(linked["institution"].get("access_token").is_none());
        let institution = linked["institution"]["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .post(&base, &token, json!({ "public_token": "public-sandbox-api" }))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .post(&base, &token, json!({ "public_token": "not-a-sandbox-token" }))
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, sync) = app
            .post(&format!("{}/{}/sync", base, institution), &token, json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sync["added"], 0);

        let (_, list) = app.get(&base, &token).await;
        assert_eq!(list[0]["accounts"].as_array().unwrap().len(), 3);

        if let AggregatorClient::Sandbox(sandbox) = &app.state.aggregator {
            sandbox.require_login("access-sandbox-api").unwrap();
        }
        let (status, body) = app
            .post(&format!("{}/{}/sync", base, institution), &token, json!({}))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
        let (_, list) = app.get(&base, &token).await;
        assert_eq!(list[0]["status"], "login_required");

        let status = app.delete(&format!("{}/{}", base, institution), &token).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, accounts) = app.get(&format!("/api/budgets/{}/accounts", budget), &token).await;
        assert!(accounts.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_linked_records_cannot_be_deleted() {
        let app = TestApp::new();
        let token = app.signup("linked@example.com").await;
        let budget = app.create_budget(&token).await;
        let (status, linked) = app
            .post(
                &format!("/api/budgets/{}/institutions", budget),
                &token,
                json!({ "public_token": "public-sandbox-keep" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", linked);

        let account = linked["accounts"][0]["id"].as_str().unwrap().to_string();
        let status = app
            .delete(&format!("/api/budgets/{}/accounts/{}", budget, account), &token)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let txns = format!("/api/budgets/{}/transactions", budget);
        let (_, page) = app.get(&txns, &token).await;
        assert_eq!(page["transactions"][0]["source"], "linked");
        let txn = page["transactions"][0]["id"].as_str().unwrap().to_string();
        let status = app.delete(&format!("{}/{}", txns, txn), &token).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, after) = app.get(&txns, &token).await;
        assert_eq!(after["total"], page["total"]);
        let (_, accounts) = app.get(&format!("/api/budgets/{}/accounts", budget), &token).await;
        assert_eq!(accounts.as_array().unwrap().len(), 3);
    }
}
