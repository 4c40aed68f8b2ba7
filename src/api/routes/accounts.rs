//! Accounts and CSV import

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::{ApiJson, ApiPath, ApiQuery, AppError, AppState, AuthUser};
use crate::models::{Account, AccountId, AccountType, BudgetId, Money};
use crate::services::{
    AccountService, AccountSummary, AccountUpdate, ColumnMapping, ImportResult, ImportService,
    Permission,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListQuery {
    include_archived: bool,
}

#[derive(Debug, Deserialize)]
struct CreateAccountRequest {
    name: String,
    #[serde(default)]
    account_type: AccountType,
    #[serde(default = "Money::zero")]
    starting_balance: Money,
    #[serde(default = "default_on_budget")]
    on_budget: bool,
}

fn default_on_budget() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateAccountRequest {
    name: Option<String>,
    on_budget: Option<bool>,
    hidden: Option<bool>,
    archived: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ImportRequest {
    csv: String,
    /// Detected from the first row when absent
    mapping: Option<ColumnMapping>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/budgets/:budget/accounts",
            get(list_accounts).post(create_account),
        )
        .route(
            "/api/budgets/:budget/accounts/:account",
            patch(update_account).delete(delete_account),
        )
        .route("/api/budgets/:budget/accounts/:account/import", post(import_csv))
}

async fn list_accounts(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<AccountSummary>>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    let accounts = AccountService::new(&state.storage).list(&access, query.include_archived)?;
    Ok(Json(accounts))
}

async fn create_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let account = AccountService::new(&state.storage).create_manual(
        &access,
        &req.name,
        req.account_type,
        req.starting_balance,
        req.on_budget,
    )?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn update_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, account_id)): ApiPath<(BudgetId, AccountId)>,
    ApiJson(req): ApiJson<UpdateAccountRequest>,
) -> Result<Json<Account>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let changes = AccountUpdate {
        name: req.name,
        on_budget: req.on_budget,
        hidden: req.hidden,
        archived: req.archived,
    };
    let account = AccountService::new(&state.storage).update(&access, account_id, changes)?;
    Ok(Json(account))
}

async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, account_id)): ApiPath<(BudgetId, AccountId)>,
) -> Result<StatusCode, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    AccountService::new(&state.storage).delete(&access, account_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn import_csv(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, account_id)): ApiPath<(BudgetId, AccountId)>,
    ApiJson(req): ApiJson<ImportRequest>,
) -> Result<Json<ImportResult>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let result =
        ImportService::new(&state.storage).import_csv(&access, account_id, &req.csv, req.mapping)?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_account_crud() {
        let app = TestApp::new();
        let token = app.signup("accounts@example.com").await;
        let budget = app.create_budget(&token).await;
        let base = format!("/api/budgets/{}/accounts", budget);

        let (status, account) = app
            .post(
                &base,
                &token,
                json!({ "name": "Wallet", "account_type": "cash", "starting_balance": 4_000 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", account);
        assert_eq!(account["on_budget"], true);
        let id = account["id"].as_str().unwrap().to_string();

        let (status, _) = app.post(&base, &token, json!({ "name": " wallet " })).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app.post(&base, &token, json!({ "name": "   " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, updated) = app
            .patch(&format!("{}/{}", base, id), &token, json!({ "archived": true }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["archived"], true);

        let (_, list) = app.get(&base, &token).await;
        assert!(list.as_array().unwrap().is_empty());
        let (_, list) = app.get(&format!("{}?include_archived=true", base), &token).await;
        assert_eq!(list[0]["balance"], 4_000);

        let status = app.delete(&format!("{}/{}", base, id), &token).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let status = app.delete(&format!("{}/{}", base, id), &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_csv_import() {
        let app = TestApp::new();
        let token = app.signup("import@example.com").await;
        let budget = app.create_budget(&token).await;
        let base = format!("/api/budgets/{}/accounts", budget);
        let (_, account) = app.post(&base, &token, json!({ "name": "Checking" })).await;
        let import = format!("{}/{}/import", base, account["id"].as_str().unwrap());

        let csv = "Date,Amount,Description\n2025-01-15,-50.00,Grocery Store\n2025-01-16,1000.00,Paycheck\n";
        let (status, result) = app.post(&import, &token, json!({ "csv": csv })).await;
        assert_eq!(status, StatusCode::OK, "{}", result);
        assert_eq!(result["imported"], 2);

        let (_, again) = app.post(&import, &token, json!({ "csv": csv })).await;
        assert_eq!(again["imported"], 0);
        assert_eq!(again["duplicates_skipped"], 2);

        let (_, list) = app.get(&base, &token).await;
        assert_eq!(list[0]["balance"], 95_000);
        assert_eq!(list[0]["transaction_count"], 2);
    }
}
