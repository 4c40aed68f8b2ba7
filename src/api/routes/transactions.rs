//! Transactions

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::{nullable, ApiJson, ApiPath, ApiQuery, AppError, AppState, AuthUser};
use crate::models::{AccountId, BudgetId, CategoryId, Money, Month, Transaction, TransactionId};
use crate::services::{
    CreateTransactionInput, Permission, TransactionFilter, TransactionPage, TransactionService,
    TransactionUpdate,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListQuery {
    account_id: Option<AccountId>,
    category_id: Option<CategoryId>,
    uncategorized: bool,
    month: Option<Month>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    search: Option<String>,
    pending: Option<bool>,
    limit: Option<usize>,
    offset: usize,
}

impl From<ListQuery> for TransactionFilter {
    fn from(query: ListQuery) -> Self {
        Self {
            account_id: query.account_id,
            category_id: query.category_id,
            uncategorized: query.uncategorized,
            month: query.month,
            start_date: query.start_date,
            end_date: query.end_date,
            search: query.search,
            pending: query.pending,
            limit: query.limit,
            offset: query.offset,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateTransactionRequest {
    account_id: AccountId,
    date: NaiveDate,
    amount: Money,
    #[serde(default)]
    payee: String,
    description: Option<String>,
    category_id: Option<CategoryId>,
    notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateTransactionRequest {
    #[serde(deserialize_with = "nullable")]
    category_id: Option<Option<CategoryId>>,
    notes: Option<String>,
    payee: Option<String>,
    excluded: Option<bool>,
    date: Option<NaiveDate>,
    amount: Option<Money>,
}

#[derive(Debug, Deserialize)]
struct CategorizeRequest {
    transaction_ids: Vec<TransactionId>,
    /// `null` clears the category
    category_id: Option<CategoryId>,
}

#[derive(Debug, Serialize)]
struct UpdatedCount {
    updated: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/budgets/:budget/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/api/budgets/:budget/transactions/categorize",
            post(categorize_transactions),
        )
        .route(
            "/api/budgets/:budget/transactions/:transaction",
            patch(update_transaction).delete(delete_transaction),
        )
}

async fn list_transactions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<TransactionPage>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    let page = TransactionService::new(&state.storage).list(&access, &query.into())?;
    Ok(Json(page))
}

async fn create_transaction(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let input = CreateTransactionInput {
        account_id: req.account_id,
        date: req.date,
        amount: req.amount,
        payee: req.payee,
        description: req.description,
        category_id: req.category_id,
        notes: req.notes,
    };
    let txn = TransactionService::new(&state.storage).create_manual(&access, input)?;
    Ok((StatusCode::CREATED, Json(txn)))
}

async fn update_transaction(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, transaction_id)): ApiPath<(BudgetId, TransactionId)>,
    ApiJson(req): ApiJson<UpdateTransactionRequest>,
) -> Result<Json<Transaction>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let changes = TransactionUpdate {
        category_id: req.category_id,
        notes: req.notes,
        payee: req.payee,
        excluded: req.excluded,
        date: req.date,
        amount: req.amount,
    };
    let txn = TransactionService::new(&state.storage).update(&access, transaction_id, changes)?;
    Ok(Json(txn))
}

async fn delete_transaction(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, transaction_id)): ApiPath<(BudgetId, TransactionId)>,
) -> Result<StatusCode, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    TransactionService::new(&state.storage).delete(&access, transaction_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn categorize_transactions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<CategorizeRequest>,
) -> Result<Json<UpdatedCount>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let updated = TransactionService::new(&state.storage).bulk_categorize(
        &access,
        &req.transaction_ids,
        req.category_id,
    )?;
    Ok(Json(UpdatedCount { updated }))
}
