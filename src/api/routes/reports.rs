//! Reports, export and the activity feed

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::{ApiPath, ApiQuery, AppError, AppState, AuthUser};
use crate::audit::AuditEntry;
use crate::export::{export_budget, ExportFormat};
use crate::models::{BudgetId, Month};
use crate::reports::spending::DEFAULT_TREND_MONTHS;
use crate::reports::{recent_activity, BudgetOverview, SpendingTrend};
use crate::services::Permission;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OverviewQuery {
    month: Option<Month>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrendQuery {
    months: Option<usize>,
    end: Option<Month>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExportQuery {
    format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ActivityQuery {
    limit: Option<usize>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/budgets/:budget/reports/overview", get(overview))
        .route("/api/budgets/:budget/reports/spending-trend", get(spending_trend))
        .route("/api/budgets/:budget/export", get(export))
        .route("/api/budgets/:budget/activity", get(activity))
}

async fn overview(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiQuery(query): ApiQuery<OverviewQuery>,
) -> Result<Json<BudgetOverview>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    let month = query.month.unwrap_or_else(Month::current);
    Ok(Json(BudgetOverview::generate(&state.storage, &access, month)?))
}

async fn spending_trend(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiQuery(query): ApiQuery<TrendQuery>,
) -> Result<Json<SpendingTrend>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    let trend = SpendingTrend::generate(
        &state.storage,
        access.budget_id(),
        query.end.unwrap_or_else(Month::current),
        query.months.unwrap_or(DEFAULT_TREND_MONTHS),
    )?;
    Ok(Json(trend))
}

async fn export(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    let format = match query.format {
        Some(format) => format.parse()?,
        None => ExportFormat::default(),
    };

    let mut body = Vec::new();
    export_budget(&state.storage, &access, format, &mut body)?;

    let disposition = format!(
        "attachment; filename=\"budget-{}.{}\"",
        access.budget_id(),
        format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

async fn activity(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiQuery(query): ApiQuery<ActivityQuery>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    Ok(Json(recent_activity(&state.storage, &access, query.limit)?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::api::routes::test_support::TestApp;

    async fn seeded(app: &TestApp) -> (String, String) {
        let token = app.signup("reports@example.com").await;
        let budget = app.create_budget(&token).await;
        let groceries = app.category_id(&token, &budget, "Groceries").await;
        let (_, account) = app
            .post(
                &format!("/api/budgets/{}/accounts", budget),
                &token,
                json!({ "name": "Checking", "starting_balance": 100_000 }),
            )
            .await;
        for (date, cents) in [("2025-01-10", -3_000), ("2025-02-10", -5_000), ("2025-03-10", -7_000)] {
            app.post(
                &format!("/api/budgets/{}/transactions", budget),
                &token,
                json!({
                    "account_id": account["id"],
                    "date": date,
                    "amount": cents,
                    "payee": "Market",
                    "category_id": groceries,
                }),
            )
            .await;
        }
        (token, budget)
    }

    #[tokio::test]
    async fn test_overview_and_trend() {
        let app = TestApp::new();
        let (token, budget) = seeded(&app).await;

        let (status, overview) = app
            .get(&format!("/api/budgets/{}/reports/overview?month=2025-02", budget), &token)
            .await;
        assert_eq!(status, StatusCode::OK, "{}", overview);
        assert_eq!(overview["spending"], 5_000);
        assert_eq!(overview["net_worth"]["net_worth"], 85_000);
        assert_eq!(overview["top_categories"][0]["name"], "Groceries");

        let (status, trend) = app
            .get(
                &format!("/api/budgets/{}/reports/spending-trend?months=3&end=2025-03", budget),
                &token,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(trend["months"][0]["month"], "2025-01");
        assert_eq!(trend["total_spending"], 15_000);
        assert_eq!(trend["average_spending"], 5_000);

        let (status, _) = app
            .get(&format!("/api/budgets/{}/reports/spending-trend?months=0", budget), &token)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_formats() {
        let app = TestApp::new();
        let (token, budget) = seeded(&app).await;
        let url = format!("/api/budgets/{}/export", budget);

        let (status, json) = app.get(&url, &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["schema_version"], "2.0.0");
        assert_eq!(json["transactions"].as_array().unwrap().len(), 3);

        let (status, csv) = app
            .send_raw(Method::GET, &format!("{}?format=csv", url), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let csv = String::from_utf8(csv.to_vec()).unwrap();
        assert!(csv.starts_with("id,date,account,payee,category"));
        assert_eq!(csv.lines().count(), 4);

        let (status, yaml) = app
            .send_raw(Method::GET, &format!("{}?format=yml", url), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(yaml.to_vec()).unwrap().starts_with("# Budget export: Household"));

        let (status, body) = app.get(&format!("{}?format=xml", url), &token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_activity_feed() {
        let app = TestApp::new();
        let (token, budget) = seeded(&app).await;

        let (status, entries) = app
            .get(&format!("/api/budgets/{}/activity?limit=2", budget), &token)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entries.as_array().unwrap().len(), 2);
        assert_eq!(entries[0]["entity_type"], "transaction");

        let stranger = app.signup("stranger@example.com").await;
        let (status, _) = app
            .get(&format!("/api/budgets/{}/activity", budget), &stranger)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
