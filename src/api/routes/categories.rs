//! Category groups and categories

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::{ApiJson, ApiPath, ApiQuery, AppError, AppState, AuthUser};
use crate::models::{BudgetId, Category, CategoryGroup, CategoryGroupId, CategoryId};
use crate::services::{CategoryGroupWithCategories, CategoryService, CategoryUpdate, Permission};

#[derive(Debug, Deserialize)]
struct GroupRequest {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeleteGroupQuery {
    /// Also delete the group's categories
    force: bool,
}

#[derive(Debug, Deserialize)]
struct ReorderGroupsRequest {
    group_ids: Vec<CategoryGroupId>,
}

#[derive(Debug, Deserialize)]
struct CreateCategoryRequest {
    group_id: CategoryGroupId,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateCategoryRequest {
    name: Option<String>,
    group_id: Option<CategoryGroupId>,
    hidden: Option<bool>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/budgets/:budget/categories", get(list_categories).post(create_category))
        .route(
            "/api/budgets/:budget/categories/:category",
            patch(update_category).delete(delete_category),
        )
        .route("/api/budgets/:budget/category-groups", post(create_group))
        .route("/api/budgets/:budget/category-groups/reorder", post(reorder_groups))
        .route(
            "/api/budgets/:budget/category-groups/:group",
            patch(rename_group).delete(delete_group),
        )
}

async fn list_categories(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
) -> Result<Json<Vec<CategoryGroupWithCategories>>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Read)?;
    Ok(Json(CategoryService::new(&state.storage).list(&access)?))
}

async fn create_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<GroupRequest>,
) -> Result<(StatusCode, Json<CategoryGroup>), AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let group = CategoryService::new(&state.storage).create_group(&access, &req.name)?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn rename_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, group_id)): ApiPath<(BudgetId, CategoryGroupId)>,
    ApiJson(req): ApiJson<GroupRequest>,
) -> Result<Json<CategoryGroup>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let group = CategoryService::new(&state.storage).rename_group(&access, group_id, &req.name)?;
    Ok(Json(group))
}

async fn reorder_groups(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<ReorderGroupsRequest>,
) -> Result<Json<Vec<CategoryGroup>>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let groups = CategoryService::new(&state.storage).reorder_groups(&access, &req.group_ids)?;
    Ok(Json(groups))
}

async fn delete_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, group_id)): ApiPath<(BudgetId, CategoryGroupId)>,
    ApiQuery(query): ApiQuery<DeleteGroupQuery>,
) -> Result<StatusCode, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    CategoryService::new(&state.storage).delete_group(&access, group_id, query.force)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_category(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(budget_id): ApiPath<BudgetId>,
    ApiJson(req): ApiJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let category =
        CategoryService::new(&state.storage).create_category(&access, req.group_id, &req.name)?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, category_id)): ApiPath<(BudgetId, CategoryId)>,
    ApiJson(req): ApiJson<UpdateCategoryRequest>,
) -> Result<Json<Category>, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    let changes = CategoryUpdate {
        name: req.name,
        group_id: req.group_id,
        hidden: req.hidden,
    };
    let category =
        CategoryService::new(&state.storage).update_category(&access, category_id, changes)?;
    Ok(Json(category))
}

async fn delete_category(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((budget_id, category_id)): ApiPath<(BudgetId, CategoryId)>,
) -> Result<StatusCode, AppError> {
    let access = state.authorize(user, budget_id, Permission::Write)?;
    CategoryService::new(&state.storage).delete_category(&access, category_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_seeded_tree() {
        let app = TestApp::new();
        let token = app.signup("cats@example.com").await;
        let budget = app.create_budget(&token).await;

        let (status, groups) = app.get(&format!("/api/budgets/{}/categories", budget), &token).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = groups
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Income", "Bills", "Needs", "Wants", "Savings"]);
        assert_eq!(groups[0]["system"], true);
        assert_eq!(groups[0]["categories"][0]["name"], "Income");
    }

    #[tokio::test]
    async fn test_group_and_category_lifecycle() {
        let app = TestApp::new();
        let token = app.signup("cats@example.com").await;
        let budget = app.create_budget(&token).await;
        let groups = format!("/api/budgets/{}/category-groups", budget);
        let categories = format!("/api/budgets/{}/categories", budget);

        let (status, group) = app.post(&groups, &token, json!({ "name": "Travel" })).await;
        assert_eq!(status, StatusCode::CREATED);
        let group_id = group["id"].as_str().unwrap().to_string();

        let (status, _) = app.post(&groups, &token, json!({ "name": "travel" })).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, renamed) = app
            .patch(&format!("{}/{}", groups, group_id), &token, json!({ "name": "Trips" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["name"], "Trips");

        let (status, flights) = app
            .post(&categories, &token, json!({ "group_id": group_id, "name": "Flights" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, hidden) = app
            .patch(
                &format!("{}/{}", categories, flights["id"].as_str().unwrap()),
                &token,
                json!({ "hidden": true }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hidden["hidden"], true);

        let (status, ordered) = app
            .post(&format!("{}/reorder", groups), &token, json!({ "group_ids": [group_id] }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ordered[0]["name"], "Trips");

        let status = app.delete(&format!("{}/{}", groups, group_id), &token).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let status = app.delete(&format!("{}/{}?force=true", groups, group_id), &token).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, income) = app.get(&categories, &token).await;
        let income_group = income[0]["id"].as_str().unwrap();
        let status = app.delete(&format!("{}/{}", groups, income_group), &token).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
