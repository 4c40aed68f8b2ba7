//! Signup, login and the current user

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::{ApiJson, AppError, AppState, AuthUser};
use crate::models::UserProfile;
use crate::services::UserService;

#[derive(Debug, Deserialize)]
struct SignupRequest {
    email: String,
    password: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user: UserProfile,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/me", get(me))
}

async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = UserService::new(&state.storage).signup(&req.email, &req.password, &req.name)?;
    let token = state.tokens.issue(user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.profile(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = UserService::new(&state.storage).login(&req.email, &req.password)?;
    let token = state.tokens.issue(user.id)?;
    Ok(Json(AuthResponse {
        token,
        user: user.profile(),
    }))
}

async fn me(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> Result<Json<UserProfile>, AppError> {
    let user = UserService::new(&state.storage).get(user_id)?;
    Ok(Json(user.profile()))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::api::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_signup_login_me() {
        let app = TestApp::new();
        let token = app.signup("Ada@Example.com").await;

        let (status, me) = app.get("/api/me", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "ada@example.com");
        assert!(me.get("password_hash").is_none());

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": "correct horse" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": "wrong password" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], true);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_signup_errors() {
        let app = TestApp::new();
        app.signup("dup@example.com").await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "email": "DUP@example.com", "password": "long enough" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "DUPLICATE");

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "email": "short@example.com", "password": "short" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send_raw(Method::POST, "/api/auth/signup", None, Some("{not json".into()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let app = TestApp::new();
        let (status, _) = app.send(Method::GET, "/api/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.get("/api/me", "garbage").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
