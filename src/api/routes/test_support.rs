//! Router fixtures for handler tests

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::aggregator::{AggregatorClient, SandboxAggregator};
use crate::api::{create_router, AppState};
use crate::config::{EnvelopePaths, Settings};
use crate::crypto::{KeyDerivationParams, SecureString};
use crate::storage::Storage;

pub(crate) struct TestApp {
    _temp: TempDir,
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let paths = EnvelopePaths::at(temp.path());
        let storage = Storage::open(paths).unwrap();
        let settings = Settings {
            key_params: KeyDerivationParams::insecure_fast(),
            ..Settings::default()
        };
        let state = AppState::new(
            storage,
            settings,
            &SecureString::from("test-secret-0123456789"),
            AggregatorClient::Sandbox(SandboxAggregator::new()),
        )
        .unwrap();

        Self {
            _temp: temp,
            router: create_router(state.clone()),
            state,
        }
    }

    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> (StatusCode, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(text) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(text)
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes)
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self
            .send_raw(method, uri, token, body.map(|b| b.to_string()))
            .await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> StatusCode {
        self.send(Method::DELETE, uri, Some(token), None).await.0
    }

    /// Sign up and return the bearer token
    pub async fn signup(&self, email: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "email": email, "password": "correct horse", "name": "Test" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Create a budget and return its id
    pub async fn create_budget(&self, token: &str) -> String {
        let (status, body) = self
            .post("/api/budgets", token, json!({ "name": "Household" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Id of a seeded category by name
    pub async fn category_id(&self, token: &str, budget: &str, name: &str) -> String {
        let (_, groups) = self
            .get(&format!("/api/budgets/{}/categories", budget), token)
            .await;
        groups
            .as_array()
            .unwrap()
            .iter()
            .flat_map(|g| g["categories"].as_array().unwrap().iter())
            .find(|c| c["name"] == name)
            .map(|c| c["id"].as_str().unwrap().to_string())
            .unwrap()
    }
}
