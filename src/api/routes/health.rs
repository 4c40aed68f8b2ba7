//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::AppState;
use crate::config::AggregatorKind;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    aggregator: AggregatorKind,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        aggregator: state.aggregator.kind(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::api::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["aggregator"], "sandbox");
    }
}
