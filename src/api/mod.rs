//! HTTP API
//!
//! JSON over HTTP with bearer-token auth. Every budget route resolves the
//! caller's membership first; non-members see 404.

pub mod error;
pub mod extract;
pub mod routes;

pub use error::{AppError, ErrorResponse};
pub use extract::{nullable, ApiJson, ApiPath, ApiQuery, AuthUser};

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::aggregator::AggregatorClient;
use crate::auth::TokenIssuer;
use crate::config::Settings;
use crate::crypto::{SecureString, TokenCipher};
use crate::error::EnvelopeResult;
use crate::models::{BudgetId, UserId};
use crate::services::{authorize, BudgetAccess, Permission};
use crate::storage::Storage;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub settings: Arc<Settings>,
    pub tokens: TokenIssuer,
    pub cipher: TokenCipher,
    pub aggregator: AggregatorClient,
}

impl AppState {
    /// Build the state; key derivation for the token cipher runs here
    pub fn new(
        storage: Storage,
        settings: Settings,
        secret: &SecureString,
        aggregator: AggregatorClient,
    ) -> EnvelopeResult<Self> {
        let cipher = TokenCipher::from_secret(secret.as_str(), &settings.key_params)?;
        let tokens = TokenIssuer::new(secret.as_str().as_bytes(), settings.token_ttl_hours);

        Ok(Self {
            storage: Arc::new(storage),
            settings: Arc::new(settings),
            tokens,
            cipher,
            aggregator,
        })
    }

    /// Resolve the caller's access to a budget
    pub fn authorize(&self, user: UserId, budget_id: BudgetId, permission: Permission) -> EnvelopeResult<BudgetAccess> {
        authorize(&self.storage, user, budget_id, permission)
    }
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::auth::routes())
        .merge(routes::onboarding::routes())
        .merge(routes::budgets::routes())
        .merge(routes::institutions::routes())
        .merge(routes::accounts::routes())
        .merge(routes::transactions::routes())
        .merge(routes::categories::routes())
        .merge(routes::rules::routes())
        .merge(routes::goals::routes())
        .merge(routes::tracking::routes())
        .merge(routes::reports::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
