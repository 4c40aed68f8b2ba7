//! Banking aggregator clients
//!
//! The server talks to the aggregator through the [`Aggregator`] trait. Two
//! clients exist: [`HttpAggregator`] for a Plaid-style JSON API and
//! [`SandboxAggregator`], an in-process fake with deterministic data used in
//! development and tests.

mod http;
mod sandbox;

pub use http::HttpAggregator;
pub use sandbox::SandboxAggregator;

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::config::{AggregatorKind, ServerConfig};
use crate::crypto::SecureString;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{AccountType, Money};

/// Error code the aggregator returns when the user must re-authenticate
pub const LOGIN_REQUIRED_CODE: &str = "ITEM_LOGIN_REQUIRED";

/// Errors from the aggregator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregatorError {
    /// The linked item needs the user to log in at their bank again
    #[error("Institution login required")]
    LoginRequired,

    /// The aggregator rejected the request
    #[error("{code}: {message}")]
    Api { code: String, message: String },

    /// The aggregator could not be reached or replied with garbage
    #[error("{0}")]
    Transport(String),
}

impl AggregatorError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        if code == LOGIN_REQUIRED_CODE {
            return Self::LoginRequired;
        }
        Self::Api {
            code,
            message: message.into(),
        }
    }
}

impl From<AggregatorError> for EnvelopeError {
    fn from(err: AggregatorError) -> Self {
        match err {
            AggregatorError::LoginRequired => EnvelopeError::Conflict(
                "Institution requires the user to log in again before syncing".into(),
            ),
            other => EnvelopeError::Aggregator(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for AggregatorError {
    fn from(err: reqwest::Error) -> Self {
        AggregatorError::Transport(err.to_string())
    }
}

/// A short-lived token the client uses to open the aggregator's link flow
#[derive(Debug, Clone, Serialize)]
pub struct LinkToken {
    pub link_token: String,
    pub expiration: DateTime<Utc>,
}

/// Result of exchanging a public token
#[derive(Debug, Clone)]
pub struct TokenExchange {
    pub access_token: SecureString,
    pub item_id: String,
}

/// An account as reported by the aggregator
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorAccount {
    pub account_id: String,
    pub name: String,
    pub mask: Option<String>,
    pub account_type: AccountType,
    /// Balance in our sign convention (debts negative)
    pub current_balance: Option<Money>,
}

/// A transaction as reported by the aggregator, in our sign convention
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorTransaction {
    pub transaction_id: String,
    pub account_id: String,
    pub date: NaiveDate,
    /// Positive for inflows, negative for outflows
    pub amount: Money,
    pub name: String,
    pub merchant_name: Option<String>,
    pub pending: bool,
    /// Category suggested by the aggregator, if any
    pub category: Option<String>,
}

/// One page of incremental transaction changes
#[derive(Debug, Clone, Default)]
pub struct SyncPage {
    pub added: Vec<AggregatorTransaction>,
    pub modified: Vec<AggregatorTransaction>,
    pub removed: Vec<String>,
    pub next_cursor: String,
    pub has_more: bool,
}

/// Operations the server needs from a banking aggregator
pub trait Aggregator: Send + Sync {
    fn create_link_token(
        &self,
        client_user_id: &str,
    ) -> impl Future<Output = Result<LinkToken, AggregatorError>> + Send;

    fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> impl Future<Output = Result<TokenExchange, AggregatorError>> + Send;

    fn get_accounts(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<Vec<AggregatorAccount>, AggregatorError>> + Send;

    /// Fetch changes since `cursor` (from the beginning when `None`)
    fn sync_transactions(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<SyncPage, AggregatorError>> + Send;
}

/// The aggregator selected at startup
#[derive(Debug, Clone)]
pub enum AggregatorClient {
    Sandbox(SandboxAggregator),
    Http(HttpAggregator),
}

impl AggregatorClient {
    /// Build the client named by the server configuration
    pub fn from_config(config: &ServerConfig) -> EnvelopeResult<Self> {
        match config.aggregator {
            AggregatorKind::Sandbox => Ok(Self::Sandbox(SandboxAggregator::new())),
            AggregatorKind::Http => {
                let credentials = config.aggregator_credentials.clone().ok_or_else(|| {
                    EnvelopeError::Config(
                        "The http aggregator requires --aggregator-url, --aggregator-client-id and --aggregator-client-secret".into(),
                    )
                })?;
                Ok(Self::Http(HttpAggregator::new(credentials)?))
            }
        }
    }

    pub fn kind(&self) -> AggregatorKind {
        match self {
            Self::Sandbox(_) => AggregatorKind::Sandbox,
            Self::Http(_) => AggregatorKind::Http,
        }
    }
}

impl Aggregator for AggregatorClient {
    async fn create_link_token(&self, client_user_id: &str) -> Result<LinkToken, AggregatorError> {
        match self {
            Self::Sandbox(c) => c.create_link_token(client_user_id).await,
            Self::Http(c) => c.create_link_token(client_user_id).await,
        }
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<TokenExchange, AggregatorError> {
        match self {
            Self::Sandbox(c) => c.exchange_public_token(public_token).await,
            Self::Http(c) => c.exchange_public_token(public_token).await,
        }
    }

    async fn get_accounts(&self, access_token: &str) -> Result<Vec<AggregatorAccount>, AggregatorError> {
        match self {
            Self::Sandbox(c) => c.get_accounts(access_token).await,
            Self::Http(c) => c.get_accounts(access_token).await,
        }
    }

    async fn sync_transactions(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> Result<SyncPage, AggregatorError> {
        match self {
            Self::Sandbox(c) => c.sync_transactions(access_token, cursor).await,
            Self::Http(c) => c.sync_transactions(access_token, cursor).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_required_code_is_recognized() {
        assert_eq!(
            AggregatorError::api(LOGIN_REQUIRED_CODE, "log in"),
            AggregatorError::LoginRequired
        );
        assert!(matches!(
            AggregatorError::api("RATE_LIMIT_EXCEEDED", "slow down"),
            AggregatorError::Api { .. }
        ));
    }

    #[test]
    fn test_error_status_mapping() {
        let conflict: EnvelopeError = AggregatorError::LoginRequired.into();
        assert_eq!(conflict.status_code(), 409);

        let upstream: EnvelopeError = AggregatorError::Transport("timeout".into()).into();
        assert_eq!(upstream.status_code(), 502);
    }
}
