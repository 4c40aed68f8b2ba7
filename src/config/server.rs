//! HTTP server configuration
//!
//! `ServeArgs` is parsed by clap (every flag also reads an environment
//! variable) and converted into a validated `ServerConfig`.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::crypto::SecureString;
use crate::error::{EnvelopeError, EnvelopeResult};

/// Minimum length of the server secret
pub const MIN_SECRET_LEN: usize = 16;

/// Which banking aggregator client to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatorKind {
    /// Deterministic in-process aggregator with fake institutions
    #[default]
    Sandbox,
    /// Remote aggregator reached over HTTPS
    Http,
}

/// Command line arguments for `serve`
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to listen on for HTTP requests
    #[arg(long, env = "ENVELOPE_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: String,

    /// Base directory for settings, data files and the audit log
    #[arg(long, env = "ENVELOPE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Secret used to sign bearer tokens and encrypt aggregator tokens
    #[arg(long, env = "ENVELOPE_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Banking aggregator client
    #[arg(long, env = "ENVELOPE_AGGREGATOR", value_enum, default_value_t = AggregatorKind::Sandbox)]
    pub aggregator: AggregatorKind,

    /// Base URL of the HTTP aggregator
    #[arg(long, env = "ENVELOPE_AGGREGATOR_URL")]
    pub aggregator_url: Option<String>,

    /// Client id for the HTTP aggregator
    #[arg(long, env = "ENVELOPE_AGGREGATOR_CLIENT_ID")]
    pub aggregator_client_id: Option<String>,

    /// Client secret for the HTTP aggregator
    #[arg(long, env = "ENVELOPE_AGGREGATOR_CLIENT_SECRET", hide_env_values = true)]
    pub aggregator_client_secret: Option<String>,
}

/// Credentials for the HTTP aggregator
#[derive(Debug, Clone)]
pub struct AggregatorCredentials {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecureString,
}

/// Validated server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub data_dir: Option<PathBuf>,
    pub secret: SecureString,
    pub aggregator: AggregatorKind,
    pub aggregator_credentials: Option<AggregatorCredentials>,
}

impl TryFrom<&ServeArgs> for ServerConfig {
    type Error = EnvelopeError;

    fn try_from(args: &ServeArgs) -> EnvelopeResult<Self> {
        let listen_addr: SocketAddr = args.listen.parse().map_err(|e| {
            EnvelopeError::Config(format!("Invalid listen address '{}': {}", args.listen, e))
        })?;

        if args.secret.len() < MIN_SECRET_LEN {
            return Err(EnvelopeError::Config(format!(
                "Secret must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        let aggregator_credentials = match args.aggregator {
            AggregatorKind::Sandbox => None,
            AggregatorKind::Http => {
                let missing = |flag: &str| {
                    EnvelopeError::Config(format!("--{} is required with --aggregator http", flag))
                };
                Some(AggregatorCredentials {
                    base_url: args
                        .aggregator_url
                        .clone()
                        .ok_or_else(|| missing("aggregator-url"))?,
                    client_id: args
                        .aggregator_client_id
                        .clone()
                        .ok_or_else(|| missing("aggregator-client-id"))?,
                    client_secret: args
                        .aggregator_client_secret
                        .as_deref()
                        .map(SecureString::from)
                        .ok_or_else(|| missing("aggregator-client-secret"))?,
                })
            }
        };

        Ok(Self {
            listen_addr,
            data_dir: args.data_dir.clone(),
            secret: SecureString::from(args.secret.as_str()),
            aggregator: args.aggregator,
            aggregator_credentials,
        })
    }
}
