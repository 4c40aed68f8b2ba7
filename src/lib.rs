//! Envelope Server - multi-user zero-based budgeting over HTTP
//!
//! Users share budgets, link bank accounts through an aggregator, categorize
//! transactions with rules and track spending against monthly targets.
//!
//! # Architecture
//!
//! - `config`: paths, persisted settings and server flags
//! - `error`: error type shared by every layer
//! - `models`: budgets, accounts, transactions, categories and friends
//! - `storage`: JSON file collections with cascade deletes
//! - `audit`: append-only audit log
//! - `auth`, `crypto`: bearer tokens, password hashing, token encryption
//! - `aggregator`: banking aggregator clients (sandbox and HTTP)
//! - `services`: business logic, one service per entity
//! - `reports`, `export`: read-only views of a budget
//! - `api`: the axum router
//! - `cli`: command line entry points

pub mod aggregator;
pub mod api;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod export;
pub mod models;
pub mod reports;
pub mod services;
pub mod storage;

pub use error::{EnvelopeError, EnvelopeResult};
