//! Configuration module
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Persisted server settings
//! - Command line / environment configuration for the HTTP server

pub mod paths;
pub mod server;
pub mod settings;

pub use paths::EnvelopePaths;
pub use server::{AggregatorCredentials, AggregatorKind, ServeArgs, ServerConfig};
pub use settings::Settings;
