//! Command line interface
//!
//! `serve` runs the HTTP server; `init`, `config` and `audit` are
//! administrative commands that work on the data directory directly.

pub mod admin;
pub mod serve;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub use admin::{handle_audit, handle_config, handle_init};
pub use serve::handle_serve;

use crate::config::ServeArgs;
use crate::error::EnvelopeResult;

#[derive(Parser)]
#[command(
    name = "envelope-server",
    version,
    about = "Multi-user budgeting server",
    long_about = "Envelope Server hosts shared budgets over a JSON HTTP API: linked bank \
                  accounts, rules-based categorization, spending targets and goals."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Create the data directory and settings file
    Init(DataDirArgs),

    /// Show paths and settings
    Config(DataDirArgs),

    /// Show recent audit log entries
    Audit {
        #[command(flatten)]
        dir: DataDirArgs,

        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

/// Data directory override shared by the administrative commands
#[derive(Debug, Clone, Args)]
pub struct DataDirArgs {
    /// Base directory for settings, data files and the audit log
    #[arg(long, env = "ENVELOPE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Run a parsed command line
pub async fn run(cli: Cli) -> EnvelopeResult<()> {
    match cli.command {
        Commands::Serve(args) => handle_serve(args).await,
        Commands::Init(dir) => handle_init(dir.data_dir.as_deref()),
        Commands::Config(dir) => handle_config(dir.data_dir.as_deref()),
        Commands::Audit { dir, limit } => handle_audit(dir.data_dir.as_deref(), limit),
    }
}
