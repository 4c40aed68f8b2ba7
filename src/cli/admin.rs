//! Administrative commands

use std::path::Path;

use crate::audit::AuditLogger;
use crate::config::{EnvelopePaths, Settings};
use crate::error::EnvelopeResult;
use crate::storage::initialize_storage;

/// Create directories and the settings file
pub fn handle_init(data_dir: Option<&Path>) -> EnvelopeResult<()> {
    let paths = EnvelopePaths::resolve(data_dir)?;
    let fresh = !paths.is_initialized();
    let settings = initialize_storage(&paths)?;

    if fresh {
        println!("Initialized envelope server at: {}", paths.base_dir().display());
    } else {
        println!("Already initialized at: {}", paths.base_dir().display());
    }
    println!("Settings file: {}", paths.settings_file().display());
    println!("Default currency: {}", settings.default_currency);
    println!();
    println!("Start the server with 'envelope-server serve --secret <SECRET>'.");
    Ok(())
}

/// Print paths and settings
pub fn handle_config(data_dir: Option<&Path>) -> EnvelopeResult<()> {
    let paths = EnvelopePaths::resolve(data_dir)?;
    let settings = Settings::load_or_create(&paths)?;

    println!("Envelope Server Configuration");
    println!("=============================");
    println!("Base directory: {}", paths.base_dir().display());
    println!("Data directory: {}", paths.data_dir().display());
    println!("Settings file:  {}", paths.settings_file().display());
    println!("Audit log:      {}", paths.audit_log().display());
    println!("Initialized:    {}", paths.is_initialized());
    println!();
    println!("Settings:");
    println!("  Default currency:   {}", settings.default_currency);
    println!("  Token lifetime:     {} hours", settings.token_ttl_hours);
    println!("  Seed categories:    {}", settings.seed_default_categories);
    println!("  Encryption salt:    {}", if settings.key_params.is_initialized() { "set" } else { "not set" });
    Ok(())
}

/// Print the most recent audit entries, newest first
pub fn handle_audit(data_dir: Option<&Path>, limit: usize) -> EnvelopeResult<()> {
    let paths = EnvelopePaths::resolve(data_dir)?;
    let entries = AuditLogger::new(paths.audit_log()).read_recent(limit)?;
    if entries.is_empty() {
        println!("No audit entries.");
        return Ok(());
    }

    for entry in entries.into_iter().rev() {
        println!("{}", entry);
        if let Some(diff) = &entry.diff_summary {
            println!("    {}", diff);
        }
    }
    Ok(())
}
