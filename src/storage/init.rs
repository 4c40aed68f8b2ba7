//! First-run setup

use crate::config::{EnvelopePaths, Settings};
use crate::error::EnvelopeError;

/// Create the directory layout and make sure `config.json` holds a
/// key-derivation salt
///
/// Safe to run repeatedly: existing settings are loaded and only a missing
/// salt is filled in.
pub fn initialize_storage(paths: &EnvelopePaths) -> Result<Settings, EnvelopeError> {
    paths.ensure_directories()?;

    let mut settings = Settings::load_or_create(paths)?;
    if settings.ensure_key_params() || !paths.is_initialized() {
        settings.save(paths)?;
    }
    Ok(settings)
}
