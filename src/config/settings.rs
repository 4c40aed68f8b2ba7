//! Persisted server settings (`config.json`)
//!
//! Every field has a default, so older or hand-trimmed files still load.

use serde::{Deserialize, Serialize};

use super::paths::EnvelopePaths;
use crate::crypto::KeyDerivationParams;
use crate::error::EnvelopeError;
use crate::storage::file_io::{read_json, write_json_atomic};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub schema_version: u32,
    /// Currency for budgets created without one
    pub default_currency: String,
    /// Lifetime of issued bearer tokens
    pub token_ttl_hours: u32,
    /// Salt and costs for the aggregator token key
    pub key_params: KeyDerivationParams,
    /// Seed new budgets with the starter category groups
    pub seed_default_categories: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            default_currency: "USD".to_string(),
            token_ttl_hours: 24 * 7,
            key_params: KeyDerivationParams::default(),
            seed_default_categories: true,
        }
    }
}

impl Settings {
    /// Read `config.json`; defaults when it does not exist yet
    pub fn load_or_create(paths: &EnvelopePaths) -> Result<Self, EnvelopeError> {
        read_json(paths.settings_file()).map_err(|e| {
            EnvelopeError::Config(format!("Unreadable settings file: {}", e))
        })
    }

    pub fn save(&self, paths: &EnvelopePaths) -> Result<(), EnvelopeError> {
        write_json_atomic(paths.settings_file(), self)
    }

    /// Generate a key-derivation salt if none exists; true when one was added
    pub fn ensure_key_params(&mut self) -> bool {
        if self.key_params.is_initialized() {
            return false;
        }
        self.key_params = KeyDerivationParams::new();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings: Settings = serde_json::from_str(r#"{"default_currency":"CAD"}"#).unwrap();
        assert_eq!(settings.default_currency, "CAD");
        assert_eq!(settings.schema_version, 1);
        assert_eq!(settings.token_ttl_hours, 168);
        assert!(settings.seed_default_categories);
        assert!(!settings.key_params.is_initialized());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let paths = EnvelopePaths::at(temp.path());

        let mut settings = Settings::load_or_create(&paths).unwrap();
        settings.default_currency = "EUR".into();
        assert!(settings.ensure_key_params());
        assert!(!settings.ensure_key_params());
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.default_currency, "EUR");
        assert_eq!(loaded.key_params, settings.key_params);
    }

    #[test]
    fn test_corrupt_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let paths = EnvelopePaths::at(temp.path());
        std::fs::write(paths.settings_file(), "[").unwrap();

        let err = Settings::load_or_create(&paths).unwrap_err();
        assert!(matches!(err, EnvelopeError::Config(_)));
    }
}
