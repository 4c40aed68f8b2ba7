//! On-disk layout
//!
//! ```text
//! <base>/config.json        settings
//! <base>/audit.log          audit entries, one JSON object per line
//! <base>/data/<name>.json   one file per collection
//! ```
//!
//! The base directory is `--data-dir` (or `ENVELOPE_DATA_DIR`) when given,
//! else `$XDG_DATA_HOME/envelope-server`, else
//! `~/.local/share/envelope-server`.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::EnvelopeError;

pub const DATA_DIR_ENV: &str = "ENVELOPE_DATA_DIR";

const APP_DIR: &str = "envelope-server";

#[derive(Debug, Clone)]
pub struct EnvelopePaths {
    base_dir: PathBuf,
}

fn non_empty_env(name: &str) -> Option<PathBuf> {
    env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from)
}

impl EnvelopePaths {
    pub fn at(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// An explicit directory wins over the environment
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, EnvelopeError> {
        if let Some(dir) = explicit {
            return Ok(Self::at(dir));
        }
        if let Some(dir) = non_empty_env(DATA_DIR_ENV) {
            return Ok(Self::at(dir));
        }
        if let Some(xdg) = non_empty_env("XDG_DATA_HOME") {
            return Ok(Self::at(xdg.join(APP_DIR)));
        }
        non_empty_env("HOME")
            .map(|home| Self::at(home.join(".local").join("share").join(APP_DIR)))
            .ok_or_else(|| {
                EnvelopeError::Config(format!(
                    "Could not determine a data directory; pass --data-dir or set {}",
                    DATA_DIR_ENV
                ))
            })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    pub fn collection_file(&self, name: &str) -> PathBuf {
        self.data_dir().join(name).with_extension("json")
    }

    /// Create the base and data directories
    pub fn ensure_directories(&self) -> Result<(), EnvelopeError> {
        let data = self.data_dir();
        std::fs::create_dir_all(&data).map_err(|e| {
            EnvelopeError::Io(format!("Failed to create {}: {}", data.display(), e))
        })
    }

    /// True once a settings file has been written
    pub fn is_initialized(&self) -> bool {
        self.settings_file().is_file()
    }
}
