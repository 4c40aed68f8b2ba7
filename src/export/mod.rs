//! Budget export
//!
//! - JSON: versioned snapshot of everything in a budget
//! - YAML: the same snapshot, human-readable
//! - CSV: transactions only, spreadsheet-compatible

pub mod csv;
pub mod json;
pub mod yaml;

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::Deserialize;

pub use self::csv::export_transactions_csv;
pub use json::{export_budget_json, BudgetExport, ExportMetadata, EXPORT_SCHEMA_VERSION};
pub use yaml::export_budget_yaml;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::services::BudgetAccess;
use crate::storage::Storage;

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Yaml,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Yaml => "application/yaml",
            Self::Csv => "text/csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "csv" => Ok(Self::Csv),
            other => Err(EnvelopeError::Validation(format!(
                "Unknown export format '{}': expected json, yaml or csv",
                other
            ))),
        }
    }
}

/// Export a budget in the given format
pub fn export_budget<W: Write>(
    storage: &Storage,
    access: &BudgetAccess,
    format: ExportFormat,
    writer: &mut W,
) -> EnvelopeResult<()> {
    match format {
        ExportFormat::Json => export_budget_json(storage, &access.budget, writer),
        ExportFormat::Yaml => export_budget_yaml(storage, &access.budget, writer),
        ExportFormat::Csv => export_transactions_csv(storage, access.budget_id(), writer),
    }
}
