//! YAML export
//!
//! The same snapshot as the JSON export, for people who read their backups.

use std::io::Write;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::export::json::BudgetExport;
use crate::models::Budget;
use crate::storage::Storage;

pub fn export_budget_yaml<W: Write>(storage: &Storage, budget: &Budget, writer: &mut W) -> EnvelopeResult<()> {
    let export = BudgetExport::from_storage(storage, budget)?;
    let io_err = |e: std::io::Error| EnvelopeError::Export(e.to_string());

    writeln!(writer, "# Budget export: {}", budget.name).map_err(io_err)?;
    writeln!(writer, "# Generated: {}", export.exported_at).map_err(io_err)?;
    writeln!(writer, "# Server version: {}", export.app_version).map_err(io_err)?;
    writeln!(writer).map_err(io_err)?;

    serde_yaml::to_writer(writer, &export).map_err(|e| EnvelopeError::Export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{create_manual_account, create_test_storage, setup_budget};

    #[test]
    fn test_yaml_export_parses_back() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        create_manual_account(&access, &storage, "Checking", 0);

        let mut out = Vec::new();
        export_budget_yaml(&storage, &access.budget, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# Budget export: Household"));

        let parsed: BudgetExport = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed.accounts[0].name, "Checking");
        assert!(parsed.categories.iter().any(|c| c.name == "Groceries"));
    }
}
