//! CSV export of a budget's transactions, with names resolved

use std::io::Write;

use serde::Serialize;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{BudgetId, TransactionSource};
use crate::services::transaction::NameIndex;
use crate::storage::Storage;

#[derive(Serialize)]
struct CsvRow<'a> {
    id: String,
    date: String,
    account: &'a str,
    payee: &'a str,
    category: &'a str,
    group: &'a str,
    amount: String,
    description: &'a str,
    notes: &'a str,
    pending: bool,
    excluded: bool,
    source: TransactionSource,
}

/// Write every transaction in the budget, oldest first
pub fn export_transactions_csv<W: Write>(storage: &Storage, budget_id: BudgetId, writer: W) -> EnvelopeResult<()> {
    let names = NameIndex::load(storage, budget_id)?;
    let mut transactions = storage.transactions.for_budget(budget_id)?;
    transactions.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));

    let mut csv_writer = csv::Writer::from_writer(writer);
    for txn in transactions {
        let view = names.view(txn);
        let txn = &view.transaction;
        csv_writer
            .serialize(CsvRow {
                id: txn.id.as_uuid().to_string(),
                date: txn.date.to_string(),
                account: &view.account_name,
                payee: &txn.payee,
                category: view.category_name.as_deref().unwrap_or_default(),
                group: view.group_name.as_deref().unwrap_or_default(),
                amount: txn.amount.format_with_symbol(""),
                description: &txn.description,
                notes: &txn.notes,
                pending: txn.pending,
                excluded: txn.excluded,
                source: txn.source,
            })
            .map_err(|e| EnvelopeError::Export(e.to_string()))?;
    }
    csv_writer
        .flush()
        .map_err(|e| EnvelopeError::Export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Money, Transaction};
    use crate::services::test_support::{create_manual_account, create_test_storage, date, setup_budget};

    #[test]
    fn test_csv_resolves_names_and_quotes() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let account = create_manual_account(&access, &storage, "Checking", 0);
        let groceries = storage
            .categories
            .find_by_name(access.budget_id(), "Groceries")
            .unwrap()
            .unwrap();

        let mut txn = Transaction::new(access.budget_id(), account.id, date(2025, 2, 3), Money::from_cents(-1_234));
        txn.payee = "Smith, Jones & Co".into();
        txn.category_id = Some(groceries.id);
        storage.transactions.upsert(txn).unwrap();

        let mut out = Vec::new();
        export_transactions_csv(&storage, access.budget_id(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "id,date,account,payee,category,group,amount,description,notes,pending,excluded,source"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("2025-02-03,Checking,\"Smith, Jones & Co\",Groceries,Needs,-12.34"));
        assert!(row.ends_with("false,false,manual"));
        assert!(lines.next().is_none());
    }
}
