//! CSV import into manual accounts
//!
//! A [`ColumnMapping`] says which columns hold the date, amount, payee and
//! memo. When the caller sends none, one is guessed from the first row: a
//! header row is matched by keyword, and a headerless bank export of
//! `date, description, debit, credit, ...` is recognised by its shape.
//!
//! Rows that fail to parse are reported by row number and skipped; the rest
//! of the file still imports. Rows whose import id already exists on the
//! account are counted as duplicates.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use csv::{Reader, ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::EntityType;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{AccountId, Money, Month, Transaction, TransactionSource};
use crate::services::access::BudgetAccess;
use crate::services::{RuleEngine, TrackingService};
use crate::storage::Storage;

/// Formats tried, in order, after the mapping's own format
const FALLBACK_DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d/%m/%Y", "%d/%m/%y", "%Y/%m/%d", "%m-%d-%Y", "%d-%m-%Y",
];

/// Where a row's amount comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountColumns {
    /// One signed column; negative is money out
    Signed { column: usize },
    /// Unsigned outflow and inflow columns, one of them filled per row
    Split { outflow: usize, inflow: usize },
}

/// Column layout of an import file
///
/// Every field has a default, so a request can send only what differs:
/// `{"amount": {"outflow": 2, "inflow": 3}, "date_format": "%d/%m/%Y"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub date: usize,
    pub amount: AmountColumns,
    pub payee: Option<usize>,
    /// Stored as the transaction description
    pub memo: Option<usize>,
    /// chrono format tried before the fallbacks
    pub date_format: String,
    pub has_header: bool,
    pub delimiter: char,
    /// For banks that export spending as positive numbers
    pub invert_amounts: bool,
}

impl Default for ColumnMapping {
    /// `date, amount, payee` with a header row
    fn default() -> Self {
        Self {
            date: 0,
            amount: AmountColumns::Signed { column: 1 },
            payee: Some(2),
            memo: None,
            date_format: "%Y-%m-%d".to_string(),
            has_header: true,
            delimiter: ',',
            invert_amounts: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderRole {
    Date,
    Amount,
    Outflow,
    Inflow,
    Payee,
    Description,
    Memo,
}

/// First matching entry wins, so "Posted Date" is a date, not a memo
const HEADER_KEYWORDS: [(HeaderRole, &[&str]); 7] = [
    (HeaderRole::Date, &["date", "posted"]),
    (HeaderRole::Amount, &["amount"]),
    (HeaderRole::Outflow, &["debit", "outflow", "withdrawal"]),
    (HeaderRole::Inflow, &["credit", "inflow", "deposit"]),
    (HeaderRole::Payee, &["payee", "merchant", "name"]),
    (HeaderRole::Description, &["description"]),
    (HeaderRole::Memo, &["memo", "note"]),
];

fn header_role(header: &str) -> Option<HeaderRole> {
    let header = header.trim().to_lowercase();
    HEADER_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| header.contains(w)))
        .map(|(role, _)| *role)
}

fn field<'r>(record: &'r StringRecord, column: usize) -> &'r str {
    record.get(column).unwrap_or("")
}

impl ColumnMapping {
    /// Guess the layout from the first row of the file
    pub fn detect(first_row: &StringRecord) -> EnvelopeResult<Self> {
        if let Some(mapping) = Self::detect_headerless(first_row) {
            return Ok(mapping);
        }

        let columns: Vec<(usize, HeaderRole)> = first_row
            .iter()
            .enumerate()
            .filter_map(|(i, h)| header_role(h).map(|role| (i, role)))
            .collect();
        let first = |role| columns.iter().find(|(_, r)| *r == role).map(|(i, _)| *i);

        let amount = match (first(HeaderRole::Outflow), first(HeaderRole::Inflow), first(HeaderRole::Amount)) {
            (Some(outflow), Some(inflow), _) => AmountColumns::Split { outflow, inflow },
            (_, _, Some(column)) => AmountColumns::Signed { column },
            _ => {
                return Err(EnvelopeError::Import(
                    "Could not find an amount column or debit/credit columns in the header".into(),
                ))
            }
        };

        // A description column is the payee unless a payee column exists,
        // in which case it becomes the memo
        let description = first(HeaderRole::Description);
        let (payee, memo) = match first(HeaderRole::Payee) {
            Some(payee) => (Some(payee), first(HeaderRole::Memo).or(description)),
            None => (description, first(HeaderRole::Memo)),
        };

        Ok(Self {
            date: first(HeaderRole::Date).unwrap_or(0),
            amount,
            payee,
            memo,
            ..Self::default()
        })
    }

    /// `date, description, debit, credit[, balance]` with no header row
    fn detect_headerless(first_row: &StringRecord) -> Option<Self> {
        let numeric_or_blank = |s: &str| s.is_empty() || parse_amount(s).is_ok();
        let matches = first_row.len() >= 4
            && parse_date(field(first_row, 0), "%Y-%m-%d").is_ok()
            && numeric_or_blank(field(first_row, 2))
            && numeric_or_blank(field(first_row, 3));

        matches.then(|| Self {
            date: 0,
            amount: AmountColumns::Split { outflow: 2, inflow: 3 },
            payee: Some(1),
            memo: None,
            has_header: false,
            ..Self::default()
        })
    }

    fn reader<'d>(&self, data: &'d str) -> EnvelopeResult<Reader<&'d [u8]>> {
        let delimiter = u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| EnvelopeError::Import(format!("Unsupported delimiter '{}'", self.delimiter)))?;

        Ok(ReaderBuilder::new()
            .has_headers(self.has_header)
            .delimiter(delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(data.as_bytes()))
    }

    fn amount_of(&self, record: &StringRecord) -> Result<Money, String> {
        let amount = match self.amount {
            AmountColumns::Signed { column } => match field(record, column) {
                "" => return Err("Missing amount".into()),
                value => parse_amount(value)?,
            },
            AmountColumns::Split { outflow, inflow } => {
                match (field(record, outflow), field(record, inflow)) {
                    ("", "") => return Err("Row has neither an inflow nor an outflow".into()),
                    (out, "") => -parse_amount(out)?.abs(),
                    ("", inc) => parse_amount(inc)?.abs(),
                    (out, inc) => parse_amount(inc)?.abs() - parse_amount(out)?.abs(),
                }
            }
        };
        Ok(if self.invert_amounts { -amount } else { amount })
    }

    fn read_row(&self, record: &StringRecord) -> Result<ImportRow, String> {
        let date = match field(record, self.date) {
            "" => return Err("Missing date".into()),
            value => parse_date(value, &self.date_format)?,
        };
        let amount = self.amount_of(record)?;
        let text = |column: Option<usize>| column.map(|c| field(record, c).to_string()).unwrap_or_default();

        Ok(ImportRow {
            date,
            amount,
            payee: text(self.payee),
            memo: text(self.memo),
        })
    }
}

/// One parsed data row
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub date: NaiveDate,
    pub amount: Money,
    pub payee: String,
    pub memo: String,
}

impl ImportRow {
    /// Import id of the `occurrence`-th identical row in one file (1-based)
    ///
    /// The first occurrence keeps the plain key, so ids stored by earlier
    /// imports still match.
    pub fn import_id(&self, occurrence: usize) -> String {
        let key = Transaction::generate_import_id(self.date, self.amount, &self.payee);
        if occurrence <= 1 {
            key
        } else {
            format!("{}#{}", key, occurrence)
        }
    }
}

fn parse_date(value: &str, preferred: &str) -> Result<NaiveDate, String> {
    std::iter::once(preferred)
        .chain(FALLBACK_DATE_FORMATS)
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .ok_or_else(|| format!("Could not parse date '{}'", value))
}

/// Accepts currency symbols, thousands separators and `(12.50)` negatives
fn parse_amount(value: &str) -> Result<Money, String> {
    let trimmed = value.trim();
    let (negative, body) = match trimmed.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };
    let digits: String = body
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();

    Money::parse(&digits)
        .map(|m| if negative { -m.abs() } else { m })
        .map_err(|_| format!("Could not parse amount '{}'", value))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    pub imported: usize,
    pub duplicates_skipped: usize,
    pub errors: usize,
    /// Keyed by data row number, counting from 1 after any header
    pub error_messages: BTreeMap<usize, String>,
}

impl ImportResult {
    fn reject(&mut self, row: usize, message: String) {
        self.errors += 1;
        self.error_messages.insert(row, message);
    }
}

pub struct ImportService<'a> {
    storage: &'a Storage,
}

impl<'a> ImportService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Parse every data row, keeping per-row failures
    pub fn parse(
        &self,
        data: &str,
        mapping: &ColumnMapping,
    ) -> EnvelopeResult<Vec<(usize, Result<ImportRow, String>)>> {
        let mut reader = mapping.reader(data)?;
        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let parsed = match record {
                Ok(record) if record.iter().all(str::is_empty) => continue,
                Ok(record) => mapping.read_row(&record),
                Err(e) => Err(format!("Unreadable CSV record: {}", e)),
            };
            rows.push((index + 1, parsed));
        }
        Ok(rows)
    }

    /// Guess a mapping from the first row of `data`
    pub fn detect_mapping(&self, data: &str) -> EnvelopeResult<ColumnMapping> {
        let first = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(data.as_bytes())
            .records()
            .next()
            .ok_or_else(|| EnvelopeError::Import("CSV data is empty".into()))?
            .map_err(|e| EnvelopeError::Import(format!("Unreadable first CSV row: {}", e)))?;
        ColumnMapping::detect(&first)
    }

    pub fn import_csv(
        &self,
        access: &BudgetAccess,
        account_id: AccountId,
        data: &str,
        mapping: Option<ColumnMapping>,
    ) -> EnvelopeResult<ImportResult> {
        let budget_id = access.budget_id();
        let account = self
            .storage
            .accounts
            .get_in_budget(budget_id, account_id)?
            .ok_or_else(|| EnvelopeError::not_found("Account", account_id.to_string()))?;
        if account.is_linked() {
            return Err(EnvelopeError::Conflict(
                "CSV import is only available for manual accounts".into(),
            ));
        }

        let mapping = match mapping {
            Some(mapping) => mapping,
            None => self.detect_mapping(data)?,
        };
        let rows = self.parse(data, &mapping)?;

        let existing: HashSet<String> = self
            .storage
            .transactions
            .get_by_account(account.id)?
            .into_iter()
            .filter_map(|t| t.import_id)
            .collect();
        let rules = RuleEngine::load(self.storage, budget_id)?;

        let mut result = ImportResult::default();
        let mut created = Vec::new();
        let mut months = BTreeSet::new();
        let mut occurrences: HashMap<String, usize> = HashMap::new();

        for (row_number, row) in rows {
            let row = match row {
                Ok(row) => row,
                Err(message) => {
                    result.reject(row_number, message);
                    continue;
                }
            };

            let occurrence = occurrences.entry(row.import_id(1)).or_default();
            *occurrence += 1;
            let import_id = row.import_id(*occurrence);
            if existing.contains(&import_id) {
                result.duplicates_skipped += 1;
                continue;
            }

            let mut txn = Transaction::new(budget_id, account.id, row.date, row.amount);
            txn.payee = row.payee;
            txn.description = row.memo;
            txn.source = TransactionSource::Csv;
            txn.import_id = Some(import_id);
            rules.categorize(&mut txn);

            if let Err(e) = txn.validate() {
                result.reject(row_number, e.to_string());
                continue;
            }

            months.insert(Month::of(txn.date));
            created.push(txn);
        }

        result.imported = created.len();
        for txn in &created {
            self.storage.log_create(
                access.scope(),
                EntityType::Transaction,
                txn.id,
                Some(txn.payee.clone()),
                txn,
            )?;
        }
        self.storage.transactions.upsert_many(created)?;
        self.storage.transactions.save()?;

        info!(
            account_id = %account.id,
            imported = result.imported,
            duplicates = result.duplicates_skipped,
            errors = result.errors,
            "CSV imported"
        );

        TrackingService::new(self.storage).recalculate_months(budget_id, months)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountType, CategorySource, InstitutionId, RuleCondition, RuleField, RuleOperator};
    use crate::services::test_support::{create_manual_account, create_test_storage, date, setup_budget};
    use crate::services::{RuleInput, RuleService};

    fn first_row(line: &str) -> StringRecord {
        ReaderBuilder::new()
            .has_headers(false)
            .from_reader(line.as_bytes())
            .records()
            .next()
            .unwrap()
            .unwrap()
    }

    fn amounts(rows: &[(usize, Result<ImportRow, String>)]) -> Vec<i64> {
        rows.iter().map(|(_, r)| r.as_ref().unwrap().amount.cents()).collect()
    }

    #[test]
    fn test_default_layout() {
        let (_temp, storage) = create_test_storage();
        let rows = ImportService::new(&storage)
            .parse(
                "Date,Amount,Payee\n2025-01-15,-50.00,Corner Store\n\n2025-01-16,\"1,200.00\",Paycheck",
                &ColumnMapping::default(),
            )
            .unwrap();

        assert_eq!(amounts(&rows), vec![-5_000, 120_000]);
        let (number, first) = &rows[0];
        assert_eq!(*number, 1);
        assert_eq!(first.as_ref().unwrap().date, date(2025, 1, 15));
        assert_eq!(first.as_ref().unwrap().payee, "Corner Store");
    }

    #[test]
    fn test_split_columns_formats_and_inversion() {
        let (_temp, storage) = create_test_storage();
        let service = ImportService::new(&storage);

        let split = ColumnMapping {
            amount: AmountColumns::Split { outflow: 1, inflow: 2 },
            payee: Some(3),
            ..ColumnMapping::default()
        };
        let rows = service
            .parse("Date,Out,In,Payee\n2025-01-15,50.00,,Grocer\n2025-01-16,,$100.00,Pay\n2025-01-17,,,Empty", &split)
            .unwrap();
        assert_eq!(amounts(&rows[..2]), vec![-5_000, 10_000]);
        assert!(rows[2].1.as_ref().unwrap_err().contains("neither"));

        let semicolons = ColumnMapping {
            date_format: "%d/%m/%Y".into(),
            delimiter: ';',
            has_header: false,
            ..ColumnMapping::default()
        };
        let rows = service.parse("15/01/2025;(50.00);Cafe", &semicolons).unwrap();
        assert_eq!(rows[0].1.as_ref().unwrap().date, date(2025, 1, 15));
        assert_eq!(amounts(&rows), vec![-5_000]);

        let inverted = ColumnMapping {
            invert_amounts: true,
            has_header: false,
            ..ColumnMapping::default()
        };
        let rows = service.parse("2025-01-15,12.50,Card", &inverted).unwrap();
        assert_eq!(amounts(&rows), vec![-1_250]);
    }

    #[test]
    fn test_detect_from_header() {
        let mapping = ColumnMapping::detect(&first_row("Transaction Date,Debit,Credit,Description,Notes")).unwrap();
        assert_eq!(mapping.date, 0);
        assert_eq!(mapping.amount, AmountColumns::Split { outflow: 1, inflow: 2 });
        assert_eq!(mapping.payee, Some(3));
        assert_eq!(mapping.memo, Some(4));

        let mapping = ColumnMapping::detect(&first_row("Description,Posted,Payee,Amount")).unwrap();
        assert_eq!(mapping.date, 1);
        assert_eq!(mapping.amount, AmountColumns::Signed { column: 3 });
        assert_eq!((mapping.payee, mapping.memo), (Some(2), Some(0)));

        assert!(ColumnMapping::detect(&first_row("Date,Payee,Notes")).is_err());
    }

    #[test]
    fn test_detect_headerless_export() {
        let (_temp, storage) = create_test_storage();
        let mapping = ImportService::new(&storage)
            .detect_mapping("2025-01-02,COFFEE,4.50,,995.50")
            .unwrap();
        assert!(!mapping.has_header);
        assert_eq!(mapping.amount, AmountColumns::Split { outflow: 2, inflow: 3 });
        assert_eq!(mapping.payee, Some(1));
    }

    #[test]
    fn test_import_counts_duplicates_and_errors() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let account = create_manual_account(&access, &storage, "Checking", 0);
        let service = ImportService::new(&storage);

        let csv = "Date,Amount,Payee\n2025-01-15,-50.00,Store 1\nnot-a-date,-1.00,Bad\n2025-01-16,-25.00,Store 2\n2025-01-16,-25.00,store 2";
        let result = service.import_csv(&access, account.id, csv, None).unwrap();
        assert_eq!(result.imported, 3);
        assert_eq!(result.duplicates_skipped, 0);
        assert_eq!(result.errors, 1);
        assert!(result.error_messages[&2].contains("not-a-date"));

        let again = service.import_csv(&access, account.id, csv, None).unwrap();
        assert_eq!(again.imported, 0);
        assert_eq!(again.duplicates_skipped, 3);

        let txns = storage.transactions.get_by_account(account.id).unwrap();
        assert_eq!(txns.len(), 3);
        assert!(txns.iter().all(|t| t.source == TransactionSource::Csv));
        assert!(storage
            .summaries
            .exists((access.budget_id(), Month::new(2025, 1).unwrap()))
            .unwrap());
    }

    #[test]
    fn test_identical_rows_in_one_file_are_kept() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let account = create_manual_account(&access, &storage, "Checking", 0);
        let service = ImportService::new(&storage);

        let first = "Date,Amount,Payee\n2025-02-03,-4.50,Cafe\n2025-02-03,-4.50,Cafe";
        let result = service.import_csv(&access, account.id, first, None).unwrap();
        assert_eq!(result.imported, 2);
        assert_eq!(result.duplicates_skipped, 0);

        // A later export overlapping the first one adds only the third coffee
        let overlap = format!("{}\n2025-02-03,-4.50,Cafe", first);
        let result = service.import_csv(&access, account.id, &overlap, None).unwrap();
        assert_eq!(result.imported, 1);
        assert_eq!(result.duplicates_skipped, 2);

        let txns = storage.transactions.get_by_account(account.id).unwrap();
        assert_eq!(txns.len(), 3);
        assert_eq!(txns.iter().map(|t| t.amount.cents()).sum::<i64>(), -1_350);
    }

    #[test]
    fn test_import_applies_rules() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let account = create_manual_account(&access, &storage, "Checking", 0);
        let groceries = storage
            .categories
            .find_by_name(access.budget_id(), "Groceries")
            .unwrap()
            .unwrap();
        RuleService::new(&storage)
            .create(
                &access,
                RuleInput {
                    name: "Grocer".into(),
                    conditions: vec![RuleCondition::new(RuleField::Payee, RuleOperator::StartsWith, "fresh")],
                    match_all: true,
                    category_id: groceries.id,
                    rename_payee: None,
                    enabled: true,
                    priority: None,
                },
            )
            .unwrap();

        ImportService::new(&storage)
            .import_csv(&access, account.id, "Date,Amount,Payee\n2025-02-01,-80.00,Fresh Foods", None)
            .unwrap();

        let txn = &storage.transactions.get_by_account(account.id).unwrap()[0];
        assert_eq!(txn.category_id, Some(groceries.id));
        assert_eq!(txn.category_source, CategorySource::Rule);
    }

    #[test]
    fn test_linked_accounts_refuse_import() {
        let (_temp, storage) = create_test_storage();
        let access = setup_budget(&storage);
        let linked = Account::linked(access.budget_id(), InstitutionId::new(), "ext", "Bank", AccountType::Checking);
        storage.accounts.upsert(linked.clone()).unwrap();

        let err = ImportService::new(&storage)
            .import_csv(&access, linked.id, "Date,Amount\n2025-01-01,1.00", None)
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_mapping_json_defaults() {
        let mapping: ColumnMapping =
            serde_json::from_str(r#"{"amount": {"outflow": 3, "inflow": 4}, "delimiter": "\t"}"#).unwrap();
        assert_eq!(mapping.amount, AmountColumns::Split { outflow: 3, inflow: 4 });
        assert_eq!(mapping.delimiter, '\t');
        assert!(mapping.has_header);
        assert_eq!(mapping.date_format, "%Y-%m-%d");
    }
}
