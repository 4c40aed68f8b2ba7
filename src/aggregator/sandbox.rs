//! Deterministic in-process aggregator
//!
//! Every linked item gets the same three accounts and a short history of
//! transactions in the current month. Changes are kept as an event log per
//! item and the sync cursor is an index into that log, so repeated syncs
//! behave like the real incremental API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDate, Utc};

use crate::models::{AccountType, Money, Month};

use super::{
    Aggregator, AggregatorAccount, AggregatorError, AggregatorTransaction, LinkToken, SyncPage,
    TokenExchange,
};

/// Public tokens must carry this prefix
pub const PUBLIC_TOKEN_PREFIX: &str = "public-sandbox-";

const PAGE_SIZE: usize = 4;

#[derive(Debug, Clone)]
enum SyncEvent {
    Added(AggregatorTransaction),
    Modified(AggregatorTransaction),
    Removed(String),
}

#[derive(Debug)]
struct SandboxItem {
    login_required: bool,
    events: Vec<SyncEvent>,
}

/// Fake aggregator for development and tests
#[derive(Debug, Clone, Default)]
pub struct SandboxAggregator {
    items: Arc<Mutex<HashMap<String, SandboxItem>>>,
}

fn account_external_id(item_suffix: &str, kind: &str) -> String {
    format!("sbx-{}-{}", item_suffix, kind)
}

fn day_in_month(month: Month, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(month.year(), month.month(), day).unwrap_or_else(|| month.end_date())
}

fn seed_transactions(item_suffix: &str) -> Vec<AggregatorTransaction> {
    let month = Month::current();
    let checking = account_external_id(item_suffix, "checking");
    let credit = account_external_id(item_suffix, "credit");

    let rows: [(&str, &String, u32, i64, &str, Option<&str>, Option<&str>); 6] = [
        ("payroll", &checking, 1, 250_000, "ACME CORP PAYROLL", Some("Acme Corp"), Some("Income")),
        ("rent", &checking, 1, -140_000, "Sunset Apartments", None, Some("Rent/Mortgage")),
        ("grocer", &checking, 3, -8_642, "FRESH MARKET #22", Some("Fresh Market"), Some("Groceries")),
        ("power", &checking, 5, -6_120, "CITY POWER & LIGHT", None, Some("Utilities")),
        ("coffee", &credit, 2, -475, "BLUE BOTTLE", Some("Blue Bottle Coffee"), None),
        ("stream", &credit, 4, -1_599, "STREAMFLIX.COM", Some("Streamflix"), Some("Subscriptions")),
    ];

    rows.iter()
        .map(|(key, account, day, cents, name, merchant, category)| AggregatorTransaction {
            transaction_id: format!("sbx-{}-{}", item_suffix, key),
            account_id: (*account).clone(),
            date: day_in_month(month, *day),
            amount: Money::from_cents(*cents),
            name: name.to_string(),
            merchant_name: merchant.map(str::to_string),
            pending: false,
            category: category.map(str::to_string),
        })
        .collect()
}

impl SandboxAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SandboxItem>>, AggregatorError> {
        self.items
            .lock()
            .map_err(|e| AggregatorError::Transport(format!("Sandbox state unavailable: {}", e)))
    }

    fn item_suffix(access_token: &str) -> Option<&str> {
        access_token.strip_prefix("access-sandbox-")
    }

    fn with_item<T>(
        &self,
        access_token: &str,
        f: impl FnOnce(&mut SandboxItem) -> T,
    ) -> Result<T, AggregatorError> {
        let mut items = self.lock()?;
        let item = items
            .get_mut(access_token)
            .ok_or_else(|| AggregatorError::api("INVALID_ACCESS_TOKEN", "unknown access token"))?;
        Ok(f(item))
    }

    /// Simulate the bank revising a transaction
    pub fn modify_transaction(
        &self,
        access_token: &str,
        transaction: AggregatorTransaction,
    ) -> Result<(), AggregatorError> {
        self.with_item(access_token, |item| item.events.push(SyncEvent::Modified(transaction)))
    }

    /// Simulate a new transaction posting
    pub fn add_transaction(
        &self,
        access_token: &str,
        transaction: AggregatorTransaction,
    ) -> Result<(), AggregatorError> {
        self.with_item(access_token, |item| item.events.push(SyncEvent::Added(transaction)))
    }

    /// Simulate the bank dropping a transaction
    pub fn remove_transaction(&self, access_token: &str, transaction_id: &str) -> Result<(), AggregatorError> {
        self.with_item(access_token, |item| {
            item.events.push(SyncEvent::Removed(transaction_id.to_string()))
        })
    }

    /// Simulate the item's credentials expiring
    pub fn require_login(&self, access_token: &str) -> Result<(), AggregatorError> {
        self.with_item(access_token, |item| item.login_required = true)
    }
}

impl Aggregator for SandboxAggregator {
    async fn create_link_token(&self, client_user_id: &str) -> Result<LinkToken, AggregatorError> {
        Ok(LinkToken {
            link_token: format!("link-sandbox-{}", client_user_id),
            expiration: Utc::now() + Duration::hours(4),
        })
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<TokenExchange, AggregatorError> {
        let suffix = public_token
            .strip_prefix(PUBLIC_TOKEN_PREFIX)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AggregatorError::api("INVALID_PUBLIC_TOKEN", "malformed public token"))?;

        let access_token = format!("access-sandbox-{}", suffix);
        let mut items = self.lock()?;
        items.entry(access_token.clone()).or_insert_with(|| SandboxItem {
            login_required: false,
            events: seed_transactions(suffix)
                .into_iter()
                .map(SyncEvent::Added)
                .collect(),
        });

        Ok(TokenExchange {
            access_token: access_token.into(),
            item_id: format!("item-sandbox-{}", suffix),
        })
    }

    async fn get_accounts(&self, access_token: &str) -> Result<Vec<AggregatorAccount>, AggregatorError> {
        let login_required = self.with_item(access_token, |item| item.login_required)?;
        if login_required {
            return Err(AggregatorError::LoginRequired);
        }
        let suffix = Self::item_suffix(access_token).unwrap_or_default();

        Ok(vec![
            AggregatorAccount {
                account_id: account_external_id(suffix, "checking"),
                name: "Sandbox Checking".into(),
                mask: Some("0000".into()),
                account_type: AccountType::Checking,
                current_balance: Some(Money::from_cents(310_163)),
            },
            AggregatorAccount {
                account_id: account_external_id(suffix, "savings"),
                name: "Sandbox Savings".into(),
                mask: Some("1111".into()),
                account_type: AccountType::Savings,
                current_balance: Some(Money::from_cents(1_250_000)),
            },
            AggregatorAccount {
                account_id: account_external_id(suffix, "credit"),
                name: "Sandbox Credit Card".into(),
                mask: Some("3333".into()),
                account_type: AccountType::Credit,
                current_balance: Some(Money::from_cents(-2_074)),
            },
        ])
    }

    async fn sync_transactions(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> Result<SyncPage, AggregatorError> {
        let start = match cursor {
            None => 0,
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| AggregatorError::api("INVALID_CURSOR", "cursor is not valid"))?,
        };

        self.with_item(access_token, |item| {
            if item.login_required {
                return Err(AggregatorError::LoginRequired);
            }

            let start = start.min(item.events.len());
            let end = (start + PAGE_SIZE).min(item.events.len());
            let mut page = SyncPage {
                next_cursor: end.to_string(),
                has_more: end < item.events.len(),
                ..SyncPage::default()
            };

            for event in &item.events[start..end] {
                match event {
                    SyncEvent::Added(t) => page.added.push(t.clone()),
                    SyncEvent::Modified(t) => page.modified.push(t.clone()),
                    SyncEvent::Removed(id) => page.removed.push(id.clone()),
                }
            }
            Ok(page)
        })?
    }
}
