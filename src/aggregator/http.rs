//! HTTP client for a Plaid-style aggregator API
//!
//! Every endpoint is a JSON POST carrying the client id and secret in the
//! body. Amounts come back as decimal numbers where positive means money
//! leaving the account, so they are negated on the way in.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AggregatorCredentials;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{AccountType, Money};

use super::{
    Aggregator, AggregatorAccount, AggregatorError, AggregatorTransaction, LinkToken, SyncPage,
    TokenExchange,
};

const CLIENT_NAME: &str = "Envelope";
const SYNC_PAGE_SIZE: u32 = 250;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Aggregator reached over HTTPS
#[derive(Debug, Clone)]
pub struct HttpAggregator {
    base_url: String,
    credentials: AggregatorCredentials,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct Authenticated<'a, T: Serialize> {
    client_id: &'a str,
    secret: &'a str,
    #[serde(flatten)]
    body: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    error_message: String,
}

#[derive(Serialize)]
struct LinkTokenRequest<'a> {
    client_name: &'a str,
    user: LinkUser<'a>,
    products: [&'a str; 1],
    country_codes: [&'a str; 1],
    language: &'a str,
}

#[derive(Serialize)]
struct LinkUser<'a> {
    client_user_id: &'a str,
}

#[derive(Deserialize)]
struct LinkTokenResponse {
    link_token: String,
    expiration: DateTime<Utc>,
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    public_token: &'a str,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    access_token: String,
    item_id: String,
}

#[derive(Serialize)]
struct AccessTokenRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
struct AccountsResponse {
    accounts: Vec<RemoteAccount>,
}

#[derive(Deserialize)]
struct RemoteAccount {
    account_id: String,
    name: String,
    #[serde(default)]
    mask: Option<String>,
    #[serde(rename = "type")]
    account_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    balances: RemoteBalances,
}

#[derive(Deserialize, Default)]
struct RemoteBalances {
    current: Option<f64>,
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    count: u32,
}

#[derive(Deserialize)]
struct SyncResponse {
    #[serde(default)]
    added: Vec<RemoteTransaction>,
    #[serde(default)]
    modified: Vec<RemoteTransaction>,
    #[serde(default)]
    removed: Vec<RemovedTransaction>,
    next_cursor: String,
    has_more: bool,
}

#[derive(Deserialize)]
struct RemovedTransaction {
    transaction_id: String,
}

#[derive(Deserialize)]
struct RemoteTransaction {
    transaction_id: String,
    account_id: String,
    amount: f64,
    date: NaiveDate,
    name: String,
    #[serde(default)]
    merchant_name: Option<String>,
    #[serde(default)]
    pending: bool,
    #[serde(default)]
    category: Option<Vec<String>>,
    #[serde(default)]
    personal_finance_category: Option<PersonalFinanceCategory>,
}

#[derive(Deserialize)]
struct PersonalFinanceCategory {
    primary: String,
}

/// Convert a decimal amount in currency units to cents
fn to_money(amount: f64) -> Money {
    Money::from_cents((amount * 100.0).round() as i64)
}

fn map_account_type(kind: &str, subtype: Option<&str>) -> AccountType {
    match (kind, subtype) {
        ("depository", Some("savings")) | ("depository", Some("money market")) => AccountType::Savings,
        ("depository", _) => AccountType::Checking,
        ("credit", _) => AccountType::Credit,
        ("loan", _) => AccountType::Loan,
        ("investment", _) | ("brokerage", _) => AccountType::Investment,
        _ => AccountType::Other,
    }
}

/// Turn "FOOD_AND_DRINK" into "Food And Drink"
fn humanize(code: &str) -> String {
    code.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let lower = w.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl RemoteAccount {
    fn into_account(self) -> AggregatorAccount {
        let account_type = map_account_type(&self.account_type, self.subtype.as_deref());
        // Liability balances are reported as positive amounts owed
        let current_balance = self.balances.current.map(|b| {
            let money = to_money(b);
            if account_type.is_liability() {
                -money
            } else {
                money
            }
        });

        AggregatorAccount {
            account_id: self.account_id,
            name: self.name,
            mask: self.mask,
            account_type,
            current_balance,
        }
    }
}

impl RemoteTransaction {
    fn into_transaction(self) -> AggregatorTransaction {
        let category = self
            .category
            .and_then(|c| c.last().cloned())
            .or_else(|| self.personal_finance_category.map(|p| humanize(&p.primary)));

        AggregatorTransaction {
            transaction_id: self.transaction_id,
            account_id: self.account_id,
            date: self.date,
            amount: -to_money(self.amount),
            name: self.name,
            merchant_name: self.merchant_name,
            pending: self.pending,
            category,
        }
    }
}

impl HttpAggregator {
    pub fn new(credentials: AggregatorCredentials) -> EnvelopeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EnvelopeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    async fn post<B, R>(&self, path: &str, body: B) -> Result<R, AggregatorError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let request = Authenticated {
            client_id: &self.credentials.client_id,
            secret: self.credentials.client_secret.as_str(),
            body,
        };

        debug!(path, "Aggregator request");
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorBody>(&text) {
                Ok(err) if !err.error_code.is_empty() => {
                    AggregatorError::api(err.error_code, err.error_message)
                }
                _ => AggregatorError::Transport(format!("{} returned {}", path, status)),
            });
        }

        Ok(response.json::<R>().await?)
    }
}

impl Aggregator for HttpAggregator {
    async fn create_link_token(&self, client_user_id: &str) -> Result<LinkToken, AggregatorError> {
        let response: LinkTokenResponse = self
            .post(
                "/link/token/create",
                LinkTokenRequest {
                    client_name: CLIENT_NAME,
                    user: LinkUser { client_user_id },
                    products: ["transactions"],
                    country_codes: ["US"],
                    language: "en",
                },
            )
            .await?;

        Ok(LinkToken {
            link_token: response.link_token,
            expiration: response.expiration,
        })
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<TokenExchange, AggregatorError> {
        let response: ExchangeResponse = self
            .post("/item/public_token/exchange", ExchangeRequest { public_token })
            .await?;

        Ok(TokenExchange {
            access_token: response.access_token.into(),
            item_id: response.item_id,
        })
    }

    async fn get_accounts(&self, access_token: &str) -> Result<Vec<AggregatorAccount>, AggregatorError> {
        let response: AccountsResponse = self
            .post("/accounts/get", AccessTokenRequest { access_token })
            .await?;

        Ok(response
            .accounts
            .into_iter()
            .map(RemoteAccount::into_account)
            .collect())
    }

    async fn sync_transactions(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> Result<SyncPage, AggregatorError> {
        let response: SyncResponse = self
            .post(
                "/transactions/sync",
                SyncRequest {
                    access_token,
                    cursor,
                    count: SYNC_PAGE_SIZE,
                },
            )
            .await?;

        Ok(SyncPage {
            added: response
                .added
                .into_iter()
                .map(RemoteTransaction::into_transaction)
                .collect(),
            modified: response
                .modified
                .into_iter()
                .map(RemoteTransaction::into_transaction)
                .collect(),
            removed: response.removed.into_iter().map(|r| r.transaction_id).collect(),
            next_cursor: response.next_cursor,
            has_more: response.has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_sign_is_flipped() {
        let remote: RemoteTransaction = serde_json::from_str(
            r#"{
                "transaction_id": "t1",
                "account_id": "a1",
                "amount": 12.34,
                "date": "2025-03-04",
                "name": "COFFEE SHOP",
                "merchant_name": "Coffee Shop",
                "pending": false,
                "category": ["Food and Drink", "Coffee Shop"]
            }"#,
        )
        .unwrap();

        let txn = remote.into_transaction();
        assert_eq!(txn.amount.cents(), -1234);
        assert_eq!(txn.category.as_deref(), Some("Coffee Shop"));
    }

    #[test]
    fn test_personal_finance_category_fallback() {
        let remote: RemoteTransaction = serde_json::from_str(
            r#"{
                "transaction_id": "t2",
                "account_id": "a1",
                "amount": -2500.0,
                "date": "2025-03-01",
                "name": "PAYROLL",
                "personal_finance_category": {"primary": "INCOME"}
            }"#,
        )
        .unwrap();

        let txn = remote.into_transaction();
        assert_eq!(txn.amount.cents(), 250_000);
        assert_eq!(txn.category.as_deref(), Some("Income"));
        assert_eq!(humanize("FOOD_AND_DRINK"), "Food And Drink");
    }

    #[test]
    fn test_account_mapping() {
        let remote: RemoteAccount = serde_json::from_str(
            r#"{
                "account_id": "a2",
                "name": "Platinum Card",
                "mask": "1234",
                "type": "credit",
                "subtype": "credit card",
                "balances": {"current": 410.5, "available": null}
            }"#,
        )
        .unwrap();

        let account = remote.into_account();
        assert_eq!(account.account_type, AccountType::Credit);
        assert_eq!(account.current_balance, Some(Money::from_cents(-41050)));

        assert_eq!(map_account_type("depository", Some("savings")), AccountType::Savings);
        assert_eq!(map_account_type("depository", Some("checking")), AccountType::Checking);
        assert_eq!(map_account_type("mortgage", None), AccountType::Other);
    }

    #[test]
    fn test_request_carries_credentials() {
        let request = Authenticated {
            client_id: "id",
            secret: "shh",
            body: AccessTokenRequest { access_token: "tok" },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["client_id"], "id");
        assert_eq!(json["access_token"], "tok");
    }
}
