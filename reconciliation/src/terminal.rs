//! Banking-terminal deposit feed
//!
//! Terminals publish the deposits they recorded per day as an XML feed
//! behind basic auth. Rows observed here become (or refresh) local deposit
//! rows; reconciliation and closure operate on the local copies.

use crate::config::TerminalConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use deposit_core::{Deposit, DepositRepository};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Terminal feed seam
#[async_trait]
pub trait TerminalSource: Send + Sync {
    /// Deposits recorded by one terminal on one calendar date
    async fn deposits_by_day(&self, terminal_id: &str, date: NaiveDate) -> Result<Vec<Deposit>>;
}

/// HTTP terminal feed client
pub struct HttpTerminalSource {
    config: TerminalConfig,
    client: Client,
}

impl HttpTerminalSource {
    /// Create a new client with the configured timeout
    pub fn new(config: TerminalConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl TerminalSource for HttpTerminalSource {
    async fn deposits_by_day(&self, terminal_id: &str, date: NaiveDate) -> Result<Vec<Deposit>> {
        // This feed takes the date in month/day/year text form
        let url = format!("{}/deposits/byday", self.config.endpoint);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.user, Some(&self.config.password))
            .query(&[
                ("stIdentifier", terminal_id),
                ("date", &date.format("%m/%d/%Y").to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status_code,
                message,
            });
        }

        let body = response.text().await?;
        let envelope: DepositsByDay =
            quick_xml::de::from_str(&body).map_err(|e| Error::Xml(e.to_string()))?;

        Ok(envelope
            .deposits
            .into_iter()
            .map(|row| row.into_deposit(terminal_id, date))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct DepositsByDay {
    #[serde(rename = "WSDepositsByDayDTO", default)]
    deposits: Vec<DepositRow>,
}

#[derive(Debug, Deserialize)]
struct DepositRow {
    #[serde(rename = "depositId")]
    deposit_id: String,
    #[serde(rename = "userName", default)]
    user_name: Option<String>,
    #[serde(rename = "dateTime", default)]
    date_time: Option<String>,
    #[serde(default)]
    currencies: Option<Currencies>,
}

#[derive(Debug, Deserialize)]
struct Currencies {
    #[serde(rename = "WSDepositCurrency", default)]
    currency: Option<DepositCurrency>,
}

#[derive(Debug, Deserialize)]
struct DepositCurrency {
    #[serde(rename = "totalAmount", default)]
    total_amount: Option<String>,
}

impl DepositRow {
    fn into_deposit(self, terminal_id: &str, date: NaiveDate) -> Deposit {
        let recorded_amount = self
            .currencies
            .and_then(|c| c.currency)
            .and_then(|c| c.total_amount)
            .and_then(|raw| match raw.trim().parse::<Decimal>() {
                Ok(amount) => Some(amount),
                Err(_) => {
                    warn!("Unreadable totalAmount {:?} for deposit {}", raw, self.deposit_id);
                    None
                }
            })
            .unwrap_or(Decimal::ZERO);

        let recorded_at = self
            .date_time
            .as_deref()
            .and_then(|raw| raw.parse::<NaiveDateTime>().ok())
            .unwrap_or_else(|| date.and_time(NaiveTime::MIN))
            .and_utc();

        Deposit::new(
            self.deposit_id,
            terminal_id,
            self.user_name,
            recorded_amount,
            recorded_at,
        )
    }
}

/// One terminal's failure inside a sync pass
#[derive(Debug, Clone, Serialize)]
pub struct TerminalFailure {
    /// Terminal identifier
    pub terminal_id: String,
    /// Fetch error
    pub error: String,
}

/// Outcome of one terminal sync pass
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    /// Calendar date synced
    pub date: NaiveDate,
    /// Terminals polled
    pub terminals: usize,
    /// Deposit rows observed and upserted
    pub observed: usize,
    /// Per-terminal fetch failures
    pub failures: Vec<TerminalFailure>,
}

/// Pull one day of deposits from every configured terminal into the
/// repository. A failing terminal is recorded and does not abort the rest.
pub async fn sync_deposits(
    source: &dyn TerminalSource,
    repository: &dyn DepositRepository,
    terminals: &[String],
    date: NaiveDate,
) -> Result<SyncSummary> {
    let mut summary = SyncSummary {
        date,
        terminals: terminals.len(),
        observed: 0,
        failures: Vec::new(),
    };

    for terminal_id in terminals {
        match source.deposits_by_day(terminal_id, date).await {
            Ok(rows) => {
                summary.observed += rows.len();
                for row in rows {
                    repository.upsert_deposit(row).await?;
                }
            }
            Err(e) => {
                warn!("Terminal {} fetch failed: {}", terminal_id, e);
                summary.failures.push(TerminalFailure {
                    terminal_id: terminal_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Synced {} deposits from {} terminals for {} ({} failures)",
        summary.observed,
        summary.terminals,
        date,
        summary.failures.len()
    );

    Ok(summary)
}
