//! External valuation feed
//!
//! The feed reports per-route cash/check/retention figures for a calendar
//! date. Its JSON rows are inconsistent: the route id arrives under any of
//! several key spellings and the figures under two casings, as numbers,
//! numeric strings or null. Everything is resolved here, at the fetch
//! boundary, into one fixed internal shape so downstream logic never
//! re-checks aliases.

use crate::config::ValuationConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use deposit_core::Composition;
use rust_decimal::{prelude::FromPrimitive, Decimal};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Key spellings under which the feed delivers the route id
const ROUTE_ID_KEYS: [&str; 6] = ["idreparto", "IdReparto", "id_reparto", "idReparto", "ID", "id"];

/// Per-route expected figures for one date, in normalized shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValuationRecord {
    /// Route identifier
    pub route_id: u32,
    /// Expected cash figure
    pub cash: Decimal,
    /// Expected check figure
    pub check: Decimal,
    /// Expected retention figure
    pub retention: Decimal,
}

impl ValuationRecord {
    /// Expected total: cash + check + retention
    pub fn total(&self) -> Decimal {
        self.cash + self.check + self.retention
    }

    /// Whether every figure is non-positive
    pub fn is_empty(&self) -> bool {
        self.cash <= Decimal::ZERO
            && self.check <= Decimal::ZERO
            && self.retention <= Decimal::ZERO
    }

    /// Composition tag for this record: members in fixed order (cash,
    /// check, retention), present when the figure is positive, cash-only
    /// when nothing is.
    pub fn composition(&self) -> Composition {
        Composition::new(
            self.cash > Decimal::ZERO,
            self.check > Decimal::ZERO,
            self.retention > Decimal::ZERO,
        )
    }
}

/// Valuation feed seam
#[async_trait]
pub trait ValuationSource: Send + Sync {
    /// Fetch per-route figures for a calendar date
    async fn fetch(&self, date: NaiveDate) -> Result<Vec<ValuationRecord>>;
}

/// HTTP valuation feed client
pub struct HttpValuationSource {
    config: ValuationConfig,
    client: Client,
}

impl HttpValuationSource {
    /// Create a new client with the configured timeout
    pub fn new(config: ValuationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ValuationSource for HttpValuationSource {
    async fn fetch(&self, date: NaiveDate) -> Result<Vec<ValuationRecord>> {
        // The feed takes the date in day/month/year text form
        let fecha = date.format("%d/%m/%Y").to_string();
        debug!("Querying valuation feed for {}", fecha);

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("idreparto", "0"), ("fecha", fecha.as_str())])
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

        let rows: Vec<Value> = response.json().await?;
        Ok(normalize_rows(&rows))
    }
}

/// Resolve the feed's key aliases into `ValuationRecord`s. Rows with no
/// recognizable route id are logged and skipped.
pub fn normalize_rows(rows: &[Value]) -> Vec<ValuationRecord> {
    rows.iter()
        .filter_map(|row| match normalize_row(row) {
            Some(record) => Some(record),
            None => {
                warn!("Valuation row without a recognizable route id: {}", row);
                None
            }
        })
        .collect()
}

fn normalize_row(row: &Value) -> Option<ValuationRecord> {
    let route_id = ROUTE_ID_KEYS
        .iter()
        .find_map(|key| row.get(key))
        .and_then(route_id_value)?;

    Some(ValuationRecord {
        route_id,
        cash: figure(row, "Efectivo", "efectivo"),
        check: figure(row, "Cheques", "cheques"),
        retention: figure(row, "Retenciones", "retenciones"),
    })
}

fn route_id_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|id| id as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read one figure under either casing; anything unreadable coerces to zero
fn figure(row: &Value, upper: &str, lower: &str) -> Decimal {
    row.get(upper)
        .or_else(|| row.get(lower))
        .and_then(decimal_value)
        .unwrap_or(Decimal::ZERO)
}

fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_normalize_resolves_aliases() {
        let rows = vec![
            json!({"idreparto": 42, "Efectivo": 1000, "Cheques": 2000, "Retenciones": 3000}),
            json!({"IdReparto": "7", "efectivo": "500.50", "cheques": null}),
            json!({"Efectivo": 100}),
        ];

        let records = normalize_rows(&rows);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].route_id, 42);
        assert_eq!(records[0].cash, dec!(1000));
        assert_eq!(records[0].total(), dec!(6000));

        assert_eq!(records[1].route_id, 7);
        assert_eq!(records[1].cash, dec!(500.50));
        assert_eq!(records[1].check, Decimal::ZERO);
        assert_eq!(records[1].retention, Decimal::ZERO);
    }

    #[test]
    fn test_composition_order_and_default() {
        let record = ValuationRecord {
            route_id: 1,
            cash: dec!(10),
            check: Decimal::ZERO,
            retention: dec!(5),
        };
        assert_eq!(record.composition().to_string(), "cash+retention");

        let empty = ValuationRecord {
            route_id: 1,
            cash: Decimal::ZERO,
            check: Decimal::ZERO,
            retention: Decimal::ZERO,
        };
        assert!(empty.is_empty());
        assert_eq!(empty.composition().to_string(), "cash");
    }

    #[tokio::test]
    async fn test_http_fetch_normalizes_and_fails_on_non_2xx() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reparto_get_valores"))
            .and(query_param("idreparto", "0"))
            .and(query_param("fecha", "28/06/2025"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"IdReparto": 42, "efectivo": 1000, "Retenciones": 3000, "Cheques": 2000}
            ])))
            .mount(&server)
            .await;

        let source = HttpValuationSource::new(ValuationConfig {
            endpoint: format!("{}/reparto_get_valores", server.uri()),
            timeout_seconds: 5,
        })
        .unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 6, 28).unwrap();
        let records = source.fetch(date).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].route_id, 42);
        assert_eq!(records[0].total(), dec!(6000));

        let failing = HttpValuationSource::new(ValuationConfig {
            endpoint: format!("{}/nowhere", server.uri()),
            timeout_seconds: 5,
        })
        .unwrap();
        let err = failing.fetch(date).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status_code: 404, .. }));
    }
}
