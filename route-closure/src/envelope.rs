//! Legacy closure envelope
//!
//! Renders a deposit and its child documents into the wire payload the
//! legacy settlement service expects: a SOAP 1.2 envelope whose
//! `retenciones`/`cheques` fields carry JSON array text. Field names are
//! the legacy protocol's and replay byte-exact.
//!
//! Child rows are normalized independently: dates re-emit in day/month/
//! year text, numeric-looking text fields coerce through the shared
//! digit-run utility, and missing optional fields fall back to the legacy
//! schema's documented defaults so its mandatory-field checks pass.

use crate::Result;
use chrono::{NaiveDate, Utc};
use deposit_core::numeric::coerce_code;
use deposit_core::{Check, Deposit, Retention};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

/// Concept code for check rows
pub const CONCEPT_CHECK: &str = "CHE";
/// Default concept code for retention rows
pub const CONCEPT_RETENTION: &str = "RIB";

/// Legacy defaults for mandatory fields absent upstream
const DEFAULT_ACCOUNT_CODE: i64 = 1;
const DEFAULT_BRANCH: i64 = 1;
const DEFAULT_LOCALITY: i64 = 1234;
const DEFAULT_ACCOUNT_NUMBER: i64 = 1234;

/// Check row in legacy wire shape
#[derive(Debug, Clone, Serialize)]
pub struct WireCheck {
    /// Ledger account code
    pub nrocta: i64,
    /// Concept code, always `CHE`
    pub concepto: String,
    /// Issuing bank code
    pub banco: i64,
    /// Branch code
    pub sucursal: i64,
    /// Locality code
    pub localidad: i64,
    /// Check number
    pub nro_cheque: i64,
    /// Account number
    pub nro_cuenta: i64,
    /// Account holder
    pub titular: String,
    /// Issue date, day/month/year text
    pub fecha: String,
    /// Amount
    pub importe: Decimal,
}

/// Retention row in legacy wire shape
#[derive(Debug, Clone, Serialize)]
pub struct WireRetention {
    /// Ledger account code
    pub nrocta: i64,
    /// Withholding concept code
    pub concepto: String,
    /// Retention document number
    pub nro_retencion: i64,
    /// Issue date, day/month/year text
    pub fecha: String,
    /// Amount
    pub importe: Decimal,
}

/// Materialized closure payload for one route
#[derive(Debug, Clone)]
pub struct ClosurePayload {
    /// Route being closed
    pub route_id: u32,
    /// Deposit date, day/month/year text
    pub date: String,
    /// Cash figure to close with
    pub cash_amount: Decimal,
    /// Retention rows
    pub retentions: Vec<WireRetention>,
    /// Check rows
    pub checks: Vec<WireCheck>,
    /// System username
    pub user: String,
}

/// Builds legacy closure envelopes
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    namespace: String,
    system_user: String,
}

impl EnvelopeBuilder {
    /// New builder for a legacy namespace and system username
    pub fn new(namespace: impl Into<String>, system_user: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            system_user: system_user.into(),
        }
    }

    /// Materialize the payload for a deposit and its documents.
    ///
    /// The route id falls back to the digits of the deposit's own id when
    /// label extraction fails, and to zero when no digits exist anywhere.
    /// The cash figure is the expected cash-only amount, falling back to
    /// the terminal-recorded total when reconciliation never matched.
    pub fn payload(
        &self,
        deposit: &Deposit,
        checks: &[Check],
        retentions: &[Retention],
    ) -> ClosurePayload {
        let route_id = deposit.route_id().unwrap_or_else(|| {
            warn!(
                "No digits in label {:?} nor id {:?}, closing as route 0",
                deposit.route_label, deposit.deposit_id
            );
            0
        });

        let today = Utc::now().date_naive();
        ClosurePayload {
            route_id,
            date: deposit.recorded_at.format("%d/%m/%Y").to_string(),
            cash_amount: deposit.closing_cash(),
            retentions: retentions
                .iter()
                .map(|r| wire_retention(r, today))
                .collect(),
            checks: checks.iter().map(|c| wire_check(c, today)).collect(),
            user: self.system_user.clone(),
        }
    }

    /// Render the payload as the SOAP 1.2 envelope, byte-exact
    pub fn render(&self, payload: &ClosurePayload) -> Result<String> {
        let retentions_json = serde_json::to_string(&payload.retentions)?;
        let checks_json = serde_json::to_string(&payload.checks)?;

        Ok(format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<soap12:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                 xmlns:xsd="http://www.w3.org/2001/XMLSchema"
                 xmlns:soap12="http://www.w3.org/2003/05/soap-envelope">
  <soap12:Body>
    <reparto_cerrar xmlns="{namespace}">
      <idreparto>{route_id}</idreparto>
      <fecha>{date}</fecha>
      <ajustar_envases>0</ajustar_envases>
      <efectivo_importe>{cash}</efectivo_importe>
      <retenciones>{retentions}</retenciones>
      <cheques>{checks}</cheques>
      <usuario>{user}</usuario>
    </reparto_cerrar>
  </soap12:Body>
</soap12:Envelope>"#,
            namespace = self.namespace,
            route_id = payload.route_id,
            date = payload.date,
            cash = payload.cash_amount,
            retentions = retentions_json,
            checks = checks_json,
            user = payload.user,
        ))
    }
}

fn wire_check(check: &Check, today: NaiveDate) -> WireCheck {
    WireCheck {
        nrocta: check.account_code.unwrap_or(DEFAULT_ACCOUNT_CODE),
        concepto: CONCEPT_CHECK.to_string(),
        banco: coerce_field("banco", check.bank.as_deref()),
        sucursal: check
            .branch
            .as_deref()
            .map(|raw| coerce_code("sucursal", raw))
            .unwrap_or(DEFAULT_BRANCH),
        localidad: check
            .locality
            .as_deref()
            .map(|raw| coerce_code("localidad", raw))
            .unwrap_or(DEFAULT_LOCALITY),
        nro_cheque: coerce_field("nro_cheque", check.check_number.as_deref()),
        nro_cuenta: check.account_number.unwrap_or(DEFAULT_ACCOUNT_NUMBER),
        titular: check.holder.clone().unwrap_or_default(),
        fecha: local_date(check.issued_on.as_deref(), today),
        importe: check.amount,
    }
}

fn wire_retention(retention: &Retention, today: NaiveDate) -> WireRetention {
    WireRetention {
        nrocta: retention.account_code.unwrap_or(DEFAULT_ACCOUNT_CODE),
        concepto: retention
            .concept
            .clone()
            .unwrap_or_else(|| CONCEPT_RETENTION.to_string()),
        nro_retencion: coerce_field("nro_retencion", retention.retention_number.as_deref()),
        fecha: local_date(retention.issued_on.as_deref(), today),
        importe: retention.amount,
    }
}

fn coerce_field(field: &str, raw: Option<&str>) -> i64 {
    raw.map(|raw| coerce_code(field, raw)).unwrap_or(0)
}

/// Normalize a captured date to day/month/year text. Accepts ISO or local
/// form; anything else falls back to today with a logged warning.
fn local_date(raw: Option<&str>, today: NaiveDate) -> String {
    let fallback = || today.format("%d/%m/%Y").to_string();
    let Some(raw) = raw else {
        return fallback();
    };
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%d/%m/%Y").to_string();
    }
    if NaiveDate::parse_from_str(raw, "%d/%m/%Y").is_ok() {
        return raw.to_string();
    }

    warn!("Unparseable document date {:?}, defaulting to today", raw);
    fallback()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn deposit() -> Deposit {
        let recorded_at = Utc.with_ymd_and_hms(2025, 6, 28, 10, 30, 0).unwrap();
        let mut d = Deposit::new(
            "009",
            "L-EJU-001",
            Some("42, RTO 042".to_string()),
            dec!(150000),
            recorded_at,
        );
        d.expected_cash = Some(dec!(120000));
        d
    }

    fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::new("http://legacy.example.com/", "SISTEMA")
    }

    #[test]
    fn test_payload_fields() {
        let payload = builder().payload(&deposit(), &[], &[]);
        assert_eq!(payload.route_id, 42);
        assert_eq!(payload.date, "28/06/2025");
        assert_eq!(payload.cash_amount, dec!(120000));
        assert_eq!(payload.user, "SISTEMA");
    }

    #[test]
    fn test_route_id_falls_back_to_deposit_id() {
        let mut d = deposit();
        d.route_label = Some("sin numero".to_string());
        let payload = builder().payload(&d, &[], &[]);
        assert_eq!(payload.route_id, 9);
    }

    #[test]
    fn test_cash_falls_back_to_recorded() {
        let mut d = deposit();
        d.expected_cash = None;
        let payload = builder().payload(&d, &[], &[]);
        assert_eq!(payload.cash_amount, dec!(150000));
    }

    #[test]
    fn test_check_normalization() {
        let check = Check {
            deposit_id: "009".to_string(),
            account_code: None,
            bank: Some("Banco 17".to_string()),
            branch: None,
            locality: None,
            check_number: Some("000123".to_string()),
            account_number: None,
            holder: None,
            issued_on: Some("2025-06-01".to_string()),
            amount: dec!(2000),
        };

        let today = NaiveDate::from_ymd_opt(2025, 6, 28).unwrap();
        let wire = wire_check(&check, today);
        assert_eq!(wire.nrocta, 1);
        assert_eq!(wire.concepto, "CHE");
        assert_eq!(wire.banco, 17);
        assert_eq!(wire.sucursal, 1);
        assert_eq!(wire.localidad, 1234);
        assert_eq!(wire.nro_cheque, 123);
        assert_eq!(wire.nro_cuenta, 1234);
        assert_eq!(wire.fecha, "01/06/2025");
    }

    #[test]
    fn test_document_date_forms() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 28).unwrap();
        assert_eq!(local_date(Some("2025-06-01"), today), "01/06/2025");
        assert_eq!(local_date(Some("01/06/2025"), today), "01/06/2025");
        assert_eq!(local_date(Some("junio"), today), "28/06/2025");
        assert_eq!(local_date(None, today), "28/06/2025");
    }

    #[test]
    fn test_envelope_renders_wire_fields() {
        let retention = Retention {
            deposit_id: "009".to_string(),
            account_code: Some(2),
            concept: None,
            retention_number: Some("R-778".to_string()),
            issued_on: Some("02/06/2025".to_string()),
            amount: dec!(3000),
        };

        let b = builder();
        let payload = b.payload(&deposit(), &[], &[retention]);
        let xml = b.render(&payload).unwrap();

        assert!(xml.contains("<reparto_cerrar xmlns=\"http://legacy.example.com/\">"));
        assert!(xml.contains("<idreparto>42</idreparto>"));
        assert!(xml.contains("<fecha>28/06/2025</fecha>"));
        assert!(xml.contains("<ajustar_envases>0</ajustar_envases>"));
        assert!(xml.contains("<efectivo_importe>120000</efectivo_importe>"));
        assert!(xml.contains("<usuario>SISTEMA</usuario>"));
        assert!(xml.contains("\"concepto\":\"RIB\""));
        assert!(xml.contains("\"nro_retencion\":778"));
        assert!(xml.contains("<cheques>[]</cheques>"));
    }
}
