//! Closure dispatcher
//!
//! Sends one closure envelope per call to the legacy settlement service.
//! The audit artifact is written before any network activity, in both
//! modes. Retry orchestration belongs to the queue processor.

use crate::audit::AuditWriter;
use crate::config::ClosureConfig;
use crate::envelope::EnvelopeBuilder;
use crate::{Error, Result};
use chrono::Utc;
use deposit_core::{DepositRepository, DepositState};
use quick_xml::events::Event;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Name of the legacy closure operation
pub const CLOSE_ACTION: &str = "reparto_cerrar";
/// Element carrying the result marker in the reply body
const RESULT_ELEMENT: &[u8] = b"reparto_cerrarResult";
/// Marker value meaning the closure was accepted
const RESULT_OK: &str = "OK";

/// Canned reply used in simulation mode
const SIMULATED_REPLY: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
    "<soap:Envelope xmlns:soap=\"http://www.w3.org/2003/05/soap-envelope\">",
    "<soap:Body><reparto_cerrarResponse>",
    "<reparto_cerrarResult>OK</reparto_cerrarResult>",
    "</reparto_cerrarResponse></soap:Body></soap:Envelope>"
);

/// Dispatch mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Send the envelope to the legacy endpoint
    Production,
    /// Build the identical envelope, skip the network, synthesize success
    Simulation,
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchMode::Production => write!(f, "production"),
            DispatchMode::Simulation => write!(f, "simulation"),
        }
    }
}

impl std::str::FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "production" => Ok(DispatchMode::Production),
            "simulation" => Ok(DispatchMode::Simulation),
            other => Err(other.to_string()),
        }
    }
}

/// Outcome of one successful dispatch
#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    /// Route that was closed
    pub route_id: u32,
    /// Mode the dispatch ran in
    pub mode: DispatchMode,
    /// Result marker extracted from the reply, if the body parsed
    pub result_marker: Option<String>,
    /// Diagnostic recorded when a 2xx reply body could not be parsed
    pub parse_warning: Option<String>,
    /// Path of the audit artifact for this attempt
    pub audit_artifact: PathBuf,
    /// Deposits flipped to SENT (all rows of the closed route)
    pub marked_sent: Vec<String>,
}

/// Closure dispatcher
pub struct ClosureDispatcher {
    config: ClosureConfig,
    client: Client,
    repository: Arc<dyn DepositRepository>,
    builder: EnvelopeBuilder,
    audit: AuditWriter,
}

impl ClosureDispatcher {
    /// Create a new dispatcher over the deposit repository
    pub fn new(config: ClosureConfig, repository: Arc<dyn DepositRepository>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let builder = EnvelopeBuilder::new(&config.namespace, &config.system_user);
        let audit = AuditWriter::new(&config.audit_dir);

        Ok(Self {
            config,
            client,
            repository,
            builder,
            audit,
        })
    }

    /// Dispatch one deposit's closure in the configured mode
    pub async fn dispatch(&self, deposit_id: &str) -> Result<DispatchReceipt> {
        self.dispatch_with_mode(deposit_id, None).await
    }

    /// Dispatch one deposit's closure, optionally overriding the mode.
    ///
    /// Exactly one attempt: builds the envelope, records the audit
    /// artifact, sends (or simulates), interprets the reply, and on
    /// success flips every deposit of the route to SENT.
    pub async fn dispatch_with_mode(
        &self,
        deposit_id: &str,
        mode: Option<DispatchMode>,
    ) -> Result<DispatchReceipt> {
        let deposit = self.repository.deposit(deposit_id).await?;
        if deposit.state != DepositState::Ready {
            return Err(deposit_core::Error::NotReady {
                deposit_id: deposit.deposit_id,
                state: deposit.state,
            }
            .into());
        }

        let (checks, retentions) = self.repository.documents(deposit_id).await?;
        let payload = self.builder.payload(&deposit, &checks, &retentions);
        let body = self.builder.render(&payload)?;

        // The artifact precedes any network activity, in both modes
        let audit_artifact =
            self.audit
                .record(deposit.recorded_at.date_naive(), payload.route_id, &body)?;

        let mode = mode.unwrap_or(self.config.mode);
        info!(
            "Dispatching route {} ({} checks, {} retentions, cash {}) in {} mode",
            payload.route_id,
            payload.checks.len(),
            payload.retentions.len(),
            payload.cash_amount,
            mode
        );

        let reply = match mode {
            DispatchMode::Production => self.post(&body).await?,
            DispatchMode::Simulation => SIMULATED_REPLY.to_string(),
        };

        let (result_marker, parse_warning) = read_result_marker(&reply);
        if let Some(marker) = result_marker.as_deref() {
            if marker != RESULT_OK {
                warn!("Route {} rejected by endpoint: {}", payload.route_id, marker);
                return Err(Error::Rejected {
                    route_id: payload.route_id,
                    marker: marker.to_string(),
                });
            }
        }
        if let Some(warning) = parse_warning.as_deref() {
            // Tolerant-parse policy: a 2xx reply counts as success even
            // when the body defies the schema
            warn!("Route {} reply accepted untyped: {}", payload.route_id, warning);
        }

        let marked_sent = self
            .repository
            .mark_sent_matching_route(payload.route_id, Utc::now())
            .await?;
        info!(
            "Route {} closed, {} deposit(s) marked SENT",
            payload.route_id,
            marked_sent.len()
        );

        Ok(DispatchReceipt {
            route_id: payload.route_id,
            mode,
            result_marker,
            parse_warning,
            audit_artifact,
            marked_sent,
        })
    }

    async fn post(&self, body: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .header(
                "SOAPAction",
                format!("{}{}", self.config.namespace, CLOSE_ACTION),
            )
            .body(body.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Endpoint {
                status_code,
                message,
            });
        }

        Ok(response.text().await.unwrap_or_default())
    }
}

/// Best-effort scan for the result marker. Returns the marker when the
/// body parses, otherwise a diagnostic for the tolerant-parse path.
fn read_result_marker(body: &str) -> (Option<String>, Option<String>) {
    let mut reader = quick_xml::Reader::from_str(body);
    let mut in_result = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == RESULT_ELEMENT => in_result = true,
            Ok(Event::Text(text)) if in_result => {
                return match text.unescape() {
                    Ok(marker) => (Some(marker.into_owned()), None),
                    Err(e) => (None, Some(format!("unreadable result marker: {}", e))),
                };
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == RESULT_ELEMENT => in_result = false,
            Ok(Event::Eof) => return (None, Some("no result marker in reply".to_string())),
            Err(e) => return (None, Some(format!("unparseable reply: {}", e))),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_found() {
        let (marker, warning) = read_result_marker(SIMULATED_REPLY);
        assert_eq!(marker.as_deref(), Some("OK"));
        assert!(warning.is_none());
    }

    #[test]
    fn test_marker_with_namespace_prefix() {
        let body = "<e xmlns:a=\"urn:x\"><a:reparto_cerrarResult>ERROR 12</a:reparto_cerrarResult></e>";
        let (marker, _) = read_result_marker(body);
        assert_eq!(marker.as_deref(), Some("ERROR 12"));
    }

    #[test]
    fn test_missing_marker_yields_warning() {
        let (marker, warning) = read_result_marker("<ok/>");
        assert!(marker.is_none());
        assert!(warning.unwrap().contains("no result marker"));
    }

    #[test]
    fn test_unparseable_body_yields_warning() {
        let (marker, warning) = read_result_marker("this is not xml <<<");
        assert!(marker.is_none());
        assert!(warning.is_some());
    }
}
