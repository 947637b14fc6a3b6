//! Closure queue processing
//!
//! Drives the dispatcher over every READY deposit, with bounded retries
//! per deposit and a deliberate pacing delay between distinct deposits:
//! the legacy endpoint tolerates no bursts. One deposit exhausting its
//! retries marks only that item failed; the batch always runs to the end.

use crate::config::ClosureConfig;
use crate::dispatcher::ClosureDispatcher;
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use deposit_core::{DepositRepository, DepositState};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// One deposit's outcome inside a batch
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    /// Deposit identifier
    pub deposit_id: String,
    /// Effective route id, if any digits existed
    pub route_id: Option<u32>,
    /// Plant of the recording terminal
    pub plant: String,
    /// Cash figure the closure carried
    pub cash_amount: Decimal,
    /// Check rows in the envelope
    pub checks: usize,
    /// Retention rows in the envelope
    pub retentions: usize,
    /// Dispatch attempts consumed
    pub attempts: u32,
    /// Whether the deposit ended SENT
    pub sent: bool,
    /// Last error when the item failed
    pub error: Option<String>,
}

/// Aggregate outcome of one queue run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Batch identifier
    pub id: Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Date filter applied, if any
    pub date: Option<NaiveDate>,
    /// READY deposits picked up
    pub total: usize,
    /// Deposits that ended SENT
    pub sent: usize,
    /// Deposits that exhausted their retries
    pub failed: usize,
    /// True only when no item failed
    pub success: bool,
    /// Per-item detail
    pub items: Vec<ItemOutcome>,
}

/// READY deposits grouped by calendar date, for the operator dashboard
#[derive(Debug, Clone, Serialize)]
pub struct ReadyDaySummary {
    /// Calendar date
    pub date: NaiveDate,
    /// Date in day/month/year display form
    pub display: String,
    /// READY deposits on that date
    pub total: usize,
    /// Per-plant counts
    pub plants: HashMap<String, usize>,
}

/// Queue processor over the closure dispatcher
pub struct QueueProcessor {
    dispatcher: Arc<ClosureDispatcher>,
    repository: Arc<dyn DepositRepository>,
    config: ClosureConfig,
}

impl QueueProcessor {
    /// Create a new processor
    pub fn new(
        dispatcher: Arc<ClosureDispatcher>,
        repository: Arc<dyn DepositRepository>,
        config: ClosureConfig,
    ) -> Self {
        Self {
            dispatcher,
            repository,
            config,
        }
    }

    /// Process every READY deposit, optionally filtered to one date.
    ///
    /// Each deposit gets up to `max_retries` dispatch attempts with
    /// `retry_delay_ms` between them, stopping at the first success. The
    /// pacing delay always separates distinct deposits regardless of
    /// outcome.
    pub async fn process(&self, date: Option<NaiveDate>) -> Result<BatchSummary> {
        let ready = self
            .repository
            .deposits_in_state(DepositState::Ready, date)
            .await?;

        let mut summary = BatchSummary {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            date,
            total: ready.len(),
            sent: 0,
            failed: 0,
            success: true,
            items: Vec::with_capacity(ready.len()),
        };

        if ready.is_empty() {
            info!("No READY deposits to close for {:?}", date);
            return Ok(summary);
        }

        info!("Processing {} READY deposits", ready.len());
        let queue = &self.config.queue;

        for (position, deposit) in ready.iter().enumerate() {
            if position > 0 && queue.pacing_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(queue.pacing_delay_ms)).await;
            }

            // An earlier item of the same route may have swept this row
            // to SENT already
            let current = self.repository.deposit(&deposit.deposit_id).await?;
            let (checks, retentions) = self.repository.documents(&deposit.deposit_id).await?;
            let mut outcome = ItemOutcome {
                deposit_id: deposit.deposit_id.clone(),
                route_id: deposit.route_id(),
                plant: self.plant(&deposit.terminal_id),
                cash_amount: current.closing_cash(),
                checks: checks.len(),
                retentions: retentions.len(),
                attempts: 0,
                sent: false,
                error: None,
            };

            if current.state == DepositState::Sent {
                outcome.sent = true;
                summary.sent += 1;
                summary.items.push(outcome);
                continue;
            }

            for attempt in 1..=queue.max_retries {
                outcome.attempts = attempt;
                match self.dispatcher.dispatch(&deposit.deposit_id).await {
                    Ok(receipt) => {
                        outcome.sent = true;
                        outcome.error = None;
                        info!(
                            "Deposit {} closed on attempt {}/{} ({} rows SENT)",
                            deposit.deposit_id,
                            attempt,
                            queue.max_retries,
                            receipt.marked_sent.len()
                        );
                        break;
                    }
                    Err(e) => {
                        warn!(
                            "Attempt {}/{} failed for deposit {}: {}",
                            attempt, queue.max_retries, deposit.deposit_id, e
                        );
                        outcome.error = Some(e.to_string());
                        if attempt < queue.max_retries && queue.retry_delay_ms > 0 {
                            tokio::time::sleep(Duration::from_millis(queue.retry_delay_ms)).await;
                        }
                    }
                }
            }

            if outcome.sent {
                summary.sent += 1;
            } else {
                summary.failed += 1;
                warn!(
                    "Deposit {} failed after {} attempts",
                    deposit.deposit_id, queue.max_retries
                );
            }
            summary.items.push(outcome);
        }

        summary.success = summary.failed == 0;
        info!(
            "Queue run complete: {} total, {} sent, {} failed",
            summary.total, summary.sent, summary.failed
        );

        Ok(summary)
    }

    /// READY deposits grouped by date, newest first
    pub async fn ready_summary(&self) -> Result<Vec<ReadyDaySummary>> {
        let ready = self
            .repository
            .deposits_in_state(DepositState::Ready, None)
            .await?;

        let mut by_date: BTreeMap<NaiveDate, ReadyDaySummary> = BTreeMap::new();
        for deposit in ready {
            let date = deposit.recorded_at.date_naive();
            let entry = by_date.entry(date).or_insert_with(|| ReadyDaySummary {
                date,
                display: date.format("%d/%m/%Y").to_string(),
                total: 0,
                plants: HashMap::new(),
            });
            entry.total += 1;
            *entry.plants.entry(self.plant(&deposit.terminal_id)).or_insert(0) += 1;
        }

        Ok(by_date.into_values().rev().collect())
    }

    fn plant(&self, terminal_id: &str) -> String {
        self.config
            .plants
            .get(terminal_id)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    }
}
