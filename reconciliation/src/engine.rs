//! Reconciliation engine
//!
//! Drives one reconciliation pass: valuation fetch, route-id extraction,
//! matching, and expected-value updates with state recomputation.

use crate::valuation::{ValuationRecord, ValuationSource};
use crate::Result;
use chrono::NaiveDate;
use deposit_core::{extract, Composition, DepositRepository, DepositState};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One deposit's change inside a reconciliation pass
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileDetail {
    /// Deposit identifier
    pub deposit_id: String,
    /// Raw route label the id was extracted from
    pub route_label: Option<String>,
    /// Extracted route id
    pub route_id: u32,
    /// Previously stored expected total
    pub old_expected_total: Option<Decimal>,
    /// Newly derived expected total
    pub new_expected_total: Decimal,
    /// Previously stored composition
    pub old_composition: Option<Composition>,
    /// Newly derived composition
    pub new_composition: Composition,
    /// Lifecycle state after recomputation
    pub state: DepositState,
}

/// Aggregate outcome of one reconciliation pass
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileSummary {
    /// Pass identifier
    pub id: Uuid,
    /// Calendar date reconciled
    pub date: NaiveDate,
    /// Valuation records fetched (after dropping all-zero rows)
    pub fetched: usize,
    /// Local deposits examined
    pub processed: usize,
    /// Deposits whose label yielded a route id
    pub extracted: usize,
    /// Deposits whose route id existed in the valuation index
    pub matched: usize,
    /// Deposits actually written
    pub updated: usize,
    /// Per-deposit change log
    pub details: Vec<ReconcileDetail>,
}

/// Reconciliation engine
pub struct ReconciliationEngine {
    source: Arc<dyn ValuationSource>,
    repository: Arc<dyn DepositRepository>,
}

impl ReconciliationEngine {
    /// Create a new engine over a valuation source and deposit repository
    pub fn new(source: Arc<dyn ValuationSource>, repository: Arc<dyn DepositRepository>) -> Self {
        Self { source, repository }
    }

    /// Run one reconciliation pass for a calendar date.
    ///
    /// Extraction and lookup misses are expected and skipped; a failing
    /// valuation fetch aborts the pass. Running twice over unchanged
    /// inputs performs zero writes on the second pass.
    pub async fn reconcile(&self, date: NaiveDate) -> Result<ReconcileSummary> {
        info!("Starting reconciliation for {}", date);

        let records = self.source.fetch(date).await?;
        let index = index_by_route(records);

        let deposits = self.repository.deposits_on(date).await?;

        let mut summary = ReconcileSummary {
            id: Uuid::new_v4(),
            date,
            fetched: index.len(),
            processed: deposits.len(),
            extracted: 0,
            matched: 0,
            updated: 0,
            details: Vec::new(),
        };

        for deposit in deposits {
            let Some(route_id) = extract::route_id_from_label(deposit.route_label.as_deref())
            else {
                warn!(
                    "No route id in label {:?} (deposit {})",
                    deposit.route_label, deposit.deposit_id
                );
                continue;
            };
            summary.extracted += 1;

            let Some(record) = index.get(&route_id) else {
                warn!(
                    "Route {} not in valuation feed (deposit {})",
                    route_id, deposit.deposit_id
                );
                continue;
            };
            summary.matched += 1;

            let changed = self
                .repository
                .update_expected(
                    &deposit.deposit_id,
                    record.total(),
                    record.cash,
                    record.composition(),
                )
                .await?;

            if !changed {
                debug!(
                    "Deposit {} already carries expected {} ({})",
                    deposit.deposit_id,
                    record.total(),
                    record.composition()
                );
                continue;
            }

            summary.updated += 1;
            let refreshed = self.repository.deposit(&deposit.deposit_id).await?;
            info!(
                "Updated deposit {}: expected {:?} → {}, composition {:?} → {}",
                deposit.deposit_id,
                deposit.expected_total,
                record.total(),
                deposit.expected_composition.map(|c| c.to_string()),
                record.composition()
            );
            summary.details.push(ReconcileDetail {
                deposit_id: deposit.deposit_id.clone(),
                route_label: deposit.route_label.clone(),
                route_id,
                old_expected_total: deposit.expected_total,
                new_expected_total: record.total(),
                old_composition: deposit.expected_composition,
                new_composition: record.composition(),
                state: refreshed.state,
            });
        }

        info!(
            "Reconciliation complete for {}: {} processed, {} extracted, {} matched, {} updated",
            date, summary.processed, summary.extracted, summary.matched, summary.updated
        );

        Ok(summary)
    }
}

/// Index valuation records by route id, dropping all-zero rows
fn index_by_route(records: Vec<ValuationRecord>) -> HashMap<u32, ValuationRecord> {
    records
        .into_iter()
        .filter(|record| !record.is_empty())
        .map(|record| (record.route_id, record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use async_trait::async_trait;
    use chrono::Utc;
    use deposit_core::{Deposit, MemoryDepositStore};
    use rust_decimal_macros::dec;

    struct FixedSource(Vec<ValuationRecord>);

    #[async_trait]
    impl ValuationSource for FixedSource {
        async fn fetch(&self, _date: NaiveDate) -> Result<Vec<ValuationRecord>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ValuationSource for FailingSource {
        async fn fetch(&self, _date: NaiveDate) -> Result<Vec<ValuationRecord>> {
            Err(Error::Upstream {
                status_code: 503,
                message: "maintenance".to_string(),
            })
        }
    }

    fn record(route_id: u32, cash: Decimal, check: Decimal, retention: Decimal) -> ValuationRecord {
        ValuationRecord {
            route_id,
            cash,
            check,
            retention,
        }
    }

    async fn store_with(labels: &[(&str, &str)]) -> Arc<MemoryDepositStore> {
        let store = Arc::new(MemoryDepositStore::new());
        for (id, label) in labels {
            store
                .upsert_deposit(Deposit::new(
                    *id,
                    "L-EJU-001",
                    Some(label.to_string()),
                    dec!(1000),
                    Utc::now(),
                ))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_reconcile_matches_and_updates() {
        let store = store_with(&[("D-1", "42, RTO 042"), ("D-2", "sin numero"), ("D-3", "99, RTO 099")]).await;
        let source = Arc::new(FixedSource(vec![
            record(42, dec!(1000), dec!(2000), dec!(3000)),
            record(7, dec!(500), Decimal::ZERO, Decimal::ZERO),
            // All-zero row must be dropped before indexing
            record(99, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        ]));

        let engine = ReconciliationEngine::new(source, store.clone());
        let summary = engine.reconcile(Utc::now().date_naive()).await.unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.extracted, 2); // D-2 has no digits
        assert_eq!(summary.matched, 1); // route 99 was all-zero
        assert_eq!(summary.updated, 1);

        let deposit = store.deposit("D-1").await.unwrap();
        assert_eq!(deposit.expected_total, Some(dec!(6000)));
        assert_eq!(deposit.expected_cash, Some(dec!(1000)));
        assert_eq!(
            deposit.expected_composition.unwrap().to_string(),
            "cash+check+retention"
        );
        // No paperwork attached: the write recomputed the state to READY
        assert_eq!(deposit.state, DepositState::Ready);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = store_with(&[("D-1", "42, RTO 042")]).await;
        let source = Arc::new(FixedSource(vec![record(
            42,
            dec!(1000),
            dec!(2000),
            dec!(3000),
        )]));

        let engine = ReconciliationEngine::new(source, store);
        let date = Utc::now().date_naive();

        let first = engine.reconcile(date).await.unwrap();
        assert_eq!(first.updated, 1);

        let second = engine.reconcile(date).await.unwrap();
        assert_eq!(second.updated, 0);
        assert!(second.details.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_pass() {
        let store = store_with(&[("D-1", "42, RTO 042")]).await;
        let engine = ReconciliationEngine::new(Arc::new(FailingSource), store.clone());

        let result = engine.reconcile(Utc::now().date_naive()).await;
        assert!(matches!(
            result,
            Err(Error::Upstream {
                status_code: 503,
                ..
            })
        ));

        // Nothing was written
        let deposit = store.deposit("D-1").await.unwrap();
        assert!(deposit.expected_total.is_none());
    }
}
