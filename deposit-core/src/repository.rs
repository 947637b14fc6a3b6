//! Deposit repository abstraction
//!
//! The persistence layer proper (SQL schema, migrations) lives outside this
//! workspace; the core consumes this trait. `MemoryDepositStore` backs tests
//! and the simulation environment.
//!
//! # Concurrency
//!
//! A surrounding scheduler may run a reconciliation pass and a dispatch
//! batch concurrently against the same date. Every read-modify-write here
//! (the compare-then-update in `update_expected`, the match-then-flip in
//! `mark_sent_matching_route`) runs entirely under the store's write lock,
//! so two passes cannot interleave and lose updates.

use crate::types::{Check, Composition, Deposit, DepositState, Retention};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Repository seam between the closure core and the persistence layer
#[async_trait]
pub trait DepositRepository: Send + Sync {
    /// Insert a deposit observed from the terminal feed, or refresh the
    /// terminal-owned fields (label, recorded amount, timestamp) of an
    /// existing row. Expected data and lifecycle state are preserved.
    async fn upsert_deposit(&self, row: Deposit) -> Result<()>;

    /// Fetch one deposit by its terminal-assigned id
    async fn deposit(&self, deposit_id: &str) -> Result<Deposit>;

    /// All deposits recorded on a calendar date
    async fn deposits_on(&self, date: NaiveDate) -> Result<Vec<Deposit>>;

    /// All deposits in `state`, optionally filtered to one calendar date
    async fn deposits_in_state(
        &self,
        state: DepositState,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Deposit>>;

    /// Attach a check to its parent deposit and recompute the parent state
    async fn add_check(&self, check: Check) -> Result<()>;

    /// Attach a retention to its parent deposit and recompute the parent state
    async fn add_retention(&self, retention: Retention) -> Result<()>;

    /// Detach a check by index and recompute the parent state
    async fn remove_check(&self, deposit_id: &str, index: usize) -> Result<()>;

    /// Detach a retention by index and recompute the parent state
    async fn remove_retention(&self, deposit_id: &str, index: usize) -> Result<()>;

    /// Child documents of a deposit
    async fn documents(&self, deposit_id: &str) -> Result<(Vec<Check>, Vec<Retention>)>;

    /// Write expected values derived from the valuation feed. Compares
    /// against stored values under the write lock and writes only when
    /// something differs, recomputing state on change. Returns whether a
    /// write happened.
    async fn update_expected(
        &self,
        deposit_id: &str,
        total: Decimal,
        cash: Decimal,
        composition: Composition,
    ) -> Result<bool>;

    /// Operator transition (PENDING ⇄ READY only)
    async fn set_state(&self, deposit_id: &str, to: DepositState) -> Result<Deposit>;

    /// Flip to SENT every READY deposit whose effective route id matches
    /// the dispatched route id. One logical route closure can cover several
    /// terminal-recorded rows. Returns the affected deposit ids.
    async fn mark_sent_matching_route(
        &self,
        route_id: u32,
        at: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    /// Administrative revert: move matching SENT deposits back to READY
    /// and clear their sent timestamps. Returns the affected deposit ids.
    async fn revert_sent(
        &self,
        date: Option<NaiveDate>,
        route_id: Option<u32>,
    ) -> Result<Vec<String>>;

    /// Deposit counts per lifecycle state
    async fn state_counts(&self) -> Result<HashMap<DepositState, usize>>;
}

#[derive(Debug, Default)]
struct StoreInner {
    deposits: HashMap<String, Deposit>,
    checks: HashMap<String, Vec<Check>>,
    retentions: HashMap<String, Vec<Retention>>,
}

impl StoreInner {
    fn has_documents(&self, deposit_id: &str) -> bool {
        self.checks.get(deposit_id).is_some_and(|c| !c.is_empty())
            || self
                .retentions
                .get(deposit_id)
                .is_some_and(|r| !r.is_empty())
    }

    fn deposit_mut(&mut self, deposit_id: &str) -> Result<&mut Deposit> {
        self.deposits
            .get_mut(deposit_id)
            .ok_or_else(|| Error::NotFound(deposit_id.to_string()))
    }
}

/// In-memory deposit store
#[derive(Debug, Default)]
pub struct MemoryDepositStore {
    inner: RwLock<StoreInner>,
}

impl MemoryDepositStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DepositRepository for MemoryDepositStore {
    async fn upsert_deposit(&self, row: Deposit) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.deposits.get_mut(&row.deposit_id) {
            Some(existing) => {
                existing.terminal_id = row.terminal_id;
                existing.route_label = row.route_label;
                existing.recorded_amount = row.recorded_amount;
                existing.recorded_at = row.recorded_at;
            }
            None => {
                inner.deposits.insert(row.deposit_id.clone(), row);
            }
        }
        Ok(())
    }

    async fn deposit(&self, deposit_id: &str) -> Result<Deposit> {
        let inner = self.inner.read().await;
        inner
            .deposits
            .get(deposit_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(deposit_id.to_string()))
    }

    async fn deposits_on(&self, date: NaiveDate) -> Result<Vec<Deposit>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Deposit> = inner
            .deposits
            .values()
            .filter(|d| d.recorded_at.date_naive() == date)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        Ok(rows)
    }

    async fn deposits_in_state(
        &self,
        state: DepositState,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Deposit>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Deposit> = inner
            .deposits
            .values()
            .filter(|d| d.state == state)
            .filter(|d| date.map_or(true, |date| d.recorded_at.date_naive() == date))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        Ok(rows)
    }

    async fn add_check(&self, check: Check) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.deposits.contains_key(&check.deposit_id) {
            return Err(Error::NotFound(check.deposit_id.clone()));
        }
        let deposit_id = check.deposit_id.clone();
        inner.checks.entry(deposit_id.clone()).or_default().push(check);
        let has_documents = inner.has_documents(&deposit_id);
        inner.deposit_mut(&deposit_id)?.recompute_state(has_documents);
        Ok(())
    }

    async fn add_retention(&self, retention: Retention) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.deposits.contains_key(&retention.deposit_id) {
            return Err(Error::NotFound(retention.deposit_id.clone()));
        }
        let deposit_id = retention.deposit_id.clone();
        inner
            .retentions
            .entry(deposit_id.clone())
            .or_default()
            .push(retention);
        let has_documents = inner.has_documents(&deposit_id);
        inner.deposit_mut(&deposit_id)?.recompute_state(has_documents);
        Ok(())
    }

    async fn remove_check(&self, deposit_id: &str, index: usize) -> Result<()> {
        let mut inner = self.inner.write().await;
        let checks = inner
            .checks
            .get_mut(deposit_id)
            .filter(|checks| index < checks.len())
            .ok_or_else(|| Error::NotFound(deposit_id.to_string()))?;
        checks.remove(index);
        let has_documents = inner.has_documents(deposit_id);
        inner.deposit_mut(deposit_id)?.recompute_state(has_documents);
        Ok(())
    }

    async fn remove_retention(&self, deposit_id: &str, index: usize) -> Result<()> {
        let mut inner = self.inner.write().await;
        let retentions = inner
            .retentions
            .get_mut(deposit_id)
            .filter(|retentions| index < retentions.len())
            .ok_or_else(|| Error::NotFound(deposit_id.to_string()))?;
        retentions.remove(index);
        let has_documents = inner.has_documents(deposit_id);
        inner.deposit_mut(deposit_id)?.recompute_state(has_documents);
        Ok(())
    }

    async fn documents(&self, deposit_id: &str) -> Result<(Vec<Check>, Vec<Retention>)> {
        let inner = self.inner.read().await;
        Ok((
            inner.checks.get(deposit_id).cloned().unwrap_or_default(),
            inner.retentions.get(deposit_id).cloned().unwrap_or_default(),
        ))
    }

    async fn update_expected(
        &self,
        deposit_id: &str,
        total: Decimal,
        cash: Decimal,
        composition: Composition,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let has_documents = inner.has_documents(deposit_id);
        let deposit = inner.deposit_mut(deposit_id)?;

        let unchanged = deposit.expected_total == Some(total)
            && deposit.expected_cash == Some(cash)
            && deposit.expected_composition == Some(composition);
        if unchanged {
            return Ok(false);
        }

        deposit.expected_total = Some(total);
        deposit.expected_cash = Some(cash);
        deposit.expected_composition = Some(composition);
        deposit.recompute_state(has_documents);
        Ok(true)
    }

    async fn set_state(&self, deposit_id: &str, to: DepositState) -> Result<Deposit> {
        let mut inner = self.inner.write().await;
        let deposit = inner.deposit_mut(deposit_id)?;
        deposit.apply_operator_state(to)?;
        Ok(deposit.clone())
    }

    async fn mark_sent_matching_route(
        &self,
        route_id: u32,
        at: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut inner = self.inner.write().await;
        let mut affected = Vec::new();
        for deposit in inner.deposits.values_mut() {
            if deposit.state == DepositState::Ready && deposit.route_id() == Some(route_id) {
                deposit.mark_sent(at)?;
                affected.push(deposit.deposit_id.clone());
            }
        }
        affected.sort();
        Ok(affected)
    }

    async fn revert_sent(
        &self,
        date: Option<NaiveDate>,
        route_id: Option<u32>,
    ) -> Result<Vec<String>> {
        let mut inner = self.inner.write().await;
        let mut affected = Vec::new();
        for deposit in inner.deposits.values_mut() {
            if deposit.state != DepositState::Sent {
                continue;
            }
            if date.is_some_and(|date| deposit.recorded_at.date_naive() != date) {
                continue;
            }
            if route_id.is_some_and(|id| deposit.route_id() != Some(id)) {
                continue;
            }
            deposit.revert_to_ready()?;
            affected.push(deposit.deposit_id.clone());
        }
        affected.sort();
        Ok(affected)
    }

    async fn state_counts(&self) -> Result<HashMap<DepositState, usize>> {
        let inner = self.inner.read().await;
        let mut counts = HashMap::new();
        for deposit in inner.deposits.values() {
            *counts.entry(deposit.state).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn deposit(id: &str, label: &str) -> Deposit {
        Deposit::new(id, "L-EJU-001", Some(label.to_string()), dec!(1000), Utc::now())
    }

    fn check(deposit_id: &str) -> Check {
        Check {
            deposit_id: deposit_id.to_string(),
            account_code: None,
            bank: Some("Banco 17".to_string()),
            branch: None,
            locality: None,
            check_number: Some("123".to_string()),
            account_number: None,
            holder: None,
            issued_on: None,
            amount: dec!(2000),
        }
    }

    #[tokio::test]
    async fn test_upsert_preserves_expected_and_state() {
        let store = MemoryDepositStore::new();
        store.upsert_deposit(deposit("001", "42, RTO 042")).await.unwrap();
        store
            .update_expected("001", dec!(6000), dec!(1000), Composition::new(true, true, true))
            .await
            .unwrap();

        // Terminal feed re-observes the same row
        let mut refreshed = deposit("001", "42, RTO 042");
        refreshed.recorded_amount = dec!(1100);
        store.upsert_deposit(refreshed).await.unwrap();

        let row = store.deposit("001").await.unwrap();
        assert_eq!(row.recorded_amount, dec!(1100));
        assert_eq!(row.expected_total, Some(dec!(6000)));
        assert_eq!(row.state, DepositState::Ready);
    }

    #[tokio::test]
    async fn test_update_expected_is_idempotent() {
        let store = MemoryDepositStore::new();
        store.upsert_deposit(deposit("001", "42, RTO 042")).await.unwrap();

        let composition = Composition::new(true, false, true);
        let first = store
            .update_expected("001", dec!(4000), dec!(1000), composition)
            .await
            .unwrap();
        let second = store
            .update_expected("001", dec!(4000), dec!(1000), composition)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_documents_force_pending() {
        let store = MemoryDepositStore::new();
        store.upsert_deposit(deposit("001", "42, RTO 042")).await.unwrap();
        store
            .update_expected("001", dec!(4000), dec!(1000), Composition::CASH_ONLY)
            .await
            .unwrap();
        assert_eq!(store.deposit("001").await.unwrap().state, DepositState::Ready);

        store.add_check(check("001")).await.unwrap();
        assert_eq!(store.deposit("001").await.unwrap().state, DepositState::Pending);

        store.remove_check("001", 0).await.unwrap();
        assert_eq!(store.deposit("001").await.unwrap().state, DepositState::Ready);
    }

    #[tokio::test]
    async fn test_mark_sent_matches_all_route_rows() {
        let store = MemoryDepositStore::new();
        // Two terminal rows for route 42, one for route 7
        store.upsert_deposit(deposit("001", "42, RTO 042")).await.unwrap();
        store.upsert_deposit(deposit("002", "RTO 042, 42")).await.unwrap();
        store.upsert_deposit(deposit("003", "7, RTO 007")).await.unwrap();
        for id in ["001", "002", "003"] {
            store.set_state(id, DepositState::Ready).await.unwrap();
        }

        let affected = store.mark_sent_matching_route(42, Utc::now()).await.unwrap();
        assert_eq!(affected, vec!["001".to_string(), "002".to_string()]);
        assert_eq!(store.deposit("003").await.unwrap().state, DepositState::Ready);
    }

    #[tokio::test]
    async fn test_revert_sent_by_date_and_route() {
        let store = MemoryDepositStore::new();
        store.upsert_deposit(deposit("001", "42, RTO 042")).await.unwrap();
        store.set_state("001", DepositState::Ready).await.unwrap();
        store.mark_sent_matching_route(42, Utc::now()).await.unwrap();

        let affected = store
            .revert_sent(Some(Utc::now().date_naive()), Some(42))
            .await
            .unwrap();
        assert_eq!(affected, vec!["001".to_string()]);

        let row = store.deposit("001").await.unwrap();
        assert_eq!(row.state, DepositState::Ready);
        assert!(row.sent_at.is_none());
    }

    #[tokio::test]
    async fn test_state_counts() {
        let store = MemoryDepositStore::new();
        store.upsert_deposit(deposit("001", "1, RTO 001")).await.unwrap();
        store.upsert_deposit(deposit("002", "2, RTO 002")).await.unwrap();
        store.set_state("002", DepositState::Ready).await.unwrap();

        let counts = store.state_counts().await.unwrap();
        assert_eq!(counts.get(&DepositState::Pending), Some(&1));
        assert_eq!(counts.get(&DepositState::Ready), Some(&1));
        assert_eq!(counts.get(&DepositState::Sent), None);
    }

    #[tokio::test]
    async fn test_state_filter_by_date() {
        let store = MemoryDepositStore::new();
        store.upsert_deposit(deposit("001", "42, RTO 042")).await.unwrap();
        store.set_state("001", DepositState::Ready).await.unwrap();

        let today = Utc::now().date_naive();
        let ready = store
            .deposits_in_state(DepositState::Ready, Some(today))
            .await
            .unwrap();
        assert_eq!(ready.len(), 1);

        let other_day = today.pred_opt().unwrap();
        let ready = store
            .deposits_in_state(DepositState::Ready, Some(other_day))
            .await
            .unwrap();
        assert!(ready.is_empty());
    }
}
