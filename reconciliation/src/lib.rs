//! Reconciliation Engine
//!
//! Matches noisy terminal-recorded deposit rows against the per-route
//! valuation feed and derives expected totals and composition.
//!
//! # Flow
//!
//! 1. **Fetch**: pull per-route cash/check/retention figures for a date
//!    from the valuation feed, normalizing its inconsistent key casing at
//!    the boundary.
//! 2. **Index**: drop all-zero records, index the rest by route id.
//! 3. **Match**: extract a route id from each local deposit's free-text
//!    label and look it up in the index.
//! 4. **Update**: write expected values only when something changed, then
//!    recompute the deposit's lifecycle state.
//!
//! A second pass over unchanged inputs performs zero writes. Extraction
//! and lookup misses are expected and logged; a failed external fetch
//! aborts the whole pass with a structured error.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod engine;
pub mod error;
pub mod terminal;
pub mod valuation;

// Re-exports
pub use config::Config;
pub use engine::{ReconcileDetail, ReconcileSummary, ReconciliationEngine};
pub use error::{Error, Result};
pub use valuation::{HttpValuationSource, ValuationRecord, ValuationSource};
