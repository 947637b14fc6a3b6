//! Deposit Core
//!
//! Domain model for route-proceeds deposits: the deposit rows observed from
//! banking terminals, their attached check/retention documents, the expected
//! composition derived from the valuation feed, and the lifecycle state
//! machine that decides when a deposit may be closed.
//!
//! # Lifecycle
//!
//! ```text
//! PENDING ⇄ READY ──dispatch──▶ SENT
//!              ▲                  │
//!              └────── revert ────┘
//! ```
//!
//! - A deposit with any attached check or retention is forced to PENDING:
//!   outstanding paperwork is the actionable signal, not the numeric gap
//!   between recorded and expected totals.
//! - READY → SENT happens only through a successful closure dispatch.
//! - SENT → READY happens only through an explicit administrative revert.
//!
//! # Invariants
//!
//! - Composition is a non-empty ordered subset over {cash, check, retention}.
//! - Recorded and expected totals are independent; their difference is
//!   informational and never gates a transition.
//! - A deposit reaches SENT once per normal flow.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod extract;
pub mod numeric;
pub mod repository;
pub mod state;
pub mod types;

// Re-exports
pub use error::{Error, Result};
pub use repository::{DepositRepository, MemoryDepositStore};
pub use types::{Check, Composition, Deposit, DepositState, Retention};
