//! Route Closure
//!
//! Formally closes reconciled delivery routes against the legacy
//! settlement service.
//!
//! # Flow
//!
//! 1. **Envelope**: render a READY deposit and its check/retention
//!    documents into the legacy SOAP payload, byte-exact.
//! 2. **Audit**: write the payload to a per-day artifact before any
//!    network activity; every attempt leaves exactly one copy, real or
//!    simulated.
//! 3. **Dispatch**: send under a bounded timeout (or synthesize the reply
//!    in simulation), interpret the result marker tolerantly, and on
//!    success flip every deposit of the closed route to SENT.
//! 4. **Queue**: drive a batch of READY deposits with bounded retries and
//!    deliberate pacing between items; one exhausted item never aborts
//!    the rest.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod audit;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod queue;

// Re-exports
pub use config::{ClosureConfig, QueueConfig};
pub use dispatcher::{ClosureDispatcher, DispatchMode, DispatchReceipt};
pub use error::{Error, Result};
pub use queue::{BatchSummary, ItemOutcome, QueueProcessor};
