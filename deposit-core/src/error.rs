//! Error types for the deposit core

use crate::types::DepositState;
use thiserror::Error;

/// Result type for deposit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Deposit domain errors
#[derive(Error, Debug)]
pub enum Error {
    /// Transition not allowed by the lifecycle state machine
    #[error("Invalid transition {from} → {to}")]
    InvalidTransition {
        /// Current state
        from: DepositState,
        /// Requested state
        to: DepositState,
    },

    /// Dispatch attempted on a deposit that is not READY
    #[error("Deposit {deposit_id} is {state}, not READY")]
    NotReady {
        /// Deposit identifier
        deposit_id: String,
        /// Current state
        state: DepositState,
    },

    /// Deposit not found in the repository
    #[error("Deposit not found: {0}")]
    NotFound(String),

    /// Unrecognized state label
    #[error("Unknown deposit state: {0}")]
    UnknownState(String),

    /// Unrecognized composition tag
    #[error("Unknown composition tag: {0}")]
    UnknownComposition(String),
}
