//! Deposit lifecycle state machine
//!
//! The gating rule is paperwork-based: the presence of ANY attached check
//! or retention forces PENDING regardless of whether amounts reconcile.
//! The numeric expected-vs-recorded difference never gates a transition.

use crate::types::{Deposit, DepositState};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

impl Deposit {
    /// Recompute the automatic PENDING/READY state. Invoked whenever the
    /// set of attached documents or the expected data change. SENT deposits
    /// are left untouched; only an explicit revert moves them.
    pub fn recompute_state(&mut self, has_documents: bool) {
        if self.state == DepositState::Sent {
            return;
        }
        self.state = if has_documents {
            DepositState::Pending
        } else {
            DepositState::Ready
        };
    }

    /// Operator-driven transition. Only PENDING ⇄ READY is editable;
    /// everything else is rejected explicitly.
    pub fn apply_operator_state(&mut self, to: DepositState) -> Result<()> {
        let allowed = matches!(
            (self.state, to),
            (DepositState::Pending, DepositState::Ready)
                | (DepositState::Ready, DepositState::Pending)
        );
        if !allowed {
            return Err(Error::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Flip to SENT after a successful closure dispatch. Rejected unless
    /// the deposit is READY.
    pub fn mark_sent(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.state != DepositState::Ready {
            return Err(Error::NotReady {
                deposit_id: self.deposit_id.clone(),
                state: self.state,
            });
        }
        self.state = DepositState::Sent;
        self.sent_at = Some(at);
        Ok(())
    }

    /// Administrative revert: SENT back to READY, clearing the sent
    /// timestamp so a later queue run may dispatch again.
    pub fn revert_to_ready(&mut self) -> Result<()> {
        if self.state != DepositState::Sent {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: DepositState::Ready,
            });
        }
        self.state = DepositState::Ready;
        self.sent_at = None;
        Ok(())
    }
}
