//! Domain types for deposits and their attached documents

use crate::numeric::first_digit_run;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Deposit lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositState {
    /// Paperwork outstanding, not eligible for closure
    Pending,
    /// Eligible for closure dispatch
    Ready,
    /// Closed against the legacy settlement service
    Sent,
}

impl std::fmt::Display for DepositState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepositState::Pending => write!(f, "PENDING"),
            DepositState::Ready => write!(f, "READY"),
            DepositState::Sent => write!(f, "SENT"),
        }
    }
}

impl std::str::FromStr for DepositState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(DepositState::Pending),
            "READY" => Ok(DepositState::Ready),
            "SENT" => Ok(DepositState::Sent),
            other => Err(Error::UnknownState(other.to_string())),
        }
    }
}

/// Expected value composition of a route: which of cash, check and
/// retention the valuation feed reported as positive.
///
/// Renders in fixed member order (`cash`, `check`, `retention`) joined
/// with `+`; an all-absent composition renders as cash-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Composition {
    /// Cash figure was positive
    pub cash: bool,
    /// Check figure was positive
    pub check: bool,
    /// Retention figure was positive
    pub retention: bool,
}

impl Composition {
    /// Cash-only composition (the default when no figure is positive)
    pub const CASH_ONLY: Composition = Composition {
        cash: true,
        check: false,
        retention: false,
    };

    /// Build from member flags; all-false collapses to cash-only
    pub fn new(cash: bool, check: bool, retention: bool) -> Self {
        if !cash && !check && !retention {
            return Self::CASH_ONLY;
        }
        Self {
            cash,
            check,
            retention,
        }
    }

    /// Whether this is the cash-only composition
    pub fn is_cash_only(&self) -> bool {
        *self == Self::CASH_ONLY
    }
}

impl std::fmt::Display for Composition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut members = Vec::with_capacity(3);
        if self.cash {
            members.push("cash");
        }
        if self.check {
            members.push("check");
        }
        if self.retention {
            members.push("retention");
        }
        if members.is_empty() {
            members.push("cash");
        }
        write!(f, "{}", members.join("+"))
    }
}

impl std::str::FromStr for Composition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut composition = Composition {
            cash: false,
            check: false,
            retention: false,
        };
        for member in s.split('+') {
            match member.trim() {
                "cash" => composition.cash = true,
                "check" => composition.check = true,
                "retention" => composition.retention = true,
                _ => return Err(Error::UnknownComposition(s.to_string())),
            }
        }
        Ok(Composition::new(
            composition.cash,
            composition.check,
            composition.retention,
        ))
    }
}

impl From<Composition> for String {
    fn from(composition: Composition) -> Self {
        composition.to_string()
    }
}

impl TryFrom<String> for Composition {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// A banking-terminal deposit record: the unit being reconciled and closed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    /// Terminal-assigned deposit identifier (may carry leading zeros)
    pub deposit_id: String,

    /// Identifier of the terminal that recorded the deposit
    pub terminal_id: String,

    /// Raw free-text route label as captured by the terminal.
    /// Alternates unpredictably between "ID, LABEL" and "LABEL, ID".
    pub route_label: Option<String>,

    /// Cash amount counted by the terminal
    pub recorded_amount: Decimal,

    /// Expected total (cash + check + retention) from the valuation feed
    pub expected_total: Option<Decimal>,

    /// Expected cash-only amount from the valuation feed
    pub expected_cash: Option<Decimal>,

    /// Expected composition from the valuation feed
    pub expected_composition: Option<Composition>,

    /// Lifecycle state
    pub state: DepositState,

    /// When the terminal recorded the deposit
    pub recorded_at: DateTime<Utc>,

    /// When the deposit was closed against the legacy service
    pub sent_at: Option<DateTime<Utc>>,
}

impl Deposit {
    /// New deposit as observed from the terminal feed
    pub fn new(
        deposit_id: impl Into<String>,
        terminal_id: impl Into<String>,
        route_label: Option<String>,
        recorded_amount: Decimal,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            deposit_id: deposit_id.into(),
            terminal_id: terminal_id.into(),
            route_label,
            recorded_amount,
            expected_total: None,
            expected_cash: None,
            expected_composition: None,
            state: DepositState::Pending,
            recorded_at,
            sent_at: None,
        }
    }

    /// Effective route id: extractor over the label, falling back to the
    /// first digit run of the terminal-assigned id (`"009"` → `9`).
    pub fn route_id(&self) -> Option<u32> {
        crate::extract::route_id_from_label(self.route_label.as_deref())
            .or_else(|| first_digit_run(&self.deposit_id).map(|id| id as u32))
    }

    /// Cash figure to close with: expected cash when reconciled, otherwise
    /// the terminal-recorded amount.
    pub fn closing_cash(&self) -> Decimal {
        self.expected_cash.unwrap_or(self.recorded_amount)
    }

    /// Informational gap between expected and recorded totals.
    /// Never participates in state gating.
    pub fn difference(&self) -> Option<Decimal> {
        self.expected_total
            .map(|expected| expected - self.recorded_amount)
    }
}

/// A check attached to a deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    /// Parent deposit identifier
    pub deposit_id: String,
    /// Ledger account code
    pub account_code: Option<i64>,
    /// Issuing bank code (free text, coerced on the wire)
    pub bank: Option<String>,
    /// Branch code
    pub branch: Option<String>,
    /// Locality code
    pub locality: Option<String>,
    /// Check number
    pub check_number: Option<String>,
    /// Account number
    pub account_number: Option<i64>,
    /// Account holder name
    pub holder: Option<String>,
    /// Issue date as captured (ISO or day/month/year text)
    pub issued_on: Option<String>,
    /// Check amount
    pub amount: Decimal,
}

/// A tax-withholding retention attached to a deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retention {
    /// Parent deposit identifier
    pub deposit_id: String,
    /// Ledger account code
    pub account_code: Option<i64>,
    /// Withholding concept code
    pub concept: Option<String>,
    /// Retention document number
    pub retention_number: Option<String>,
    /// Issue date as captured (ISO or day/month/year text)
    pub issued_on: Option<String>,
    /// Retention amount
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_composition_order_stable() {
        let composition = Composition::new(true, false, true);
        assert_eq!(composition.to_string(), "cash+retention");

        let full = Composition::new(true, true, true);
        assert_eq!(full.to_string(), "cash+check+retention");
    }

    #[test]
    fn test_composition_defaults_to_cash_only() {
        let composition = Composition::new(false, false, false);
        assert!(composition.is_cash_only());
        assert_eq!(composition.to_string(), "cash");
    }

    #[test]
    fn test_composition_round_trip() {
        let composition: Composition = "check+retention".parse().unwrap();
        assert!(!composition.cash);
        assert!(composition.check);
        assert!(composition.retention);
        assert!("cash+cheque".parse::<Composition>().is_err());
    }

    #[test]
    fn test_route_id_falls_back_to_deposit_id() {
        let mut deposit = Deposit::new("009", "L-EJU-001", None, dec!(1000), Utc::now());
        assert_eq!(deposit.route_id(), Some(9));

        deposit.route_label = Some("42, RTO 042".to_string());
        assert_eq!(deposit.route_id(), Some(42));
    }

    #[test]
    fn test_closing_cash_prefers_expected() {
        let mut deposit = Deposit::new("001", "L-EJU-001", None, dec!(5000), Utc::now());
        assert_eq!(deposit.closing_cash(), dec!(5000));

        deposit.expected_cash = Some(dec!(4500));
        assert_eq!(deposit.closing_cash(), dec!(4500));
    }

    #[test]
    fn test_difference_is_informational() {
        let mut deposit = Deposit::new("001", "L-EJU-001", None, dec!(5000), Utc::now());
        assert_eq!(deposit.difference(), None);

        deposit.expected_total = Some(dec!(6000));
        assert_eq!(deposit.difference(), Some(dec!(1000)));
    }
}
