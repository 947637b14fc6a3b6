//! Best-effort numeric extraction
//!
//! The legacy schema expects integer codes in fields that upstream systems
//! fill with free text ("001", "Suc. 12", sometimes nothing). All such
//! coercions funnel through this module so the fallback policy is auditable
//! in one place.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

lazy_static! {
    static ref DIGIT_RUN: Regex = Regex::new(r"\d+").expect("static digit-run pattern");
}

/// First run of digits in `text`, if any.
///
/// Runs too long for a `u64` are treated as no match.
pub fn first_digit_run(text: &str) -> Option<u64> {
    DIGIT_RUN
        .find(text)
        .and_then(|m| m.as_str().parse::<u64>().ok())
}

/// Coerce a numeric-looking text field to the integer code the legacy
/// schema expects. Extracts the first digit run; when none exists the
/// field falls back to zero with one logged warning.
pub fn coerce_code(field: &str, raw: &str) -> i64 {
    match first_digit_run(raw) {
        Some(value) => value as i64,
        None => {
            warn!("No digits in {} field {:?}, coercing to 0", field, raw);
            0
        }
    }
}
