//! Route-id extraction from noisy free-text labels
//!
//! Terminal operators key the route label inconsistently: sometimes
//! `"42, RTO 042"`, sometimes `"RTO 277, 277"`, sometimes with no comma at
//! all. The extractor prefers the segment left of the first comma, then the
//! right segment, because the id-first form is the common one and the
//! trailing segment repeats the id zero-padded.

use crate::numeric::first_digit_run;

/// Recover a numeric route id from a free-text label.
///
/// Splits on the first comma and scans the left segment for the first run
/// of digits; if the left segment has none, scans the right segment. With
/// no comma the whole string is scanned. Returns `None` when no digits
/// exist anywhere or the label is absent. Never fails; misses are the
/// caller's to log.
pub fn route_id_from_label(label: Option<&str>) -> Option<u32> {
    let label = label?;
    if label.is_empty() {
        return None;
    }

    match label.split_once(',') {
        Some((left, right)) => first_digit_run(left.trim())
            .or_else(|| first_digit_run(right.trim()))
            .map(|id| id as u32),
        None => first_digit_run(label).map(|id| id as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_before_comma() {
        assert_eq!(route_id_from_label(Some("42, RTO 042")), Some(42));
        assert_eq!(route_id_from_label(Some("1, algo más")), Some(1));
    }

    #[test]
    fn test_id_inside_left_segment() {
        assert_eq!(route_id_from_label(Some("RTO 277, 277")), Some(277));
        assert_eq!(route_id_from_label(Some("RTO 123, algo")), Some(123));
    }

    #[test]
    fn test_id_after_comma() {
        assert_eq!(route_id_from_label(Some(", 123")), Some(123));
        assert_eq!(route_id_from_label(Some("ruta sur, 88")), Some(88));
    }

    #[test]
    fn test_no_comma() {
        assert_eq!(route_id_from_label(Some("RTO 55")), Some(55));
    }

    #[test]
    fn test_no_digits_anywhere() {
        assert_eq!(route_id_from_label(Some("sin numero, nada")), None);
        assert_eq!(route_id_from_label(Some("")), None);
        assert_eq!(route_id_from_label(None), None);
    }
}
