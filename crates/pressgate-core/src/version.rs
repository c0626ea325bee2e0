//! Dotted-numeric version ordering.
//!
//! Versions are compared component by component as non-negative integers,
//! so `2.10` is newer than `2.9`. Components are compared without parsing,
//! which keeps arbitrarily long digit runs well-defined. Missing trailing
//! components count as zero (`1.0` equals `1.0.0`).
//!
//! Callers are expected to have validated the format with
//! [`crate::validate::is_valid_version`]; non-digit input still yields a
//! total order but carries no meaning.

use std::cmp::Ordering;

/// Compare two dotted-numeric version strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let ord = compare_component(l.unwrap_or("0"), r.unwrap_or("0"));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Returns `true` when `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}

fn compare_component(a: &str, b: &str) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(s: &str) -> &str {
    let trimmed = s.trim_start_matches('0');
    if trimmed.is_empty() { "0" } else { trimmed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_not_lexicographic() {
        assert_eq!(compare_versions("2.10", "2.9"), Ordering::Greater);
        assert_eq!(compare_versions("2.9", "2.10"), Ordering::Less);
        assert_eq!(compare_versions("10.0", "9.9.9"), Ordering::Greater);
    }

    #[test]
    fn equal_versions() {
        assert_eq!(compare_versions("1.2.3", "1.2.3"), Ordering::Equal);
        assert_eq!(compare_versions("01.2", "1.02"), Ordering::Equal);
    }

    #[test]
    fn missing_components_are_zero() {
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1", "1.0.1"), Ordering::Less);
        assert_eq!(compare_versions("1.0.1", "1"), Ordering::Greater);
    }

    #[test]
    fn long_components_do_not_overflow() {
        assert_eq!(
            compare_versions("1.99999999999999999999999", "1.99999999999999999999998"),
            Ordering::Greater
        );
    }

    #[test]
    fn is_newer_is_strict() {
        assert!(is_newer("2.0", "1.0"));
        assert!(!is_newer("2.0", "2.0"));
        assert!(!is_newer("1.9", "2.0"));
    }
}
