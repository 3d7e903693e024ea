//! Comparator implementations (§4.9): `i;octet` exact-octet equality,
//! `i;ascii-casemap` case-insensitive ASCII, and `i;ascii-numeric`
//! (RFC 4790) for the relational extension. Any other registered name
//! falls back to octet comparison — extending this is adding a match arm,
//! not touching the match engine's structure.

use sieve_core::primitives::Comparator;

pub fn equal(cmp: &Comparator, a: &str, b: &str) -> bool {
    match cmp {
        Comparator::Octet => a == b,
        Comparator::AsciiCasemap => a.eq_ignore_ascii_case(b),
        Comparator::Named(name) if name == "i;ascii-numeric" => ascii_numeric_eq(a, b),
        Comparator::Named(_) => a == b,
    }
}

pub fn contains(cmp: &Comparator, haystack: &str, needle: &str) -> bool {
    match cmp {
        Comparator::AsciiCasemap => haystack
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase()),
        _ => haystack.contains(needle),
    }
}

/// RFC 4790 `i;ascii-numeric`: non-numeric strings are all equal to each
/// other and less than every numeric string.
fn ascii_numeric_eq(a: &str, b: &str) -> bool {
    match (leading_digits(a), leading_digits(b)) {
        (Some(x), Some(y)) => x == y,
        (None, None) => true,
        _ => false,
    }
}

fn leading_digits(s: &str) -> Option<u64> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octet_is_case_sensitive() {
        assert!(!equal(&Comparator::Octet, "Subject", "subject"));
        assert!(equal(&Comparator::Octet, "Subject", "Subject"));
    }

    #[test]
    fn ascii_casemap_ignores_case() {
        assert!(equal(&Comparator::AsciiCasemap, "Subject", "SUBJECT"));
        assert!(contains(&Comparator::AsciiCasemap, "Summer Sale", "SALE"));
    }

    #[test]
    fn ascii_numeric_compares_leading_digits() {
        let cmp = Comparator::Named("i;ascii-numeric".into());
        assert!(equal(&cmp, "0042", "42"));
        assert!(!equal(&cmp, "42", "43"));
        assert!(equal(&cmp, "abc", "xyz"));
    }
}
