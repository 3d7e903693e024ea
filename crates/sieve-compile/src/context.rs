//! Match context attached to a test by the validator (§4.5): the
//! effective comparator, match-type, and address-part, with defaults per
//! §4.9 — `i;ascii-casemap` (or `i;octet` for a few tests that default
//! differently in real Sieve; this workspace applies the common default
//! uniformly and documents the simplification in DESIGN.md), `:is`, and
//! `:all`.

use sieve_core::primitives::{AddressPart, Comparator, MatchType};

#[derive(Debug, Clone, Default)]
pub struct MatchContext {
    pub comparator: Comparator,
    pub match_type: MatchType,
    pub address_part: AddressPart,
}

impl MatchContext {
    pub fn new() -> Self {
        Self {
            comparator: Comparator::default(),
            match_type: MatchType::default(),
            address_part: AddressPart::default(),
        }
    }
}
