//! Shared value types referenced by the validator, code generator and
//! runtime: comparators, match types, address parts, and script names.

use std::fmt;

/// A comparator identifier (§4.9). Core set is `i;octet` and
/// `i;ascii-casemap`; extensions (`comparator-i;ascii-numeric`) register
/// more under the same namespace via `Comparator::Named`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// Octet-exact comparison.
    Octet,
    /// Case-insensitive ASCII comparison. The default comparator.
    AsciiCasemap,
    /// Any other registered comparator name (e.g. `i;ascii-numeric`).
    Named(String),
}

impl Default for Comparator {
    fn default() -> Self {
        Comparator::AsciiCasemap
    }
}

impl Comparator {
    pub fn from_name(name: &str) -> Self {
        match name {
            "i;octet" => Comparator::Octet,
            "i;ascii-casemap" => Comparator::AsciiCasemap,
            other => Comparator::Named(other.to_owned()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Comparator::Octet => "i;octet",
            Comparator::AsciiCasemap => "i;ascii-casemap",
            Comparator::Named(n) => n,
        }
    }

    /// Whether this comparator declares `substring_match`, required by
    /// `:contains` (§4.9).
    pub fn supports_substring_match(&self) -> bool {
        !matches!(self, Comparator::Named(n) if n == "i;ascii-numeric")
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Match-type predicate family (§4.9, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchType {
    Is,
    Contains,
    Matches,
    /// Extension-provided: `:count`, `:value`, `:regex`, carrying the
    /// relational operator string for `:count`/`:value` (e.g. `"gt"`).
    Count(RelationalMatch),
    Value(RelationalMatch),
    Regex,
}

/// Relational operator accepted by `:count "op"` / `:value "op"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationalMatch {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl RelationalMatch {
    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "gt" => RelationalMatch::Gt,
            "ge" => RelationalMatch::Ge,
            "lt" => RelationalMatch::Lt,
            "le" => RelationalMatch::Le,
            "eq" => RelationalMatch::Eq,
            "ne" => RelationalMatch::Ne,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationalMatch::Gt => "gt",
            RelationalMatch::Ge => "ge",
            RelationalMatch::Lt => "lt",
            RelationalMatch::Le => "le",
            RelationalMatch::Eq => "eq",
            RelationalMatch::Ne => "ne",
        }
    }
}

impl Default for MatchType {
    fn default() -> Self {
        MatchType::Is
    }
}

impl MatchType {
    pub fn tag_name(&self) -> &'static str {
        match self {
            MatchType::Is => ":is",
            MatchType::Contains => ":contains",
            MatchType::Matches => ":matches",
            MatchType::Count(_) => ":count",
            MatchType::Value(_) => ":value",
            MatchType::Regex => ":regex",
        }
    }

    /// Encode as the wire string stored in a `MatchType` operand
    /// (`sieve-bytecode::Operand::MatchType`); relational variants append
    /// `:op` so the interpreter can recover the comparison without a
    /// second operand.
    pub fn to_wire(&self) -> String {
        match self {
            MatchType::Count(op) => format!("count:{}", op.as_str()),
            MatchType::Value(op) => format!("value:{}", op.as_str()),
            other => other.tag_name()[1..].to_owned(),
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Some(if let Some(op) = s.strip_prefix("count:") {
            MatchType::Count(RelationalMatch::from_str(op)?)
        } else if let Some(op) = s.strip_prefix("value:") {
            MatchType::Value(RelationalMatch::from_str(op)?)
        } else {
            match s {
                "is" => MatchType::Is,
                "contains" => MatchType::Contains,
                "matches" => MatchType::Matches,
                "regex" => MatchType::Regex,
                _ => return None,
            }
        })
    }
}

/// Address-part selector (§4.9, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressPart {
    All,
    LocalPart,
    Domain,
    /// Extension-provided `:user`/`:detail`, `subaddress` extension.
    User,
    Detail,
}

impl Default for AddressPart {
    fn default() -> Self {
        AddressPart::All
    }
}

impl AddressPart {
    pub fn tag_name(&self) -> &'static str {
        match self {
            AddressPart::All => ":all",
            AddressPart::LocalPart => ":localpart",
            AddressPart::Domain => ":domain",
            AddressPart::User => ":user",
            AddressPart::Detail => ":detail",
        }
    }

    pub fn to_wire(&self) -> &'static str {
        &self.tag_name()[1..]
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "all" => AddressPart::All,
            "localpart" => AddressPart::LocalPart,
            "domain" => AddressPart::Domain,
            "user" => AddressPart::User,
            "detail" => AddressPart::Detail,
            _ => return None,
        })
    }
}

/// A validated Sieve script name (§6): UTF-8, 1..256 code points, no
/// control characters, no U+2028/U+2029, no `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptName(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScriptNameError {
    #[error("script name is empty")]
    Empty,
    #[error("script name exceeds 256 Unicode code points")]
    TooLong,
    #[error("script name contains a disallowed character {0:?}")]
    DisallowedChar(char),
}

impl ScriptName {
    pub fn new(name: impl Into<String>) -> Result<Self, ScriptNameError> {
        let name = name.into();
        let len = name.chars().count();
        if len == 0 {
            return Err(ScriptNameError::Empty);
        }
        if len > 256 {
            return Err(ScriptNameError::TooLong);
        }
        for c in name.chars() {
            if is_disallowed(c) {
                return Err(ScriptNameError::DisallowedChar(c));
            }
        }
        Ok(ScriptName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_disallowed(c: char) -> bool {
    let cp = c as u32;
    matches!(cp, 0x0000..=0x001F | 0x007F | 0x0080..=0x009F | 0x00FF)
        || c == '\u{2028}'
        || c == '\u{2029}'
        || c == '/'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_name_rejects_slash() {
        assert_eq!(
            ScriptName::new("a/b").unwrap_err(),
            ScriptNameError::DisallowedChar('/')
        );
    }

    #[test]
    fn script_name_rejects_control_chars() {
        assert!(ScriptName::new("bad\u{0007}name").is_err());
    }

    #[test]
    fn script_name_rejects_line_separator() {
        assert!(ScriptName::new("bad\u{2028}name").is_err());
    }

    #[test]
    fn script_name_accepts_ordinary_unicode() {
        assert!(ScriptName::new("spam-filter-\u{00e9}").is_ok());
    }

    #[test]
    fn script_name_rejects_empty_and_too_long() {
        assert_eq!(ScriptName::new("").unwrap_err(), ScriptNameError::Empty);
        let long = "a".repeat(257);
        assert_eq!(ScriptName::new(long).unwrap_err(), ScriptNameError::TooLong);
    }

    #[test]
    fn comparator_default_is_ascii_casemap() {
        assert_eq!(Comparator::default(), Comparator::AsciiCasemap);
        assert_eq!(Comparator::from_name("i;octet"), Comparator::Octet);
    }

    #[test]
    fn match_type_wire_roundtrips_including_relational() {
        for mt in [
            MatchType::Is,
            MatchType::Contains,
            MatchType::Matches,
            MatchType::Regex,
            MatchType::Count(RelationalMatch::Gt),
            MatchType::Value(RelationalMatch::Eq),
        ] {
            assert_eq!(MatchType::from_wire(&mt.to_wire()), Some(mt));
        }
    }

    #[test]
    fn address_part_wire_roundtrips() {
        for ap in [
            AddressPart::All,
            AddressPart::LocalPart,
            AddressPart::Domain,
            AddressPart::User,
            AddressPart::Detail,
        ] {
            assert_eq!(AddressPart::from_wire(ap.to_wire()), Some(ap));
        }
    }
}
