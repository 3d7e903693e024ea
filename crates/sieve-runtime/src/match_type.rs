//! Match-type evaluation (§4.9): `:is`/`:contains` via the comparator;
//! `:matches`/`:regex` via a `regex-automata` DFA compiled once per test
//! (the glob alphabet `?`/`*` is translated to an anchored regex pattern
//! at compile time, not interpreted char-by-char at match time — the
//! `regex-automata` idiom `plotnik-vm` uses for predicate evaluation);
//! `:count`/`:value` via the relational extension's operator set.

use regex_automata::meta::Regex;

use sieve_core::primitives::{Comparator, MatchType, RelationalMatch};

use crate::comparator;

/// The outcome of evaluating one match-type against a value/key list
/// pair. `captures` is non-empty only after a successful `:matches`/
/// `:regex`: index 0 is the whole match, `1..` are wildcard/regex groups
/// in source order (§4.9 "Match values").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub matched: bool,
    pub captures: Vec<Option<String>>,
}

pub fn evaluate(match_type: &MatchType, cmp: &Comparator, values: &[String], keys: &[String]) -> MatchOutcome {
    match match_type {
        MatchType::Is => simple(values, keys, |v, k| comparator::equal(cmp, v, k)),
        MatchType::Contains => simple(values, keys, |v, k| comparator::contains(cmp, v, k)),
        MatchType::Matches => pattern_match(values, keys, true, cmp),
        MatchType::Regex => pattern_match(values, keys, false, cmp),
        MatchType::Count(op) => {
            let count = values.len() as i64;
            let matched = keys
                .iter()
                .any(|k| k.trim().parse::<i64>().is_ok_and(|n| relational_compare(count, n, *op)));
            MatchOutcome { matched, captures: Vec::new() }
        }
        MatchType::Value(op) => {
            let matched = values
                .iter()
                .any(|v| keys.iter().any(|k| value_relational(v, k, cmp, *op)));
            MatchOutcome { matched, captures: Vec::new() }
        }
    }
}

fn simple(values: &[String], keys: &[String], pred: impl Fn(&str, &str) -> bool) -> MatchOutcome {
    let matched = values.iter().any(|v| keys.iter().any(|k| pred(v, k)));
    MatchOutcome { matched, captures: Vec::new() }
}

/// `glob = true` selects Sieve-glob translation (`:matches`, whole-value
/// anchored match); `glob = false` uses the key as a raw regex searched
/// as a substring (`:regex`), per the `regex` extension. Both fold case
/// per `cmp`: the default comparator is `i;ascii-casemap`, so an
/// unqualified `:matches`/`:regex` test must be case-insensitive.
fn pattern_match(values: &[String], keys: &[String], glob: bool, cmp: &Comparator) -> MatchOutcome {
    let fold_case = matches!(cmp, Comparator::AsciiCasemap);
    let compiled: Vec<(Regex, usize)> = keys
        .iter()
        .filter_map(|k| {
            let (pattern, groups) = if glob {
                glob_to_regex(k)
            } else {
                (k.clone(), count_capture_groups(k))
            };
            let pattern = if fold_case { format!("(?i){pattern}") } else { pattern };
            Regex::new(&pattern).ok().map(|re| (re, groups))
        })
        .collect();

    for v in values {
        for (re, group_count) in &compiled {
            if !re.is_match(v.as_str()) {
                continue;
            }
            let mut caps = re.create_captures();
            re.captures(v.as_str(), &mut caps);
            let groups = (0..=*group_count)
                .map(|i| caps.get_group(i).map(|span| v[span.start..span.end].to_owned()))
                .collect();
            return MatchOutcome { matched: true, captures: groups };
        }
    }
    MatchOutcome { matched: false, captures: Vec::new() }
}

/// Translate a Sieve glob (`?` one char, `*` any run, else literal) into
/// an anchored regex, returning the pattern and the number of wildcard
/// capture groups it introduced (in source order).
pub fn glob_to_regex(glob: &str) -> (String, usize) {
    let mut out = String::from("^");
    let mut groups = 0usize;
    for c in glob.chars() {
        match c {
            '?' => {
                groups += 1;
                out.push_str("(.)");
            }
            '*' => {
                groups += 1;
                out.push_str("(.*)");
            }
            '\\' | '.' | '+' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('$');
    (out, groups)
}

/// Counts capturing groups in a raw `:regex` pattern (§4.9 "Match
/// values": `:regex` contributes `${1..n}` the same way `:matches`'s
/// wildcards do). Non-capturing groups (`(?:`), lookaround assertions
/// (`(?=`, `(?!`, `(?<=`, `(?<!`) and escaped parens don't count;
/// ordinary and named (`(?<name>`, `(?P<name>`) groups do.
fn count_capture_groups(pattern: &str) -> usize {
    let bytes = pattern.as_bytes();
    let mut count = 0;
    let mut i = 0;
    let mut escaped = false;
    while i < bytes.len() {
        let c = bytes[i];
        if escaped {
            escaped = false;
            i += 1;
            continue;
        }
        match c {
            b'\\' => escaped = true,
            b'(' => {
                let rest = &pattern[i + 1..];
                let non_capturing = rest.starts_with("?:")
                    || rest.starts_with("?=")
                    || rest.starts_with("?!")
                    || rest.starts_with("?<=")
                    || rest.starts_with("?<!");
                if !non_capturing {
                    count += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    count
}

fn relational_compare(a: i64, b: i64, op: RelationalMatch) -> bool {
    match op {
        RelationalMatch::Gt => a > b,
        RelationalMatch::Ge => a >= b,
        RelationalMatch::Lt => a < b,
        RelationalMatch::Le => a <= b,
        RelationalMatch::Eq => a == b,
        RelationalMatch::Ne => a != b,
    }
}

fn value_relational(value: &str, key: &str, cmp: &Comparator, op: RelationalMatch) -> bool {
    if let (Ok(v), Ok(k)) = (value.trim().parse::<i64>(), key.trim().parse::<i64>()) {
        return relational_compare(v, k, op);
    }
    let ordering = if matches!(cmp, Comparator::AsciiCasemap) {
        value.to_ascii_lowercase().cmp(&key.to_ascii_lowercase())
    } else {
        value.cmp(key)
    };
    use std::cmp::Ordering::*;
    match op {
        RelationalMatch::Gt => ordering == Greater,
        RelationalMatch::Ge => ordering != Less,
        RelationalMatch::Lt => ordering == Less,
        RelationalMatch::Le => ordering != Greater,
        RelationalMatch::Eq => ordering == Equal,
        RelationalMatch::Ne => ordering != Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_star_captures_remainder() {
        let outcome = evaluate(
            &MatchType::Matches,
            &Comparator::AsciiCasemap,
            &["hello*".to_owned()],
            &["s*".to_owned()],
        );
        // "hello*" matched against "s*" -> no match since first char isn't 's'.
        assert!(!outcome.matched);
    }

    #[test]
    fn glob_star_matches_and_captures_group() {
        let outcome = evaluate(
            &MatchType::Matches,
            &Comparator::AsciiCasemap,
            &["to+news@example.com".to_owned()],
            &["*+*@example.com".to_owned()],
        );
        assert!(outcome.matched);
        assert_eq!(outcome.captures[1].as_deref(), Some("to"));
        assert_eq!(outcome.captures[2].as_deref(), Some("news"));
    }

    #[test]
    fn is_match_respects_comparator() {
        let outcome = evaluate(
            &MatchType::Is,
            &Comparator::AsciiCasemap,
            &["yes".to_owned()],
            &["YES".to_owned()],
        );
        assert!(outcome.matched);
    }

    #[test]
    fn count_relational_operator() {
        let outcome = evaluate(
            &MatchType::Count(RelationalMatch::Ge),
            &Comparator::AsciiCasemap,
            &["a".to_owned(), "b".to_owned()],
            &["2".to_owned()],
        );
        assert!(outcome.matched);
    }

    #[test]
    fn value_relational_numeric() {
        let outcome = evaluate(
            &MatchType::Value(RelationalMatch::Gt),
            &Comparator::AsciiCasemap,
            &["10".to_owned()],
            &["3".to_owned()],
        );
        assert!(outcome.matched);
    }

    #[test]
    fn matches_is_case_insensitive_under_default_comparator() {
        let outcome = evaluate(
            &MatchType::Matches,
            &Comparator::AsciiCasemap,
            &["Summer sale!".to_owned()],
            &["*Sale*".to_owned()],
        );
        assert!(outcome.matched);
    }

    #[test]
    fn matches_is_case_sensitive_under_octet_comparator() {
        let outcome = evaluate(
            &MatchType::Matches,
            &Comparator::Octet,
            &["Summer sale!".to_owned()],
            &["*Sale*".to_owned()],
        );
        assert!(!outcome.matched);
    }

    #[test]
    fn regex_captures_groups() {
        let outcome = evaluate(
            &MatchType::Regex,
            &Comparator::AsciiCasemap,
            &["order-4471".to_owned()],
            &[r"order-(\d+)".to_owned()],
        );
        assert!(outcome.matched);
        assert_eq!(outcome.captures[1].as_deref(), Some("4471"));
    }

    #[test]
    fn regex_is_case_insensitive_under_default_comparator() {
        let outcome = evaluate(
            &MatchType::Regex,
            &Comparator::AsciiCasemap,
            &["Summer sale!".to_owned()],
            &["sale".to_owned()],
        );
        assert!(outcome.matched);
    }
}
