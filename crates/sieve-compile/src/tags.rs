//! Tagged-argument scanning (§4.5 "Tagged argument contract"): the parser
//! leaves every [`sieve_syntax::ast::NodeKind::Tag`] node's `params` empty —
//! a tag's value (`:comparator "i;octet"`, `:days 7`, ...) lands as the
//! next sibling in the command/test's flat `arguments` list, exactly where
//! the grammar places it. [`scan_arguments`] walks that flat list once,
//! pairing each value-taking tag with the argument immediately following
//! it and classifying everything else (match-type/address-part keyword
//! tags, bare flags like `:copy`, and the true positional strings/numbers)
//! so `codegen.rs` never has to re-derive this pairing itself.

use std::collections::{HashMap, HashSet};

use sieve_core::diag::Diagnostics;
use sieve_core::primitives::{AddressPart, Comparator, MatchType, RelationalMatch};
use sieve_syntax::ast::{Ast, NodeId, NodeKind};

use crate::context::MatchContext;

/// Tags (other than the match-context ones) that consume the following
/// argument as their value, keyed by name.
pub const VALUE_TAKING_TAGS: &[&str] =
    &["flags", "options", "days", "subject", "handle", "message", "content"];

/// The result of one pass over a command or test's `arguments`.
pub struct ArgScan {
    pub match_ctx: MatchContext,
    /// Non-match-context value-taking tags, e.g. `tag_values["days"]`.
    pub tag_values: HashMap<String, NodeId>,
    /// Tags present with no following value consumed (`:copy`, `:over`,
    /// `:under`, and any match-context tag already folded into `match_ctx`).
    pub bare_tags: HashSet<String>,
    /// Every argument node that is neither a tag nor a tag's consumed
    /// value, in source order.
    pub positionals: Vec<NodeId>,
}

impl ArgScan {
    pub fn positional_string(&self, ast: &Ast, index: usize) -> Option<String> {
        self.positionals.get(index).and_then(|&id| node_string(ast, id))
    }

    pub fn positional_string_list(&self, ast: &Ast, index: usize) -> Vec<String> {
        self.positionals
            .get(index)
            .map(|&id| node_string_list(ast, id))
            .unwrap_or_default()
    }

    pub fn positional_number(&self, ast: &Ast, index: usize) -> Option<u64> {
        self.positionals.get(index).and_then(|&id| match &ast.get(id).kind {
            NodeKind::Number(n) => Some(*n),
            _ => None,
        })
    }

    pub fn tag_string(&self, ast: &Ast, name: &str) -> Option<String> {
        self.tag_values.get(name).and_then(|&id| node_string(ast, id))
    }

    pub fn tag_string_list(&self, ast: &Ast, name: &str) -> Option<Vec<String>> {
        self.tag_values.get(name).map(|&id| node_string_list(ast, id))
    }

    pub fn tag_number(&self, ast: &Ast, name: &str) -> Option<u64> {
        self.tag_values.get(name).and_then(|&id| match &ast.get(id).kind {
            NodeKind::Number(n) => Some(*n),
            _ => None,
        })
    }

    pub fn has_bare(&self, name: &str) -> bool {
        self.bare_tags.contains(name)
    }
}

fn node_string(ast: &Ast, id: NodeId) -> Option<String> {
    match &ast.get(id).kind {
        NodeKind::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn node_string_list(ast: &Ast, id: NodeId) -> Vec<String> {
    match &ast.get(id).kind {
        NodeKind::StringList(items) => items.iter().filter_map(|&i| node_string(ast, i)).collect(),
        NodeKind::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Walk `arguments` once, separating match-context tags, value-taking
/// tags (and the value each consumes), bare tags, and true positionals.
pub fn scan_arguments(ast: &Ast, arguments: &[NodeId], filename: &str, diag: &mut Diagnostics) -> ArgScan {
    let mut ctx = MatchContext::new();
    let mut tag_values = HashMap::new();
    let mut bare_tags = HashSet::new();
    let mut positionals = Vec::new();

    let mut i = 0;
    while i < arguments.len() {
        let id = arguments[i];
        let NodeKind::Tag { name, .. } = ast.get(id).kind.clone() else {
            positionals.push(id);
            i += 1;
            continue;
        };
        let line = ast.get(id).line;
        match name.as_str() {
            "is" => {
                ctx.match_type = MatchType::Is;
                bare_tags.insert(name);
                i += 1;
            }
            "contains" => {
                ctx.match_type = MatchType::Contains;
                bare_tags.insert(name);
                i += 1;
            }
            "matches" => {
                ctx.match_type = MatchType::Matches;
                bare_tags.insert(name);
                i += 1;
            }
            "regex" => {
                ctx.match_type = MatchType::Regex;
                bare_tags.insert(name);
                i += 1;
            }
            "all" => {
                ctx.address_part = AddressPart::All;
                bare_tags.insert(name);
                i += 1;
            }
            "localpart" => {
                ctx.address_part = AddressPart::LocalPart;
                bare_tags.insert(name);
                i += 1;
            }
            "domain" => {
                ctx.address_part = AddressPart::Domain;
                bare_tags.insert(name);
                i += 1;
            }
            "user" => {
                ctx.address_part = AddressPart::User;
                bare_tags.insert(name);
                i += 1;
            }
            "detail" => {
                ctx.address_part = AddressPart::Detail;
                bare_tags.insert(name);
                i += 1;
            }
            "comparator" => {
                match arguments.get(i + 1).and_then(|&v| node_string(ast, v)) {
                    Some(value) => {
                        ctx.comparator = Comparator::from_name(&value);
                        i += 2;
                    }
                    None => {
                        diag.error(filename, line, "':comparator' requires a string parameter");
                        i += 1;
                    }
                }
            }
            "count" | "value" => {
                match arguments.get(i + 1).and_then(|&v| node_string(ast, v)) {
                    Some(value) => {
                        let op = RelationalMatch::from_str(&value).unwrap_or_else(|| {
                            diag.error(
                                filename,
                                line,
                                "expected a relational operator string (gt/ge/lt/le/eq/ne)",
                            );
                            RelationalMatch::Eq
                        });
                        ctx.match_type = if name == "count" {
                            MatchType::Count(op)
                        } else {
                            MatchType::Value(op)
                        };
                        i += 2;
                    }
                    None => {
                        diag.error(filename, line, format!("':{name}' requires a string parameter"));
                        i += 1;
                    }
                }
            }
            _ if VALUE_TAKING_TAGS.contains(&name.as_str()) => {
                if let Some(&value_id) = arguments.get(i + 1) {
                    tag_values.insert(name, value_id);
                    i += 2;
                } else {
                    bare_tags.insert(name);
                    i += 1;
                }
            }
            _ => {
                bare_tags.insert(name);
                i += 1;
            }
        }
    }

    ArgScan {
        match_ctx: ctx,
        tag_values,
        bare_tags,
        positionals,
    }
}

/// Convenience for call sites that only need the match-context (defaults
/// applied per §4.9 for any tag not present).
pub fn parse_match_tags(ast: &Ast, arguments: &[NodeId], filename: &str, diag: &mut Diagnostics) -> MatchContext {
    scan_arguments(ast, arguments, filename, diag).match_ctx
}

/// The first string-valued argument among `nodes`, ignoring tags.
pub fn first_string(ast: &Ast, nodes: &[NodeId]) -> Option<String> {
    nodes.iter().find_map(|&id| node_string(ast, id))
}

pub fn first_number(ast: &Ast, nodes: &[NodeId]) -> Option<u64> {
    nodes.iter().find_map(|&id| match &ast.get(id).kind {
        NodeKind::Number(n) => Some(*n),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn diag() -> Diagnostics {
        Diagnostics::new(Rc::new(sieve_core::diag::MemorySink::default()), 0)
    }

    #[test]
    fn defaults_are_is_and_ascii_casemap() {
        let ast = Ast::new();
        let mut d = diag();
        let ctx = parse_match_tags(&ast, &[], "t", &mut d);
        assert_eq!(ctx.match_type, MatchType::Is);
        assert_eq!(ctx.comparator, Comparator::AsciiCasemap);
        assert_eq!(ctx.address_part, AddressPart::All);
    }

    #[test]
    fn contains_tag_overrides_match_type() {
        let mut ast = Ast::new();
        let tag = ast.alloc(
            NodeKind::Tag {
                name: "contains".into(),
                params: vec![],
            },
            1,
        );
        let mut d = diag();
        let ctx = parse_match_tags(&ast, &[tag], "t", &mut d);
        assert_eq!(ctx.match_type, MatchType::Contains);
    }

    #[test]
    fn comparator_tag_consumes_following_string_sibling() {
        let mut ast = Ast::new();
        let tag = ast.alloc(
            NodeKind::Tag {
                name: "comparator".into(),
                params: vec![],
            },
            1,
        );
        let value = ast.alloc(NodeKind::String("i;octet".into()), 1);
        let mut d = diag();
        let scan = scan_arguments(&ast, &[tag, value], "t", &mut d);
        assert_eq!(scan.match_ctx.comparator, Comparator::Octet);
        assert!(scan.positionals.is_empty(), "comparator's value must not leak into positionals");
    }

    #[test]
    fn count_tag_parses_relational_operator() {
        let mut ast = Ast::new();
        let tag = ast.alloc(
            NodeKind::Tag {
                name: "count".into(),
                params: vec![],
            },
            1,
        );
        let value = ast.alloc(NodeKind::String("ge".into()), 1);
        let mut d = diag();
        let scan = scan_arguments(&ast, &[tag, value], "t", &mut d);
        assert_eq!(scan.match_ctx.match_type, MatchType::Count(RelationalMatch::Ge));
    }

    #[test]
    fn vacation_style_tags_do_not_shadow_the_trailing_reason_positional() {
        let mut ast = Ast::new();
        let subject_tag = ast.alloc(
            NodeKind::Tag {
                name: "subject".into(),
                params: vec![],
            },
            1,
        );
        let subject_value = ast.alloc(NodeKind::String("Away".into()), 1);
        let reason = ast.alloc(NodeKind::String("I am away".into()), 1);
        let mut d = diag();
        let scan = scan_arguments(&ast, &[subject_tag, subject_value, reason], "t", &mut d);
        assert_eq!(scan.tag_string(&ast, "subject"), Some("Away".to_owned()));
        assert_eq!(scan.positional_string(&ast, 0), Some("I am away".to_owned()));
    }
}
