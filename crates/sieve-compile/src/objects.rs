//! Command and test object definitions (§3 "Command (abstract)"): rather
//! than the original's function-pointer "hooks" vtable, each built-in is
//! a `CommandSpec` value in a static table — a tagged variant carrying
//! the same shape (`identifier`, `kind`, `positional_count`, `subtests`,
//! `block_allowed`, `block_required`) the spec describes. `generate` and
//! `validate` behaviour live in `validator.rs`/`codegen.rs` as match arms
//! over the identifier, rather than as stored function pointers — Design
//! Note in spec.md §9 calls for "tagged variants plus trait-style
//! vtables"; a flat match arm is the idiomatic Rust rendering of a vtable
//! with no per-instance state.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtests {
    None,
    One,
    Many,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub identifier: &'static str,
    pub subtests: Subtests,
    pub block_allowed: bool,
    pub block_required: bool,
    /// The extension that must be `require`d for this command, or `None`
    /// for core Sieve (RFC 5228 base commands always available).
    pub requires_extension: Option<&'static str>,
}

pub const CORE_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        identifier: "require",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: None,
    },
    CommandSpec {
        identifier: "if",
        subtests: Subtests::One,
        block_allowed: true,
        block_required: true,
        requires_extension: None,
    },
    CommandSpec {
        identifier: "elsif",
        subtests: Subtests::One,
        block_allowed: true,
        block_required: true,
        requires_extension: None,
    },
    CommandSpec {
        identifier: "else",
        subtests: Subtests::None,
        block_allowed: true,
        block_required: true,
        requires_extension: None,
    },
    CommandSpec {
        identifier: "stop",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: None,
    },
    CommandSpec {
        identifier: "keep",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: None,
    },
    CommandSpec {
        identifier: "discard",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: None,
    },
    CommandSpec {
        identifier: "redirect",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: None,
    },
    CommandSpec {
        identifier: "fileinto",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("fileinto"),
    },
    CommandSpec {
        identifier: "reject",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("reject"),
    },
    CommandSpec {
        identifier: "ereject",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("reject"),
    },
    CommandSpec {
        identifier: "vacation",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("vacation"),
    },
    CommandSpec {
        identifier: "notify",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("enotify"),
    },
    CommandSpec {
        identifier: "addheader",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("editheader"),
    },
    CommandSpec {
        identifier: "deleteheader",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("editheader"),
    },
    CommandSpec {
        identifier: "setflag",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("imap4flags"),
    },
    CommandSpec {
        identifier: "addflag",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("imap4flags"),
    },
    CommandSpec {
        identifier: "removeflag",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("imap4flags"),
    },
    CommandSpec {
        identifier: "include",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("include"),
    },
    CommandSpec {
        identifier: "return",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("include"),
    },
    CommandSpec {
        identifier: "set",
        subtests: Subtests::None,
        block_allowed: false,
        block_required: false,
        requires_extension: Some("variables"),
    },
];

pub fn command_spec(identifier: &str) -> Option<&'static CommandSpec> {
    CORE_COMMANDS.iter().find(|c| c.identifier == identifier)
}

/// Tests, mirrored the same way. `anyof`/`allof`/`not` are structural
/// (handled directly by the validator/codegen since their subtests are a
/// list rather than positional arguments) and are not listed here.
pub const CORE_TESTS: &[&str] = &[
    "true",
    "false",
    "address",
    "header",
    "exists",
    "size",
    "envelope",
    "body",
    "hasflag",
    "string",
];

pub fn is_core_test(identifier: &str) -> bool {
    identifier == "not"
        || identifier == "anyof"
        || identifier == "allof"
        || CORE_TESTS.contains(&identifier)
}

pub fn test_requires_extension(identifier: &str) -> Option<&'static str> {
    match identifier {
        "envelope" => Some("envelope"),
        "body" => Some("body"),
        "hasflag" => Some("imap4flags"),
        "string" => Some("variables"),
        _ => None,
    }
}
