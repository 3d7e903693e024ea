//! Validate-time error kinds (spec.md §7). These are reported through the
//! shared `Diagnostics` sink as `Error`-severity diagnostics; this enum
//! exists so callers (the CLI's `annotate-snippets` renderer, tests) can
//! match on the precise failure rather than parsing message text.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidateError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("unknown test {0:?}")]
    UnknownTest(String),
    #[error("extension {0:?} is not required")]
    ExtensionNotRequired(String),
    #[error("unknown extension {0:?} in require list")]
    UnknownExtension(String),
    #[error("require must appear before any other command")]
    RequireNotAtTop,
    #[error("{0} requires a block")]
    BlockRequired(String),
    #[error("{0} does not take a block")]
    BlockNotAllowed(String),
    #[error("elsif/else must follow if/elsif")]
    DanglingElse,
    #[error("wrong number of positional arguments for {command}: expected {expected}, found {found}")]
    ArityMismatch {
        command: String,
        expected: usize,
        found: usize,
    },
    #[error("unknown tag {tag:?} on {command}")]
    UnknownTag { tag: String, command: String },
    #[error("tag {0:?} requires a parameter")]
    TagMissingParameter(String),
    #[error("invalid relational operator {0:?}")]
    InvalidRelationalOperator(String),
    #[error("conflicting extension aliases {0:?} and {1:?} both required")]
    ConflictingExtensionAliases(String, String),
    #[error("return is only valid within an included script")]
    ReturnOutsideInclude,
    #[error(transparent)]
    ScriptName(#[from] sieve_core::primitives::ScriptNameError),
}
