//! Execution status family (spec.md §4.8, §7): each operation's execute
//! function returns one of these; `bin_corrupt` is fatal, `temp_failure`
//! unwinds without commit, `failure` unwinds without commit and invokes
//! the failure-mailbox policy, `ok` with no delivery triggers implicit
//! keep.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("bytecode is corrupt: {0}")]
    BinCorrupt(String),
    #[error("temporary failure: {0}")]
    TempFailure(String),
    #[error("runtime failure: {0}")]
    Failure(String),
    #[error("include depth {0} exceeds configured limit")]
    IncludeDepthExceeded(u32),
    #[error("total included scripts {0} exceeds configured limit")]
    IncludeCountExceeded(u32),
    #[error("include cycle detected: {0:?} is already on the include stack")]
    IncludeCycle(String),
    #[error("script {0:?} could not be resolved by the include resolver")]
    IncludeNotFound(String),
    #[error("execution fuel exhausted after {0} steps")]
    FuelExhausted(u64),
    #[error("execution cancelled by host")]
    Cancelled,
    #[error("action limit {0} exceeded")]
    ActionLimitExceeded(u32),
    #[error("redirect limit {0} exceeded")]
    RedirectLimitExceeded(u32),
    #[error("conflicting actions: {0}")]
    ActionConflict(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
