//! Storage-side error kinds (spec.md §7): the subset of the error-kind
//! list a `Storage`/`Script` implementation can raise. Compile-time
//! `parse`/`validate` and run-time `runtime`/`temp_failure` live in
//! `sieve-syntax`/`sieve-runtime` instead; this crate only adds the
//! kinds that are specific to persistence.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("script {0:?} not found")]
    NotFound(String),
    #[error("script {0:?} already exists")]
    Exists(String),
    #[error("permission denied for {0:?}")]
    NoPermission(String),
    #[error("storage quota exceeded: {have} bytes available, {want} requested")]
    NoQuota { have: u64, want: u64 },
    #[error("script {0:?} is the active script and cannot be deleted")]
    Active(String),
    #[error("bad storage parameters: {0}")]
    BadParams(String),
    #[error("operation not possible on this backend: {0}")]
    NotPossible(String),
    #[error("internal storage error: {0}")]
    Internal(String),
    #[error("compiled binary for {0:?} is corrupt")]
    BinCorrupt(String),
    #[error("compiled binary for {0:?} is outdated and must be recompiled")]
    BinOutdated(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Bytecode(#[from] sieve_bytecode::BytecodeError),
}

pub type Result<T> = std::result::Result<T, StorageError>;
