//! CLI-wide error type and the spec.md §6 exit-code mapping: `0`
//! success, `65` usage, `73` cannot create, `74` IO, `75` temp
//! failure, `76` protocol.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("usage error: {0}")]
    Usage(String),
    #[error("{0} error(s) in script")]
    ScriptInvalid(u32),
    #[error(transparent)]
    Storage(#[from] sieve_storage::StorageError),
    #[error(transparent)]
    Runtime(#[from] sieve_runtime::RuntimeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Exit code per spec.md §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) | CliError::ScriptInvalid(_) => 65,
            CliError::Storage(e) => storage_exit_code(e),
            CliError::Runtime(e) => runtime_exit_code(e),
            CliError::Io(_) => 74,
        }
    }
}

fn storage_exit_code(e: &sieve_storage::StorageError) -> i32 {
    use sieve_storage::StorageError::*;
    match e {
        Exists(_) | Active(_) => 73,
        Io(_) => 74,
        NotFound(_) | NoPermission(_) | NoQuota { .. } | BadParams(_) => 65,
        BinCorrupt(_) | BinOutdated(_) | NotPossible(_) | Internal(_) | Bytecode(_) => 76,
    }
}

fn runtime_exit_code(e: &sieve_runtime::RuntimeError) -> i32 {
    use sieve_runtime::RuntimeError::*;
    match e {
        TempFailure(_) | FuelExhausted(_) | Cancelled => 75,
        BinCorrupt(_) => 76,
        _ => 65,
    }
}
