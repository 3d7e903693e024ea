//! Errors produced while assembling, saving or loading a [`crate::Module`].
//!
//! Names mirror the error kinds in spec.md §7: `bin_corrupt` and
//! `bin_outdated` are the two kinds a caller reacts to by recompiling.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("bad magic bytes, not a Sieve binary")]
    BadMagic,
    #[error("bytecode version {found_major}.{found_minor} is newer than supported {supported_major}.{supported_minor}")]
    Outdated {
        found_major: u8,
        found_minor: u8,
        supported_major: u8,
        supported_minor: u8,
    },
    #[error("checksum mismatch: binary is corrupt")]
    ChecksumMismatch,
    #[error("extension {0:?} referenced by this binary is not known to this instance")]
    UnknownExtension(String),
    #[error("jump target {target} lies outside block {block_id} (len {block_len})")]
    JumpOutOfBlock {
        block_id: u32,
        target: i64,
        block_len: usize,
    },
    #[error("block {0} not found")]
    NoSuchBlock(u32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BytecodeError>;
