//! The `Script` handle (spec.md §4.11): one named entry inside a
//! [`crate::Storage`], with its source text and (optionally) a cached
//! compiled [`sieve_bytecode::Binary`] alongside it.

use std::io::Read;

use sieve_bytecode::{Binary, ScriptMetadata};

use crate::error::Result;

/// Outcome of comparing a loaded binary's embedded [`ScriptMetadata`]
/// against the storage's current view of the script (§4.11 "Binary
/// metadata"): whether the cached compile can be reused as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryStatus {
    UpToDate,
    Stale,
    Corrupt,
}

/// One named script inside a storage backend.
///
/// Mirrors spec.md's field list exactly: `storage, name, open,
/// get_stream, binary_read_metadata, binary_write_metadata,
/// binary_load, binary_save, rename, delete, activate, is_active, cmp`.
pub trait Script {
    /// Name of the storage this script lives in (for diagnostics and
    /// cross-driver comparisons).
    fn storage(&self) -> &str;

    /// The script's name within its storage.
    fn name(&self) -> &str;

    /// Read the full source text.
    fn open(&self) -> Result<String>;

    /// Open a streaming reader over the source text, for callers that
    /// want to avoid materializing large scripts (spec.md's `get_stream`).
    fn get_stream(&self) -> Result<Box<dyn Read>>;

    /// Read back the metadata embedded in the cached compiled binary,
    /// if one exists, without decoding the whole binary.
    fn binary_read_metadata(&self) -> Result<Option<ScriptMetadata>>;

    /// Overwrite just the metadata of an already-saved binary. Used
    /// when a driver wants to re-stamp a binary (e.g. after a rename)
    /// without recompiling.
    fn binary_write_metadata(&self, metadata: &ScriptMetadata) -> Result<()>;

    /// Compare the cached binary's metadata against this script's
    /// current source to decide whether it can still be used (§4.11,
    /// Testable Property 6/Scenario F).
    fn binary_status(&self) -> Result<BinaryStatus>;

    /// Load the cached compiled binary. Callers should consult
    /// [`Script::binary_status`] first; this returns
    /// [`crate::error::StorageError::BinCorrupt`] if the bytes on disk
    /// fail the bytecode checksum or [`crate::error::StorageError::BinOutdated`]
    /// if the embedded metadata no longer matches.
    fn binary_load(&self, known_extensions: &dyn Fn(&str) -> bool) -> Result<Binary>;

    /// Save a freshly compiled binary alongside the source, stamped
    /// with this script's metadata.
    fn binary_save(&self, binary: &Binary) -> Result<()>;

    /// Rename this script within its storage. Renaming the active
    /// script keeps it active under the new name.
    fn rename(&mut self, new_name: &str) -> Result<()>;

    /// Delete this script and its cached binary. Returns
    /// [`crate::error::StorageError::Active`] if this is the active
    /// script (a storage must be deactivated before its active script
    /// can be deleted).
    fn delete(self: Box<Self>) -> Result<()>;

    /// Atomically make this the storage's active script (§4.11 "Active
    /// script").
    fn activate(&self) -> Result<()>;

    /// Whether this script is currently the storage's active script.
    fn is_active(&self) -> Result<bool>;

    /// Ordering used when listing scripts (by name, the only ordering
    /// spec.md defines).
    fn cmp(&self, other: &dyn Script) -> std::cmp::Ordering {
        self.name().cmp(other.name())
    }
}
