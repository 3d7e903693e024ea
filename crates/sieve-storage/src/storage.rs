//! The `Storage` trait (spec.md §4.11): a named collection of
//! [`crate::Script`]s plus at most one active script.

use crate::error::Result;
use crate::script::Script;

/// A script storage backend.
///
/// spec.md names this trait's operations as `alloc, init, get_script,
/// list_init/next/deinit, active_script_get_name, active_script_open,
/// deactivate, save_*, quota_havespace`. The `list_init/next/deinit`
/// triplet is a C-style cursor; Rust expresses the same "enumerate
/// without materializing everything the backend might ever hold" idea
/// as an iterator, so `list` returns one here instead of three calls.
pub trait Storage {
    /// Name of this storage (used in embedded binary metadata).
    fn name(&self) -> &str;

    /// Prepare the backend for use (create directories, open
    /// connections, ...). Idempotent.
    fn init(&mut self) -> Result<()>;

    /// Reserve and return a brand-new, empty script. Fails with
    /// [`crate::error::StorageError::Exists`] if `name` is already
    /// taken.
    fn alloc(&mut self, name: &str) -> Result<Box<dyn Script>>;

    /// Look up an existing script by name.
    fn get_script(&self, name: &str) -> Result<Box<dyn Script>>;

    /// Enumerate every script's name, in the backend's natural order.
    fn list(&self) -> Result<Vec<String>>;

    /// Name of the currently active script, if any.
    fn active_script_get_name(&self) -> Result<Option<String>>;

    /// Open the currently active script.
    fn active_script_open(&self) -> Result<Box<dyn Script>>;

    /// Clear the active-script pointer without deleting anything.
    fn deactivate(&mut self) -> Result<()>;

    /// Write `source` as `name`'s script body, creating it if absent.
    fn save_script(&mut self, name: &str, source: &str) -> Result<Box<dyn Script>>;

    /// Delete `name`. Fails with
    /// [`crate::error::StorageError::Active`] if it is the active
    /// script.
    fn delete_script(&mut self, name: &str) -> Result<()>;

    /// Whether `additional_bytes` more storage can be allocated under
    /// whatever quota this backend enforces. Backends with no quota
    /// always return `true`.
    fn quota_havespace(&self, additional_bytes: u64) -> Result<bool>;
}
