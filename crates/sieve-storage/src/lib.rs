#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Script persistence (spec.md §4.11, §6): the `Script`/`Storage`
//! traits plus the backends a deployment chooses between by driver
//! name (`file`, `data`, `dict`, and the feature-gated `ldap` stub).
//!
//! Layers:
//! - [`error`]: the storage-specific error kinds (§7).
//! - [`script`]/[`storage`]: the two core traits, named after spec.md's
//!   own field lists.
//! - [`file`]: on-disk scripts, atomic saves, symlink activation.
//! - [`data`]: in-memory, no persistence, for tests and embedding.
//! - [`dict`]: an in-process stand-in for a dict-protocol client.
//! - [`ldap`] (feature `ldap`): stub returning `not_possible` until a
//!   real LDAP client is wired in.
//! - [`include_resolver`]: adapts any [`Storage`] into
//!   `sieve_runtime::IncludeResolver` for the `include` extension.

pub mod data;
pub mod dict;
pub mod error;
pub mod file;
pub mod include_resolver;
#[cfg(feature = "ldap")]
pub mod ldap;
pub mod script;
pub mod storage;

pub use data::DataStorage;
pub use dict::{DictOptions, DictStorage};
pub use error::{Result, StorageError};
pub use file::{FileStorage, FileStorageOptions};
pub use include_resolver::StorageIncludeResolver;
#[cfg(feature = "ldap")]
pub use ldap::{LdapOptions, LdapStorage};
pub use script::{BinaryStatus, Script};
pub use storage::Storage;

/// Construct a [`Storage`] from a driver name and its option set
/// (spec.md §6: "Storage drivers recognise these backends
/// (case-insensitive): `file`, `dict`, `ldap`, `data`").
pub fn open_storage(
    driver: &str,
    storage_name: &str,
    options: &std::collections::BTreeMap<String, String>,
) -> Result<Box<dyn Storage>> {
    match driver.to_ascii_lowercase().as_str() {
        "file" => {
            let opts = file::FileStorageOptions::from_options(options)?;
            Ok(Box::new(file::FileStorage::new(storage_name, opts)))
        }
        "data" => Ok(Box::new(data::DataStorage::new(storage_name))),
        "dict" => {
            let dict_uri = options
                .get("dict-uri")
                .ok_or_else(|| StorageError::BadParams("dict storage requires dict-uri".into()))?;
            let user_name = options.get("user-name").cloned().unwrap_or_default();
            Ok(Box::new(dict::DictStorage::new(
                storage_name,
                dict::DictOptions { dict_uri: dict_uri.clone(), user_name },
            )))
        }
        #[cfg(feature = "ldap")]
        "ldap" => {
            let uri = options.get("uri").cloned().unwrap_or_default();
            let base_dn = options.get("base-dn").cloned().unwrap_or_default();
            let bind_dn = options.get("bind-dn").cloned().unwrap_or_default();
            let active_attribute = options.get("active-attribute").cloned().unwrap_or_default();
            Ok(Box::new(ldap::LdapStorage::new(
                storage_name,
                ldap::LdapOptions { uri, base_dn, bind_dn, active_attribute },
            )))
        }
        #[cfg(not(feature = "ldap"))]
        "ldap" => Err(StorageError::NotPossible("ldap support not built into this binary".into())),
        other => Err(StorageError::BadParams(format!("unknown storage driver {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn open_storage_dispatches_by_driver_name() {
        let opts = BTreeMap::new();
        assert!(open_storage("data", "test", &opts).is_ok());
        assert!(open_storage("DATA", "test", &opts).is_ok());
        assert!(open_storage("bogus", "test", &opts).is_err());
    }
}
