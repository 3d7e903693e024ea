//! The `ldap` backend (spec.md §6, §4.11): feature-gated stub.
//!
//! Core only prescribes the interface an LDAP-backed storage must
//! satisfy (activation "by looking up a scoped attribute", metadata
//! carrying "LDAP DN and modify-timestamp"); wiring an actual LDAP
//! client is a network-protocol concern this workspace's Non-goals
//! exclude. This type exists so `ldap` is a recognised driver name and
//! so a future implementation has the trait shape to fill in; every
//! method returns [`crate::error::StorageError::NotPossible`] until
//! then.

use crate::error::{Result, StorageError};
use crate::script::Script;
use crate::storage::Storage;

/// Connection parameters spec.md §4.11 names for an LDAP backend: a
/// base DN, bind credentials, and the scoped attribute that holds the
/// active-script pointer.
#[derive(Debug, Clone)]
pub struct LdapOptions {
    pub uri: String,
    pub base_dn: String,
    pub bind_dn: String,
    pub active_attribute: String,
}

pub struct LdapStorage {
    storage_name: String,
    options: LdapOptions,
}

impl LdapStorage {
    pub fn new(storage_name: impl Into<String>, options: LdapOptions) -> Self {
        Self { storage_name: storage_name.into(), options }
    }

    pub fn options(&self) -> &LdapOptions {
        &self.options
    }

    fn unimplemented(&self, op: &str) -> StorageError {
        StorageError::NotPossible(format!("ldap storage {:?}: {op} requires a real LDAP client", self.storage_name))
    }
}

impl Storage for LdapStorage {
    fn name(&self) -> &str {
        &self.storage_name
    }

    fn init(&mut self) -> Result<()> {
        Err(self.unimplemented("init"))
    }

    fn alloc(&mut self, _name: &str) -> Result<Box<dyn Script>> {
        Err(self.unimplemented("alloc"))
    }

    fn get_script(&self, _name: &str) -> Result<Box<dyn Script>> {
        Err(self.unimplemented("get_script"))
    }

    fn list(&self) -> Result<Vec<String>> {
        Err(self.unimplemented("list"))
    }

    fn active_script_get_name(&self) -> Result<Option<String>> {
        Err(self.unimplemented("active_script_get_name"))
    }

    fn active_script_open(&self) -> Result<Box<dyn Script>> {
        Err(self.unimplemented("active_script_open"))
    }

    fn deactivate(&mut self) -> Result<()> {
        Err(self.unimplemented("deactivate"))
    }

    fn save_script(&mut self, _name: &str, _source: &str) -> Result<Box<dyn Script>> {
        Err(self.unimplemented("save_script"))
    }

    fn delete_script(&mut self, _name: &str) -> Result<()> {
        Err(self.unimplemented("delete_script"))
    }

    fn quota_havespace(&self, _additional_bytes: u64) -> Result<bool> {
        Err(self.unimplemented("quota_havespace"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_reports_not_possible() {
        let mut s = LdapStorage::new(
            "corp",
            LdapOptions {
                uri: "ldaps://dc1.example.com".into(),
                base_dn: "ou=sieve,dc=example,dc=com".into(),
                bind_dn: "cn=svc,dc=example,dc=com".into(),
                active_attribute: "sieveActiveScript".into(),
            },
        );
        assert!(matches!(s.init(), Err(StorageError::NotPossible(_))));
        assert!(matches!(s.list(), Err(StorageError::NotPossible(_))));
    }
}
