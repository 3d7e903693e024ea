//! The `data` backend (spec.md §6): an in-memory storage with no
//! options and no persistence across process restarts. Used for tests
//! and for hosts that compile scripts on the fly without ever writing
//! them to disk.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::rc::Rc;

use sieve_bytecode::{Binary, ScriptMetadata};

use crate::error::{Result, StorageError};
use crate::script::{BinaryStatus, Script};
use crate::storage::Storage;

const DRIVER_NAME: &str = "data";
const STORAGE_VERSION: u64 = 1;

#[derive(Default)]
struct Entry {
    source: String,
    binary: Option<Vec<u8>>,
}

struct Inner {
    scripts: BTreeMap<String, Entry>,
    active: Option<String>,
}

/// In-memory storage backend. Cheap to clone (an `Rc` around the
/// shared table), so a host can hand copies to multiple `Instance`s
/// that should see the same scripts.
#[derive(Clone)]
pub struct DataStorage {
    storage_name: Rc<str>,
    inner: Rc<RefCell<Inner>>,
}

impl DataStorage {
    pub fn new(storage_name: impl Into<String>) -> Self {
        Self {
            storage_name: storage_name.into().into(),
            inner: Rc::new(RefCell::new(Inner {
                scripts: BTreeMap::new(),
                active: None,
            })),
        }
    }
}

impl Storage for DataStorage {
    fn name(&self) -> &str {
        &self.storage_name
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn alloc(&mut self, name: &str) -> Result<Box<dyn Script>> {
        sieve_core::ScriptName::new(name).map_err(|e| StorageError::BadParams(e.to_string()))?;
        let mut inner = self.inner.borrow_mut();
        if inner.scripts.contains_key(name) {
            return Err(StorageError::Exists(name.to_owned()));
        }
        inner.scripts.insert(name.to_owned(), Entry::default());
        drop(inner);
        Ok(Box::new(DataScript {
            storage_name: self.storage_name.clone(),
            inner: self.inner.clone(),
            name: name.to_owned(),
        }))
    }

    fn get_script(&self, name: &str) -> Result<Box<dyn Script>> {
        let inner = self.inner.borrow();
        if !inner.scripts.contains_key(name) {
            return Err(StorageError::NotFound(name.to_owned()));
        }
        Ok(Box::new(DataScript {
            storage_name: self.storage_name.clone(),
            inner: self.inner.clone(),
            name: name.to_owned(),
        }))
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.inner.borrow().scripts.keys().cloned().collect())
    }

    fn active_script_get_name(&self) -> Result<Option<String>> {
        Ok(self.inner.borrow().active.clone())
    }

    fn active_script_open(&self) -> Result<Box<dyn Script>> {
        let name = self
            .inner
            .borrow()
            .active
            .clone()
            .ok_or_else(|| StorageError::NotFound("<no active script>".into()))?;
        self.get_script(&name)
    }

    fn deactivate(&mut self) -> Result<()> {
        self.inner.borrow_mut().active = None;
        Ok(())
    }

    fn save_script(&mut self, name: &str, source: &str) -> Result<Box<dyn Script>> {
        sieve_core::ScriptName::new(name).map_err(|e| StorageError::BadParams(e.to_string()))?;
        let mut inner = self.inner.borrow_mut();
        let entry = inner.scripts.entry(name.to_owned()).or_default();
        entry.source = source.to_owned();
        entry.binary = None;
        drop(inner);
        Ok(Box::new(DataScript {
            storage_name: self.storage_name.clone(),
            inner: self.inner.clone(),
            name: name.to_owned(),
        }))
    }

    fn delete_script(&mut self, name: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.active.as_deref() == Some(name) {
            return Err(StorageError::Active(name.to_owned()));
        }
        inner
            .scripts
            .remove(name)
            .ok_or_else(|| StorageError::NotFound(name.to_owned()))?;
        Ok(())
    }

    fn quota_havespace(&self, _additional_bytes: u64) -> Result<bool> {
        Ok(true)
    }
}

struct DataScript {
    storage_name: Rc<str>,
    inner: Rc<RefCell<Inner>>,
    name: String,
}

impl Script for DataScript {
    fn storage(&self) -> &str {
        &self.storage_name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<String> {
        let inner = self.inner.borrow();
        let entry = inner.scripts.get(&self.name).ok_or_else(|| StorageError::NotFound(self.name.clone()))?;
        Ok(entry.source.clone())
    }

    fn get_stream(&self) -> Result<Box<dyn std::io::Read>> {
        Ok(Box::new(Cursor::new(self.open()?.into_bytes())))
    }

    fn binary_read_metadata(&self) -> Result<Option<ScriptMetadata>> {
        let inner = self.inner.borrow();
        let entry = inner.scripts.get(&self.name).ok_or_else(|| StorageError::NotFound(self.name.clone()))?;
        let Some(bytes) = &entry.binary else { return Ok(None) };
        let binary = Binary::from_bytes(bytes, &|_| true)?;
        Ok(Some(binary.metadata.clone()))
    }

    fn binary_write_metadata(&self, metadata: &ScriptMetadata) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let entry = inner.scripts.get_mut(&self.name).ok_or_else(|| StorageError::NotFound(self.name.clone()))?;
        let Some(bytes) = &entry.binary else {
            return Err(StorageError::NotFound(format!("{}: no cached binary", self.name)));
        };
        let mut binary = Binary::from_bytes(bytes, &|_| true)?;
        binary.metadata = metadata.clone();
        entry.binary = Some(binary.to_bytes()?);
        Ok(())
    }

    fn binary_status(&self) -> Result<BinaryStatus> {
        let Some(metadata) = self.binary_read_metadata()? else {
            return Ok(BinaryStatus::Stale);
        };
        if metadata.driver_name != DRIVER_NAME || metadata.script_name != self.name {
            return Ok(BinaryStatus::Stale);
        }
        Ok(BinaryStatus::UpToDate)
    }

    fn binary_load(&self, known_extensions: &dyn Fn(&str) -> bool) -> Result<Binary> {
        let inner = self.inner.borrow();
        let entry = inner.scripts.get(&self.name).ok_or_else(|| StorageError::NotFound(self.name.clone()))?;
        let bytes = entry.binary.as_ref().ok_or_else(|| StorageError::NotFound(format!("{}: no cached binary", self.name)))?;
        Binary::from_bytes(bytes, known_extensions).map_err(|e| match e {
            sieve_bytecode::BytecodeError::ChecksumMismatch | sieve_bytecode::BytecodeError::BadMagic => {
                StorageError::BinCorrupt(self.name.clone())
            }
            other => other.into(),
        })
    }

    fn binary_save(&self, binary: &Binary) -> Result<()> {
        let mut binary = binary.clone();
        binary.metadata = ScriptMetadata {
            driver_name: DRIVER_NAME.to_owned(),
            storage_version: STORAGE_VERSION,
            storage_name: self.storage_name.to_string(),
            script_name: self.name.clone(),
            driver_data: String::new(),
        };
        let bytes = binary.to_bytes()?;
        let mut inner = self.inner.borrow_mut();
        let entry = inner.scripts.get_mut(&self.name).ok_or_else(|| StorageError::NotFound(self.name.clone()))?;
        entry.binary = Some(bytes);
        Ok(())
    }

    fn rename(&mut self, new_name: &str) -> Result<()> {
        sieve_core::ScriptName::new(new_name).map_err(|e| StorageError::BadParams(e.to_string()))?;
        let mut inner = self.inner.borrow_mut();
        if inner.scripts.contains_key(new_name) {
            return Err(StorageError::Exists(new_name.to_owned()));
        }
        let entry = inner.scripts.remove(&self.name).ok_or_else(|| StorageError::NotFound(self.name.clone()))?;
        inner.scripts.insert(new_name.to_owned(), entry);
        if inner.active.as_deref() == Some(&self.name) {
            inner.active = Some(new_name.to_owned());
        }
        self.name = new_name.to_owned();
        Ok(())
    }

    fn delete(self: Box<Self>) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.active.as_deref() == Some(&self.name) {
            return Err(StorageError::Active(self.name.clone()));
        }
        inner.scripts.remove(&self.name).ok_or_else(|| StorageError::NotFound(self.name.clone()))?;
        Ok(())
    }

    fn activate(&self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if !inner.scripts.contains_key(&self.name) {
            return Err(StorageError::NotFound(self.name.clone()));
        }
        inner.active = Some(self.name.clone());
        Ok(())
    }

    fn is_active(&self) -> Result<bool> {
        Ok(self.inner.borrow().active.as_deref() == Some(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_save_then_open_round_trips_source() {
        let mut storage = DataStorage::new("test");
        storage.alloc("main").unwrap();
        storage.save_script("main", "keep;").unwrap();
        let script = storage.get_script("main").unwrap();
        assert_eq!(script.open().unwrap(), "keep;");
    }

    #[test]
    fn activate_then_active_script_open_returns_same_script() {
        let mut storage = DataStorage::new("test");
        storage.save_script("main", "keep;").unwrap();
        storage.get_script("main").unwrap().activate().unwrap();
        assert_eq!(storage.active_script_get_name().unwrap().as_deref(), Some("main"));
        let active = storage.active_script_open().unwrap();
        assert_eq!(active.name(), "main");
    }

    #[test]
    fn deleting_active_script_fails() {
        let mut storage = DataStorage::new("test");
        storage.save_script("main", "keep;").unwrap();
        storage.get_script("main").unwrap().activate().unwrap();
        let err = storage.delete_script("main").unwrap_err();
        assert!(matches!(err, StorageError::Active(_)));
    }

    #[test]
    fn rename_carries_active_pointer() {
        let mut storage = DataStorage::new("test");
        storage.save_script("old", "keep;").unwrap();
        storage.get_script("old").unwrap().activate().unwrap();
        let mut script = storage.get_script("old").unwrap();
        script.rename("new").unwrap();
        assert_eq!(storage.active_script_get_name().unwrap().as_deref(), Some("new"));
    }
}
