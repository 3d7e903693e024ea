//! The `dict` backend (spec.md §6, §4.11, SPEC_FULL.md §4.11): an
//! in-process `Mutex<HashMap<String, String>>` standing in for a real
//! dict-protocol client, enough to exercise the `Storage`/`Script`
//! contract and the activation/metadata semantics a dict backend must
//! provide without implementing the wire protocol itself (a
//! network-protocol Non-goal; see SPEC_FULL.md).
//!
//! Keys are namespaced by a `data-id`: `source:<name>`, `bin:<name>`
//! and the single `active` pointer key.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use sieve_bytecode::{Binary, ScriptMetadata};

use crate::error::{Result, StorageError};
use crate::script::{BinaryStatus, Script};
use crate::storage::Storage;

const DRIVER_NAME: &str = "dict";
const STORAGE_VERSION: u64 = 1;
const ACTIVE_KEY: &str = "active";

/// A dict connection's configuration (spec.md §6: "dict: dict-uri plus
/// user-name").
#[derive(Debug, Clone)]
pub struct DictOptions {
    pub dict_uri: String,
    pub user_name: String,
}

/// In-process stand-in for a dict-protocol storage.
#[derive(Clone)]
pub struct DictStorage {
    storage_name: String,
    options: DictOptions,
    table: Arc<Mutex<HashMap<String, String>>>,
}

impl DictStorage {
    pub fn new(storage_name: impl Into<String>, options: DictOptions) -> Self {
        Self {
            storage_name: storage_name.into(),
            options,
            table: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn source_key(name: &str) -> String {
        format!("source:{name}")
    }

    fn bin_key(name: &str) -> String {
        format!("bin:{name}")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for DictStorage {
    fn name(&self) -> &str {
        &self.storage_name
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn alloc(&mut self, name: &str) -> Result<Box<dyn Script>> {
        sieve_core::ScriptName::new(name).map_err(|e| StorageError::BadParams(e.to_string()))?;
        let mut table = self.lock();
        let key = Self::source_key(name);
        if table.contains_key(&key) {
            return Err(StorageError::Exists(name.to_owned()));
        }
        table.insert(key, String::new());
        drop(table);
        self.get_script(name)
    }

    fn get_script(&self, name: &str) -> Result<Box<dyn Script>> {
        if !self.lock().contains_key(&Self::source_key(name)) {
            return Err(StorageError::NotFound(name.to_owned()));
        }
        Ok(Box::new(DictScript {
            storage_name: self.storage_name.clone(),
            table: self.table.clone(),
            name: name.to_owned(),
        }))
    }

    fn list(&self) -> Result<Vec<String>> {
        let table = self.lock();
        let mut names: Vec<String> = table
            .keys()
            .filter_map(|k| k.strip_prefix("source:"))
            .map(str::to_owned)
            .collect();
        names.sort();
        Ok(names)
    }

    fn active_script_get_name(&self) -> Result<Option<String>> {
        Ok(self.lock().get(ACTIVE_KEY).cloned())
    }

    fn active_script_open(&self) -> Result<Box<dyn Script>> {
        let name = self
            .active_script_get_name()?
            .ok_or_else(|| StorageError::NotFound("<no active script>".into()))?;
        self.get_script(&name)
    }

    fn deactivate(&mut self) -> Result<()> {
        self.lock().remove(ACTIVE_KEY);
        Ok(())
    }

    fn save_script(&mut self, name: &str, source: &str) -> Result<Box<dyn Script>> {
        sieve_core::ScriptName::new(name).map_err(|e| StorageError::BadParams(e.to_string()))?;
        let mut table = self.lock();
        table.insert(Self::source_key(name), source.to_owned());
        table.remove(&Self::bin_key(name));
        drop(table);
        self.get_script(name)
    }

    fn delete_script(&mut self, name: &str) -> Result<()> {
        if self.active_script_get_name()?.as_deref() == Some(name) {
            return Err(StorageError::Active(name.to_owned()));
        }
        let mut table = self.lock();
        if table.remove(&Self::source_key(name)).is_none() {
            return Err(StorageError::NotFound(name.to_owned()));
        }
        table.remove(&Self::bin_key(name));
        Ok(())
    }

    fn quota_havespace(&self, _additional_bytes: u64) -> Result<bool> {
        Ok(true)
    }
}

impl DictStorage {
    pub fn options(&self) -> &DictOptions {
        &self.options
    }
}

struct DictScript {
    storage_name: String,
    table: Arc<Mutex<HashMap<String, String>>>,
    name: String,
}

impl DictScript {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Script for DictScript {
    fn storage(&self) -> &str {
        &self.storage_name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<String> {
        self.lock()
            .get(&DictStorage::source_key(&self.name))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(self.name.clone()))
    }

    fn get_stream(&self) -> Result<Box<dyn std::io::Read>> {
        Ok(Box::new(Cursor::new(self.open()?.into_bytes())))
    }

    fn binary_read_metadata(&self) -> Result<Option<ScriptMetadata>> {
        let table = self.lock();
        let Some(encoded) = table.get(&DictStorage::bin_key(&self.name)) else { return Ok(None) };
        let bytes = hex_decode(encoded);
        let binary = Binary::from_bytes(&bytes, &|_| true)?;
        Ok(Some(binary.metadata.clone()))
    }

    fn binary_write_metadata(&self, metadata: &ScriptMetadata) -> Result<()> {
        let mut table = self.lock();
        let key = DictStorage::bin_key(&self.name);
        let Some(encoded) = table.get(&key) else {
            return Err(StorageError::NotFound(format!("{}: no cached binary", self.name)));
        };
        let bytes = hex_decode(encoded);
        let mut binary = Binary::from_bytes(&bytes, &|_| true)?;
        binary.metadata = metadata.clone();
        table.insert(key, hex_encode(&binary.to_bytes()?));
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
        let table = self.lock();
        let encoded = table
            .get(&DictStorage::bin_key(&self.name))
            .ok_or_else(|| StorageError::NotFound(format!("{}: no cached binary", self.name)))?;
        let bytes = hex_decode(encoded);
        Binary::from_bytes(&bytes, known_extensions).map_err(|e| match e {
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
            storage_name: self.storage_name.clone(),
            script_name: self.name.clone(),
            driver_data: serde_json::json!({ "data_id": DictStorage::bin_key(&self.name) }).to_string(),
        };
        let bytes = binary.to_bytes()?;
        self.lock().insert(DictStorage::bin_key(&self.name), hex_encode(&bytes));
        Ok(())
    }

    fn rename(&mut self, new_name: &str) -> Result<()> {
        sieve_core::ScriptName::new(new_name).map_err(|e| StorageError::BadParams(e.to_string()))?;
        let mut table = self.lock();
        let new_key = DictStorage::source_key(new_name);
        if table.contains_key(&new_key) {
            return Err(StorageError::Exists(new_name.to_owned()));
        }
        let source = table
            .remove(&DictStorage::source_key(&self.name))
            .ok_or_else(|| StorageError::NotFound(self.name.clone()))?;
        table.insert(new_key, source);
        if let Some(bin) = table.remove(&DictStorage::bin_key(&self.name)) {
            table.insert(DictStorage::bin_key(new_name), bin);
        }
        if table.get(ACTIVE_KEY).map(String::as_str) == Some(self.name.as_str()) {
            table.insert(ACTIVE_KEY.to_owned(), new_name.to_owned());
        }
        drop(table);
        self.name = new_name.to_owned();
        Ok(())
    }

    fn delete(self: Box<Self>) -> Result<()> {
        let mut table = self.lock();
        if table.get(ACTIVE_KEY).map(String::as_str) == Some(self.name.as_str()) {
            return Err(StorageError::Active(self.name.clone()));
        }
        if table.remove(&DictStorage::source_key(&self.name)).is_none() {
            return Err(StorageError::NotFound(self.name.clone()));
        }
        table.remove(&DictStorage::bin_key(&self.name));
        Ok(())
    }

    fn activate(&self) -> Result<()> {
        let mut table = self.lock();
        if !table.contains_key(&DictStorage::source_key(&self.name)) {
            return Err(StorageError::NotFound(self.name.clone()));
        }
        table.insert(ACTIVE_KEY.to_owned(), self.name.clone());
        Ok(())
    }

    fn is_active(&self) -> Result<bool> {
        Ok(self.lock().get(ACTIVE_KEY).map(String::as_str) == Some(self.name.as_str()))
    }
}

/// Dict protocols are text-based (key/value strings); binaries are
/// stashed as hex so they fit in the same `String` value space a real
/// dict backend would offer.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .filter_map(|i| s.get(i..i + 2))
        .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> DictStorage {
        DictStorage::new(
            "test",
            DictOptions { dict_uri: "dict://localhost".into(), user_name: "alice".into() },
        )
    }

    #[test]
    fn save_then_open_round_trips_source() {
        let mut s = storage();
        s.save_script("main", "keep;").unwrap();
        assert_eq!(s.get_script("main").unwrap().open().unwrap(), "keep;");
    }

    #[test]
    fn activate_writes_pointer_key() {
        let mut s = storage();
        s.save_script("main", "keep;").unwrap();
        s.get_script("main").unwrap().activate().unwrap();
        assert_eq!(s.active_script_get_name().unwrap().as_deref(), Some("main"));
    }

    #[test]
    fn binary_round_trips_through_hex_encoding() {
        let mut s = storage();
        s.save_script("main", "keep;").unwrap();
        let script = s.get_script("main").unwrap();
        script.binary_save(&Binary::new()).unwrap();
        assert_eq!(script.binary_status().unwrap(), BinaryStatus::UpToDate);
        let loaded = script.binary_load(&|_| true).unwrap();
        assert_eq!(loaded.main_block().payload, Binary::new().main_block().payload);
    }
}
