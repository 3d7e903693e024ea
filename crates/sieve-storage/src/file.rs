//! The `file` backend (spec.md §6, §4.11): scripts are plain files
//! under `script_path`; the currently active script is a symlink at
//! `script_active_path` pointing at one of them; compiled binaries are
//! cached alongside under `script_bin_path`.
//!
//! Options: `script_path`, `script_active_path` (default
//! `<script_path>/.active`), `script_bin_path` (default `script_path`).
//!
//! Writes are atomic (temp-file-plus-rename, same idiom as
//! [`sieve_bytecode::Binary::save`]); activation is an atomic symlink
//! swap so readers never observe a half-updated pointer (§5 "Shared
//! resources").

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sieve_bytecode::{Binary, ScriptMetadata};

use crate::error::{Result, StorageError};
use crate::script::{BinaryStatus, Script};
use crate::storage::Storage;

const DRIVER_NAME: &str = "file";
const STORAGE_VERSION: u64 = 1;
const ACTIVE_LINK_NAME: &str = ".active";

#[derive(Debug, Clone)]
pub struct FileStorageOptions {
    pub script_path: PathBuf,
    pub script_active_path: Option<PathBuf>,
    pub script_bin_path: Option<PathBuf>,
}

impl FileStorageOptions {
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
            script_active_path: None,
            script_bin_path: None,
        }
    }

    /// Parse from the key/value option set named in spec.md §6
    /// (`script_path`, `script_active_path`, `script_bin_path`).
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self> {
        let script_path = options
            .get("script_path")
            .ok_or_else(|| StorageError::BadParams("file storage requires script_path".into()))?;
        Ok(Self {
            script_path: PathBuf::from(script_path),
            script_active_path: options.get("script_active_path").map(PathBuf::from),
            script_bin_path: options.get("script_bin_path").map(PathBuf::from),
        })
    }
}

/// `file` storage backend: one directory of `.sieve` sources, an
/// `.active` symlink, and sibling `.svbin` compiled caches.
pub struct FileStorage {
    storage_name: String,
    options: FileStorageOptions,
}

impl FileStorage {
    pub fn new(storage_name: impl Into<String>, options: FileStorageOptions) -> Self {
        Self { storage_name: storage_name.into(), options }
    }

    fn script_path(&self, name: &str) -> PathBuf {
        self.options.script_path.join(format!("{name}.sieve"))
    }

    fn bin_path(&self, name: &str) -> PathBuf {
        self.options
            .script_bin_path
            .clone()
            .unwrap_or_else(|| self.options.script_path.clone())
            .join(format!("{name}.svbin"))
    }

    fn active_path(&self) -> PathBuf {
        self.options
            .script_active_path
            .clone()
            .unwrap_or_else(|| self.options.script_path.join(ACTIVE_LINK_NAME))
    }

    /// Write `bytes` to `path` atomically: temp file in the same
    /// directory, `fsync`, then `rename` over the target (mirrors
    /// `sieve-bytecode::Binary::save`).
    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp_name = path.file_name().unwrap_or_default().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);
        {
            let mut f = File::create(&tmp_path)?;
            f.write_all(bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn name(&self) -> &str {
        &self.storage_name
    }

    fn init(&mut self) -> Result<()> {
        fs::create_dir_all(&self.options.script_path)?;
        if let Some(bin_path) = &self.options.script_bin_path {
            fs::create_dir_all(bin_path)?;
        }
        Ok(())
    }

    fn alloc(&mut self, name: &str) -> Result<Box<dyn Script>> {
        sieve_core::ScriptName::new(name).map_err(|e| StorageError::BadParams(e.to_string()))?;
        let path = self.script_path(name);
        if path.exists() {
            return Err(StorageError::Exists(name.to_owned()));
        }
        Self::write_atomic(&path, b"")?;
        self.get_script(name)
    }

    fn get_script(&self, name: &str) -> Result<Box<dyn Script>> {
        if !self.script_path(name).exists() {
            return Err(StorageError::NotFound(name.to_owned()));
        }
        Ok(Box::new(FileScript {
            storage_name: self.storage_name.clone(),
            script_path: self.script_path(name),
            bin_path: self.bin_path(name),
            active_path: self.active_path(),
            name: name.to_owned(),
        }))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.options.script_path.exists() {
            return Ok(names);
        }
        for entry in fs::read_dir(&self.options.script_path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("sieve") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn active_script_get_name(&self) -> Result<Option<String>> {
        let active = self.active_path();
        match fs::read_link(&active) {
            Ok(target) => Ok(target.file_stem().and_then(|s| s.to_str()).map(str::to_owned)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn active_script_open(&self) -> Result<Box<dyn Script>> {
        let name = self
            .active_script_get_name()?
            .ok_or_else(|| StorageError::NotFound("<no active script>".into()))?;
        self.get_script(&name)
    }

    fn deactivate(&mut self) -> Result<()> {
        let active = self.active_path();
        match fs::remove_file(&active) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_script(&mut self, name: &str, source: &str) -> Result<Box<dyn Script>> {
        sieve_core::ScriptName::new(name).map_err(|e| StorageError::BadParams(e.to_string()))?;
        Self::write_atomic(&self.script_path(name), source.as_bytes())?;
        let bin_path = self.bin_path(name);
        if bin_path.exists() {
            fs::remove_file(&bin_path)?;
        }
        self.get_script(name)
    }

    fn delete_script(&mut self, name: &str) -> Result<()> {
        if self.active_script_get_name()?.as_deref() == Some(name) {
            return Err(StorageError::Active(name.to_owned()));
        }
        let path = self.script_path(name);
        if !path.exists() {
            return Err(StorageError::NotFound(name.to_owned()));
        }
        fs::remove_file(&path)?;
        let bin_path = self.bin_path(name);
        if bin_path.exists() {
            fs::remove_file(&bin_path)?;
        }
        Ok(())
    }

    fn quota_havespace(&self, _additional_bytes: u64) -> Result<bool> {
        // No disk-quota accounting in this backend; a real deployment
        // would consult the filesystem (statvfs) or a configured byte
        // ceiling here.
        Ok(true)
    }
}

struct FileScript {
    storage_name: String,
    script_path: PathBuf,
    bin_path: PathBuf,
    active_path: PathBuf,
    name: String,
}

impl FileScript {
    fn load_binary_bytes(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.bin_path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Script for FileScript {
    fn storage(&self) -> &str {
        &self.storage_name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.script_path)?)
    }

    fn get_stream(&self) -> Result<Box<dyn Read>> {
        Ok(Box::new(File::open(&self.script_path)?))
    }

    fn binary_read_metadata(&self) -> Result<Option<ScriptMetadata>> {
        let Some(bytes) = self.load_binary_bytes()? else { return Ok(None) };
        let binary = Binary::from_bytes(&bytes, &|_| true)?;
        Ok(Some(binary.metadata.clone()))
    }

    fn binary_write_metadata(&self, metadata: &ScriptMetadata) -> Result<()> {
        let Some(bytes) = self.load_binary_bytes()? else {
            return Err(StorageError::NotFound(format!("{}: no cached binary", self.name)));
        };
        let mut binary = Binary::from_bytes(&bytes, &|_| true)?;
        binary.metadata = metadata.clone();
        FileStorage::write_atomic(&self.bin_path, &binary.to_bytes()?)
    }

    fn binary_status(&self) -> Result<BinaryStatus> {
        let Some(metadata) = self.binary_read_metadata()? else {
            return Ok(BinaryStatus::Stale);
        };
        if metadata.driver_name != DRIVER_NAME || metadata.script_name != self.name {
            return Ok(BinaryStatus::Stale);
        }
        let source_modified = fs::metadata(&self.script_path)?.modified()?;
        let binary_modified = fs::metadata(&self.bin_path)?.modified()?;
        if source_modified > binary_modified {
            return Ok(BinaryStatus::Stale);
        }
        Ok(BinaryStatus::UpToDate)
    }

    fn binary_load(&self, known_extensions: &dyn Fn(&str) -> bool) -> Result<Binary> {
        let bytes = self
            .load_binary_bytes()?
            .ok_or_else(|| StorageError::NotFound(format!("{}: no cached binary", self.name)))?;
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
            driver_data: serde_json::json!({ "path": self.script_path }).to_string(),
        };
        FileStorage::write_atomic(&self.bin_path, &binary.to_bytes()?)
    }

    fn rename(&mut self, new_name: &str) -> Result<()> {
        sieve_core::ScriptName::new(new_name).map_err(|e| StorageError::BadParams(e.to_string()))?;
        let new_script_path = self.script_path.with_file_name(format!("{new_name}.sieve"));
        if new_script_path.exists() {
            return Err(StorageError::Exists(new_name.to_owned()));
        }
        let was_active = self.is_active()?;
        fs::rename(&self.script_path, &new_script_path)?;
        let new_bin_path = self.bin_path.with_file_name(format!("{new_name}.svbin"));
        if self.bin_path.exists() {
            fs::rename(&self.bin_path, &new_bin_path)?;
        }
        self.script_path = new_script_path;
        self.bin_path = new_bin_path;
        self.name = new_name.to_owned();
        if was_active {
            self.activate()?;
        }
        Ok(())
    }

    fn delete(self: Box<Self>) -> Result<()> {
        if self.is_active()? {
            return Err(StorageError::Active(self.name.clone()));
        }
        fs::remove_file(&self.script_path)?;
        if self.bin_path.exists() {
            fs::remove_file(&self.bin_path)?;
        }
        Ok(())
    }

    fn activate(&self) -> Result<()> {
        if !self.script_path.exists() {
            return Err(StorageError::NotFound(self.name.clone()));
        }
        // Atomic symlink swap: point a fresh temporary symlink at the
        // target, then rename it over the real active-link path (§4.11
        // "Active script" / §5 "a file backend does this with a
        // temporary symlink and atomic rename").
        let tmp_link = self.active_path.with_extension("active.tmp");
        if fs::symlink_metadata(&tmp_link).is_ok() {
            fs::remove_file(&tmp_link)?;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(&self.script_path, &tmp_link)?;
        #[cfg(not(unix))]
        fs::write(&tmp_link, self.script_path.to_string_lossy().as_bytes())?;
        fs::rename(&tmp_link, &self.active_path)?;
        Ok(())
    }

    fn is_active(&self) -> Result<bool> {
        match fs::read_link(&self.active_path) {
            Ok(target) => Ok(target == self.script_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn storage(dir: &Path) -> FileStorage {
        let mut s = FileStorage::new("test", FileStorageOptions::new(dir));
        s.init().unwrap();
        s
    }

    #[test]
    fn save_then_open_round_trips_source() {
        let dir = tempdir().unwrap();
        let mut s = storage(dir.path());
        s.save_script("main", "keep;").unwrap();
        let script = s.get_script("main").unwrap();
        assert_eq!(script.open().unwrap(), "keep;");
    }

    #[test]
    fn activate_is_visible_through_active_script_open() {
        let dir = tempdir().unwrap();
        let mut s = storage(dir.path());
        s.save_script("main", "keep;").unwrap();
        s.get_script("main").unwrap().activate().unwrap();
        assert_eq!(s.active_script_get_name().unwrap().as_deref(), Some("main"));
        assert!(s.active_script_open().unwrap().is_active().unwrap());
    }

    #[test]
    fn deleting_active_script_fails() {
        let dir = tempdir().unwrap();
        let mut s = storage(dir.path());
        s.save_script("main", "keep;").unwrap();
        s.get_script("main").unwrap().activate().unwrap();
        assert!(matches!(s.delete_script("main"), Err(StorageError::Active(_))));
    }

    #[test]
    fn binary_status_is_stale_with_no_cached_binary() {
        let dir = tempdir().unwrap();
        let mut s = storage(dir.path());
        s.save_script("main", "keep;").unwrap();
        let script = s.get_script("main").unwrap();
        assert_eq!(script.binary_status().unwrap(), BinaryStatus::Stale);
    }

    #[test]
    fn binary_save_then_status_is_up_to_date() {
        let dir = tempdir().unwrap();
        let mut s = storage(dir.path());
        s.save_script("main", "keep;").unwrap();
        let script = s.get_script("main").unwrap();
        script.binary_save(&Binary::new()).unwrap();
        assert_eq!(script.binary_status().unwrap(), BinaryStatus::UpToDate);
    }

    #[test]
    fn resaving_source_invalidates_cached_binary() {
        let dir = tempdir().unwrap();
        let mut s = storage(dir.path());
        s.save_script("main", "keep;").unwrap();
        let script = s.get_script("main").unwrap();
        script.binary_save(&Binary::new()).unwrap();
        s.save_script("main", "discard;").unwrap();
        let script = s.get_script("main").unwrap();
        assert_eq!(script.binary_status().unwrap(), BinaryStatus::Stale);
    }
}
