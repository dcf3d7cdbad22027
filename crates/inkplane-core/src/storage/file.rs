//! File-backed key/value storage for native platforms.

use super::{KeyValueStore, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Stores all entries as a single JSON object on disk.
///
/// The file is rewritten on every `set`/`remove`, mirroring browser local
/// storage semantics where writes are immediately durable.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or create) the storage file at `path`.
    ///
    /// An unreadable or corrupt file is treated as empty.
    pub fn open(path: PathBuf) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Io(format!("Failed to create storage directory: {}", e))
                })?;
            }
        }

        let entries = match fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Discarding corrupt settings file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Default settings file for native hosts.
    ///
    /// On Unix: `~/.local/share/inkplane/settings.json`
    /// On Windows: `%LOCALAPPDATA%\inkplane\settings.json`
    pub fn default_path() -> StorageResult<PathBuf> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Ok(base.join("inkplane").join("settings.json"))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| {
            StorageError::Io(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}
