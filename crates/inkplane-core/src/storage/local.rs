//! Browser `localStorage` backend for WebAssembly.

use super::{KeyValueStore, StorageError, StorageResult};

/// Key/value storage backed by `window.localStorage`.
///
/// Not Send/Sync; WASM is single-threaded.
pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    /// Bind to the window's local storage.
    pub fn new() -> StorageResult<Self> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Other("No window object".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(|e| StorageError::Other(format!("localStorage error: {:?}", e)))?
            .ok_or_else(|| StorageError::Other("localStorage not available".to_string()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {:?}", key, e)))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {:?}", key, e)))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| StorageError::Io(format!("Failed to remove {}: {:?}", key, e)))
    }
}
