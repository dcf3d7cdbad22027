//! Local key/value storage for client-side settings.
//!
//! The viewport persists three scalar entries here on every change and reads
//! them back once at startup.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod local;

pub use memory::MemoryStorage;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

#[cfg(target_arch = "wasm32")]
pub use local::LocalStorage;

use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Synchronous string key/value store.
///
/// Implementations can keep entries in memory, in a JSON file on native
/// platforms, or in browser local storage.
#[cfg(not(target_arch = "wasm32"))]
pub trait KeyValueStore: Send + Sync {
    /// Read an entry; `Ok(None)` when the key was never written.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write an entry, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove an entry. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Synchronous string key/value store (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}
