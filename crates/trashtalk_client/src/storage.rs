//! crates/trashtalk_client/src/storage.rs
//!
//! Key-value storage backing the client's identity and session snapshot.
//! Two scopes exist: a durable store that survives restarts (the browser's
//! localStorage, rendered here as a JSON file) and a session store that
//! lives only as long as the process (sessionStorage, rendered in memory).

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Errors raised by a storage backend. Callers in this crate never let these
/// escape; unavailable storage always degrades to a temporary in-memory
/// substitute.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage contents are not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Storage is unavailable: {0}")]
    Unavailable(String),
}

/// Minimal string key-value contract shared by both storage scopes.
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn store(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).load(key)
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).store(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

//=========================================================================================
// In-memory store (session scope, and the degraded fallback)
//=========================================================================================

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

//=========================================================================================
// File-backed store (durable scope)
//=========================================================================================

/// A durable store persisting all keys into one JSON object file.
/// Reads and writes go through an in-memory cache guarded by a mutex; every
/// mutation is flushed to disk immediately.
pub struct FileStore {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Opens (or lazily creates) the store at `path`. A missing file is an
    /// empty store; an unreadable or corrupt file is an error the caller is
    /// expected to degrade from.
    pub fn open(path: PathBuf) -> Result<Self, StorageError> {
        let cache = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let value: Value = serde_json::from_str(&contents)?;
                match value {
                    Value::Object(map) => map
                        .into_iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                        .collect(),
                    _ => {
                        return Err(StorageError::Unavailable(format!(
                            "{} does not contain a JSON object",
                            path.display()
                        )))
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StorageError::Io(e)),
        };

        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    fn flush(&self, cache: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(cache)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.cache.lock().unwrap().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut cache = self.cache.lock().unwrap();
        cache.insert(key.to_string(), value.to_string());
        self.flush(&cache)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut cache = self.cache.lock().unwrap();
        cache.remove(key);
        self.flush(&cache)
    }
}
