//! Persistent key-value storage port for session data.
//!
//! DESIGN
//! ======
//! The session store is the only writer. It talks to storage through the
//! narrow `KeyValueStore` trait so tests can substitute `MemoryStore` and the
//! CLI can persist to disk with `FileStore`. Multi-key writes go through
//! `apply` so an adapter can commit them as one unit.
//!
//! A `FileStore` whose file is not valid JSON reads as an error but is
//! replaced wholesale by the next write, so a corrupt file never blocks
//! logout or a fresh login.
//!
//! TRADE-OFFS
//! ==========
//! `FileStore` rereads and rewrites the whole file on every operation. The
//! file holds three short entries, so simplicity wins over caching.

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ErrorCode;

pub const ACCESS_TOKEN_KEY: &str = "authToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed: {0}")]
    Io(String),
    #[error("storage contents are not a JSON object: {0}")]
    Format(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E_STORAGE_IO",
            Self::Format(_) => "E_STORAGE_FORMAT",
            Self::Unavailable(_) => "E_STORAGE_UNAVAILABLE",
        }
    }
}

// =============================================================================
// PORT
// =============================================================================

/// One mutation inside a batch passed to [`KeyValueStore::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp<'a> {
    Set(&'a str, &'a str),
    Remove(&'a str),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Apply a batch of mutations. Adapters that can commit atomically
    /// override this; the default applies each op in order.
    fn apply(&self, ops: &[StorageOp<'_>]) -> Result<(), StorageError> {
        for op in ops {
            match *op {
                StorageOp::Set(key, value) => self.set(key, value)?,
                StorageOp::Remove(key) => self.remove(key)?,
            }
        }
        Ok(())
    }
}

fn apply_to_map(map: &mut HashMap<String, String>, ops: &[StorageOp<'_>]) {
    for op in ops {
        match *op {
            StorageOp::Set(key, value) => {
                map.insert(key.to_owned(), value.to_owned());
            }
            StorageOp::Remove(key) => {
                map.remove(key);
            }
        }
    }
}

// =============================================================================
// MEMORY
// =============================================================================

/// Shared in-memory store. Clones see the same entries.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }

    fn apply(&self, ops: &[StorageOp<'_>]) -> Result<(), StorageError> {
        apply_to_map(&mut self.lock(), ops);
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// JSON-object file on disk. A missing file reads as an empty store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(StorageError::Io(format!("{}: {e}", self.path.display()))),
        };
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| StorageError::Format(format!("{}: {e}", self.path.display())))
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        let io_err = |e: std::io::Error| StorageError::Io(format!("{}: {e}", self.path.display()));
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(map).map_err(|e| StorageError::Format(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }

    fn modify(&self, ops: &[StorageOp<'_>]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(StorageError::Format(detail)) => {
                tracing::warn!(%detail, "overwriting unreadable storage file");
                HashMap::new()
            }
            Err(e) => return Err(e),
        };
        apply_to_map(&mut map, ops);
        self.write_map(&map)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.modify(&[StorageOp::Set(key, value)])
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.modify(&[StorageOp::Remove(key)])
    }

    fn apply(&self, ops: &[StorageOp<'_>]) -> Result<(), StorageError> {
        self.modify(ops)
    }
}

// =============================================================================
// BROWSER
// =============================================================================

/// `window.localStorage` adapter for browser builds.
#[cfg(feature = "web")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

#[cfg(feature = "web")]
impl LocalStorage {
    fn storage() -> Result<web_sys::Storage, StorageError> {
        web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window".to_owned()))?
            .local_storage()
            .map_err(|_| StorageError::Unavailable("localStorage access denied".to_owned()))?
            .ok_or_else(|| StorageError::Unavailable("localStorage disabled".to_owned()))
    }
}

// wasm32 is single-threaded, so the adapter holds no state to share.
#[cfg(feature = "web")]
impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::storage()?
            .get_item(key)
            .map_err(|_| StorageError::Io(format!("localStorage get {key} failed")))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|_| StorageError::Io(format!("localStorage set {key} failed")))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        Self::storage()?
            .remove_item(key)
            .map_err(|_| StorageError::Io(format!("localStorage remove {key} failed")))
    }
}
