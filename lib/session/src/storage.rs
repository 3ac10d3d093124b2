//! Durable key/value storage for the session entries.
//!
//! The session is persisted as exactly two entries: the bearer token under
//! [`TOKEN_KEY`] and the serialized identity under [`USER_KEY`]. The store
//! writes and removes them together.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StorageError;

/// Key of the bearer token entry.
pub const TOKEN_KEY: &str = "token";

/// Key of the serialized user identity entry.
pub const USER_KEY: &str = "user";

/// Durable string storage that survives a restart of the console.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Reads an entry, returning `None` if it does not exist.
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes an entry, replacing any previous value.
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes an entry. Removing a missing entry succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local storage, used in tests and for throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage pre-populated with entries.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Returns a copy of the stored entries.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|e| StorageError::ReadFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|e| StorageError::WriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|e| StorageError::RemoveFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        entries.remove(key);
        Ok(())
    }
}

/// File-backed storage: one file per entry inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    /// Creates storage rooted at `directory`. The directory is created on
    /// first write.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }
}

#[async_trait]
impl SessionStorage for FileStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.entry_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let write_failed = |e: std::io::Error| StorageError::WriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        };
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(write_failed)?;
        tokio::fs::write(self.entry_path(key), value)
            .await
            .map_err(write_failed)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::RemoveFailed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
