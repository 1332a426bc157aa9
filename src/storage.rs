//! String-valued local state, injected wherever preferences or history are
//! persisted.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::db::entities::local_state;

/// A failed read or write of local state.
#[derive(Debug, PartialEq, Eq)]
pub enum StorageError {
    /// The value could not be read.
    ReadFailed(String),
    /// The value could not be written.
    StoragePersistFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed(msg) => write!(f, "Failed to read local state: {msg}"),
            Self::StoragePersistFailed(msg) => write!(f, "Failed to persist local state: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Key/value access to persisted local state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value under `key`, if any.
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing what was there.
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Local state kept in the SQLite `local_state` table.
#[derive(Clone, Debug)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    /// Wraps a migrated connection.
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for DbStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        local_state::Entity::value_of(&self.db, key)
            .await
            .map_err(|err| StorageError::ReadFailed(err.to_string()))
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        local_state::Entity::upsert(&self.db, key, value)
            .await
            .map_err(|err| StorageError::StoragePersistFailed(err.to_string()))
    }
}

/// Process-local state, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    read_only: bool,
    first_write_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with `values`.
    pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            values: Mutex::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Makes every write fail, like a full quota.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Holds the first write back for `delay`, like a slow disk.
    pub fn delay_first_write(self, delay: Duration) -> Self {
        Self {
            first_write_delay: Mutex::new(Some(delay)),
            ..self
        }
    }

    /// The current value under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(key).cloned())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self
            .values
            .lock()
            .map_err(|err| StorageError::ReadFailed(err.to_string()))?;
        Ok(values.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::StoragePersistFailed(
                "store is read-only".to_string(),
            ));
        }
        let delay = self
            .first_write_delay
            .lock()
            .ok()
            .and_then(|mut delay| delay.take());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut values = self
            .values
            .lock()
            .map_err(|err| StorageError::StoragePersistFailed(err.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
