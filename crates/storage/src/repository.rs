use async_trait::async_trait;
use clinic_core::model::SessionId;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persistence contract for the active autosave session id.
///
/// One store instance models one browsing context: the cached id survives a
/// reload (process restart) but must never leak across unrelated attempts,
/// so `clear` runs on both completion and explicit abandonment. At most one
/// id is held at a time; `set` replaces any previous value.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the cached session id, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn get(&self) -> Result<Option<SessionId>, StorageError>;

    /// Cache a session id, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the id cannot be persisted.
    async fn set(&self, id: &SessionId) -> Result<(), StorageError>;

    /// Drop the cached session id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    current: Arc<Mutex<Option<SessionId>>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self) -> Result<Option<SessionId>, StorageError> {
        let guard = self
            .current
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn set(&self, id: &SessionId) -> Result<(), StorageError> {
        let mut guard = self
            .current
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(id.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .current
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Aggregates storage adapters behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        Self { sessions }
    }
}
