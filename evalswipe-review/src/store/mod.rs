//! Durable Store collaborator
//!
//! Plain key/value persistence used only to checkpoint and restore a session
//! across restarts. Values are opaque strings (the session snapshot as JSON).

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Key under which the current session checkpoint is stored
pub const SESSION_KEY: &str = "evalswipe_session";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value exists but cannot be used
    #[error("Corrupt checkpoint: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// `Ok(None)` when nothing is stored under `key`
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Removing an absent key is not an error
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
