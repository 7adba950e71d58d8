//! SQLite-backed key/value store
//!
//! One `session_store` table keyed by name; writes are upserts.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::{DurableStore, StorageError};

/// File name of the store inside the root folder
pub const STORE_FILE_NAME: &str = "evalswipe.db";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the store file at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self, StorageError> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        if newly_created {
            info!("Initialized new session store: {}", db_path.display());
        } else {
            info!("Opened existing session store: {}", db_path.display());
        }

        Self::with_pool(pool).await
    }

    /// Private in-memory database, mostly for tests
    pub async fn in_memory() -> Result<Self, StorageError> {
        // A single connection keeps every query on the same memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        create_store_table(&pool).await?;
        Ok(Self { pool })
    }
}

async fn create_store_table(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO session_store (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        debug!(key = key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM session_store WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM session_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SESSION_KEY;

    #[tokio::test]
    async fn test_save_overwrites_previous_value() {
        let store = SqliteStore::in_memory().await.unwrap();

        store.save(SESSION_KEY, "first").await.unwrap();
        store.save(SESSION_KEY, "second").await.unwrap();

        assert_eq!(
            store.load(SESSION_KEY).await.unwrap().as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn test_load_absent_key() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.save(SESSION_KEY, "{}").await.unwrap();

        store.remove(SESSION_KEY).await.unwrap();
        store.remove(SESSION_KEY).await.unwrap();
        assert!(store.load(SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join(STORE_FILE_NAME);

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.save(SESSION_KEY, r#"{"currentTraceIndex":2}"#).await.unwrap();
        }

        let reopened = SqliteStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.load(SESSION_KEY).await.unwrap().as_deref(),
            Some(r#"{"currentTraceIndex":2}"#)
        );
    }
}
