//! Process-local store for tests and throwaway sessions

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::{DurableStore, StorageError};

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with `StorageError::Unavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Put a raw value in place, bypassing failure injection
    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.values.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_store_rejects_and_recovers() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(matches!(
            store.save("k", "v").await,
            Err(StorageError::Unavailable(_))
        ));

        store.set_failing(false);
        store.save("k", "v").await.unwrap();
        assert_eq!(store.load("k").await.unwrap().as_deref(), Some("v"));
    }
}
