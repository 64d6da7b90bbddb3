//! Process-local secure store.

use async_trait::async_trait;
use bridge_traits::{error::Result, storage::SecureStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// `SecureStore` kept in process memory.
///
/// Clones share the same map, which lets a test drop a session manager and
/// build a fresh one over the same storage to simulate an app restart.
#[derive(Clone, Default)]
pub struct MemorySecureStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear_all(&self) -> Result<()> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemorySecureStore::new();
        let reopened = store.clone();

        store.set_secret("quiz_master_token", b"T1").await.unwrap();

        assert_eq!(
            reopened.get_secret("quiz_master_token").await.unwrap(),
            Some(b"T1".to_vec())
        );
        assert_eq!(reopened.list_keys().await.unwrap(), vec!["quiz_master_token"]);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let store = MemorySecureStore::new();
        store.delete_secret("absent").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let store = MemorySecureStore::new();
        store.set_secret("a", b"1").await.unwrap();
        store.set_secret("b", b"2").await.unwrap();

        store.clear_all().await.unwrap();

        assert_eq!(store.len().await, 0);
        assert!(!store.has_secret("a").await.unwrap());
    }
}
