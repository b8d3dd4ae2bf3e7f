//! In-memory storage backend
//!
//! Nothing survives the process. Used when no keychain is present and for
//! throwaway console sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::SecureStorage;
use crate::error::Result;

/// Volatile key/value storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        debug!("Stored key: {}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.entries.write().await.remove(key).is_some() {
            debug!("Deleted key: {}", key);
        }
        Ok(())
    }

    fn is_hardware_backed(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "In-Memory Storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let storage = MemoryStorage::new();

        assert_eq!(storage.get("provider").await.unwrap(), None);

        storage.set("provider", "email").await.unwrap();
        assert_eq!(
            storage.get("provider").await.unwrap(),
            Some("email".to_string())
        );

        storage.set("provider", "oauth_google").await.unwrap();
        assert_eq!(
            storage.get("provider").await.unwrap(),
            Some("oauth_google".to_string())
        );

        storage.delete("provider").await.unwrap();
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_missing_key_succeeds() {
        let storage = MemoryStorage::new();
        storage.delete("locked").await.unwrap();
        assert_eq!(storage.len().await, 0);
    }
}
