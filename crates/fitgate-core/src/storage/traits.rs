//! Storage trait definitions

use crate::error::Result;
use async_trait::async_trait;

/// Key/value store for small secrets that must survive app restarts.
///
/// Implementations report every backend failure as
/// [`AuthError::StorageUnavailable`](crate::AuthError::StorageUnavailable).
/// A missing key is `Ok(None)`, never an error.
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Retrieve a value by key
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value; deleting a missing key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if this storage backend is hardware-backed
    fn is_hardware_backed(&self) -> bool;

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
