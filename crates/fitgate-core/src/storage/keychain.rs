//! OS Keychain storage backend
//!
//! Uses the system keychain for secure storage:
//! - macOS / iOS: Keychain
//! - Windows: Credential Manager (DPAPI)
//! - Linux: Secret Service (GNOME Keyring, KWallet)

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, warn};

use super::SecureStorage;
use crate::error::{AuthError, Result};

/// Service name used for keychain entries
const SERVICE_NAME: &str = "fitgate";

/// OS Keychain storage backend
pub struct KeychainStorage {
    /// Prefix for all keys (for namespacing)
    prefix: String,
    /// Whether keychain is available
    available: bool,
}

impl KeychainStorage {
    /// Create a new keychain storage with optional namespace
    pub fn new(namespace: Option<&str>) -> Self {
        let prefix = namespace.map(|p| format!("{}-", p)).unwrap_or_default();

        let available = Self::probe();

        if available {
            debug!("Keychain storage is available");
        } else {
            warn!("Keychain storage is not available");
        }

        Self { prefix, available }
    }

    /// Write and remove a throwaway entry to see whether the keychain answers
    fn probe() -> bool {
        match Entry::new(SERVICE_NAME, "__fitgate_probe__") {
            Ok(entry) => {
                if entry.set_password("probe").is_ok() {
                    let _ = entry.delete_password();
                    true
                } else {
                    false
                }
            }
            Err(_) => false,
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        if !self.available {
            return Err(AuthError::StorageUnavailable(
                "Keychain not available".to_string(),
            ));
        }

        let full_key = format!("{}{}", self.prefix, key);
        Entry::new(SERVICE_NAME, &full_key)
            .map_err(|e| AuthError::StorageUnavailable(e.to_string()))
    }

    /// Check if keychain is available
    pub fn is_available(&self) -> bool {
        self.available
    }
}

#[async_trait]
impl SecureStorage for KeychainStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entry = self.entry(key)?;

        match entry.get_password() {
            Ok(value) => {
                debug!("Read key from keychain: {}", key);
                Ok(Some(value))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::StorageUnavailable(e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let entry = self.entry(key)?;

        entry
            .set_password(value)
            .map_err(|e| AuthError::StorageUnavailable(e.to_string()))?;

        debug!("Stored key in keychain: {}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let entry = self.entry(key)?;

        match entry.delete_password() {
            Ok(()) => {
                debug!("Deleted key from keychain: {}", key);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::StorageUnavailable(e.to_string())),
        }
    }

    fn is_hardware_backed(&self) -> bool {
        // OS keychains are treated as hardware-backed (Secure Enclave, DPAPI, TPM-sealed keyrings)
        self.available
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        return "Apple Keychain";

        #[cfg(target_os = "windows")]
        return "Windows Credential Manager";

        #[cfg(target_os = "linux")]
        return "Linux Secret Service";

        #[cfg(not(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "windows",
            target_os = "linux"
        )))]
        return "System Keychain";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keychain_availability() {
        let storage = KeychainStorage::new(Some("fitgate-test"));
        // Only checks that probing does not panic on hosts without a keychain
        let _ = storage.is_available();
    }

    #[tokio::test]
    async fn test_unavailable_keychain_reports_storage_error() {
        let storage = KeychainStorage {
            prefix: String::new(),
            available: false,
        };

        let err = storage.get("credentials").await.unwrap_err();
        assert!(matches!(err, AuthError::StorageUnavailable(_)));

        let err = storage.set("credentials", "{}").await.unwrap_err();
        assert!(matches!(err, AuthError::StorageUnavailable(_)));
        assert!(!storage.is_hardware_backed());
    }
}
