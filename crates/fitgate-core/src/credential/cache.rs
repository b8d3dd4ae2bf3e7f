//! Credential cache backed by secure storage
//!
//! Holds at most one password credential, the provider tag of the last
//! authentication, and the soft-lock flag.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::types::{ProviderTag, StoredCredential};
use crate::error::Result;
use crate::storage::SecureStorage;

/// Storage key for the cached credential pair
pub const CREDENTIAL_KEY: &str = "credentials";
/// Storage key for the provider tag
pub const PROVIDER_KEY: &str = "provider";
/// Storage key for the soft-lock flag
pub const LOCK_KEY: &str = "locked";

/// Durable store for the last password credential and session flags
#[derive(Clone)]
pub struct CredentialCache {
    storage: Arc<dyn SecureStorage>,
}

impl CredentialCache {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Name of the storage backend in use
    pub fn backend_name(&self) -> &'static str {
        self.storage.backend_name()
    }

    /// Overwrite the cached credential and provider tag.
    ///
    /// Either both writes land or the previous credential record is put
    /// back before the error is returned.
    pub async fn save(&self, identifier: &str, secret: &str, tag: ProviderTag) -> Result<()> {
        let payload = StoredCredential::new(identifier, secret).to_payload()?;
        let previous = self.storage.get(CREDENTIAL_KEY).await?;

        self.storage.set(CREDENTIAL_KEY, &payload).await?;

        if let Err(e) = self.storage.set(PROVIDER_KEY, tag.as_str()).await {
            warn!("Provider tag write failed, restoring previous credential: {}", e);
            let restored = match previous {
                Some(old) => self.storage.set(CREDENTIAL_KEY, &old).await,
                None => self.storage.delete(CREDENTIAL_KEY).await,
            };
            if let Err(restore_err) = restored {
                error!("Could not restore previous credential: {}", restore_err);
            }
            return Err(e);
        }

        info!("Cached credential for {}", identifier);
        Ok(())
    }

    /// Load the cached credential.
    ///
    /// A malformed payload reads as absent; storage failures are errors.
    pub async fn load(&self) -> Result<Option<StoredCredential>> {
        let Some(payload) = self.storage.get(CREDENTIAL_KEY).await? else {
            return Ok(None);
        };

        match StoredCredential::from_payload(&payload) {
            Some(credential) => Ok(Some(credential)),
            None => {
                warn!("Ignoring malformed cached credential");
                Ok(None)
            }
        }
    }

    /// Remove the cached credential
    pub async fn clear(&self) -> Result<()> {
        self.storage.delete(CREDENTIAL_KEY).await?;
        info!("Cleared cached credential");
        Ok(())
    }

    /// Provider tag of the last successful authentication
    pub async fn provider_tag(&self) -> Result<Option<ProviderTag>> {
        let Some(raw) = self.storage.get(PROVIDER_KEY).await? else {
            return Ok(None);
        };

        match raw.parse() {
            Ok(tag) => Ok(Some(tag)),
            Err(e) => {
                warn!("Ignoring stored provider tag: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn set_provider_tag(&self, tag: ProviderTag) -> Result<()> {
        self.storage.set(PROVIDER_KEY, tag.as_str()).await?;
        debug!("Provider tag set to {}", tag);
        Ok(())
    }

    pub async fn clear_provider_tag(&self) -> Result<()> {
        self.storage.delete(PROVIDER_KEY).await
    }

    /// Whether the app is soft-locked
    pub async fn is_locked(&self) -> Result<bool> {
        Ok(self.storage.get(LOCK_KEY).await?.as_deref() == Some("true"))
    }

    pub async fn set_locked(&self, locked: bool) -> Result<()> {
        if locked {
            self.storage.set(LOCK_KEY, "true").await?;
        } else {
            self.storage.delete(LOCK_KEY).await?;
        }
        debug!("Lock flag set to {}", locked);
        Ok(())
    }
}
