//! Primary email change

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{normalize_email, validate_code, validate_email, VerificationStatus, VerifyingGuard};
use crate::error::{AuthError, Result};
use crate::provider::{EmailAddressHandle, IdentityProvider, ProviderError, ProviderResult};

/// Replaces the signed-in user's primary address after the new one is
/// verified with a one-time code
pub struct EmailChangeFlow {
    provider: Arc<dyn IdentityProvider>,
    status: VerificationStatus,
    pending: Option<EmailAddressHandle>,
    /// Code already accepted; only finalisation is left
    verified: bool,
}

impl EmailChangeFlow {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            status: VerificationStatus::Idle,
            pending: None,
            verified: false,
        }
    }

    pub fn status(&self) -> &VerificationStatus {
        &self.status
    }

    /// Address waiting for its code
    pub fn pending_address(&self) -> Option<&str> {
        self.pending.as_ref().map(|h| h.address.as_str())
    }

    /// Add `new_address` to the account and send it a code
    pub async fn request_change(&mut self, new_address: &str) -> Result<()> {
        if self.pending.is_some() {
            return Err(AuthError::InvalidState(
                "an email change is already in progress".to_string(),
            ));
        }

        let new_address = normalize_email(new_address);
        validate_email(&new_address)?;

        let account = self
            .provider
            .current_account()
            .await?
            .ok_or_else(|| AuthError::InvalidState("no signed-in account".to_string()))?;

        let current = account.primary_email().map(|e| normalize_email(&e.address));
        if current.as_deref() == Some(new_address.as_str()) {
            info!("Requested email matches the current primary address");
            return Err(AuthError::EmailUnchanged);
        }

        let handle = self.provider.create_email_address(&new_address).await?;

        if let Err(e) = self.provider.prepare_email_verification(&handle).await {
            warn!("Could not send verification code to {}: {}", handle.address, e);
            if let Err(cleanup) = self.provider.delete_email_address(&handle).await {
                warn!("Could not remove unverified address {}: {}", handle.address, cleanup);
            }
            return Err(e.into());
        }

        info!("Verification code sent to {}", handle.address);
        self.pending = Some(handle);
        self.verified = false;
        self.status = VerificationStatus::CodeRequested;
        Ok(())
    }

    /// Verify the code, make the new address primary and drop the others.
    ///
    /// Returns the new primary address.
    pub async fn submit_code(&mut self, code: &str) -> Result<EmailAddressHandle> {
        if !self.status.accepts_code() {
            return Err(AuthError::InvalidState(format!(
                "cannot submit a code while {:?}",
                self.status
            )));
        }
        let code = validate_code(code)?;
        let handle = self
            .pending
            .clone()
            .ok_or_else(|| AuthError::InvalidState("no email change pending".to_string()))?;

        let guard = VerifyingGuard::begin(&mut self.status);

        if !self.verified {
            if let Err(e) = self
                .provider
                .attempt_email_verification(&handle, code)
                .await
            {
                warn!("Verification code rejected for {}: {}", handle.address, e);
                guard.fail(e.message.clone());
                return Err(AuthError::VerificationRejected(e));
            }
            self.verified = true;
        }

        if let Err(e) = promote(self.provider.as_ref(), &handle).await {
            warn!("Verified {} but could not make it primary: {}", handle.address, e);
            guard.fail(e.message.clone());
            return Err(AuthError::Provider(e));
        }

        guard.settle(VerificationStatus::Complete);
        self.pending = None;
        self.verified = false;

        info!("Primary email changed to {}", handle.address);
        Ok(handle)
    }

    /// Abandon the change and remove the pending address.
    ///
    /// The flow stays pending until the provider has removed the address,
    /// so a failed cancel can be retried.
    pub async fn cancel(&mut self) -> Result<()> {
        if let Some(handle) = &self.pending {
            match self.provider.delete_email_address(handle).await {
                Ok(()) => info!("Email change to {} cancelled", handle.address),
                Err(e) if e.code == "resource_not_found" => {
                    debug!("Pending address {} already gone", handle.address);
                }
                Err(e) => {
                    warn!("Could not remove pending address {}: {}", handle.address, e);
                    return Err(e.into());
                }
            }
        }

        self.pending = None;
        self.verified = false;
        self.status = VerificationStatus::Idle;
        Ok(())
    }
}

/// Make `handle` primary and delete every other address on the account
async fn promote(provider: &dyn IdentityProvider, handle: &EmailAddressHandle) -> ProviderResult<()> {
    provider.set_primary_email(handle).await?;

    let account = provider.current_account().await?.ok_or_else(|| {
        ProviderError::new("signed_out", "You need to be signed in to do that.")
    })?;

    for old in account.email_addresses.iter().filter(|e| e.id != handle.id) {
        provider.delete_email_address(old).await?;
    }

    Ok(())
}
