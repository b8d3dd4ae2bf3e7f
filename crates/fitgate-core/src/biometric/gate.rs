//! Biometric gate state machine

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{BiometricAuthenticator, BiometricOutcome};
use crate::credential::{CredentialCache, StoredCredential};
use crate::error::{AuthError, Result};

/// Gate state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Availability not yet determined
    Unchecked,
    /// No hardware or no cached credential
    Unavailable,
    /// Biometric login can be offered
    Available,
    /// OS prompt is on screen
    Prompting,
    /// Last prompt succeeded and the credential was released
    Succeeded,
    /// Last prompt was cancelled or did not match
    Denied,
    /// Last prompt could not run
    Failed(String),
}

/// Decides whether biometric login is offered and releases the cached
/// credential after a successful prompt. Never talks to the identity
/// provider.
pub struct BiometricGate {
    authenticator: Arc<dyn BiometricAuthenticator>,
    cache: CredentialCache,
    prompt_message: String,
    state: GateState,
}

impl BiometricGate {
    pub fn new(
        authenticator: Arc<dyn BiometricAuthenticator>,
        cache: CredentialCache,
        prompt_message: impl Into<String>,
    ) -> Self {
        Self {
            authenticator,
            cache,
            prompt_message: prompt_message.into(),
            state: GateState::Unchecked,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// Forget the last availability decision
    pub fn invalidate(&mut self) {
        self.state = GateState::Unchecked;
    }

    /// Hardware present and a credential cached.
    ///
    /// Enrollment is only logged: some platforms misreport it, and the OS
    /// prompt is the authoritative check.
    pub async fn check_availability(&mut self) -> Result<bool> {
        if !self.authenticator.has_hardware().await {
            debug!("No biometric hardware");
            self.state = GateState::Unavailable;
            return Ok(false);
        }

        if !self.authenticator.is_enrolled().await {
            debug!("Platform reports no biometric enrollment");
        }

        let cached = match self.cache.load().await {
            Ok(cached) => cached,
            Err(e) => {
                self.state = GateState::Unchecked;
                return Err(e);
            }
        };

        let available = cached.is_some();
        self.state = if available {
            GateState::Available
        } else {
            GateState::Unavailable
        };

        Ok(available)
    }

    /// Prompt and, on success, release the cached credential.
    ///
    /// Denial or a prompt error never touches the cache.
    pub async fn unlock(&mut self) -> Result<StoredCredential> {
        if !self.check_availability().await? {
            return Err(AuthError::BiometricUnavailable);
        }

        let authenticator = Arc::clone(&self.authenticator);
        let outcome = {
            let attempt = PromptAttempt::begin(&mut self.state);
            let outcome = authenticator.prompt(&self.prompt_message).await;
            attempt.settle(match &outcome {
                BiometricOutcome::Success => GateState::Succeeded,
                BiometricOutcome::Denied => GateState::Denied,
                BiometricOutcome::Error(msg) => GateState::Failed(msg.clone()),
            });
            outcome
        };

        match outcome {
            BiometricOutcome::Success => match self.cache.load().await? {
                Some(credential) => {
                    info!("Biometric unlock released credential for {}", credential.identifier);
                    Ok(credential)
                }
                None => {
                    self.state = GateState::Unavailable;
                    Err(AuthError::NoStoredCredential)
                }
            },
            BiometricOutcome::Denied => {
                debug!("Biometric prompt denied");
                Err(AuthError::BiometricDenied)
            }
            BiometricOutcome::Error(msg) => {
                warn!("Biometric prompt failed: {}", msg);
                Err(AuthError::BiometricError(msg))
            }
        }
    }
}

/// Puts the gate back to `Available` if the prompt future is dropped
struct PromptAttempt<'a> {
    state: &'a mut GateState,
    settled: bool,
}

impl<'a> PromptAttempt<'a> {
    fn begin(state: &'a mut GateState) -> Self {
        *state = GateState::Prompting;
        Self {
            state,
            settled: false,
        }
    }

    fn settle(mut self, next: GateState) {
        *self.state = next;
        self.settled = true;
    }
}

impl Drop for PromptAttempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("Biometric prompt cancelled");
            *self.state = GateState::Available;
        }
    }
}
