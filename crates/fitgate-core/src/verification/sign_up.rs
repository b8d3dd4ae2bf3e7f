//! Email + password sign-up

use std::sync::Arc;
use tracing::{info, warn};

use super::{normalize_email, validate_code, validate_email, VerificationStatus, VerifyingGuard};
use crate::credential::SecretString;
use crate::error::{AuthError, Result};
use crate::provider::{
    EmailAddressHandle, IdentityProvider, ProfileField, ProfileUpdate, SignInStatus,
};

/// What the user typed on the sign-up screen
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    pub first_name: Option<String>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
}

impl SignUpForm {
    pub fn new(email: impl Into<String>, password: &str, confirm_password: &str) -> Self {
        Self {
            email: email.into(),
            password: SecretString::new(password),
            confirm_password: SecretString::new(confirm_password),
            ..Default::default()
        }
    }

    /// Optional profile details, blank entries skipped
    fn profile(&self) -> ProfileUpdate {
        [
            (ProfileField::FirstName, &self.first_name),
            (ProfileField::Username, &self.username),
            (ProfileField::PhoneNumber, &self.phone_number),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            let value = value.as_deref()?.trim();
            (!value.is_empty()).then(|| (field, value.to_string()))
        })
        .fold(ProfileUpdate::new(), |update, (field, value)| {
            update.set(field, value)
        })
    }
}

/// A verified sign-up with an active provider session, ready for
/// [`SessionController::complete_sign_up`](crate::controller::SessionController::complete_sign_up)
#[derive(Debug)]
pub struct SignUpCompletion {
    pub identifier: String,
    pub secret: SecretString,
    /// Details to write once the account exists
    pub profile: ProfileUpdate,
}

/// Creates an account after the address is verified with a one-time code
pub struct SignUpFlow {
    provider: Arc<dyn IdentityProvider>,
    status: VerificationStatus,
    pending: Option<PendingSignUp>,
}

struct PendingSignUp {
    handle: EmailAddressHandle,
    secret: SecretString,
    profile: ProfileUpdate,
    verified: bool,
}

impl SignUpFlow {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            status: VerificationStatus::Idle,
            pending: None,
        }
    }

    pub fn status(&self) -> &VerificationStatus {
        &self.status
    }

    pub fn pending_address(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.handle.address.as_str())
    }

    /// Register the address and password and send the address a code
    pub async fn start(&mut self, form: SignUpForm) -> Result<()> {
        if self.pending.is_some() {
            return Err(AuthError::InvalidState(
                "a sign-up is already in progress".to_string(),
            ));
        }

        let email = normalize_email(&form.email);
        if email.is_empty() {
            return Err(AuthError::InvalidInput("Email is required".to_string()));
        }
        validate_email(&email)?;
        if form.password.is_empty() {
            return Err(AuthError::InvalidInput("Password is required".to_string()));
        }
        if form.password != form.confirm_password {
            return Err(AuthError::InvalidInput("Passwords do not match".to_string()));
        }

        let handle = self
            .provider
            .sign_up(&email, form.password.expose())
            .await?;
        self.provider.prepare_email_verification(&handle).await?;

        info!("Sign-up started for {}", handle.address);
        self.pending = Some(PendingSignUp {
            handle,
            secret: form.password.clone(),
            profile: form.profile(),
            verified: false,
        });
        self.status = VerificationStatus::CodeRequested;
        Ok(())
    }

    /// Verify the code and create the account
    pub async fn submit_code(&mut self, code: &str) -> Result<SignUpCompletion> {
        if !self.status.accepts_code() {
            return Err(AuthError::InvalidState(format!(
                "cannot submit a code while {:?}",
                self.status
            )));
        }
        let code = validate_code(code)?;
        let Some(pending) = self.pending.as_mut() else {
            return Err(AuthError::InvalidState("no sign-up pending".to_string()));
        };

        let guard = VerifyingGuard::begin(&mut self.status);

        if !pending.verified {
            if let Err(e) = self
                .provider
                .attempt_email_verification(&pending.handle, code)
                .await
            {
                warn!("Sign-up code rejected for {}: {}", pending.handle.address, e);
                guard.fail(e.message.clone());
                return Err(AuthError::VerificationRejected(e));
            }
            pending.verified = true;
        }

        match self.provider.finalize_sign_up().await {
            Ok(SignInStatus::Complete { .. }) => {}
            Ok(SignInStatus::Incomplete { reason }) => {
                warn!("Sign-up incomplete: {}", reason);
                guard.fail(reason.clone());
                return Err(AuthError::IncompleteSignIn(reason));
            }
            Err(e) => {
                warn!("Could not finish sign-up: {}", e);
                guard.fail(e.message.clone());
                return Err(AuthError::Provider(e));
            }
        }

        guard.settle(VerificationStatus::Complete);
        let Some(pending) = self.pending.take() else {
            return Err(AuthError::InvalidState("no sign-up pending".to_string()));
        };

        info!("Account created for {}", pending.handle.address);
        Ok(SignUpCompletion {
            identifier: pending.handle.address,
            secret: pending.secret,
            profile: pending.profile,
        })
    }

    /// Abandon the sign-up at the provider, then locally.
    ///
    /// On failure the sign-up stays pending and cancel can be retried.
    pub async fn cancel(&mut self) -> Result<()> {
        if let Some(pending) = &self.pending {
            if let Err(e) = self.provider.abandon_sign_up().await {
                warn!("Could not abandon sign-up for {}: {}", pending.handle.address, e);
                return Err(e.into());
            }
            info!("Sign-up for {} cancelled", pending.handle.address);
        }

        self.pending = None;
        self.status = VerificationStatus::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{InMemoryProvider, ProviderError};
    use crate::testing::StalledVerification;
    use std::time::Duration;

    fn form(email: &str) -> SignUpForm {
        SignUpForm {
            first_name: Some("Dana".to_string()),
            username: Some("  ".to_string()),
            ..SignUpForm::new(email, "Secret1!", "Secret1!")
        }
    }

    #[tokio::test]
    async fn test_mismatched_passwords() {
        let provider = Arc::new(InMemoryProvider::new());
        let mut flow = SignUpFlow::new(provider);

        let err = flow
            .start(SignUpForm::new("dana@example.com", "Secret1!", "Secret2!"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Passwords do not match");
        assert_eq!(flow.status(), &VerificationStatus::Idle);
    }

    #[tokio::test]
    async fn test_sign_up_completes() {
        let provider = Arc::new(InMemoryProvider::new());
        let mut flow = SignUpFlow::new(provider.clone());

        flow.start(form(" Dana@Example.com")).await.unwrap();
        assert_eq!(flow.status(), &VerificationStatus::CodeRequested);

        let code = provider.verification_code("dana@example.com").await.unwrap();
        let completion = flow.submit_code(&code).await.unwrap();

        assert_eq!(flow.status(), &VerificationStatus::Complete);
        assert_eq!(completion.identifier, "dana@example.com");
        assert_eq!(completion.secret.expose(), "Secret1!");
        assert_eq!(
            completion.profile,
            ProfileUpdate::new().set(ProfileField::FirstName, "Dana")
        );
        assert!(provider.is_signed_in().await);
        assert!(provider.account_by_email("dana@example.com").await.is_some());
    }

    #[tokio::test]
    async fn test_existing_address_rejected() {
        let provider = Arc::new(InMemoryProvider::new().with_account("dana@example.com", "Secret1!"));
        let mut flow = SignUpFlow::new(provider);

        let err = flow.start(form("dana@example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::Provider(ref e) if e.code == "form_identifier_exists"));
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_flow_open() {
        let provider = Arc::new(InMemoryProvider::new());
        let mut flow = SignUpFlow::new(provider.clone());
        flow.start(form("dana@example.com")).await.unwrap();

        let code = provider.verification_code("dana@example.com").await.unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = flow.submit_code(wrong).await.unwrap_err();
        assert!(matches!(err, AuthError::VerificationRejected(_)));
        assert!(flow.status().accepts_code());
        assert!(!provider.is_signed_in().await);

        flow.submit_code(&code).await.unwrap();
        assert!(provider.is_signed_in().await);
    }

    #[tokio::test]
    async fn test_finalise_failure_retries_without_code() {
        let provider = Arc::new(InMemoryProvider::new());
        let mut flow = SignUpFlow::new(provider.clone());
        flow.start(form("dana@example.com")).await.unwrap();
        let code = provider.verification_code("dana@example.com").await.unwrap();

        provider
            .fail_next(
                "finalize_sign_up",
                ProviderError::new("network_error", "Network error"),
            )
            .await;
        let err = flow.submit_code(&code).await.unwrap_err();
        assert_eq!(err.user_message(), "Network error");

        flow.submit_code(&code).await.unwrap();
        assert_eq!(flow.status(), &VerificationStatus::Complete);
    }

    #[tokio::test]
    async fn test_cancel_resets() {
        let provider = Arc::new(InMemoryProvider::new());
        let mut flow = SignUpFlow::new(provider.clone());
        flow.start(form("dana@example.com")).await.unwrap();

        flow.cancel().await.unwrap();
        assert_eq!(flow.status(), &VerificationStatus::Idle);
        assert!(flow.pending_address().is_none());
        assert!(provider.verification_code("dana@example.com").await.is_none());
        assert!(provider.finalize_sign_up().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_cancel_keeps_sign_up_pending() {
        let provider = Arc::new(InMemoryProvider::new());
        let mut flow = SignUpFlow::new(provider.clone());
        flow.start(form("dana@example.com")).await.unwrap();

        provider
            .fail_next(
                "abandon_sign_up",
                ProviderError::new("network_error", "Network error"),
            )
            .await;
        assert!(flow.cancel().await.is_err());
        assert_eq!(flow.pending_address(), Some("dana@example.com"));
        assert!(provider.verification_code("dana@example.com").await.is_some());

        flow.cancel().await.unwrap();
        assert!(flow.pending_address().is_none());
        assert!(provider.verification_code("dana@example.com").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_submission_returns_to_code_requested() {
        let mut flow = SignUpFlow::new(Arc::new(StalledVerification(InMemoryProvider::new())));
        flow.start(form("dana@example.com")).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(30), flow.submit_code("123456")).await;
        assert!(result.is_err());
        assert_eq!(flow.status(), &VerificationStatus::CodeRequested);
    }
}
