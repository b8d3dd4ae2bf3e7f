//! Error types for fitgate-core

use thiserror::Error;

use crate::provider::ProviderError;

/// Result type alias for fitgate operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Message shown to the user when nothing more specific applies
pub const GENERIC_USER_MESSAGE: &str = "Something went wrong, please try again";

/// Authentication and session error types
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Identity provider error: {0}")]
    Provider(ProviderError),

    #[error("Secure storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Biometric authentication was cancelled or not recognised")]
    BiometricDenied,

    #[error("Biometric authentication failed: {0}")]
    BiometricError(String),

    #[error("Biometric login is not available on this device")]
    BiometricUnavailable,

    #[error("Verification code rejected: {0}")]
    VerificationRejected(ProviderError),

    #[error("No saved credentials found")]
    NoStoredCredential,

    #[error("Identity provider state is still loading")]
    NotReady,

    #[error("Sign-in requires additional steps: {0}")]
    IncompleteSignIn(String),

    #[error("New email address matches the current primary address")]
    EmailUnchanged,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuthError {
    /// Text suitable for showing to the user.
    ///
    /// Provider messages are passed through verbatim. Unexpected failures
    /// collapse to [`GENERIC_USER_MESSAGE`]; the details belong in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Provider(e) | AuthError::VerificationRejected(e) => e.message.clone(),
            AuthError::StorageUnavailable(_) => {
                "Secure storage is unavailable, please try again".to_string()
            }
            AuthError::BiometricDenied => {
                "Biometric authentication failed, enter your password instead".to_string()
            }
            AuthError::BiometricError(_) | AuthError::BiometricUnavailable => {
                "Biometric login is unavailable, enter your password instead".to_string()
            }
            AuthError::NoStoredCredential => "No saved credentials found".to_string(),
            AuthError::IncompleteSignIn(_) => "Additional verification required".to_string(),
            AuthError::EmailUnchanged => {
                "This is already your email address".to_string()
            }
            AuthError::InvalidInput(msg) => msg.clone(),
            AuthError::NotReady
            | AuthError::InvalidState(_)
            | AuthError::Config(_)
            | AuthError::Io(_)
            | AuthError::Serialization(_) => GENERIC_USER_MESSAGE.to_string(),
        }
    }

    /// Whether the same action may succeed if the user simply tries again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::StorageUnavailable(_)
                | AuthError::VerificationRejected(_)
                | AuthError::BiometricDenied
                | AuthError::NotReady
                | AuthError::Io(_)
        )
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        AuthError::Provider(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_message_is_verbatim() {
        let err = AuthError::Provider(ProviderError::new(
            "form_password_incorrect",
            "Password is incorrect. Try again, or use another method.",
        ));
        assert_eq!(
            err.user_message(),
            "Password is incorrect. Try again, or use another method."
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unexpected_errors_use_generic_message() {
        let err = AuthError::InvalidState("submit before request".to_string());
        assert_eq!(err.user_message(), GENERIC_USER_MESSAGE);

        let io = AuthError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(io.user_message(), GENERIC_USER_MESSAGE);
        assert!(io.is_retryable());
    }

    #[test]
    fn test_storage_unavailable_is_distinct_from_missing_credential() {
        let unavailable = AuthError::StorageUnavailable("keychain locked".to_string());
        let missing = AuthError::NoStoredCredential;

        assert!(unavailable.is_retryable());
        assert!(!missing.is_retryable());
        assert_ne!(unavailable.user_message(), missing.user_message());
    }
}
