//! One-time email code flows
//!
//! [`EmailChangeFlow`] swaps a signed-in user's primary address;
//! [`SignUpFlow`] creates a new account. Both own a single pending address
//! and a [`VerificationStatus`], and both return to `CodeRequested` if a
//! code submission is dropped mid-flight.

mod email_change;
mod sign_up;

pub use email_change::EmailChangeFlow;
pub use sign_up::{SignUpCompletion, SignUpFlow, SignUpForm};

use tracing::debug;

use crate::error::{AuthError, Result};

/// Where a verification flow stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VerificationStatus {
    #[default]
    Idle,
    CodeRequested,
    Verifying,
    Complete,
    /// Last submission failed; the message is shown as-is
    Error { message: String },
}

impl VerificationStatus {
    /// A code may be submitted from here
    pub fn accepts_code(&self) -> bool {
        matches!(
            self,
            VerificationStatus::CodeRequested | VerificationStatus::Error { .. }
        )
    }
}

/// Trimmed, lower-cased email address
pub fn normalize_email(address: &str) -> String {
    address.trim().to_lowercase()
}

pub(crate) fn validate_email(address: &str) -> Result<()> {
    let valid = match address.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AuthError::InvalidInput(
            "Enter a valid email address".to_string(),
        ))
    }
}

pub(crate) fn validate_code(code: &str) -> Result<&str> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AuthError::InvalidInput(
            "Enter the verification code".to_string(),
        ));
    }
    Ok(code)
}

/// Holds the status at `Verifying`; falls back to `CodeRequested` if
/// dropped before it is settled
pub(crate) struct VerifyingGuard<'a> {
    status: &'a mut VerificationStatus,
    settled: bool,
}

impl<'a> VerifyingGuard<'a> {
    pub(crate) fn begin(status: &'a mut VerificationStatus) -> Self {
        *status = VerificationStatus::Verifying;
        Self {
            status,
            settled: false,
        }
    }

    pub(crate) fn settle(mut self, next: VerificationStatus) {
        *self.status = next;
        self.settled = true;
    }

    pub(crate) fn fail(self, message: impl Into<String>) {
        self.settle(VerificationStatus::Error {
            message: message.into(),
        });
    }
}

impl Drop for VerifyingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("Code submission abandoned");
            *self.status = VerificationStatus::CodeRequested;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Bob@Example.COM "), "bob@example.com");
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("bob@example.com").is_ok());
        assert!(validate_email("bob").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("bob@").is_err());
    }

    #[test]
    fn test_guard_restores_code_requested() {
        let mut status = VerificationStatus::CodeRequested;
        {
            let _guard = VerifyingGuard::begin(&mut status);
        }
        assert_eq!(status, VerificationStatus::CodeRequested);

        let guard = VerifyingGuard::begin(&mut status);
        guard.fail("Incorrect code");
        assert_eq!(
            status,
            VerificationStatus::Error {
                message: "Incorrect code".to_string()
            }
        );
        assert!(status.accepts_code());
    }
}
