//! Biometric unlock
//!
//! [`BiometricAuthenticator`] is the platform prompt; [`BiometricGate`]
//! decides whether biometric login is offered and releases the cached
//! credential after a successful prompt.

mod gate;

pub use gate::{BiometricGate, GateState};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Result of a platform biometric prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BiometricOutcome {
    Success,
    /// User cancelled or the biometric did not match
    Denied,
    /// The platform could not run the prompt
    Error(String),
}

/// Platform biometric API
#[async_trait]
pub trait BiometricAuthenticator: Send + Sync {
    /// Device has biometric hardware
    async fn has_hardware(&self) -> bool;

    /// At least one biometric is enrolled (advisory only)
    async fn is_enrolled(&self) -> bool;

    /// Show the OS prompt
    async fn prompt(&self, message: &str) -> BiometricOutcome;
}

/// Authenticator that always gives the same answer
pub struct StaticBiometrics {
    has_hardware: bool,
    enrolled: bool,
    outcome: BiometricOutcome,
    prompts: AtomicUsize,
}

impl StaticBiometrics {
    pub fn new(has_hardware: bool, enrolled: bool, outcome: BiometricOutcome) -> Self {
        Self {
            has_hardware,
            enrolled,
            outcome,
            prompts: AtomicUsize::new(0),
        }
    }

    /// A device without biometric hardware
    pub fn absent() -> Self {
        Self::new(false, false, BiometricOutcome::Error("no biometric hardware".to_string()))
    }

    /// How many prompts have been shown
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricAuthenticator for StaticBiometrics {
    async fn has_hardware(&self) -> bool {
        self.has_hardware
    }

    async fn is_enrolled(&self) -> bool {
        self.enrolled
    }

    async fn prompt(&self, _message: &str) -> BiometricOutcome {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
