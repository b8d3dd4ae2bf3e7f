//! # fitgate-core
//!
//! Authentication and session continuity for the fitgate app:
//! - Credential cache in the OS keychain for biometric re-entry
//! - Biometric gate that releases the cached credential
//! - Session controller with provider-aware logout and soft-lock
//! - Email-change and sign-up flows verified with one-time codes
//! - Profile editing and workout calendar data

pub mod biometric;
pub mod controller;
pub mod credential;
pub mod error;
pub mod profile;
pub mod provider;
pub mod settings;
pub mod storage;
pub mod verification;
pub mod workout;

#[cfg(test)]
pub(crate) mod testing;

pub use biometric::{
    BiometricAuthenticator, BiometricGate, BiometricOutcome, GateState, StaticBiometrics,
};
pub use controller::{AuthState, PersistenceStep, Route, SessionController, Transition};
pub use credential::{CredentialCache, ProviderTag, SecretString, StoredCredential};
pub use error::{AuthError, Result};
pub use profile::{EditingField, ProfileEditor};
pub use provider::{IdentityProvider, InMemoryProvider, OAuthStrategy, ProviderError};
pub use settings::{Settings, SettingsManager};
pub use storage::{KeychainStorage, MemoryStorage, SecureStorage};
pub use verification::{
    EmailChangeFlow, SignUpCompletion, SignUpFlow, SignUpForm, VerificationStatus,
};
pub use workout::{marked_dates, sample_workouts, DayMark, WorkoutRecord, WorkoutStatus};
