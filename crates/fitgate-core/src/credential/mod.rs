//! Local credential cache for biometric re-authentication

mod cache;
mod types;

pub use cache::{CredentialCache, CREDENTIAL_KEY, LOCK_KEY, PROVIDER_KEY};
pub use types::*;
