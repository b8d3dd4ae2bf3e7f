//! Identity provider client abstraction
//!
//! The hosted identity provider owns credentials, sessions, email
//! verification and OAuth federation. Everything here talks to it through
//! [`IdentityProvider`]; [`InMemoryProvider`] simulates one locally.

mod memory;
mod types;

pub use memory::InMemoryProvider;
pub use types::*;

use async_trait::async_trait;

/// Result type for identity provider calls
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Operations the app needs from the hosted identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session state, including whether it has finished loading
    async fn session(&self) -> ProviderResult<SessionSnapshot>;

    /// Password sign-in; a `Complete` result activates the session
    async fn sign_in(&self, identifier: &str, secret: &str) -> ProviderResult<SignInStatus>;

    /// OAuth sign-in through the external browser flow
    async fn sign_in_with_oauth(
        &self,
        strategy: OAuthStrategy,
        redirect_uri: &str,
    ) -> ProviderResult<SignInStatus>;

    /// Terminate the current session
    async fn sign_out(&self) -> ProviderResult<()>;

    /// The signed-in account, if any
    async fn current_account(&self) -> ProviderResult<Option<Account>>;

    /// Add an unverified email address to the signed-in account
    async fn create_email_address(&self, address: &str) -> ProviderResult<EmailAddressHandle>;

    /// Send a one-time code to the address
    async fn prepare_email_verification(&self, handle: &EmailAddressHandle) -> ProviderResult<()>;

    /// Check a one-time code for the address
    async fn attempt_email_verification(
        &self,
        handle: &EmailAddressHandle,
        code: &str,
    ) -> ProviderResult<()>;

    /// Make a verified address the primary one
    async fn set_primary_email(&self, handle: &EmailAddressHandle) -> ProviderResult<()>;

    /// Remove an address from the account
    async fn delete_email_address(&self, handle: &EmailAddressHandle) -> ProviderResult<()>;

    /// Update profile fields
    async fn update_profile(&self, update: &ProfileUpdate) -> ProviderResult<()>;

    /// Replace the profile image (`None` removes it)
    async fn set_profile_image(&self, image: Option<&str>) -> ProviderResult<()>;

    /// Delete the signed-in account
    async fn delete_account(&self) -> ProviderResult<()>;

    /// Start a password sign-up; returns the pending address to verify
    async fn sign_up(&self, address: &str, secret: &str) -> ProviderResult<EmailAddressHandle>;

    /// Turn a verified sign-up into an account with an active session
    async fn finalize_sign_up(&self) -> ProviderResult<SignInStatus>;

    /// Discard the pending sign-up and its code
    async fn abandon_sign_up(&self) -> ProviderResult<()>;

    /// Email a password-reset code
    async fn request_password_reset(&self, identifier: &str) -> ProviderResult<()>;

    /// Reset the password with the emailed code; `Complete` signs the user in
    async fn reset_password(&self, code: &str, new_secret: &str) -> ProviderResult<SignInStatus>;
}
