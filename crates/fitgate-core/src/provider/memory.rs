//! In-memory identity provider
//!
//! Simulates the hosted provider closely enough to drive every flow
//! locally: password and OAuth sign-in, one-time email codes, sign-up,
//! password reset and account deletion. Verification codes are not sent
//! anywhere; read them back with [`InMemoryProvider::verification_code`].

use async_trait::async_trait;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{
    Account, EmailAddressHandle, OAuthStrategy, ProfileUpdate, ProviderError, SessionSnapshot,
    SignInStatus,
};
use super::{IdentityProvider, ProviderResult};

/// Minimum password length accepted on sign-up and reset
const MIN_SECRET_LEN: usize = 8;

struct AccountRecord {
    account: Account,
    secret: String,
}

struct PendingSignUp {
    handle: EmailAddressHandle,
    secret: String,
    verified: bool,
}

struct PasswordReset {
    account_id: String,
    code: String,
}

#[derive(Default)]
struct ProviderState {
    loaded: bool,
    accounts: Vec<AccountRecord>,
    session_account: Option<String>,
    oauth_links: HashMap<OAuthStrategy, String>,
    unverified: HashSet<String>,
    codes: HashMap<String, String>,
    pending_sign_up: Option<PendingSignUp>,
    password_reset: Option<PasswordReset>,
    failures: HashMap<&'static str, ProviderError>,
    sign_in_attempts: usize,
}

impl ProviderState {
    fn take_failure(&mut self, operation: &'static str) -> ProviderResult<()> {
        match self.failures.remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn address_taken(&self, address: &str) -> bool {
        self.accounts
            .iter()
            .any(|r| r.account.email_addresses.iter().any(|e| e.address == address))
    }

    fn find_by_address(&self, address: &str) -> Option<usize> {
        self.accounts.iter().position(|r| {
            r.account
                .email_addresses
                .iter()
                .any(|e| e.address == address && !self.unverified.contains(&e.id))
        })
    }

    fn session_index(&self) -> ProviderResult<usize> {
        let id = self.session_account.as_deref().ok_or_else(not_signed_in)?;
        self.accounts
            .iter()
            .position(|r| r.account.id == id)
            .ok_or_else(not_signed_in)
    }

    fn start_session(&mut self, account_id: String) -> SignInStatus {
        self.session_account = Some(account_id);
        SignInStatus::Complete {
            session_id: new_id("sess"),
        }
    }

    fn insert_account(&mut self, address: &str, secret: &str) -> String {
        let email = EmailAddressHandle {
            id: new_id("idn"),
            address: address.to_string(),
        };
        let account = Account {
            id: new_id("user"),
            primary_email_id: Some(email.id.clone()),
            email_addresses: vec![email],
            ..Default::default()
        };
        let id = account.id.clone();
        self.accounts.push(AccountRecord {
            account,
            secret: secret.to_string(),
        });
        id
    }
}

/// Locally simulated identity provider
pub struct InMemoryProvider {
    state: RwLock<ProviderState>,
}

impl InMemoryProvider {
    /// Create a provider with no accounts whose state is already loaded
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ProviderState {
                loaded: true,
                ..Default::default()
            }),
        }
    }

    /// Add a password account with a verified primary address
    pub fn with_account(mut self, address: &str, secret: &str) -> Self {
        self.state.get_mut().insert_account(address, secret);
        self
    }

    /// Link an OAuth identity to the account holding `address`, creating it if needed
    pub fn with_oauth_identity(mut self, strategy: OAuthStrategy, address: &str) -> Self {
        let state = self.state.get_mut();
        let account_id = match state.find_by_address(address) {
            Some(index) => state.accounts[index].account.id.clone(),
            None => state.insert_account(address, &Uuid::new_v4().to_string()),
        };
        state.oauth_links.insert(strategy, account_id);
        self
    }

    /// Toggle whether the provider has finished loading its state
    pub async fn set_loaded(&self, loaded: bool) {
        self.state.write().await.loaded = loaded;
    }

    /// Make the next call of `operation` fail with `error`
    pub async fn fail_next(&self, operation: &'static str, error: ProviderError) {
        self.state.write().await.failures.insert(operation, error);
    }

    /// The outstanding one-time code for an address, if one was sent
    pub async fn verification_code(&self, address: &str) -> Option<String> {
        let state = self.state.read().await;
        let pending = state
            .pending_sign_up
            .as_ref()
            .map(|p| &p.handle)
            .filter(|h| h.address == address);
        let on_account = state
            .accounts
            .iter()
            .flat_map(|r| r.account.email_addresses.iter())
            .find(|e| e.address == address);

        pending
            .or(on_account)
            .and_then(|h| state.codes.get(&h.id).cloned())
    }

    /// The outstanding password-reset code, if one was sent
    pub async fn password_reset_code(&self) -> Option<String> {
        let state = self.state.read().await;
        state.password_reset.as_ref().map(|r| r.code.clone())
    }

    /// Whether a provider session is active
    pub async fn is_signed_in(&self) -> bool {
        self.state.read().await.session_account.is_some()
    }

    /// Look up an account by one of its verified addresses
    pub async fn account_by_email(&self, address: &str) -> Option<Account> {
        let state = self.state.read().await;
        state
            .find_by_address(address)
            .map(|i| state.accounts[i].account.clone())
    }

    /// Number of password sign-in attempts received
    pub async fn sign_in_attempts(&self) -> usize {
        self.state.read().await.sign_in_attempts
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryProvider {
    async fn session(&self) -> ProviderResult<SessionSnapshot> {
        let mut state = self.state.write().await;
        state.take_failure("session")?;

        Ok(SessionSnapshot {
            auth_loaded: state.loaded,
            user_loaded: state.loaded,
            signed_in: state.loaded && state.session_account.is_some(),
        })
    }

    async fn sign_in(&self, identifier: &str, secret: &str) -> ProviderResult<SignInStatus> {
        let mut state = self.state.write().await;
        state.sign_in_attempts += 1;
        state.take_failure("sign_in")?;

        let index = state.find_by_address(identifier).ok_or_else(|| {
            ProviderError::new("form_identifier_not_found", "Couldn't find your account.")
        })?;

        if state.accounts[index].secret != secret {
            return Err(ProviderError::new(
                "form_password_incorrect",
                "Password is incorrect. Try again, or use another method.",
            ));
        }

        let account_id = state.accounts[index].account.id.clone();
        debug!("Password sign-in for account {}", account_id);
        Ok(state.start_session(account_id))
    }

    async fn sign_in_with_oauth(
        &self,
        strategy: OAuthStrategy,
        redirect_uri: &str,
    ) -> ProviderResult<SignInStatus> {
        let mut state = self.state.write().await;
        state.take_failure("sign_in_with_oauth")?;

        if redirect_uri.is_empty() {
            return Err(ProviderError::new(
                "invalid_redirect_url",
                "A redirect URL is required for OAuth sign-in.",
            ));
        }

        match state.oauth_links.get(&strategy).cloned() {
            Some(account_id) => {
                debug!("{} sign-in for account {}", strategy, account_id);
                Ok(state.start_session(account_id))
            }
            None => Ok(SignInStatus::Incomplete {
                reason: format!("no account is linked to {}", strategy),
            }),
        }
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.take_failure("sign_out")?;
        state.session_account = None;
        Ok(())
    }

    async fn current_account(&self) -> ProviderResult<Option<Account>> {
        let mut state = self.state.write().await;
        state.take_failure("current_account")?;

        Ok(state
            .session_index()
            .ok()
            .map(|i| state.accounts[i].account.clone()))
    }

    async fn create_email_address(&self, address: &str) -> ProviderResult<EmailAddressHandle> {
        let mut state = self.state.write().await;
        state.take_failure("create_email_address")?;
        let index = state.session_index()?;

        if state.address_taken(address) {
            return Err(ProviderError::new(
                "form_identifier_exists",
                "That email address is taken. Please try another.",
            ));
        }

        let handle = EmailAddressHandle {
            id: new_id("idn"),
            address: address.to_string(),
        };
        state.accounts[index]
            .account
            .email_addresses
            .push(handle.clone());
        state.unverified.insert(handle.id.clone());

        Ok(handle)
    }

    async fn prepare_email_verification(&self, handle: &EmailAddressHandle) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.take_failure("prepare_email_verification")?;

        let known = state
            .pending_sign_up
            .as_ref()
            .is_some_and(|p| p.handle.id == handle.id)
            || state
                .accounts
                .iter()
                .any(|r| r.account.email_addresses.iter().any(|e| e.id == handle.id));
        if !known {
            return Err(address_not_found());
        }

        state.codes.insert(handle.id.clone(), generate_code());
        info!("Verification code issued for {}", handle.address);
        Ok(())
    }

    async fn attempt_email_verification(
        &self,
        handle: &EmailAddressHandle,
        code: &str,
    ) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.take_failure("attempt_email_verification")?;

        let expected = state.codes.get(&handle.id).ok_or_else(|| {
            ProviderError::new("verification_missing", "Request a new code first.")
        })?;

        if expected != code.trim() {
            return Err(ProviderError::new("form_code_incorrect", "Incorrect code"));
        }

        state.codes.remove(&handle.id);
        state.unverified.remove(&handle.id);
        if let Some(pending) = state
            .pending_sign_up
            .as_mut()
            .filter(|p| p.handle.id == handle.id)
        {
            pending.verified = true;
        }

        Ok(())
    }

    async fn set_primary_email(&self, handle: &EmailAddressHandle) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.take_failure("set_primary_email")?;
        let index = state.session_index()?;

        if !state.accounts[index]
            .account
            .email_addresses
            .iter()
            .any(|e| e.id == handle.id)
        {
            return Err(address_not_found());
        }
        if state.unverified.contains(&handle.id) {
            return Err(ProviderError::new(
                "email_not_verified",
                "Only verified email addresses can be made primary.",
            ));
        }

        state.accounts[index].account.primary_email_id = Some(handle.id.clone());
        Ok(())
    }

    async fn delete_email_address(&self, handle: &EmailAddressHandle) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.take_failure("delete_email_address")?;
        let index = state.session_index()?;

        let account = &mut state.accounts[index].account;
        if account.primary_email_id.as_deref() == Some(handle.id.as_str()) {
            return Err(ProviderError::new(
                "cannot_delete_primary",
                "The primary email address cannot be removed.",
            ));
        }

        let before = account.email_addresses.len();
        account.email_addresses.retain(|e| e.id != handle.id);
        if account.email_addresses.len() == before {
            return Err(address_not_found());
        }

        state.unverified.remove(&handle.id);
        state.codes.remove(&handle.id);
        Ok(())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.take_failure("update_profile")?;
        let index = state.session_index()?;

        update.apply_to(&mut state.accounts[index].account);
        Ok(())
    }

    async fn set_profile_image(&self, image: Option<&str>) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.take_failure("set_profile_image")?;
        let index = state.session_index()?;

        state.accounts[index].account.image_url = image.map(str::to_string);
        Ok(())
    }

    async fn delete_account(&self) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.take_failure("delete_account")?;
        let index = state.session_index()?;

        let record = state.accounts.remove(index);
        state.oauth_links.retain(|_, id| *id != record.account.id);
        for email in &record.account.email_addresses {
            state.unverified.remove(&email.id);
            state.codes.remove(&email.id);
        }

        info!("Deleted account {}", record.account.id);
        Ok(())
    }

    async fn sign_up(&self, address: &str, secret: &str) -> ProviderResult<EmailAddressHandle> {
        let mut state = self.state.write().await;
        state.take_failure("sign_up")?;

        if state.address_taken(address) {
            return Err(ProviderError::new(
                "form_identifier_exists",
                "That email address is taken. Please try another.",
            ));
        }
        if secret.chars().count() < MIN_SECRET_LEN {
            return Err(password_too_short());
        }

        let handle = EmailAddressHandle {
            id: new_id("idn"),
            address: address.to_string(),
        };
        state.pending_sign_up = Some(PendingSignUp {
            handle: handle.clone(),
            secret: secret.to_string(),
            verified: false,
        });

        Ok(handle)
    }

    async fn finalize_sign_up(&self) -> ProviderResult<SignInStatus> {
        let mut state = self.state.write().await;
        state.take_failure("finalize_sign_up")?;

        let pending = match state.pending_sign_up.take() {
            Some(p) if p.verified => p,
            other => {
                state.pending_sign_up = other;
                return Err(ProviderError::new(
                    "verification_required",
                    "Verify your email address to finish signing up.",
                ));
            }
        };

        let account = Account {
            id: new_id("user"),
            primary_email_id: Some(pending.handle.id.clone()),
            email_addresses: vec![pending.handle],
            ..Default::default()
        };
        let account_id = account.id.clone();
        state.accounts.push(AccountRecord {
            account,
            secret: pending.secret,
        });

        info!("Created account {}", account_id);
        Ok(state.start_session(account_id))
    }

    async fn abandon_sign_up(&self) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.take_failure("abandon_sign_up")?;

        if let Some(pending) = state.pending_sign_up.take() {
            state.codes.remove(&pending.handle.id);
            debug!("Discarded pending sign-up for {}", pending.handle.address);
        }
        Ok(())
    }

    async fn request_password_reset(&self, identifier: &str) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.take_failure("request_password_reset")?;

        let index = state.find_by_address(identifier).ok_or_else(|| {
            ProviderError::new("form_identifier_not_found", "Couldn't find your account.")
        })?;

        state.password_reset = Some(PasswordReset {
            account_id: state.accounts[index].account.id.clone(),
            code: generate_code(),
        });
        info!("Password reset code issued for {}", identifier);
        Ok(())
    }

    async fn reset_password(&self, code: &str, new_secret: &str) -> ProviderResult<SignInStatus> {
        let mut state = self.state.write().await;
        state.take_failure("reset_password")?;

        let reset = state.password_reset.as_ref().ok_or_else(|| {
            ProviderError::new("verification_missing", "Request a new code first.")
        })?;
        if reset.code != code.trim() {
            return Err(ProviderError::new("form_code_incorrect", "Incorrect code"));
        }
        if new_secret.chars().count() < MIN_SECRET_LEN {
            return Err(password_too_short());
        }

        let account_id = reset.account_id.clone();
        state.password_reset = None;

        let record = state
            .accounts
            .iter_mut()
            .find(|r| r.account.id == account_id)
            .ok_or_else(|| {
                ProviderError::new("form_identifier_not_found", "Couldn't find your account.")
            })?;
        record.secret = new_secret.to_string();

        Ok(state.start_session(account_id))
    }
}

fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

fn not_signed_in() -> ProviderError {
    ProviderError::new("signed_out", "You need to be signed in to do that.")
}

fn address_not_found() -> ProviderError {
    ProviderError::new("resource_not_found", "Email address not found.")
}

fn password_too_short() -> ProviderError {
    ProviderError::new(
        "form_password_length_too_short",
        "Passwords must be 8 characters or more.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_password_sign_in() {
        let provider = InMemoryProvider::new().with_account("alice@example.com", "Secret1!");

        let status = provider.sign_in("alice@example.com", "Secret1!").await.unwrap();
        assert!(matches!(status, SignInStatus::Complete { .. }));
        assert!(provider.is_signed_in().await);

        let err = provider.sign_in("alice@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.code, "form_password_incorrect");
    }

    #[tokio::test]
    async fn test_addresses_are_case_sensitive() {
        let provider = InMemoryProvider::new().with_account("alice@example.com", "Secret1!");

        let err = provider.sign_in("Alice@Example.com", "Secret1!").await.unwrap_err();
        assert_eq!(err.code, "form_identifier_not_found");
    }

    #[tokio::test]
    async fn test_email_verification_cycle() {
        let provider = InMemoryProvider::new().with_account("bob@x.com", "Secret1!");
        provider.sign_in("bob@x.com", "Secret1!").await.unwrap();

        let handle = provider.create_email_address("robert@x.com").await.unwrap();
        provider.prepare_email_verification(&handle).await.unwrap();

        // Unverified addresses cannot become primary
        assert!(provider.set_primary_email(&handle).await.is_err());

        let code = provider.verification_code("robert@x.com").await.unwrap();
        let err = provider
            .attempt_email_verification(&handle, "not-it")
            .await
            .unwrap_err();
        assert_eq!(err.code, "form_code_incorrect");

        provider
            .attempt_email_verification(&handle, &code)
            .await
            .unwrap();
        provider.set_primary_email(&handle).await.unwrap();

        let account = provider.current_account().await.unwrap().unwrap();
        assert_eq!(account.primary_email().unwrap().address, "robert@x.com");
    }

    #[tokio::test]
    async fn test_sign_up_requires_verification() {
        let provider = InMemoryProvider::new();

        let handle = provider.sign_up("new@example.com", "LongEnough1").await.unwrap();
        assert!(provider.finalize_sign_up().await.is_err());

        provider.prepare_email_verification(&handle).await.unwrap();
        let code = provider.verification_code("new@example.com").await.unwrap();
        provider
            .attempt_email_verification(&handle, &code)
            .await
            .unwrap();

        let status = provider.finalize_sign_up().await.unwrap();
        assert!(matches!(status, SignInStatus::Complete { .. }));
        assert!(provider.account_by_email("new@example.com").await.is_some());
    }

    #[tokio::test]
    async fn test_abandoned_sign_up_cannot_finish() {
        let provider = InMemoryProvider::new();
        let handle = provider.sign_up("new@example.com", "LongEnough1").await.unwrap();
        provider.prepare_email_verification(&handle).await.unwrap();

        provider.abandon_sign_up().await.unwrap();
        assert!(provider.verification_code("new@example.com").await.is_none());
        assert!(provider.finalize_sign_up().await.is_err());

        // Nothing pending is not an error
        provider.abandon_sign_up().await.unwrap();
    }

    #[tokio::test]
    async fn test_oauth_without_link_is_incomplete() {
        let provider = InMemoryProvider::new()
            .with_oauth_identity(OAuthStrategy::Google, "carol@gmail.com");

        let status = provider
            .sign_in_with_oauth(OAuthStrategy::Github, "fitgate://oauth")
            .await
            .unwrap();
        assert!(matches!(status, SignInStatus::Incomplete { .. }));

        let status = provider
            .sign_in_with_oauth(OAuthStrategy::Google, "fitgate://oauth")
            .await
            .unwrap();
        assert!(matches!(status, SignInStatus::Complete { .. }));
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let provider = InMemoryProvider::new();
        provider
            .fail_next("sign_out", ProviderError::new("network", "Network error"))
            .await;

        assert!(provider.sign_out().await.is_err());
        assert!(provider.sign_out().await.is_ok());
    }
}
