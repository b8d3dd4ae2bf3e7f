//! Session continuity controller
//!
//! Single owner of the app's authentication state. Decides which of
//! sign-in, soft-lock or the protected app to show, and keeps the provider
//! session, credential cache, provider tag and lock flag consistent across
//! sign-in, logout and account deletion.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::biometric::{BiometricAuthenticator, BiometricGate, GateState};
use crate::credential::{CredentialCache, ProviderTag};
use crate::error::{AuthError, Result};
use crate::provider::{IdentityProvider, OAuthStrategy, SignInStatus};
use crate::settings::Settings;
use crate::storage::SecureStorage;
use crate::verification::{normalize_email, SignUpCompletion};

/// Authentication state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Provider state still resolving
    Booting,
    Unauthenticated,
    /// Provider session ended but the app expects a quick re-entry
    SoftLocked,
    Authenticated,
}

impl AuthState {
    /// Where the UI should be
    pub fn route(&self) -> Route {
        match self {
            AuthState::Booting => Route::Loading,
            AuthState::Unauthenticated => Route::SignedOut,
            AuthState::SoftLocked => Route::SoftLocked,
            AuthState::Authenticated => Route::ProtectedHome,
        }
    }
}

/// Navigation intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Neutral loading screen; no redirect decision yet
    Loading,
    SignedOut,
    SoftLocked,
    ProtectedHome,
}

/// Local write that did not land after the provider-side step succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceStep {
    CredentialCache,
    ProviderTag,
    LockFlag,
    ProfileDetails,
}

/// Outcome of a state-changing action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: AuthState,
    /// Local writes that failed; the state change still stands
    pub failures: Vec<PersistenceStep>,
}

impl Transition {
    fn unchanged(state: AuthState) -> Self {
        Self {
            state,
            failures: Vec::new(),
        }
    }

    pub fn route(&self) -> Route {
        self.state.route()
    }

    /// Every local write landed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed(&self, step: PersistenceStep) -> bool {
        self.failures.contains(&step)
    }
}

/// Session continuity controller
pub struct SessionController {
    provider: Arc<dyn IdentityProvider>,
    cache: CredentialCache,
    gate: BiometricGate,
    redirect_uri: String,
    state_tx: watch::Sender<AuthState>,
    /// How the current session was established; `None` when it predates
    /// this controller
    session_tag: Option<ProviderTag>,
}

impl SessionController {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        storage: Arc<dyn SecureStorage>,
        biometrics: Arc<dyn BiometricAuthenticator>,
        settings: &Settings,
    ) -> Self {
        let cache = CredentialCache::new(storage);
        let gate = BiometricGate::new(biometrics, cache.clone(), settings.biometric_prompt.clone());
        let (state_tx, _) = watch::channel(AuthState::Booting);

        Self {
            provider,
            cache,
            gate,
            redirect_uri: settings.oauth_redirect_uri.clone(),
            state_tx,
            session_tag: None,
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state_tx.borrow()
    }

    pub fn route(&self) -> Route {
        self.state().route()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    pub fn provider(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&self.provider)
    }

    pub fn biometric_state(&self) -> &GateState {
        self.gate.state()
    }

    fn set_state(&self, next: AuthState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            info!("Auth state {:?} -> {:?}", previous, next);
        }
    }

    /// Re-derive the state from the provider and the lock flag.
    ///
    /// Call on launch and whenever the app returns to the foreground. Until
    /// the provider has loaded both auth and user state the route stays
    /// [`Route::Loading`].
    pub async fn refresh(&mut self) -> Result<Route> {
        let snapshot = self.provider.session().await?;

        if !snapshot.is_loaded() {
            debug!("Provider state still loading");
            self.set_state(AuthState::Booting);
            return Ok(Route::Loading);
        }

        let next = if self.cache.is_locked().await? {
            AuthState::SoftLocked
        } else if snapshot.signed_in {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        };

        if next != AuthState::Authenticated {
            self.session_tag = None;
        }
        self.set_state(next);
        Ok(next.route())
    }

    /// Whether the biometric entry point should be shown
    pub async fn biometric_available(&mut self) -> Result<bool> {
        self.gate.check_availability().await
    }

    /// `Some` when a sign-in should not reach the provider
    fn sign_in_short_circuit(&self) -> Result<Option<Transition>> {
        match self.state() {
            AuthState::Booting => Err(AuthError::NotReady),
            AuthState::Authenticated => {
                debug!("Already signed in");
                Ok(Some(Transition::unchanged(AuthState::Authenticated)))
            }
            AuthState::Unauthenticated | AuthState::SoftLocked => Ok(None),
        }
    }

    /// Email + password sign-in
    pub async fn sign_in_with_password(
        &mut self,
        identifier: &str,
        secret: &str,
    ) -> Result<Transition> {
        if let Some(done) = self.sign_in_short_circuit()? {
            return Ok(done);
        }

        let identifier = normalize_email(identifier);
        if identifier.is_empty() || secret.is_empty() {
            return Err(AuthError::InvalidInput(
                "Email and password are required".to_string(),
            ));
        }

        self.password_sign_in(&identifier, secret).await
    }

    /// Replay the cached credential after a biometric prompt
    pub async fn sign_in_with_biometrics(&mut self) -> Result<Transition> {
        if let Some(done) = self.sign_in_short_circuit()? {
            return Ok(done);
        }

        let credential = self.gate.unlock().await?;
        let identifier = credential.identifier.clone();
        self.password_sign_in(&identifier, credential.secret.expose())
            .await
    }

    /// OAuth sign-in. The credential cache is never written.
    pub async fn sign_in_with_oauth(&mut self, strategy: OAuthStrategy) -> Result<Transition> {
        if let Some(done) = self.sign_in_short_circuit()? {
            return Ok(done);
        }

        let status = self
            .provider
            .sign_in_with_oauth(strategy, &self.redirect_uri)
            .await?;
        expect_complete(status)?;

        let tag = ProviderTag::from(strategy);
        let mut failures = Vec::new();
        if let Err(e) = self.cache.set_provider_tag(tag).await {
            error!("Signed in with {} but could not record the provider tag: {}", strategy, e);
            failures.push(PersistenceStep::ProviderTag);
        }

        Ok(self.finish_sign_in(tag, failures).await)
    }

    async fn password_sign_in(&mut self, identifier: &str, secret: &str) -> Result<Transition> {
        let status = self.provider.sign_in(identifier, secret).await?;
        expect_complete(status)?;
        Ok(self.establish_password_session(Some(identifier), secret).await)
    }

    /// Local half of every password authentication: cache + tag, then lock flag.
    ///
    /// The provider session already exists, so write failures are reported
    /// instead of undoing the sign-in. Without an identifier the credential
    /// cannot be cached and any older one is dropped.
    async fn establish_password_session(
        &mut self,
        identifier: Option<&str>,
        secret: &str,
    ) -> Transition {
        let mut failures = Vec::new();

        let cached = match identifier {
            Some(identifier) => match self.cache.save(identifier, secret, ProviderTag::Email).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Signed in but could not cache credential: {}", e);
                    false
                }
            },
            None => {
                warn!("Signed-in address unknown, credential not cached");
                if let Err(e) = self.cache.clear().await {
                    error!("Could not drop the previous cached credential: {}", e);
                }
                false
            }
        };

        if !cached {
            failures.push(PersistenceStep::CredentialCache);
            if let Err(e) = self.cache.set_provider_tag(ProviderTag::Email).await {
                error!("Could not record the provider tag: {}", e);
                failures.push(PersistenceStep::ProviderTag);
            }
        }
        self.gate.invalidate();

        self.finish_sign_in(ProviderTag::Email, failures).await
    }

    /// Clear the lock flag and enter `Authenticated`
    async fn finish_sign_in(
        &mut self,
        tag: ProviderTag,
        mut failures: Vec<PersistenceStep>,
    ) -> Transition {
        if let Err(e) = self.cache.set_locked(false).await {
            warn!("Could not clear lock flag: {}", e);
            failures.push(PersistenceStep::LockFlag);
        }

        self.session_tag = Some(tag);
        self.set_state(AuthState::Authenticated);
        Transition {
            state: AuthState::Authenticated,
            failures,
        }
    }

    /// Explicit logout.
    ///
    /// OAuth sessions soft-lock (cache untouched, lock flag set); password
    /// sessions, or an unknown provider, log out fully. The provider session
    /// is terminated in both cases; if that fails nothing local changes.
    ///
    /// The session's own provider decides; the stored tag is only consulted
    /// for a session restored by [`refresh`](Self::refresh).
    pub async fn sign_out(&mut self) -> Result<Transition> {
        let state = self.state();
        if state != AuthState::Authenticated {
            debug!("Sign-out ignored in state {:?}", state);
            return Ok(Transition::unchanged(state));
        }

        let tag = match self.session_tag {
            Some(tag) => Some(tag),
            None => match self.cache.provider_tag().await {
                Ok(tag) => tag,
                Err(e) => {
                    warn!("Provider tag unreadable, logging out fully: {}", e);
                    None
                }
            },
        };

        self.provider.sign_out().await?;
        self.session_tag = None;

        let mut failures = Vec::new();
        let next = match tag {
            Some(tag) if !tag.is_password() => {
                // Heals a tag write that failed at sign-in
                if let Err(e) = self.cache.set_provider_tag(tag).await {
                    warn!("Could not record the provider tag: {}", e);
                    failures.push(PersistenceStep::ProviderTag);
                }
                if let Err(e) = self.cache.set_locked(true).await {
                    warn!("Could not set lock flag: {}", e);
                    failures.push(PersistenceStep::LockFlag);
                }
                info!("Soft-locked after {} session", tag);
                AuthState::SoftLocked
            }
            _ => {
                if let Err(e) = self.cache.clear().await {
                    error!("Could not clear cached credential on logout: {}", e);
                    failures.push(PersistenceStep::CredentialCache);
                }
                if let Err(e) = self.cache.set_locked(false).await {
                    warn!("Could not clear lock flag: {}", e);
                    failures.push(PersistenceStep::LockFlag);
                }
                self.gate.invalidate();
                AuthState::Unauthenticated
            }
        };

        self.set_state(next);
        Ok(Transition {
            state: next,
            failures,
        })
    }

    /// Delete the account, then wipe every local trace of it
    pub async fn delete_account(&mut self) -> Result<Transition> {
        self.provider.delete_account().await?;

        if let Err(e) = self.provider.sign_out().await {
            debug!("Provider sign-out after account deletion failed: {}", e);
        }

        self.session_tag = None;
        let mut failures = Vec::new();
        if let Err(e) = self.cache.clear().await {
            error!("Could not clear cached credential for deleted account: {}", e);
            failures.push(PersistenceStep::CredentialCache);
        }
        if let Err(e) = self.cache.clear_provider_tag().await {
            warn!("Could not clear provider tag: {}", e);
            failures.push(PersistenceStep::ProviderTag);
        }
        if let Err(e) = self.cache.set_locked(false).await {
            warn!("Could not clear lock flag: {}", e);
            failures.push(PersistenceStep::LockFlag);
        }
        self.gate.invalidate();

        info!("Account deleted");
        self.set_state(AuthState::Unauthenticated);
        Ok(Transition {
            state: AuthState::Unauthenticated,
            failures,
        })
    }

    /// Email a password-reset code
    pub async fn request_password_reset(&self, identifier: &str) -> Result<()> {
        let identifier = normalize_email(identifier);
        if identifier.is_empty() {
            return Err(AuthError::InvalidInput("Email is required".to_string()));
        }

        self.provider.request_password_reset(&identifier).await?;
        info!("Password reset requested for {}", identifier);
        Ok(())
    }

    /// Finish a password reset; the new password replaces the cached one.
    ///
    /// `identifier` is the address the user typed. The cached identifier is
    /// the primary address of the account the provider actually reset.
    pub async fn reset_password(
        &mut self,
        identifier: &str,
        code: &str,
        new_secret: &str,
    ) -> Result<Transition> {
        if self.state() == AuthState::Booting {
            return Err(AuthError::NotReady);
        }
        if code.trim().is_empty() || new_secret.is_empty() {
            return Err(AuthError::InvalidInput(
                "Code and new password are required".to_string(),
            ));
        }

        let status = self.provider.reset_password(code, new_secret).await?;
        expect_complete(status)?;

        let account_address = match self.provider.current_account().await {
            Ok(account) => account
                .as_ref()
                .and_then(|a| a.primary_email())
                .map(|e| normalize_email(&e.address)),
            Err(e) => {
                warn!("Password reset but the account could not be read: {}", e);
                None
            }
        };

        let typed = normalize_email(identifier);
        if let Some(address) = account_address.as_deref().filter(|a| *a != typed) {
            warn!("Reset account is {}, not the entered {}", address, typed);
        }

        Ok(self
            .establish_password_session(account_address.as_deref(), new_secret)
            .await)
    }

    /// Adopt the session created by a verified sign-up
    pub async fn complete_sign_up(&mut self, completion: SignUpCompletion) -> Result<Transition> {
        if self.state() == AuthState::Booting {
            return Err(AuthError::NotReady);
        }

        let mut profile_failed = false;
        if !completion.profile.is_empty() {
            if let Err(e) = self.provider.update_profile(&completion.profile).await {
                warn!("Profile details not saved after sign-up: {}", e);
                profile_failed = true;
            }
        }

        let mut transition = self
            .establish_password_session(
                Some(completion.identifier.as_str()),
                completion.secret.expose(),
            )
            .await;
        if profile_failed {
            transition.failures.push(PersistenceStep::ProfileDetails);
        }

        Ok(transition)
    }
}

fn expect_complete(status: SignInStatus) -> Result<()> {
    match status {
        SignInStatus::Complete { session_id } => {
            debug!("Provider session {} active", session_id);
            Ok(())
        }
        SignInStatus::Incomplete { reason } => {
            warn!("Sign-in incomplete: {}", reason);
            Err(AuthError::IncompleteSignIn(reason))
        }
    }
}
