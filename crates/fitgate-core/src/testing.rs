//! Shared test fixtures

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::biometric::{BiometricOutcome, StaticBiometrics};
use crate::controller::SessionController;
use crate::error::{AuthError, Result};
use crate::provider::{
    Account, EmailAddressHandle, IdentityProvider, InMemoryProvider, OAuthStrategy,
    ProfileUpdate, ProviderResult, SessionSnapshot, SignInStatus,
};
use crate::settings::Settings;
use crate::storage::{MemoryStorage, SecureStorage};

/// Memory storage whose reads or writes can be made to fail
#[derive(Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_reads: AtomicBool,
    failing_keys: Mutex<HashSet<String>>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes_to(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.fail_reads(false);
        self.failing_keys.lock().unwrap().clear();
    }

    fn check_write(&self, key: &str) -> Result<()> {
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(AuthError::StorageUnavailable(format!("write to {} refused", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl SecureStorage for FlakyStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AuthError::StorageUnavailable("read refused".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_write(key)?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_write(key)?;
        self.inner.delete(key).await
    }

    fn is_hardware_backed(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "Flaky Test Storage"
    }
}

/// Everything a controller test needs to inspect afterwards
pub struct Harness {
    pub controller: SessionController,
    pub provider: Arc<InMemoryProvider>,
    pub storage: Arc<FlakyStorage>,
}

/// Controller over an in-memory provider, flaky storage and fixed biometrics
pub fn harness(provider: InMemoryProvider, biometrics: BiometricOutcome) -> Harness {
    let provider = Arc::new(provider);
    let storage = Arc::new(FlakyStorage::new());
    let controller = SessionController::new(
        provider.clone(),
        storage.clone(),
        Arc::new(StaticBiometrics::new(true, true, biometrics)),
        &Settings::new(),
    );

    Harness {
        controller,
        provider,
        storage,
    }
}

/// Provider whose code check never returns
pub struct StalledVerification(pub InMemoryProvider);

#[async_trait]
impl IdentityProvider for StalledVerification {
    async fn session(&self) -> ProviderResult<SessionSnapshot> {
        self.0.session().await
    }

    async fn sign_in(&self, identifier: &str, secret: &str) -> ProviderResult<SignInStatus> {
        self.0.sign_in(identifier, secret).await
    }

    async fn sign_in_with_oauth(
        &self,
        strategy: OAuthStrategy,
        redirect_uri: &str,
    ) -> ProviderResult<SignInStatus> {
        self.0.sign_in_with_oauth(strategy, redirect_uri).await
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        self.0.sign_out().await
    }

    async fn current_account(&self) -> ProviderResult<Option<Account>> {
        self.0.current_account().await
    }

    async fn create_email_address(&self, address: &str) -> ProviderResult<EmailAddressHandle> {
        self.0.create_email_address(address).await
    }

    async fn prepare_email_verification(&self, handle: &EmailAddressHandle) -> ProviderResult<()> {
        self.0.prepare_email_verification(handle).await
    }

    async fn attempt_email_verification(
        &self,
        _handle: &EmailAddressHandle,
        _code: &str,
    ) -> ProviderResult<()> {
        std::future::pending().await
    }

    async fn set_primary_email(&self, handle: &EmailAddressHandle) -> ProviderResult<()> {
        self.0.set_primary_email(handle).await
    }

    async fn delete_email_address(&self, handle: &EmailAddressHandle) -> ProviderResult<()> {
        self.0.delete_email_address(handle).await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> ProviderResult<()> {
        self.0.update_profile(update).await
    }

    async fn set_profile_image(&self, image: Option<&str>) -> ProviderResult<()> {
        self.0.set_profile_image(image).await
    }

    async fn delete_account(&self) -> ProviderResult<()> {
        self.0.delete_account().await
    }

    async fn sign_up(&self, address: &str, secret: &str) -> ProviderResult<EmailAddressHandle> {
        self.0.sign_up(address, secret).await
    }

    async fn finalize_sign_up(&self) -> ProviderResult<SignInStatus> {
        self.0.finalize_sign_up().await
    }

    async fn abandon_sign_up(&self) -> ProviderResult<()> {
        self.0.abandon_sign_up().await
    }

    async fn request_password_reset(&self, identifier: &str) -> ProviderResult<()> {
        self.0.request_password_reset(identifier).await
    }

    async fn reset_password(&self, code: &str, new_secret: &str) -> ProviderResult<SignInStatus> {
        self.0.reset_password(code, new_secret).await
    }
}
