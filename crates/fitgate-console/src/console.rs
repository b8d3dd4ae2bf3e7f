//! Interactive console over stdin

use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, info};

use fitgate_core::{
    marked_dates, sample_workouts, AuthError, EmailChangeFlow, IdentityProvider,
    InMemoryProvider, ProfileEditor, SessionController, SignUpFlow, SignUpForm, Transition,
};

use crate::command::{Command, HELP};

/// Which flow the next `code` command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeTarget {
    EmailChange,
    SignUp,
}

/// Line-oriented front end for the session controller and flows
pub struct Console {
    controller: Arc<RwLock<SessionController>>,
    provider: Arc<InMemoryProvider>,
    email_change: EmailChangeFlow,
    sign_up: SignUpFlow,
    profile: ProfileEditor,
    code_target: Option<CodeTarget>,
}

impl Console {
    pub fn new(controller: Arc<RwLock<SessionController>>, provider: Arc<InMemoryProvider>) -> Self {
        let shared: Arc<dyn IdentityProvider> = provider.clone();

        Self {
            controller,
            email_change: EmailChangeFlow::new(shared.clone()),
            sign_up: SignUpFlow::new(shared.clone()),
            profile: ProfileEditor::new(shared),
            provider,
            code_target: None,
        }
    }

    /// Read commands until `quit` or EOF
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(tokio::io::stdin());
        let mut line = String::new();

        loop {
            stdout.write_all(b"fitgate> ").await?;
            stdout.flush().await?;

            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                info!("EOF received, exiting");
                break;
            }

            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            let command = match Command::parse(input) {
                Ok(command) => command,
                Err(msg) => {
                    println!("{}", msg);
                    continue;
                }
            };

            if command == Command::Quit {
                break;
            }

            match self.execute(command).await {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    debug!("Command failed: {}", e);
                    println!("error: {}", e.user_message());
                }
            }
        }

        Ok(())
    }

    /// Run one command and return what to print
    pub async fn execute(&mut self, command: Command) -> fitgate_core::Result<String> {
        match command {
            Command::Status => {
                let mut controller = self.controller.write().await;
                let biometric = match controller.biometric_available().await {
                    Ok(true) => "available".to_string(),
                    Ok(false) => "unavailable".to_string(),
                    Err(e) => format!("unknown ({})", e.user_message()),
                };
                Ok(format!(
                    "state: {:?}\nroute: {:?}\nstorage: {}\nbiometric login: {}",
                    controller.state(),
                    controller.route(),
                    controller.cache().backend_name(),
                    biometric
                ))
            }
            Command::SignIn { email, password } => {
                let password = match password {
                    Some(p) => p,
                    None => read_secret("Password: ").await?,
                };
                let t = self
                    .controller
                    .write()
                    .await
                    .sign_in_with_password(&email, &password)
                    .await?;
                Ok(describe(&t))
            }
            Command::Biometric => {
                let t = self.controller.write().await.sign_in_with_biometrics().await?;
                Ok(describe(&t))
            }
            Command::OAuth(strategy) => {
                let t = self
                    .controller
                    .write()
                    .await
                    .sign_in_with_oauth(strategy)
                    .await?;
                Ok(describe(&t))
            }
            Command::SignOut => {
                let t = self.controller.write().await.sign_out().await?;
                Ok(describe(&t))
            }
            Command::DeleteAccount => {
                let t = self.controller.write().await.delete_account().await?;
                self.code_target = None;
                Ok(describe(&t))
            }
            Command::ChangeEmail(address) => {
                self.email_change.request_change(&address).await?;
                self.code_target = Some(CodeTarget::EmailChange);
                let pending = self.email_change.pending_address().unwrap_or_default().to_string();
                Ok(self.code_sent(&pending).await)
            }
            Command::SignUp { email, password } => {
                let (password, confirm) = match password {
                    Some(p) => (p.clone(), p),
                    None => (
                        read_secret("Password: ").await?,
                        read_secret("Confirm password: ").await?,
                    ),
                };
                self.sign_up
                    .start(SignUpForm::new(email, &password, &confirm))
                    .await?;
                self.code_target = Some(CodeTarget::SignUp);
                let pending = self.sign_up.pending_address().unwrap_or_default().to_string();
                Ok(self.code_sent(&pending).await)
            }
            Command::Code(code) => match self.code_target {
                Some(CodeTarget::EmailChange) => {
                    let handle = self.email_change.submit_code(&code).await?;
                    self.code_target = None;
                    Ok(format!("Primary email is now {}", handle.address))
                }
                Some(CodeTarget::SignUp) => {
                    let completion = self.sign_up.submit_code(&code).await?;
                    self.code_target = None;
                    let t = self
                        .controller
                        .write()
                        .await
                        .complete_sign_up(completion)
                        .await?;
                    Ok(describe(&t))
                }
                None => Err(AuthError::InvalidInput(
                    "No code has been requested".to_string(),
                )),
            },
            Command::Cancel => {
                match self.code_target {
                    Some(CodeTarget::EmailChange) => self.email_change.cancel().await?,
                    Some(CodeTarget::SignUp) => self.sign_up.cancel().await?,
                    None => {}
                }
                self.code_target = None;
                Ok("Cancelled".to_string())
            }
            Command::Forgot(email) => {
                self.controller
                    .read()
                    .await
                    .request_password_reset(&email)
                    .await?;
                let code = self.provider.password_reset_code().await.unwrap_or_default();
                Ok(format!("Reset code sent to {} (simulated email: {})", email, code))
            }
            Command::Reset {
                email,
                code,
                password,
            } => {
                let password = match password {
                    Some(p) => p,
                    None => read_secret("New password: ").await?,
                };
                let t = self
                    .controller
                    .write()
                    .await
                    .reset_password(&email, &code, &password)
                    .await?;
                Ok(describe(&t))
            }
            Command::Edit { field, value } => {
                self.profile.begin_edit(field);
                if let Err(e) = self.profile.save(&value).await {
                    self.profile.cancel_edit();
                    return Err(e);
                }
                Ok(format!("{:?} updated", field))
            }
            Command::Clear(field) => {
                self.profile.clear(field).await?;
                Ok(format!("{:?} cleared", field))
            }
            Command::Profile => {
                let account = self.profile.account().await?;
                let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
                Ok(format!(
                    "email: {}\nname: {}\nusername: {}\nphone: {}\navatar: {}",
                    account
                        .primary_email()
                        .map(|e| e.address.as_str())
                        .unwrap_or("-"),
                    show(&account.first_name),
                    show(&account.username),
                    show(&account.phone_number),
                    show(&account.image_url),
                ))
            }
            Command::Workouts => {
                let records = sample_workouts();
                let today = chrono::Local::now().date_naive();
                let lines: Vec<String> = marked_dates(&records, today)
                    .into_iter()
                    .map(|(date, mark)| {
                        let status = match (mark.status, mark.disabled) {
                            (Some(status), _) => format!("{:?}", status),
                            (None, true) => "no exercises".to_string(),
                            (None, false) => "-".to_string(),
                        };
                        let marker = if mark.today { " (today)" } else { "" };
                        format!("{}  {}{}", date, status, marker)
                    })
                    .collect();
                Ok(lines.join("\n"))
            }
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok(String::new()),
        }
    }

    /// Codes go nowhere in the simulated provider, so show them
    async fn code_sent(&self, address: &str) -> String {
        let code = self
            .provider
            .verification_code(address)
            .await
            .unwrap_or_default();
        format!("Code sent to {} (simulated email: {})", address, code)
    }
}

fn describe(t: &Transition) -> String {
    let mut out = format!("-> {:?}", t.route());
    for step in &t.failures {
        out.push_str(&format!("\nwarning: {:?} could not be saved on this device", step));
    }
    out
}

async fn read_secret(prompt: &'static str) -> fitgate_core::Result<String> {
    tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
        .await
        .map_err(|e| AuthError::Io(io::Error::other(e)))?
        .map_err(AuthError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fitgate_core::credential::CREDENTIAL_KEY;
    use fitgate_core::{
        BiometricOutcome, MemoryStorage, OAuthStrategy, Route, SecureStorage, Settings,
        StaticBiometrics,
    };

    /// Keychain whose credential entry cannot be read
    struct LockedKeychain(MemoryStorage);

    #[async_trait]
    impl SecureStorage for LockedKeychain {
        async fn get(&self, key: &str) -> fitgate_core::Result<Option<String>> {
            if key == CREDENTIAL_KEY {
                return Err(AuthError::StorageUnavailable("keychain is locked".to_string()));
            }
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> fitgate_core::Result<()> {
            self.0.set(key, value).await
        }

        async fn delete(&self, key: &str) -> fitgate_core::Result<()> {
            self.0.delete(key).await
        }

        fn is_hardware_backed(&self) -> bool {
            false
        }

        fn backend_name(&self) -> &'static str {
            "Locked Keychain"
        }
    }

    async fn console_with(storage: Arc<dyn SecureStorage>) -> Console {
        let provider = Arc::new(
            InMemoryProvider::new()
                .with_account("alice@example.com", "Secret1!")
                .with_oauth_identity(OAuthStrategy::Google, "carol@gmail.com"),
        );
        let mut controller = SessionController::new(
            provider.clone(),
            storage,
            Arc::new(StaticBiometrics::new(true, true, BiometricOutcome::Success)),
            &Settings::new(),
        );
        controller.refresh().await.unwrap();
        Console::new(Arc::new(RwLock::new(controller)), provider)
    }

    async fn console() -> Console {
        console_with(Arc::new(MemoryStorage::new())).await
    }

    async fn run(console: &mut Console, line: &str) -> fitgate_core::Result<String> {
        console.execute(Command::parse(line).unwrap()).await
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let mut console = console().await;

        let out = run(&mut console, "sign-in alice@example.com Secret1!").await.unwrap();
        assert_eq!(out, "-> ProtectedHome");

        let out = run(&mut console, "sign-out").await.unwrap();
        assert_eq!(out, "-> SignedOut");
        assert_eq!(console.controller.read().await.route(), Route::SignedOut);
    }

    #[tokio::test]
    async fn test_email_change_through_console() {
        let mut console = console().await;
        run(&mut console, "sign-in alice@example.com Secret1!").await.unwrap();

        run(&mut console, "change-email alice2@example.com").await.unwrap();
        let code = console
            .provider
            .verification_code("alice2@example.com")
            .await
            .unwrap();

        let out = run(&mut console, &format!("code {}", code)).await.unwrap();
        assert_eq!(out, "Primary email is now alice2@example.com");
    }

    #[tokio::test]
    async fn test_code_without_request() {
        let mut console = console().await;
        let err = run(&mut console, "code 123456").await.unwrap_err();
        assert_eq!(err.user_message(), "No code has been requested");
    }

    #[tokio::test]
    async fn test_sign_up_through_console() {
        let mut console = console().await;

        run(&mut console, "sign-up dana@example.com Dana-Secret").await.unwrap();
        let code = console
            .provider
            .verification_code("dana@example.com")
            .await
            .unwrap();

        let out = run(&mut console, &format!("code {}", code)).await.unwrap();
        assert_eq!(out, "-> ProtectedHome");
    }

    #[tokio::test]
    async fn test_status_reports_unreadable_cache() {
        let mut console = console_with(Arc::new(LockedKeychain(MemoryStorage::new()))).await;

        let out = run(&mut console, "status").await.unwrap();
        assert!(out.contains("biometric login: unknown (Secure storage is unavailable"));
        assert!(!out.contains("biometric login: unavailable"));
    }

    #[tokio::test]
    async fn test_status_without_cached_credential() {
        let mut console = console().await;
        let out = run(&mut console, "status").await.unwrap();
        assert!(out.contains("biometric login: unavailable"));
    }

    #[tokio::test]
    async fn test_cancel_sign_up() {
        let mut console = console().await;
        run(&mut console, "sign-up dana@example.com Dana-Secret").await.unwrap();

        assert_eq!(run(&mut console, "cancel").await.unwrap(), "Cancelled");
        assert!(console
            .provider
            .verification_code("dana@example.com")
            .await
            .is_none());
        assert!(run(&mut console, "code 123456").await.is_err());
    }

    #[tokio::test]
    async fn test_edit_profile() {
        let mut console = console().await;
        run(&mut console, "sign-in alice@example.com Secret1!").await.unwrap();

        run(&mut console, "edit name Alice Liddell").await.unwrap();
        let out = run(&mut console, "profile").await.unwrap();
        assert!(out.contains("name: Alice Liddell"));
    }
}
