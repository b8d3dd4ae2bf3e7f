//! fitgate console - exercise sign-in, logout and verification flows
//!
//! Runs the session controller against a simulated identity provider.
//! Verification codes are printed instead of emailed.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use fitgate_console::Console;
use fitgate_core::{
    BiometricAuthenticator, BiometricOutcome, InMemoryProvider, KeychainStorage, MemoryStorage,
    OAuthStrategy, SecureStorage, SessionController, SettingsManager, StaticBiometrics,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StorageBackend {
    /// OS keychain, falling back to memory if unavailable
    Keychain,
    /// Process memory only
    Memory,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BiometricMode {
    /// Every prompt succeeds
    Approve,
    /// Every prompt is denied
    Deny,
    /// No biometric hardware
    None,
}

/// fitgate - authentication and session continuity console
#[derive(Parser, Debug)]
#[command(name = "fitgate")]
#[command(version)]
#[command(about = "Drive fitgate sign-in, logout and verification flows from a terminal")]
struct Args {
    /// Where the credential cache lives
    #[arg(long, value_enum, default_value = "keychain", env = "FITGATE_STORAGE")]
    storage: StorageBackend,

    /// How the simulated biometric prompt answers
    #[arg(long, value_enum, default_value = "approve")]
    biometrics: BiometricMode,

    /// Directory holding settings.json (defaults to the platform data dir)
    #[arg(long, env = "FITGATE_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

/// Accounts available in the simulated provider
const DEMO_ACCOUNTS: &[(&str, &str)] = &[
    ("alice@example.com", "Secret1!"),
    ("bob@x.com", "Bobs-Secret"),
];

fn demo_provider() -> InMemoryProvider {
    DEMO_ACCOUNTS
        .iter()
        .fold(InMemoryProvider::new(), |provider, (address, secret)| {
            provider.with_account(address, secret)
        })
        .with_oauth_identity(OAuthStrategy::Google, "carol@gmail.com")
        .with_oauth_identity(OAuthStrategy::Github, "alice@example.com")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings_manager = match &args.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory {:?}", dir))?;
            SettingsManager::new(dir)
        }
        None => SettingsManager::in_default_dir().context("Failed to open settings")?,
    };
    let settings = settings_manager.get().clone();
    settings.validate().context("Invalid settings")?;
    info!("Using settings from {:?}", settings_manager.settings_file());

    let storage: Arc<dyn SecureStorage> = match args.storage {
        StorageBackend::Keychain => {
            let keychain = KeychainStorage::new(Some(&settings.storage_namespace));
            if keychain.is_available() {
                Arc::new(keychain)
            } else {
                warn!("Keychain unavailable, credentials will not survive this process");
                Arc::new(MemoryStorage::new())
            }
        }
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };

    let biometrics: Arc<dyn BiometricAuthenticator> = Arc::new(match args.biometrics {
        BiometricMode::Approve => StaticBiometrics::new(true, true, BiometricOutcome::Success),
        BiometricMode::Deny => StaticBiometrics::new(true, true, BiometricOutcome::Denied),
        BiometricMode::None => StaticBiometrics::absent(),
    });

    let provider = Arc::new(demo_provider());
    let mut controller = SessionController::new(provider.clone(), storage, biometrics, &settings);
    let route = controller.refresh().await.context("Failed to restore session")?;
    info!("Storage backend: {}", controller.cache().backend_name());

    println!("fitgate console - type `help` for commands");
    println!("Demo accounts:");
    for (address, secret) in DEMO_ACCOUNTS {
        println!("  {} / {}", address, secret);
    }
    println!("  carol@gmail.com via `oauth google`");
    println!("Starting at {:?}", route);

    let controller = Arc::new(RwLock::new(controller));
    Console::new(controller, provider).run().await
}
