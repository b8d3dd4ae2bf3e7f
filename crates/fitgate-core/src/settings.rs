//! Application settings management
//!
//! Stores non-sensitive configuration in a plain JSON file. Secrets never
//! go here; they live in [`SecureStorage`](crate::storage::SecureStorage).

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use crate::error::{AuthError, Result};

/// Default OAuth redirect URI (app deep link)
pub const DEFAULT_REDIRECT_URI: &str = "fitgate://oauth-callback";

/// Default biometric prompt text
pub const DEFAULT_BIOMETRIC_PROMPT: &str = "Login with biometrics";

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Namespace for secure storage keys
    pub storage_namespace: String,
    /// Where the OAuth flow returns to
    pub oauth_redirect_uri: String,
    /// Text shown in the OS biometric prompt
    pub biometric_prompt: String,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self {
            version: 1,
            storage_namespace: "fitgate".to_string(),
            oauth_redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            biometric_prompt: DEFAULT_BIOMETRIC_PROMPT.to_string(),
        }
    }

    /// Check values that would otherwise fail deep inside a flow
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.oauth_redirect_uri).map_err(|e| {
            AuthError::Config(format!(
                "invalid OAuth redirect URI {:?}: {}",
                self.oauth_redirect_uri, e
            ))
        })?;

        if self.storage_namespace.trim().is_empty() {
            return Err(AuthError::Config("storage namespace is empty".to_string()));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Create a settings manager for the given directory
    pub fn new(storage_dir: &Path) -> Self {
        let settings_file = storage_dir.join("settings.json");
        let settings = Self::load_from_file(&settings_file).unwrap_or_default();

        Self {
            settings_file,
            settings,
        }
    }

    /// Create a settings manager in the platform data directory
    pub fn in_default_dir() -> Result<Self> {
        let dir = default_data_dir()?;
        std::fs::create_dir_all(&dir)?;
        Ok(Self::new(&dir))
    }

    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::new());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.settings)?;

        // Write atomically using temp file
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Validate, replace and save
    pub async fn update(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        self.save().await
    }

    /// Reset settings to defaults and delete settings file
    pub async fn reset(&mut self) -> Result<()> {
        self.settings = Settings::new();

        if self.settings_file.exists() {
            tokio::fs::remove_file(&self.settings_file).await?;
        }

        Ok(())
    }

    pub fn settings_file(&self) -> &Path {
        &self.settings_file
    }
}

/// Platform data directory for fitgate
pub fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("dev", "fitgate", "fitgate")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| AuthError::Config("Could not determine data directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_settings_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path());

        let settings = manager.get();
        assert_eq!(settings.oauth_redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(settings.biometric_prompt, DEFAULT_BIOMETRIC_PROMPT);
        assert!(settings.validate().is_ok());
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut manager = SettingsManager::new(temp_dir.path());
            manager.get_mut().biometric_prompt = "Unlock your workouts".to_string();
            manager.get_mut().oauth_redirect_uri = "myapp://callback".to_string();
            manager.save().await.unwrap();
        }

        {
            let manager = SettingsManager::new(temp_dir.path());
            assert_eq!(manager.get().biometric_prompt, "Unlock your workouts");
            assert_eq!(manager.get().oauth_redirect_uri, "myapp://callback");
        }
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_redirect() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = SettingsManager::new(temp_dir.path());

        let mut bad = Settings::new();
        bad.oauth_redirect_uri = "not a url".to_string();

        let err = manager.update(bad).await.unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
        assert_eq!(manager.get().oauth_redirect_uri, DEFAULT_REDIRECT_URI);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("settings.json"),
            r#"{"biometricPrompt":"Scan to continue"}"#,
        )
        .unwrap();

        let manager = SettingsManager::new(temp_dir.path());
        assert_eq!(manager.get().biometric_prompt, "Scan to continue");
        assert_eq!(manager.get().storage_namespace, "fitgate");
    }

    #[tokio::test]
    async fn test_reset() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = SettingsManager::new(temp_dir.path());
        manager.get_mut().biometric_prompt = "custom".to_string();
        manager.save().await.unwrap();
        assert!(manager.settings_file().exists());

        manager.reset().await.unwrap();
        assert!(!manager.settings_file().exists());
        assert_eq!(manager.get().biometric_prompt, DEFAULT_BIOMETRIC_PROMPT);
    }
}
