//! Credential type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::provider::OAuthStrategy;

/// How the user last authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
    /// Email + password (including biometric replay of a cached password)
    Email,
    OAuthGoogle,
    OAuthApple,
    OAuthGithub,
}

impl ProviderTag {
    /// Persisted representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::Email => "email",
            ProviderTag::OAuthGoogle => "oauth_google",
            ProviderTag::OAuthApple => "oauth_apple",
            ProviderTag::OAuthGithub => "oauth_github",
        }
    }

    /// Whether a local password exists that can be replayed
    pub fn is_password(&self) -> bool {
        matches!(self, ProviderTag::Email)
    }
}

impl From<OAuthStrategy> for ProviderTag {
    fn from(strategy: OAuthStrategy) -> Self {
        match strategy {
            OAuthStrategy::Google => ProviderTag::OAuthGoogle,
            OAuthStrategy::Apple => ProviderTag::OAuthApple,
            OAuthStrategy::Github => ProviderTag::OAuthGithub,
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(ProviderTag::Email),
            "oauth_google" => Ok(ProviderTag::OAuthGoogle),
            "oauth_apple" => Ok(ProviderTag::OAuthApple),
            "oauth_github" => Ok(ProviderTag::OAuthGithub),
            other => Err(format!("unknown provider tag: {}", other)),
        }
    }
}

/// Secret value - automatically zeroed when dropped
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Get the secret value (use carefully)
    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SecretString {}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Last password-based credential pair, kept for biometric replay
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub identifier: String,
    pub secret: SecretString,
}

impl StoredCredential {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: SecretString::new(secret),
        }
    }

    /// Serialize for storage
    pub(crate) fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(&CredentialPayload {
            identifier: &self.identifier,
            secret: self.secret.expose(),
        })
    }

    /// Parse a stored payload; anything unusable is `None`
    pub(crate) fn from_payload(payload: &str) -> Option<Self> {
        let mut raw: RawCredentialPayload = serde_json::from_str(payload).ok()?;
        let secret = SecretString::new(std::mem::take(&mut raw.secret));

        if raw.identifier.trim().is_empty() || secret.is_empty() {
            return None;
        }

        Some(Self {
            identifier: std::mem::take(&mut raw.identifier),
            secret,
        })
    }
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("identifier", &self.identifier)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct CredentialPayload<'a> {
    identifier: &'a str,
    secret: &'a str,
}

/// Older payloads used `email`/`password`
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
struct RawCredentialPayload {
    #[serde(alias = "email")]
    identifier: String,
    #[serde(alias = "password")]
    secret: String,
}
