//! Identity provider type definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Structured error returned by the identity provider.
///
/// `message` is user-displayable and is shown verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} ({code})")]
pub struct ProviderError {
    /// Machine-readable error code (e.g. "form_code_incorrect")
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// OAuth federation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthStrategy {
    Google,
    Apple,
    Github,
}

impl OAuthStrategy {
    /// Wire name used by the identity provider
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthStrategy::Google => "oauth_google",
            OAuthStrategy::Apple => "oauth_apple",
            OAuthStrategy::Github => "oauth_github",
        }
    }
}

impl fmt::Display for OAuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "oauth_google" => Ok(OAuthStrategy::Google),
            "apple" | "oauth_apple" => Ok(OAuthStrategy::Apple),
            "github" | "oauth_github" => Ok(OAuthStrategy::Github),
            other => Err(format!("unknown OAuth strategy: {}", other)),
        }
    }
}

/// What the provider currently knows about the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    /// Provider auth state has finished resolving
    pub auth_loaded: bool,
    /// Provider user record has finished resolving
    pub user_loaded: bool,
    /// A provider session is active
    pub signed_in: bool,
}

impl SessionSnapshot {
    /// Both halves of the provider state have resolved
    pub fn is_loaded(&self) -> bool {
        self.auth_loaded && self.user_loaded
    }
}

/// Result of a sign-in attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInStatus {
    /// A session was created and activated
    Complete { session_id: String },
    /// The provider needs more (second factor, missing profile fields, ...)
    Incomplete { reason: String },
}

/// Reference to one email address on the account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddressHandle {
    /// Provider identifier of the address
    pub id: String,
    /// The address itself
    pub address: String,
}

/// Snapshot of the signed-in account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub first_name: Option<String>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
    pub primary_email_id: Option<String>,
    pub email_addresses: Vec<EmailAddressHandle>,
}

impl Account {
    /// The primary email address, if one is set
    pub fn primary_email(&self) -> Option<&EmailAddressHandle> {
        let id = self.primary_email_id.as_deref()?;
        self.email_addresses.iter().find(|e| e.id == id)
    }
}

/// Editable profile fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfileField {
    FirstName,
    Username,
    PhoneNumber,
}

/// Set of profile field changes; `None` clears a field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    changes: BTreeMap<ProfileField, Option<String>>,
}

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field to a value
    pub fn set(mut self, field: ProfileField, value: impl Into<String>) -> Self {
        self.changes.insert(field, Some(value.into()));
        self
    }

    /// Clear a field
    pub fn clear(mut self, field: ProfileField) -> Self {
        self.changes.insert(field, None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterate over the requested changes
    pub fn changes(&self) -> impl Iterator<Item = (ProfileField, Option<&str>)> {
        self.changes.iter().map(|(f, v)| (*f, v.as_deref()))
    }

    /// Apply the changes to an account snapshot
    pub fn apply_to(&self, account: &mut Account) {
        for (field, value) in self.changes() {
            let value = value.map(str::to_string);
            match field {
                ProfileField::FirstName => account.first_name = value,
                ProfileField::Username => account.username = value,
                ProfileField::PhoneNumber => account.phone_number = value,
            }
        }
    }
}
