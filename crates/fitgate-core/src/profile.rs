//! Profile editing

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AuthError, Result};
use crate::provider::{Account, IdentityProvider, ProfileField, ProfileUpdate};

/// Which part of the profile is open for editing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditingField {
    Avatar,
    Name,
    Username,
    Phone,
    /// Account-level actions; deletion goes through the session controller
    Account,
}

impl EditingField {
    fn profile_field(self) -> Option<ProfileField> {
        match self {
            EditingField::Name => Some(ProfileField::FirstName),
            EditingField::Username => Some(ProfileField::Username),
            EditingField::Phone => Some(ProfileField::PhoneNumber),
            EditingField::Avatar | EditingField::Account => None,
        }
    }
}

/// Edits one profile field at a time
pub struct ProfileEditor {
    provider: Arc<dyn IdentityProvider>,
    editing: Option<EditingField>,
}

impl ProfileEditor {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            editing: None,
        }
    }

    pub fn editing(&self) -> Option<EditingField> {
        self.editing
    }

    /// Open `field` for editing, closing whatever was open
    pub fn begin_edit(&mut self, field: EditingField) {
        debug!("Editing {:?}", field);
        self.editing = Some(field);
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Current account snapshot
    pub async fn account(&self) -> Result<Account> {
        self.provider
            .current_account()
            .await?
            .ok_or_else(|| AuthError::InvalidState("no signed-in account".to_string()))
    }

    /// Save `value` into the field being edited.
    ///
    /// For [`EditingField::Avatar`] the value is the image reference.
    pub async fn save(&mut self, value: &str) -> Result<()> {
        let field = self
            .editing
            .ok_or_else(|| AuthError::InvalidState("no field is being edited".to_string()))?;

        let value = value.trim();
        if value.is_empty() {
            return Err(AuthError::InvalidInput("Value cannot be empty".to_string()));
        }

        match (field, field.profile_field()) {
            (EditingField::Avatar, _) => self.provider.set_profile_image(Some(value)).await?,
            (_, Some(profile_field)) => {
                self.provider
                    .update_profile(&ProfileUpdate::new().set(profile_field, value))
                    .await?
            }
            (_, None) => return Err(not_editable()),
        }

        info!("Profile {:?} updated", field);
        self.editing = None;
        Ok(())
    }

    /// Clear `field`; cleared fields are `None` at the provider
    pub async fn clear(&mut self, field: EditingField) -> Result<()> {
        match (field, field.profile_field()) {
            (EditingField::Avatar, _) => self.provider.set_profile_image(None).await?,
            (_, Some(profile_field)) => {
                self.provider
                    .update_profile(&ProfileUpdate::new().clear(profile_field))
                    .await?
            }
            (_, None) => return Err(not_editable()),
        }

        info!("Profile {:?} cleared", field);
        self.editing = None;
        Ok(())
    }
}

fn not_editable() -> AuthError {
    AuthError::InvalidState("account settings are not editable here".to_string())
}
