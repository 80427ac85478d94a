//! Profile editor.
//!
//! Edits go to a draft addressed by field name (nested fields use a dotted
//! name such as `emergencyContact.phone`). `submit` makes the draft the saved
//! profile and persists it; `cancel` throws the draft away.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::auth::{LocalStore, LocalStoreError, User};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unknown profile field '{0}'")]
    UnknownField(String),
    #[error("profile is not being edited")]
    NotEditing,
    #[error(transparent)]
    Storage(#[from] LocalStoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub full_name: String,
    pub email: String,
    pub dob: String,
    pub gender: String,
    pub phone: String,
    pub emergency_contact: EmergencyContact,
    pub medical_history: String,
    pub therapy_goals: String,
    pub communication_style: String,
    pub avatar: Option<String>,
}

impl ProfileData {
    pub fn for_user(user: &User) -> Self {
        Self {
            full_name: user.name.clone(),
            email: user.email.clone(),
            dob: String::new(),
            gender: String::new(),
            phone: String::new(),
            emergency_contact: EmergencyContact::default(),
            medical_history: String::new(),
            therapy_goals: String::new(),
            communication_style: "direct".to_string(),
            avatar: user.profile_picture.clone(),
        }
    }

    pub fn set_field(&mut self, name: &str, value: &str) -> Result<(), ProfileError> {
        let slot = match name.split_once('.') {
            Some(("emergencyContact", child)) => match child {
                "name" => &mut self.emergency_contact.name,
                "relationship" => &mut self.emergency_contact.relationship,
                "phone" => &mut self.emergency_contact.phone,
                _ => return Err(ProfileError::UnknownField(name.to_string())),
            },
            Some(_) => return Err(ProfileError::UnknownField(name.to_string())),
            None => match name {
                "fullName" => &mut self.full_name,
                "email" => &mut self.email,
                "dob" => &mut self.dob,
                "gender" => &mut self.gender,
                "phone" => &mut self.phone,
                "medicalHistory" => &mut self.medical_history,
                "therapyGoals" => &mut self.therapy_goals,
                "communicationStyle" => &mut self.communication_style,
                "avatar" => {
                    self.avatar = (!value.is_empty()).then(|| value.to_string());
                    return Ok(());
                }
                _ => return Err(ProfileError::UnknownField(name.to_string())),
            },
        };
        *slot = value.to_string();
        Ok(())
    }
}

fn profile_key(user_id: &str) -> String {
    format!("profile:{}", user_id)
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileEditor {
    user_id: String,
    saved: ProfileData,
    draft: Option<ProfileData>,
}

impl ProfileEditor {
    /// Loads the stored profile, or seeds one from the user's identity.
    pub fn load(store: &LocalStore, user: &User) -> Result<Self, ProfileError> {
        let saved = store
            .get::<ProfileData>(&profile_key(&user.id))?
            .unwrap_or_else(|| ProfileData::for_user(user));
        Ok(Self {
            user_id: user.id.clone(),
            saved,
            draft: None,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    /// The draft while editing, otherwise the saved profile.
    pub fn current(&self) -> &ProfileData {
        self.draft.as_ref().unwrap_or(&self.saved)
    }

    pub fn begin_edit(&mut self) {
        if self.draft.is_none() {
            self.draft = Some(self.saved.clone());
        }
    }

    pub fn set_field(&mut self, name: &str, value: &str) -> Result<(), ProfileError> {
        self.draft
            .as_mut()
            .ok_or(ProfileError::NotEditing)?
            .set_field(name, value)
    }

    pub fn submit(&mut self, store: &LocalStore) -> Result<&ProfileData, ProfileError> {
        let draft = self.draft.take().ok_or(ProfileError::NotEditing)?;
        if let Err(e) = store.set(&profile_key(&self.user_id), &draft) {
            self.draft = Some(draft);
            return Err(e.into());
        }
        info!(user_id = %self.user_id, "profile saved");
        self.saved = draft;
        Ok(&self.saved)
    }

    pub fn cancel(&mut self) {
        self.draft = None;
    }
}
