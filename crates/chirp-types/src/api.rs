use serde::{Deserialize, Serialize};

use crate::models::UserId;

// -- Accounts --

/// Registration input as collected by a sign-up form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Partial profile update. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub picture_ref: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.bio.is_none()
            && self.address.is_none()
            && self.picture_ref.is_none()
    }
}

// -- Comments --

/// Who a comment is posted as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum CommentAuthor {
    Account(UserId),
    Guest(String),
}
