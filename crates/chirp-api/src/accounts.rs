use anyhow::anyhow;
use tracing::{info, warn};

use chirp_db::models::{UserRow, UserUpdate};
use chirp_db::queries::is_unique_violation;
use chirp_types::api::{ProfileUpdate, RegistrationForm};
use chirp_types::events::StoreEvent;
use chirp_types::models::{User, UserId};

use crate::error::{Result, StoreError};
use crate::{StoreInner, parse_timestamp};

/// User identity and profile operations.
pub struct Accounts<'a> {
    store: &'a StoreInner,
}

impl<'a> Accounts<'a> {
    pub(crate) fn new(store: &'a StoreInner) -> Self {
        Self { store }
    }

    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        if name.trim().is_empty() {
            return Err(StoreError::Invalid("name"));
        }
        if email.trim().is_empty() {
            return Err(StoreError::Invalid("email"));
        }
        if password.is_empty() {
            return Err(StoreError::Invalid("password"));
        }

        // Check if email is taken
        if self
            .store
            .db
            .get_user_by_email(email)
            .map_err(StoreError::Storage)?
            .is_some()
        {
            return Err(StoreError::DuplicateEmail);
        }

        let password_hash = self
            .store
            .credentials
            .hash(password)
            .map_err(StoreError::UpdateFailed)?;

        // A concurrent registration can still win the race; the UNIQUE
        // constraint reports it the same way.
        let id = self
            .store
            .db
            .insert_user(name, email, &password_hash)
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateEmail
                } else {
                    warn!("Registering {} failed: {:#}", email, e);
                    StoreError::UpdateFailed(e)
                }
            })?;

        let user = self
            .get_by_id(id)?
            .ok_or_else(|| StoreError::UpdateFailed(anyhow!("User {} missing after insert", id)))?;

        info!("Registered user {} ({})", user.id, user.name);
        self.store.dispatcher.broadcast(StoreEvent::UserRegistered {
            user_id: user.id,
            name: user.name.clone(),
        });
        Ok(user)
    }

    /// Sign-up form variant: every field is required and both password
    /// entries must match.
    pub fn register_form(&self, form: &RegistrationForm) -> Result<User> {
        let required = [
            ("name", form.name.trim()),
            ("email", form.email.trim()),
            ("password", form.password.as_str()),
            ("confirm_password", form.confirm_password.as_str()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(StoreError::Invalid(*field));
        }
        if form.password != form.confirm_password {
            return Err(StoreError::PasswordMismatch);
        }
        self.register(&form.name, &form.email, &form.password)
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        if email.is_empty() {
            return Err(StoreError::Invalid("email"));
        }
        if password.is_empty() {
            return Err(StoreError::Invalid("password"));
        }

        let row = self
            .store
            .db
            .get_user_by_email(email)
            .map_err(StoreError::Storage)?
            .ok_or(StoreError::InvalidCredentials)?;

        if !self.store.credentials.verify(password, &row.password) {
            return Err(StoreError::InvalidCredentials);
        }

        Ok(user_from_row(row))
    }

    pub fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        let row = self.store.db.get_user_by_id(id).map_err(StoreError::Storage)?;
        Ok(row.map(user_from_row))
    }

    /// Everyone but `id`, by name. Feeds "who can I message" lists.
    pub fn list_except(&self, id: UserId) -> Result<Vec<User>> {
        let rows = self.store.db.list_users_except(id).map_err(StoreError::Storage)?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }

    /// Every account in registration order.
    pub fn list_all(&self) -> Result<Vec<User>> {
        let rows = self.store.db.list_users().map_err(StoreError::Storage)?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }

    pub fn count(&self) -> Result<u64> {
        self.store.db.count_users().map_err(StoreError::Storage)
    }

    /// Overwrite the provided fields and return the fresh row.
    pub fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<User> {
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(StoreError::Invalid("name"));
        }
        if update.email.as_deref().is_some_and(|e| e.trim().is_empty()) {
            return Err(StoreError::Invalid("email"));
        }

        // Nothing to write, and nothing for viewers to reload
        if update.is_empty() {
            return self
                .get_by_id(id)?
                .ok_or_else(|| StoreError::UpdateFailed(anyhow!("No account with id {}", id)));
        }

        let changes = UserUpdate {
            name: update.name.as_deref(),
            email: update.email.as_deref(),
            bio: update.bio.as_deref(),
            address: update.address.as_deref(),
            profile_uri: update.picture_ref.as_deref(),
        };

        let changed = self.store.db.update_user(id, &changes).map_err(|e| {
            warn!("Profile update for user {} failed: {:#}", id, e);
            StoreError::UpdateFailed(e)
        })?;

        self.finish_update(id, changed)
    }

    /// Picture-only update. The reference is stored verbatim.
    pub fn update_picture(&self, id: UserId, picture_ref: &str) -> Result<User> {
        let changed = self
            .store
            .db
            .update_user_picture(id, picture_ref)
            .map_err(|e| {
                warn!("Picture update for user {} failed: {:#}", id, e);
                StoreError::UpdateFailed(e)
            })?;

        self.finish_update(id, changed)
    }

    fn finish_update(&self, id: UserId, changed: usize) -> Result<User> {
        if changed == 0 {
            return Err(StoreError::UpdateFailed(anyhow!("No account with id {}", id)));
        }

        let user = self
            .get_by_id(id)?
            .ok_or_else(|| StoreError::UpdateFailed(anyhow!("User {} missing after update", id)))?;

        self.store
            .dispatcher
            .broadcast(StoreEvent::ProfileUpdated { user_id: id });
        Ok(user)
    }
}

pub(crate) fn user_from_row(row: UserRow) -> User {
    let created_at = row
        .created_at
        .as_deref()
        .map(|raw| parse_timestamp(raw, &format!("user {}", row.id)))
        .unwrap_or_default();
    User {
        id: row.id,
        name: row.name,
        email: row.email,
        picture_ref: row.profile_uri,
        bio: row.bio,
        address: row.address,
        created_at,
    }
}
