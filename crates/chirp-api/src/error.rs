use chirp_types::models::UserId;
use thiserror::Error;

/// Every failure a store operation can report. The underlying store error,
/// when there is one, is kept as the `source()`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} is required")]
    Invalid(&'static str),

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("body is empty")]
    EmptyBody,

    #[error("no account with id {0}")]
    UnknownUser(UserId),

    #[error("update failed")]
    UpdateFailed(#[source] anyhow::Error),

    #[error("store read failed")]
    Storage(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
