//! Account, conversation and comment stores over one local SQLite file.
//!
//! Callers open a [`Store`] once and pass it (or a clone) to whatever needs
//! it. Every read returns a snapshot; views stay current by re-reading after
//! their own writes (see [`refresh`]) or, optionally, by listening to
//! [`Store::subscribe`].

pub mod accounts;
pub mod comments;
pub mod config;
pub mod conversations;
pub mod dispatcher;
pub mod error;
pub mod grouping;
pub mod logging;
pub mod password;
pub mod refresh;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::warn;

use chirp_db::Database;
use chirp_types::events::StoreEvent;

pub use accounts::Accounts;
pub use comments::Comments;
pub use config::StoreConfig;
pub use conversations::Conversations;
pub use dispatcher::Dispatcher;
pub use error::{Result, StoreError};

use password::Credentials;

/// Shared handle to the store. Cloning is cheap.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub credentials: Credentials,
}

impl Store {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let db = Database::open(&config.db_path).map_err(StoreError::Storage)?;
        Self::with_database(db, config)
    }

    /// Same as `open`, but nothing touches disk; `config.db_path` is ignored.
    pub fn open_in_memory(config: &StoreConfig) -> Result<Self> {
        let db = Database::open_in_memory().map_err(StoreError::Storage)?;
        Self::with_database(db, config)
    }

    pub fn with_database(db: Database, config: &StoreConfig) -> Result<Self> {
        let credentials = Credentials::new(config.argon2_memory_kib, config.argon2_iterations)
            .map_err(StoreError::Storage)?;

        Ok(Self {
            inner: Arc::new(StoreInner {
                db,
                dispatcher: Dispatcher::new(config.event_capacity),
                credentials,
            }),
        })
    }

    pub fn accounts(&self) -> Accounts<'_> {
        Accounts::new(&self.inner)
    }

    pub fn conversations(&self) -> Conversations<'_> {
        Conversations::new(&self.inner)
    }

    pub fn comments(&self) -> Comments<'_> {
        Comments::new(&self.inner)
    }

    /// Change notifications for writes made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.dispatcher.subscribe()
    }

    pub fn database(&self) -> &Database {
        &self.inner.db
    }
}

/// SQLite stores `datetime('now')` as "YYYY-MM-DD HH:MM:SS" without a zone;
/// those values are UTC.
pub(crate) fn parse_timestamp(raw: &str, row: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {}: {}", raw, row, e);
            DateTime::default()
        })
}
