use anyhow::anyhow;
use tracing::{debug, warn};

use chirp_db::models::MessageRow;
use chirp_db::queries::is_foreign_key_violation;
use chirp_types::events::StoreEvent;
use chirp_types::models::{Message, UserId};

use crate::error::{Result, StoreError};
use crate::{StoreInner, parse_timestamp};

/// Direct messages between pairs of users.
pub struct Conversations<'a> {
    store: &'a StoreInner,
}

impl<'a> Conversations<'a> {
    pub(crate) fn new(store: &'a StoreInner) -> Self {
        Self { store }
    }

    /// Append a message and return it as stored (trimmed body, assigned id
    /// and timestamp). Two identical sends create two rows.
    pub fn send(&self, sender: UserId, receiver: UserId, body: &str) -> Result<Message> {
        let body = self.prepare_send(sender, receiver, body)?;

        let id = self
            .store
            .db
            .insert_message(sender, receiver, body, None)
            .map_err(|e| send_failed(sender, receiver, e))?;

        let row = self
            .store
            .db
            .get_message(id)
            .map_err(StoreError::Storage)?
            .ok_or_else(|| StoreError::UpdateFailed(anyhow!("Message {} missing after insert", id)))?;

        self.announce(id, sender, receiver);
        Ok(message_from_row(row))
    }

    /// Send, then re-read the whole thread inside the same transaction.
    pub fn send_and_reload(&self, sender: UserId, receiver: UserId, body: &str) -> Result<Vec<Message>> {
        let body = self.prepare_send(sender, receiver, body)?;

        let (id, rows) = self
            .store
            .db
            .insert_message_and_get_thread(sender, receiver, body)
            .map_err(|e| send_failed(sender, receiver, e))?;

        self.announce(id, sender, receiver);
        Ok(rows.into_iter().map(message_from_row).collect())
    }

    /// Every message between `a` and `b`, in either direction, oldest first.
    /// Always a full re-read.
    pub fn load_thread(&self, a: UserId, b: UserId) -> Result<Vec<Message>> {
        let rows = self.store.db.get_thread(a, b).map_err(StoreError::Storage)?;
        debug!("Loaded {} messages between {} and {}", rows.len(), a, b);
        Ok(rows.into_iter().map(message_from_row).collect())
    }

    pub fn count(&self) -> Result<u64> {
        self.store.db.count_messages().map_err(StoreError::Storage)
    }

    /// Current picture reference of a participant, for decorating bubbles.
    /// A change made later only shows after the next call.
    pub fn resolve_profile_snapshot(&self, user: UserId) -> Result<Option<String>> {
        let row = self.store.db.get_user_by_id(user).map_err(StoreError::Storage)?;
        Ok(row.and_then(|u| u.profile_uri))
    }

    /// Lookup by display name, for callers that only have a name. Names are
    /// not unique; the oldest matching account is used.
    pub fn resolve_profile_snapshot_by_name(&self, name: &str) -> Result<Option<String>> {
        let row = self.store.db.get_user_by_name(name).map_err(StoreError::Storage)?;
        Ok(row.and_then(|u| u.profile_uri))
    }

    fn prepare_send<'b>(&self, sender: UserId, receiver: UserId, body: &'b str) -> Result<&'b str> {
        let body = body.trim();
        if body.is_empty() {
            return Err(StoreError::EmptyBody);
        }

        for id in [sender, receiver] {
            if self.store.db.get_user_by_id(id).map_err(StoreError::Storage)?.is_none() {
                return Err(StoreError::UnknownUser(id));
            }
        }

        Ok(body)
    }

    fn announce(&self, id: i64, sender: UserId, receiver: UserId) {
        self.store.dispatcher.broadcast(StoreEvent::MessageSent {
            id,
            sender_id: sender,
            receiver_id: receiver,
        });
    }
}

fn send_failed(sender: UserId, receiver: UserId, e: anyhow::Error) -> StoreError {
    if is_foreign_key_violation(&e) {
        warn!("Message {} -> {} references a missing account", sender, receiver);
    } else {
        warn!("Sending {} -> {} failed: {:#}", sender, receiver, e);
    }
    StoreError::UpdateFailed(e)
}

pub(crate) fn message_from_row(row: MessageRow) -> Message {
    let created_at = parse_timestamp(&row.created_at, &format!("message {}", row.id));
    Message {
        id: row.id,
        sender_id: row.sender_id,
        sender_name: row.sender_name,
        receiver_id: row.receiver_id,
        receiver_name: row.receiver_name,
        body: row.message,
        created_at,
    }
}
