use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned row identifier. Monotonically increasing, never reused.
pub type UserId = i64;
pub type MessageId = i64;
pub type CommentId = i64;

/// A user account as seen by callers. The password credential never leaves
/// the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub picture_ref: Option<String>,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            user_id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            picture_ref: self.picture_ref.clone(),
            bio: self.bio.clone(),
            address: self.address.clone(),
        }
    }
}

/// Point-in-time copy of the public profile fields of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub picture_ref: Option<String>,
    pub bio: Option<String>,
    pub address: Option<String>,
}

/// A direct message. Participant names are resolved from the users table at
/// read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub receiver_id: UserId,
    pub receiver_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    /// `None` for guest authors.
    pub author_id: Option<UserId>,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A comment together with its author's current profile, if the author has
/// an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    pub comment: Comment,
    pub author: Option<ProfileSnapshot>,
}

/// One row of a date-grouped thread, in rendering order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ThreadEntry {
    DateSeparator(String),
    Message(Message),
}

impl ThreadEntry {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(m) => Some(m),
            Self::DateSeparator(_) => None,
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, Self::DateSeparator(_))
    }
}
