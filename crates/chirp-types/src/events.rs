use serde::{Deserialize, Serialize};

use crate::models::{CommentId, MessageId, UserId};

/// Change notifications emitted by the store after a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StoreEvent {
    /// A new account was created
    UserRegistered { user_id: UserId, name: String },

    /// Profile fields (or only the picture reference) changed
    ProfileUpdated { user_id: UserId },

    /// A direct message was appended to the thread between two users
    MessageSent {
        id: MessageId,
        sender_id: UserId,
        receiver_id: UserId,
    },

    /// A public comment was posted
    CommentPosted {
        id: CommentId,
        author_id: Option<UserId>,
    },
}

impl StoreEvent {
    /// Returns true if a viewer of the thread between `a` and `b` should
    /// reload.
    pub fn touches_thread(&self, a: UserId, b: UserId) -> bool {
        match self {
            Self::MessageSent {
                sender_id,
                receiver_id,
                ..
            } => {
                (*sender_id == a && *receiver_id == b) || (*sender_id == b && *receiver_id == a)
            }
            // Renames change the names shown in the thread
            Self::ProfileUpdated { user_id } => *user_id == a || *user_id == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = StoreEvent::MessageSent {
            id: 7,
            sender_id: 1,
            receiver_id: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "MessageSent");
        assert_eq!(json["data"]["receiver_id"], 2);
    }

    #[test]
    fn thread_match_ignores_direction() {
        let event = StoreEvent::MessageSent {
            id: 1,
            sender_id: 2,
            receiver_id: 1,
        };
        assert!(event.touches_thread(1, 2));
        assert!(event.touches_thread(2, 1));
        assert!(!event.touches_thread(1, 3));
    }

    #[test]
    fn comments_never_touch_threads() {
        let event = StoreEvent::CommentPosted {
            id: 1,
            author_id: Some(1),
        };
        assert!(!event.touches_thread(1, 2));
    }
}
