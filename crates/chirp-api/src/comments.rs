use anyhow::anyhow;
use tracing::warn;

use chirp_db::models::{CommentRow, ProfileRow};
use chirp_types::api::CommentAuthor;
use chirp_types::events::StoreEvent;
use chirp_types::models::{Comment, CommentEntry, ProfileSnapshot};

use crate::error::{Result, StoreError};
use crate::{StoreInner, parse_timestamp};

/// Public comment log.
pub struct Comments<'a> {
    store: &'a StoreInner,
}

impl<'a> Comments<'a> {
    pub(crate) fn new(store: &'a StoreInner) -> Self {
        Self { store }
    }

    /// Account authors are linked by id; guests are stored by name only.
    pub fn post(&self, author: &CommentAuthor, body: &str) -> Result<CommentEntry> {
        if body.trim().is_empty() {
            return Err(StoreError::EmptyBody);
        }

        let (user_id, name) = match author {
            CommentAuthor::Account(id) => {
                let user = self
                    .store
                    .db
                    .get_user_by_id(*id)
                    .map_err(StoreError::Storage)?
                    .ok_or(StoreError::UnknownUser(*id))?;
                (Some(user.id), user.name)
            }
            CommentAuthor::Guest(name) => {
                if name.trim().is_empty() {
                    return Err(StoreError::Invalid("author"));
                }
                (None, name.clone())
            }
        };

        let id = self
            .store
            .db
            .insert_comment(user_id, &name, body, None)
            .map_err(|e| {
                warn!("Posting comment as {} failed: {:#}", name, e);
                StoreError::UpdateFailed(e)
            })?;

        let row = self
            .store
            .db
            .get_comment(id)
            .map_err(StoreError::Storage)?
            .ok_or_else(|| StoreError::UpdateFailed(anyhow!("Comment {} missing after insert", id)))?;

        self.store.dispatcher.broadcast(StoreEvent::CommentPosted {
            id,
            author_id: user_id,
        });
        Ok(entry_from_row(row))
    }

    /// Every comment, oldest first, each with its author's current profile.
    /// Authors without an account get `None`.
    pub fn list_all(&self) -> Result<Vec<CommentEntry>> {
        let rows = self.store.db.list_comments().map_err(StoreError::Storage)?;
        Ok(rows.into_iter().map(entry_from_row).collect())
    }

    pub fn count(&self) -> Result<u64> {
        self.store.db.count_comments().map_err(StoreError::Storage)
    }
}

fn entry_from_row(row: CommentRow) -> CommentEntry {
    let created_at = parse_timestamp(&row.created_at, &format!("comment {}", row.id));

    // Linked authors show their current name; guests keep the posted one
    let author_name = match (&row.user_id, &row.author) {
        (Some(_), Some(author)) => author.name.clone(),
        _ => row.user,
    };

    CommentEntry {
        comment: Comment {
            id: row.id,
            author_id: row.user_id,
            author_name,
            body: row.comment,
            created_at,
        },
        author: row.author.map(snapshot_from_row),
    }
}

fn snapshot_from_row(row: ProfileRow) -> ProfileSnapshot {
    ProfileSnapshot {
        user_id: row.id,
        name: row.name,
        email: row.email,
        picture_ref: row.profile_uri,
        bio: row.bio,
        address: row.address,
    }
}
