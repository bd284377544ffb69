use crate::models::{CommentRow, MessageRow, ProfileRow, UserRow, UserUpdate};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, Row};

const USER_COLUMNS: &str = "id, name, email, password, profile_uri, bio, address, created_at";

impl Database {
    // -- Users --

    /// Returns the new user's id.
    pub fn insert_user(&self, name: &str, email: &str, password_hash: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (name, email, password, created_at)
                 VALUES (?1, ?2, ?3, datetime('now'))",
                (name, email, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    /// Names are not unique; the oldest account wins.
    pub fn get_user_by_name(&self, name: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "name = ?1 ORDER BY id ASC LIMIT 1", name))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM users ORDER BY id ASC", USER_COLUMNS))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_users_except(&self, id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users WHERE id != ?1 ORDER BY name ASC, id ASC",
                USER_COLUMNS
            ))?;
            let rows = stmt
                .query_map([id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| count(conn, "users"))
    }

    /// Returns the number of rows changed (0 when `id` is unknown).
    pub fn update_user(&self, id: i64, update: &UserUpdate<'_>) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    name = COALESCE(?1, name),
                    email = COALESCE(?2, email),
                    bio = COALESCE(?3, bio),
                    address = COALESCE(?4, address),
                    profile_uri = COALESCE(?5, profile_uri)
                 WHERE id = ?6",
                rusqlite::params![
                    update.name,
                    update.email,
                    update.bio,
                    update.address,
                    update.profile_uri,
                    id
                ],
            )?;
            Ok(changed)
        })
    }

    pub fn update_user_picture(&self, id: i64, profile_uri: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET profile_uri = ?1 WHERE id = ?2",
                rusqlite::params![profile_uri, id],
            )?;
            Ok(changed)
        })
    }

    // -- Messages --

    /// `created_at` falls back to the current UTC time when `None`.
    pub fn insert_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        message: &str,
        created_at: Option<&str>,
    ) -> Result<i64> {
        self.with_conn(|conn| insert_message_row(conn, sender_id, receiver_id, message, created_at))
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} WHERE m.id = ?1", MESSAGE_SELECT))?;
            let row = stmt.query_row([id], message_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn get_thread(&self, a: i64, b: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_thread(conn, a, b))
    }

    /// Insert a message and re-read its thread in one transaction.
    pub fn insert_message_and_get_thread(
        &self,
        sender_id: i64,
        receiver_id: i64,
        message: &str,
    ) -> Result<(i64, Vec<MessageRow>)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let id = insert_message_row(&tx, sender_id, receiver_id, message, None)?;
            let thread = query_thread(&tx, sender_id, receiver_id)?;
            tx.commit()?;
            Ok((id, thread))
        })
    }

    pub fn count_messages(&self) -> Result<u64> {
        self.with_conn(|conn| count(conn, "messages"))
    }

    // -- Comments --

    pub fn insert_comment(
        &self,
        user_id: Option<i64>,
        user: &str,
        comment: &str,
        created_at: Option<&str>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (user_id, user, comment, created_at)
                 VALUES (?1, ?2, ?3, COALESCE(?4, datetime('now')))",
                rusqlite::params![user_id, user, comment, created_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} WHERE c.id = ?1", COMMENT_SELECT))?;
            let row = stmt.query_row([id], comment_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn list_comments(&self) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY c.id ASC", COMMENT_SELECT))?;
            let rows = stmt
                .query_map([], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_comments(&self) -> Result<u64> {
        self.with_conn(|conn| count(conn, "comments"))
    }
}

/// True if `err` came from a UNIQUE constraint (e.g. a taken email).
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

/// True if `err` came from a FOREIGN KEY constraint.
pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        }
        _ => false,
    }
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, filter: &str, param: P) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, filter))?;
    let row = stmt.query_row([param], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        profile_uri: row.get(4)?,
        bio: row.get(5)?,
        address: row.get(6)?,
        created_at: row.get(7)?,
    })
}

// JOIN users so participant names reflect the current accounts
const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, s.name, m.receiver_id, r.name, m.message, m.created_at
     FROM messages m
     JOIN users s ON s.id = m.sender_id
     JOIN users r ON r.id = m.receiver_id";

fn insert_message_row(
    conn: &Connection,
    sender_id: i64,
    receiver_id: i64,
    message: &str,
    created_at: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO messages (sender_id, receiver_id, message, created_at)
         VALUES (?1, ?2, ?3, COALESCE(?4, datetime('now')))",
        rusqlite::params![sender_id, receiver_id, message, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

fn query_thread(conn: &Connection, a: i64, b: i64) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(&format!(
        "{}
         WHERE (m.sender_id = ?1 AND m.receiver_id = ?2)
            OR (m.sender_id = ?2 AND m.receiver_id = ?1)
         ORDER BY m.created_at ASC, m.id ASC",
        MESSAGE_SELECT
    ))?;

    let rows = stmt
        .query_map(rusqlite::params![a, b], message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_name: row.get(2)?,
        receiver_id: row.get(3)?,
        receiver_name: row.get(4)?,
        message: row.get(5)?,
        created_at: row.get(6)?,
    })
}

// Linked comments join by id; guest comments fall back to the oldest account
// with the same name. The subquery keeps one row per comment.
const COMMENT_SELECT: &str = "SELECT c.id, c.user_id, c.user, c.comment, c.created_at,
            u.id, u.name, u.email, u.profile_uri, u.bio, u.address
     FROM comments c
     LEFT JOIN users u ON u.id = COALESCE(
         c.user_id,
         (SELECT MIN(n.id) FROM users n WHERE n.name = c.user)
     )";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    let author_id: Option<i64> = row.get(5)?;
    let author = match author_id {
        Some(id) => Some(ProfileRow {
            id,
            name: row.get(6)?,
            email: row.get(7)?,
            profile_uri: row.get(8)?,
            bio: row.get(9)?,
            address: row.get(10)?,
        }),
        None => None,
    };

    Ok(CommentRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user: row.get(2)?,
        comment: row.get(3)?,
        created_at: row.get(4)?,
        author,
    })
}

fn count(conn: &Connection, table: &str) -> Result<u64> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
    Ok(n as u64)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
