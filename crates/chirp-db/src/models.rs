//! Raw SQLite rows. Timestamps stay as stored text; chirp-api turns these
//! into the chirp-types snapshots.

pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    pub profile_uri: Option<String>,
    pub bio: Option<String>,
    pub address: Option<String>,
    /// `None` for rows written before the column existed.
    pub created_at: Option<String>,
}

pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub receiver_id: i64,
    pub receiver_name: String,
    pub message: String,
    pub created_at: String,
}

pub struct CommentRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user: String,
    pub comment: String,
    pub created_at: String,
    /// The matching account, if any, as of this read.
    pub author: Option<ProfileRow>,
}

pub struct ProfileRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub profile_uri: Option<String>,
    pub bio: Option<String>,
    pub address: Option<String>,
}

/// Columns to overwrite on `users`; `None` keeps the stored value.
#[derive(Default)]
pub struct UserUpdate<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub address: Option<&'a str>,
    pub profile_uri: Option<&'a str>,
}
