pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub use migrations::{MigrationOutcome, SchemaReport};

/// Handle to the single on-disk store file. All stores share one handle;
/// the schema is ensured before the handle is returned.
pub struct Database {
    conn: Mutex<Connection>,
    schema: SchemaReport,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self::init(Connection::open_in_memory()?)?;
        info!("In-memory database opened");
        Ok(db)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let schema = migrations::ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            schema,
        })
    }

    /// Outcome of the schema pass that ran when this handle was opened.
    pub fn schema_report(&self) -> &SchemaReport {
        &self.schema
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Like `with_conn`, but hands out a mutable connection so the closure
    /// can open a transaction.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopening_a_file_skips_every_column_migration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chirp.db");

        let first = Database::open(&path).unwrap();
        assert_eq!(first.schema_report().applied(), vec!["profile_uri", "bio", "address"]);
        drop(first);

        let second = Database::open(&path).unwrap();
        let report = second.schema_report();
        assert!(report.applied().is_empty());
        assert!(report.failed().is_empty());
        assert_eq!(
            report.skipped().len(),
            migrations::USER_COLUMNS.len() + migrations::COMMENT_COLUMNS.len()
        );
    }

    #[test]
    fn rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chirp.db");

        {
            let db = Database::open(&path).unwrap();
            db.insert_user("Ann", "ann@x.com", "hash").unwrap();
        }

        let db = Database::open(&path).unwrap();
        let ann = db.get_user_by_email("ann@x.com").unwrap().unwrap();
        assert_eq!(ann.name, "Ann");
    }

    #[test]
    fn file_from_an_older_layout_stays_usable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chirp.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    password TEXT NOT NULL
                );
                CREATE TABLE messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    sender TEXT NOT NULL,
                    receiver TEXT NOT NULL,
                    message TEXT NOT NULL,
                    created_at TEXT DEFAULT CURRENT_TIMESTAMP
                );
                INSERT INTO users (name, email, password) VALUES ('Ann', 'ann@x.com', 'h1');",
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.schema_report().failed().is_empty());
        assert_eq!(db.schema_report().failed_indexes(), vec!["idx_messages_pair"]);

        let ann = db.get_user_by_email("ann@x.com").unwrap().unwrap();
        assert_eq!(ann.created_at, None);

        let bo = db.insert_user("Bo", "bo@x.com", "h2").unwrap();
        assert!(db.get_user_by_id(bo).unwrap().unwrap().created_at.is_some());

        let names: Vec<String> = db.list_users().unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["Ann", "Bo"]);

        let comment = db.insert_comment(Some(bo), "Bo", "still here", None).unwrap();
        assert_eq!(db.get_comment(comment).unwrap().unwrap().user_id, Some(bo));
    }
}
