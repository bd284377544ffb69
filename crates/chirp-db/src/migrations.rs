use anyhow::Result;
use rusqlite::Connection;
use tracing::{debug, info, warn};

/// Additive column migrations for `users`, applied in order. `created_at`
/// comes last: older files predate it, and `ADD COLUMN` only accepts a
/// constant default, so the column is nullable and inserts set it.
pub const USER_COLUMNS: &[ColumnMigration] = &[
    ColumnMigration::new("users", "profile_uri", "TEXT"),
    ColumnMigration::new("users", "bio", "TEXT"),
    ColumnMigration::new("users", "address", "TEXT"),
    ColumnMigration::new("users", "created_at", "TEXT"),
];

/// Comments written before accounts were linked by id only carry a name.
pub const COMMENT_COLUMNS: &[ColumnMigration] = &[ColumnMigration::new(
    "comments",
    "user_id",
    "INTEGER REFERENCES users(id)",
)];

/// Indexes created after the tables. A file whose `messages` table has an
/// older layout cannot take these; that only costs the index.
pub const INDEXES: &[IndexStep] = &[IndexStep {
    name: "idx_messages_pair",
    sql: "CREATE INDEX IF NOT EXISTS idx_messages_pair
              ON messages(sender_id, receiver_id, created_at)",
}];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMigration {
    pub table: &'static str,
    pub column: &'static str,
    pub decl: &'static str,
}

impl ColumnMigration {
    pub const fn new(table: &'static str, column: &'static str, decl: &'static str) -> Self {
        Self { table, column, decl }
    }

    fn sql(&self) -> String {
        format!("ALTER TABLE {} ADD COLUMN {} {}", self.table, self.column, self.decl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStep {
    pub name: &'static str,
    pub sql: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Applied,
    /// The column was already there.
    Skipped,
    Failed(String),
}

/// Per-step results of one schema pass.
#[derive(Debug, Clone, Default)]
pub struct SchemaReport {
    pub steps: Vec<(ColumnMigration, MigrationOutcome)>,
    pub indexes: Vec<(&'static str, MigrationOutcome)>,
}

impl SchemaReport {
    fn columns_where(&self, pred: impl Fn(&MigrationOutcome) -> bool) -> Vec<&'static str> {
        self.steps
            .iter()
            .filter(|(_, outcome)| pred(outcome))
            .map(|(m, _)| m.column)
            .collect()
    }

    pub fn applied(&self) -> Vec<&'static str> {
        self.columns_where(|o| *o == MigrationOutcome::Applied)
    }

    pub fn skipped(&self) -> Vec<&'static str> {
        self.columns_where(|o| *o == MigrationOutcome::Skipped)
    }

    pub fn failed(&self) -> Vec<&'static str> {
        self.columns_where(|o| matches!(o, MigrationOutcome::Failed(_)))
    }

    pub fn failed_indexes(&self) -> Vec<&'static str> {
        self.indexes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, MigrationOutcome::Failed(_)))
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Create the base tables if absent, evolve them one column at a time, then
/// build indexes. Only a failure to create the base tables is fatal.
pub fn ensure_schema(conn: &Connection) -> Result<SchemaReport> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id   INTEGER NOT NULL REFERENCES users(id),
            receiver_id INTEGER NOT NULL REFERENCES users(id),
            message     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER REFERENCES users(id),
            user        TEXT NOT NULL,
            comment     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    let mut report = apply_columns(conn, USER_COLUMNS);
    report.steps.extend(apply_columns(conn, COMMENT_COLUMNS).steps);
    report.indexes = apply_indexes(conn, INDEXES);

    info!(
        applied = report.applied().len(),
        skipped = report.skipped().len(),
        failed = report.failed().len(),
        failed_indexes = report.failed_indexes().len(),
        "Database schema ensured"
    );
    Ok(report)
}

/// Each `ADD COLUMN` runs as its own statement; a failure never stops the
/// remaining steps.
pub fn apply_columns(conn: &Connection, migrations: &[ColumnMigration]) -> SchemaReport {
    let mut report = SchemaReport::default();

    for migration in migrations {
        let outcome = match conn.execute_batch(&migration.sql()) {
            Ok(()) => {
                info!("Added column {}.{}", migration.table, migration.column);
                MigrationOutcome::Applied
            }
            Err(e) if is_duplicate_column(&e) => {
                debug!("Column {}.{} already exists", migration.table, migration.column);
                MigrationOutcome::Skipped
            }
            Err(e) => {
                warn!("Adding column {}.{} failed: {}", migration.table, migration.column, e);
                MigrationOutcome::Failed(e.to_string())
            }
        };
        report.steps.push((*migration, outcome));
    }

    report
}

fn apply_indexes(conn: &Connection, indexes: &[IndexStep]) -> Vec<(&'static str, MigrationOutcome)> {
    indexes
        .iter()
        .map(|index| {
            let outcome = match conn.execute_batch(index.sql) {
                Ok(()) => MigrationOutcome::Applied,
                Err(e) => {
                    warn!("Creating index {} failed: {}", index.name, e);
                    MigrationOutcome::Failed(e.to_string())
                }
            };
            (index.name, outcome)
        })
        .collect()
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.contains("duplicate column name"),
        _ => false,
    }
}
