//! SQLite connection pools.
//!
//! One writer connection serializes INSERT/UPDATE/DELETE; up to eight
//! read-only connections serve queries. WAL mode lets them run side by side.
//! Foreign keys are switched on for every connection, since deleting a chat
//! relies on `ON DELETE CASCADE` to remove its messages.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Database file name inside the data directory.
pub const DATABASE_FILE: &str = "parley.db";

const MAX_READERS: u32 = 8;

#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open (or create) the database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;

        // Readers are read-only, so the schema has to exist first
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(MAX_READERS)
            .connect_with(options.read_only(true))
            .await?;

        tracing::debug!(path = %path.display(), "Opened database");
        Ok(Self { reader, writer })
    }
}
