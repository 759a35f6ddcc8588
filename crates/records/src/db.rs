//! The SQLite database behind [`SqliteRepository`](crate::SqliteRepository).

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

// Concurrent package extractions each hold a connection while their bulk
// save waits for the single WAL writer.
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Per-connection settings not exposed through [`SqliteConnectOptions`].
///
/// Searches scan the basename index, so the page cache is sized for that.
const PRAGMAS: &[(&str, i64)] = &[
    ("wal_autocheckpoint", 800),
    // Negative: KiB rather than pages.
    ("cache_size", -16_384),
    // MEMORY
    ("temp_store", 2),
    ("mmap_size", 64 * 1024 * 1024),
];

/// Connection pool over the `content_files` schema.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database file at `path` with at most `max_connections`
    /// pooled connections, creating the file and its parent directory when
    /// missing, and bring the schema up to date.
    #[instrument(skip_all, fields(path = %path.display(), max_connections))]
    pub async fn connect(path: &Path, max_connections: u32) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
        }
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::with_pool(options, max_connections.max(1)).await
    }

    /// A private in-memory database.
    ///
    /// Every connection to `:memory:` gets its own empty database, so the
    /// pool holds exactly one. Streams from it must be drained before the
    /// next query. Available outside tests for other crates' tests.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::with_pool(Self::base_options().filename(":memory:"), 1).await
    }

    async fn with_pool(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, _meta| Box::pin(async move { Self::apply_pragmas(conn).await }))
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .optimize_on_close(true, 1000)
    }

    async fn apply_pragmas(conn: &mut SqliteConnection) -> sqlx::Result<()> {
        for (name, value) in PRAGMAS {
            sqlx::query(&format!("PRAGMA {name} = {value}")).execute(&mut *conn).await?;
        }
        Ok(())
    }

    #[instrument("migrating content_files schema", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    async fn pragma(db: &Database, name: &str) -> i64 {
        let row: (i64,) = sqlx::query_as(&format!("PRAGMA {name}")).fetch_one(db.pool()).await.unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_connect_in_memory() {
        let db = Database::connect_in_memory().await.unwrap();
        assert_eq!(db.pool().options().get_max_connections(), 1);
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM content_files").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 0);
    }

    #[tokio::test]
    async fn test_connect_creates_parent_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("gbp-fl.sqlite");
        let db = Database::connect(&path, 3).await.unwrap();
        assert!(path.is_file());
        assert_eq!(db.pool().options().get_max_connections(), 3);
        let mode: (String,) = sqlx::query_as("PRAGMA journal_mode").fetch_one(db.pool()).await.unwrap();
        assert_eq!(mode.0, "wal");
        db.pool().close().await;
        // Reopening an existing database applies no migrations twice.
        Database::connect(&path, 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_connections_means_one() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(&dir.path().join("gbp-fl.sqlite"), 0).await.unwrap();
        assert_eq!(db.pool().options().get_max_connections(), 1);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
    }

    #[rstest]
    #[case("busy_timeout", 1500)]
    #[case("wal_autocheckpoint", 800)]
    #[case("cache_size", -16_384)]
    #[case("temp_store", 2)]
    #[tokio::test]
    async fn test_pragmas_are_applied(#[case] name: &str, #[case] expected: i64) {
        let db = Database::connect_in_memory().await.unwrap();
        assert_eq!(pragma(&db, name).await, expected);
    }
}
