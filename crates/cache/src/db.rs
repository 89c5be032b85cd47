//! SQLite pool shared by the scan cache and the catalog.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Pool size when the caller doesn't say how many scan workers will share it.
const DEFAULT_POOL_SIZE: u32 = 5;
/// Every in-flight file writes twice (song upsert, then cache row) and WAL
/// allows a single writer, so waiters queue here instead of failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection settings that [`SqliteConnectOptions`] has no setter for.
const CONNECTION_PRAGMAS: &str = "
    PRAGMA wal_autocheckpoint = 800;
    PRAGMA cache_size = -8192;
    PRAGMA temp_store = MEMORY;
";

/// Handle on the scan database.
///
/// Scan cache and catalog tables live side by side in one file but never
/// reference each other; build the repositories with `ScanCache::from(&db)`
/// and `Catalog::from(&db)`.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and migrate it.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with_pool_size(path, DEFAULT_POOL_SIZE).await
    }

    /// As [`connect`](Self::connect), sized for `pool_size` concurrent users.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), pool_size = pool_size))]
    pub async fn connect_with_pool_size(path: impl AsRef<Path>, pool_size: u32) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Database)?;
        }
        let options = Self::options().filename(path).create_if_missing(true);
        Self::open(options, pool_size.max(1)).await
    }

    /// A private in-memory database, for tests here and in dependent crates.
    ///
    /// Limited to a single connection: each `:memory:` connection would
    /// otherwise see its own empty database.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .auto_vacuum(SqliteAutoVacuum::None)
    }

    async fn open(options: SqliteConnectOptions, pool_size: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Runs on every new connection, not just the first.
            .after_connect(|conn, _meta| Box::pin(async move { configure(conn).await }))
            .max_connections(pool_size)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    #[instrument(skip_all)]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Refresh planner statistics and close every connection.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

async fn configure(conn: &mut SqliteConnection) -> sqlx::Result<()> {
    sqlx::query(CONNECTION_PRAGMAS).execute(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        db.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_connect_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tuneshelf.db");
        let db = Database::connect_with_pool_size(&path, 0).await.unwrap();
        assert!(path.exists());
        assert_eq!(db.pool().options().get_max_connections(), 1);
        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        for table in ["albums", "artists", "scan_cache", "smart_folders", "songs"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
        db.close().await;
    }

    #[tokio::test]
    async fn test_connection_settings() {
        let db = Database::connect_in_memory().await.unwrap();
        let (foreign_keys,): (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(foreign_keys, 1);
        let (checkpoint,): (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(checkpoint, 800);
        let (busy,): (i64,) = sqlx::query_as("PRAGMA busy_timeout").fetch_one(db.pool()).await.unwrap();
        assert_eq!(busy, 5000);
        db.close().await;
    }
}
