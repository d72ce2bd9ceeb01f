// ABOUTME: SQLite connection setup and schema migrations
// ABOUTME: Every pool enforces foreign keys so parent deletes cascade

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::{StorageError, StorageResult};

/// Open (creating if needed) the database at `path` and apply migrations
pub async fn connect(path: &Path) -> StorageResult<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }
    }

    debug!("Connecting to database: {}", path.display());

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await?;

    info!("Database connection established");

    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> StorageResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    debug!("Database migrations completed");
    Ok(())
}

/// Single-connection in-memory database with the full schema applied.
/// One connection keeps every query on the same in-memory database.
#[cfg(any(test, feature = "test-utils"))]
pub async fn memory_pool() -> StorageResult<SqlitePool> {
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn test_connect_creates_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("benos.db");

        let pool = connect(&path).await.unwrap();
        assert!(path.exists());

        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = 'tasks'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = memory_pool().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO projects (id, area_id, name, position, created_at, updated_at)
             VALUES ('p1', 'missing', 'Orphan', 0, 'now', 'now')",
        )
        .execute(&pool)
        .await;

        let err: StorageError = result.unwrap_err().into();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
    }
}
