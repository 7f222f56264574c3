//! SQLite persistence for the command queue
//!
//! Enabled with the `database` feature. [`Database`] owns the pool and runs
//! migrations; [`SqliteCommandStore`] implements the command store contract
//! on top of it.

pub mod command_store;
pub mod migrations;
pub mod schema;

pub use command_store::SqliteCommandStore;

use crate::{
    Error, Result,
    error::{InternalError, IoError},
};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Database connection manager with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and migrate it
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Io(IoError::from_std(e).with_path(db_path)))?;
        }

        // WAL lets the CLI read queue state while a runner writes
        let connect_options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                Error::Internal(InternalError::store(format!(
                    "Failed to connect to database: {e}"
                )))
            })?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_database_creation_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("queue.db");

        let db = Database::new(&db_path).await.unwrap();
        assert!(db_path.exists());
        assert_eq!(
            migrations::get_current_version(db.pool()).await.unwrap(),
            schema::CURRENT_SCHEMA_VERSION
        );
        db.close().await;
    }
}
