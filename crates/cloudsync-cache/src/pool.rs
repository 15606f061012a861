//! Database connection pool management
//!
//! Wraps SQLx's `SqlitePool`, creating the database directory, enabling the
//! WAL journal and applying the schema on connect.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

const INITIAL_SCHEMA: &str = include_str!("migrations/0001_initial.sql");

/// Pool of SQLite connections for the result cache
///
/// File databases get up to 5 connections and a 5-second busy timeout so
/// several adaptors can commit concurrently. In-memory databases use a
/// single connection, since each SQLite connection has its own memory db.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (or creates) the database file and applies the schema
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` if the directory or connection cannot
    /// be created, `CacheError::MigrationFailed` if the schema fails to apply.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to connect to database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        migrate(&pool).await?;

        tracing::info!(path = %db_path.display(), "Cache database opened");
        Ok(Self { pool })
    }

    /// Creates an in-memory database for tests
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        migrate(&pool).await?;

        tracing::debug!("In-memory cache database initialized");
        Ok(Self { pool })
    }

    /// Returns a reference to the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Applies the schema; every statement is idempotent
pub(crate) async fn migrate(pool: &SqlitePool) -> Result<(), CacheError> {
    sqlx::raw_sql(INITIAL_SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(format!("Failed to apply schema: {}", e)))?;

    tracing::debug!("Cache schema up to date");
    Ok(())
}
