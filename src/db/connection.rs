/// Database connection management with connection pooling
///
/// Every operation borrows one pooled connection and hands it back when it
/// returns. Waits for locks and for connections are bounded by the configured
/// busy timeout.

use crate::config::DatabaseSettings;
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl Database {
    /// Open (or create) the store described by `settings`
    ///
    /// # Examples
    /// ```no_run
    /// use prompt_keeper_lib::config::DatabaseSettings;
    /// use prompt_keeper_lib::db::Database;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::new(&DatabaseSettings::at("/tmp/prompts.db")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(settings: &DatabaseSettings) -> Result<Self> {
        let db_path = settings.path.clone();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(settings.busy_timeout())
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.busy_timeout())
            .connect_with(options)
            .await?;

        let db = Self {
            pool: Arc::new(pool),
            db_path,
        };

        db.initialize_schema().await?;
        tracing::info!("Opened prompt store at {}", db.db_path.display());

        Ok(db)
    }

    /// Create a test database in memory
    ///
    /// A single connection that is never reaped, so the in-memory data lives
    /// as long as the pool.
    #[cfg(test)]
    pub async fn new_test() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self {
            pool: Arc::new(pool),
            db_path: PathBuf::from(":memory:"),
        };

        db.initialize_schema().await?;

        Ok(db)
    }

    /// Initialize database schema
    ///
    /// Creates all required tables and indexes if they don't exist.
    async fn initialize_schema(&self) -> Result<()> {
        let schema = include_str!("schema.sql");

        // sqlx executes one statement per query
        for statement in schema.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(self.pool.as_ref()).await?;
            }
        }

        Ok(())
    }

    /// Get reference to the connection pool
    ///
    /// Used internally by query modules.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Close all connections in the pool
    ///
    /// Should be called on application shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get database statistics
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let record_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM records")
            .fetch_one(self.pool.as_ref())
            .await?;

        let index_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM records_fts")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(DatabaseStats {
            total_records: record_count.0,
            indexed_records: index_count.0,
            pool_size: self.pool.size(),
            idle_connections: self.pool.num_idle(),
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub total_records: i64,
    pub indexed_records: i64,
    pub pool_size: u32,
    pub idle_connections: usize,
}
