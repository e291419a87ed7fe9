//! SQLite connection pool

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::config::DatabaseSettings;
use crate::storage::migrations::{self, MigrationStatus};

const MEMORY_PATH: &str = ":memory:";

/// Where the database lives and how the pool is sized
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::with_path(default_database_path())
    }
}

impl DatabaseConfig {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 5,
            auto_migrate: true,
        }
    }

    /// From the `[database]` table of the config file
    pub fn from_settings(settings: &DatabaseSettings) -> Self {
        let path = settings.path.clone().unwrap_or_else(default_database_path);
        Self::with_path(path).max_connections(settings.max_connections)
    }

    /// Private in-memory database, held open by a single pinned connection
    pub fn in_memory() -> Self {
        Self::with_path(MEMORY_PATH).max_connections(1)
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn no_migrate(mut self) -> Self {
        self.auto_migrate = false;
        self
    }

    pub fn is_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH
    }

    /// WAL on disk so job pollers can read while a worker writes
    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = if self.is_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")?.journal_mode(SqliteJournalMode::Memory)
        } else {
            SqliteConnectOptions::new()
                .filename(&self.path)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new().max_connections(self.max_connections);
        if self.is_memory() {
            // the data is gone once the last connection closes
            options.min_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            options
        }
    }
}

/// `<data dir>/studygraph/studygraph.db`, or the working directory when
/// the platform has no data dir
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("studygraph"))
        .unwrap_or_default()
        .join("studygraph.db")
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    config: DatabaseConfig,
}

impl Database {
    /// Open (creating the file and its parent directory if needed) and
    /// migrate unless `auto_migrate` is off
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        if !config.is_memory() {
            ensure_parent_dir(&config.path)?;
        }

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .with_context(|| format!("Failed to open database at {}", config.path.display()))?;

        let database = Self { pool, config };
        if database.config.auto_migrate {
            database.migrate().await?;
        }

        tracing::debug!(path = %database.path().display(), "Database ready");
        Ok(database)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::new(DatabaseConfig::in_memory()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool)
            .await
            .context("Database migration failed")
    }

    pub async fn migration_status(&self) -> Result<MigrationStatus> {
        migrations::migration_status(&self.pool)
            .await
            .context("Could not read schema version")
    }

    pub async fn health_check(&self) -> Result<()> {
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database is not responding")?;
        anyhow::ensure!(one == 1, "Unexpected health check reply: {}", one);
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display())),
        _ => Ok(()),
    }
}
