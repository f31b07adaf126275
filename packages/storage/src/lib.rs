// ABOUTME: SQLite bootstrap for Devbox: pool configuration, PRAGMAs and embedded migrations
// ABOUTME: Every other package receives a ready SqlitePool from here

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use devbox_config::Config;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub enable_wal: bool,
    pub max_connections: u32,
    pub busy_timeout_seconds: u64,
}

impl StorageConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: devbox_core::database_file(),
            enable_wal: true,
            max_connections: 5,
            busy_timeout_seconds: 10,
        }
    }
}

impl From<&Config> for StorageConfig {
    fn from(config: &Config) -> Self {
        Self {
            path: config.database_path.clone(),
            enable_wal: config.enable_wal,
            max_connections: config.max_connections,
            busy_timeout_seconds: config.busy_timeout_secs,
        }
    }
}

/// Open (creating if needed) the on-disk database and apply pending migrations
pub async fn open_pool(config: &StorageConfig) -> StorageResult<SqlitePool> {
    if config.max_connections == 0 {
        return Err(StorageError::InvalidConfig(
            "max_connections must be at least 1".to_string(),
        ));
    }

    // Ensure parent directory exists
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let database_url = database_url(&config.path);

    if !sqlx::Sqlite::database_exists(&database_url).await? {
        debug!("Creating database at: {}", database_url);
        sqlx::Sqlite::create_database(&database_url).await?;
    }

    let journal_mode = if config.enable_wal {
        SqliteJournalMode::Wal
    } else {
        SqliteJournalMode::Delete
    };

    // PRAGMAs set on the connect options apply to every pooled connection
    let options = SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(journal_mode)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(config.busy_timeout_seconds));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.busy_timeout_seconds))
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!(
        path = %config.path.display(),
        wal = config.enable_wal,
        max_connections = config.max_connections,
        "Database ready"
    );

    Ok(pool)
}

/// Single-connection in-memory database with the schema applied.
///
/// The connection is never recycled: closing it would discard the database.
pub async fn open_in_memory() -> StorageResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Apply embedded migrations from `packages/storage/migrations`
pub async fn run_migrations(pool: &SqlitePool) -> StorageResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn database_url(path: &Path) -> String {
    format!("sqlite:{}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool_has_schema() {
        let pool = open_in_memory().await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in [
            "environments",
            "instance_provider_info",
            "instances",
            "preview_codes",
            "snapshot_versions",
        ] {
            assert!(
                tables.iter().any(|t| t == expected),
                "missing table {}",
                expected
            );
        }
    }

    #[tokio::test]
    async fn test_rejects_zero_connections() {
        let config = StorageConfig {
            max_connections: 0,
            ..StorageConfig::new("/tmp/unused.db")
        };
        assert!(matches!(
            open_pool(&config).await,
            Err(StorageError::InvalidConfig(_))
        ));
    }
}
