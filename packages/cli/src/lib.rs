// ABOUTME: Shared plumbing for the devbox operator CLI
// ABOUTME: Logging setup, database bootstrap and the store bundle used by every subcommand

pub mod output;

use anyhow::{Context, Result};
use devbox_config::constants::DEFAULT_LOG_FILTER;
use devbox_config::Config;
use devbox_sandbox::{EnvironmentStore, InstanceRegistry, PreviewCodeIssuer, SnapshotVersionStore};
use devbox_storage::StorageConfig;
use sqlx::SqlitePool;
use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. Falls back to the default filter when the
/// configured directive does not parse.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // A second init (tests, embedding) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Open the configured database, running migrations on the way
pub async fn open_database(config: &Config) -> Result<SqlitePool> {
    let storage = StorageConfig::from(config);
    devbox_storage::open_pool(&storage)
        .await
        .with_context(|| format!("Failed to open database at {}", storage.path.display()))
}

/// Every store the CLI talks to, sharing one pool
pub struct Stores {
    pub environments: EnvironmentStore,
    pub versions: SnapshotVersionStore,
    pub instances: InstanceRegistry,
    pub previews: PreviewCodeIssuer,
}

impl Stores {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            environments: EnvironmentStore::new(pool.clone()),
            versions: SnapshotVersionStore::new(pool.clone()),
            instances: InstanceRegistry::new(pool.clone()),
            previews: PreviewCodeIssuer::new(pool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devbox_config::constants::DEVBOX_DATABASE_PATH;

    #[test]
    fn test_open_database_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("devbox.db");
        let path_str = path.to_string_lossy().to_string();

        let config = Config::from_lookup(|name| {
            (name == DEVBOX_DATABASE_PATH).then(|| path_str.clone())
        })
        .unwrap();

        tokio_test::block_on(async {
            let pool = open_database(&config).await.unwrap();
            assert!(path.exists());
            pool.close().await;
        });
    }
}
