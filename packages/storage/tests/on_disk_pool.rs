// ABOUTME: Integration tests for on-disk database bootstrap
// ABOUTME: Verifies file creation, WAL mode and idempotent migrations

use devbox_storage::{open_pool, StorageConfig};

#[tokio::test]
async fn test_open_pool_creates_database_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("nested").join("devbox.db");

    let pool = open_pool(&StorageConfig::new(&path))
        .await
        .expect("Failed to open pool");

    assert!(path.exists());

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");

    let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(fk, 1);
}

#[tokio::test]
async fn test_reopen_is_idempotent() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = StorageConfig::new(dir.path().join("devbox.db"));

    let pool = open_pool(&config).await.unwrap();
    sqlx::query(
        "INSERT INTO environments (id, team_id, user_id, name, snapshot_id, created_at, updated_at)
         VALUES ('env_1', 'team', 'user', 'Env', 'snap', '2025-01-01T00:00:00.000000Z', '2025-01-01T00:00:00.000000Z')",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let reopened = open_pool(&config).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM environments")
        .fetch_one(&reopened)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
