// ABOUTME: Integration tests for snapshot version history and the environment active pointer
// ABOUTME: Covers numbering, activation, the active-version delete guard and legacy alias lookups

use devbox_sandbox::{
    CreateEnvironment, CreateSnapshotVersion, EnvironmentStore, SandboxError, SandboxProvider,
    SnapshotVersionStore, TeamContext,
};
use sqlx::SqlitePool;

async fn setup() -> (SqlitePool, EnvironmentStore, SnapshotVersionStore, TeamContext, String) {
    let pool = devbox_storage::open_in_memory()
        .await
        .expect("Failed to create in-memory database");

    let environments = EnvironmentStore::new(pool.clone());
    let versions = SnapshotVersionStore::new(pool.clone());
    let ctx = TeamContext::new("team_1", "user_1");

    let environment = environments
        .create(
            &ctx,
            CreateEnvironment {
                name: "frontend".to_string(),
                snapshot_id: "morph_4vcpu_16gb_48gb_v1".to_string(),
                snapshot_provider: SandboxProvider::Morph,
                template_vmid: None,
                maintenance_script: None,
                dev_script: None,
            },
        )
        .await
        .expect("Failed to create environment");

    (pool, environments, versions, ctx, environment.id)
}

#[tokio::test]
async fn test_versions_increase_and_last_create_is_active() {
    let (_pool, environments, versions, ctx, env_id) = setup().await;

    let mut numbers = Vec::new();
    for snapshot in ["snapshot_a", "snapshot_b", "snapshot_c"] {
        let created = versions
            .create(&ctx, &env_id, CreateSnapshotVersion::new(snapshot, SandboxProvider::Morph))
            .await
            .unwrap();
        numbers.push(created.version);
    }
    assert_eq!(numbers, vec![1, 2, 3]);

    let environment = environments.get(&ctx, &env_id).await.unwrap();
    assert_eq!(environment.snapshot_id, "snapshot_c");

    let history = versions.list(&ctx, &env_id).await.unwrap();
    let listed: Vec<(u32, bool)> = history.iter().map(|v| (v.version.version, v.is_active)).collect();
    assert_eq!(listed, vec![(3, true), (2, false), (1, false)]);

    let active = versions.active_version(&ctx, &env_id).await.unwrap().unwrap();
    assert_eq!(active.version, 3);
}

#[tokio::test]
async fn test_activate_remove_scenario() {
    let (_pool, environments, versions, ctx, env_id) = setup().await;

    let v1 = versions
        .create(&ctx, &env_id, CreateSnapshotVersion::new("snapshot_abc", SandboxProvider::Morph))
        .await
        .unwrap();
    assert_eq!(v1.version, 1);
    assert_eq!(environments.get(&ctx, &env_id).await.unwrap().snapshot_id, "snapshot_abc");

    let mut staged = CreateSnapshotVersion::new("snapshot_def", SandboxProvider::Morph);
    staged.activate = false;
    let v2 = versions.create(&ctx, &env_id, staged).await.unwrap();
    assert_eq!(v2.version, 2);
    assert_eq!(environments.get(&ctx, &env_id).await.unwrap().snapshot_id, "snapshot_abc");

    let err = versions.remove(&ctx, &env_id, &v1.id).await.unwrap_err();
    assert!(matches!(err, SandboxError::Conflict(_)));
    assert_eq!(versions.list(&ctx, &env_id).await.unwrap().len(), 2);

    versions.activate(&ctx, &env_id, &v2.id).await.unwrap();
    assert_eq!(environments.get(&ctx, &env_id).await.unwrap().snapshot_id, "snapshot_def");

    versions.remove(&ctx, &env_id, &v1.id).await.unwrap();
    let remaining = versions.list(&ctx, &env_id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].version.id, v2.id);
    assert!(remaining[0].is_active);
}

#[tokio::test]
async fn test_activation_copies_scripts_onto_environment() {
    let (_pool, environments, versions, ctx, env_id) = setup().await;

    let mut input = CreateSnapshotVersion::new("morph_8vcpu_32gb_48gb_v2", SandboxProvider::Morph);
    input.maintenance_script = Some("bun install".to_string());
    input.dev_script = Some("bun dev".to_string());
    let with_scripts = versions.create(&ctx, &env_id, input).await.unwrap();

    let environment = environments.get(&ctx, &env_id).await.unwrap();
    assert_eq!(environment.maintenance_script.as_deref(), Some("bun install"));
    assert_eq!(environment.dev_script.as_deref(), Some("bun dev"));

    versions
        .create(&ctx, &env_id, CreateSnapshotVersion::new("snapshot_plain", SandboxProvider::Morph))
        .await
        .unwrap();
    let environment = environments.get(&ctx, &env_id).await.unwrap();
    assert_eq!(environment.maintenance_script, None);

    versions.activate(&ctx, &env_id, &with_scripts.id).await.unwrap();
    let environment = environments.get(&ctx, &env_id).await.unwrap();
    assert_eq!(environment.dev_script.as_deref(), Some("bun dev"));
}

#[tokio::test]
async fn test_other_team_cannot_touch_versions() {
    let (_pool, _environments, versions, ctx, env_id) = setup().await;

    let v1 = versions
        .create(&ctx, &env_id, CreateSnapshotVersion::new("snapshot_abc", SandboxProvider::Morph))
        .await
        .unwrap();

    let outsider = TeamContext::new("team_2", "user_9");
    assert!(matches!(
        versions.list(&outsider, &env_id).await,
        Err(SandboxError::Authorization { .. })
    ));
    assert!(matches!(
        versions.activate(&outsider, &env_id, &v1.id).await,
        Err(SandboxError::Authorization { .. })
    ));
    assert!(matches!(
        versions
            .create(&outsider, &env_id, CreateSnapshotVersion::new("snapshot_x", SandboxProvider::Morph))
            .await,
        Err(SandboxError::Authorization { .. })
    ));
    assert!(matches!(
        versions.remove(&ctx, "env_missing", &v1.id).await,
        Err(SandboxError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_version_from_another_environment_is_not_found() {
    let (_pool, environments, versions, ctx, env_id) = setup().await;

    let other = environments
        .create(
            &ctx,
            CreateEnvironment {
                name: "backend".to_string(),
                snapshot_id: "snapshot_zzz".to_string(),
                snapshot_provider: SandboxProvider::Morph,
                template_vmid: None,
                maintenance_script: None,
                dev_script: None,
            },
        )
        .await
        .unwrap();

    let foreign = versions
        .create(&ctx, &other.id, CreateSnapshotVersion::new("snapshot_other", SandboxProvider::Morph))
        .await
        .unwrap();
    // Numbering is per environment
    assert_eq!(foreign.version, 1);

    assert!(matches!(
        versions.activate(&ctx, &env_id, &foreign.id).await,
        Err(SandboxError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_find_by_snapshot_id_and_legacy_alias() {
    let (pool, _environments, versions, ctx, env_id) = setup().await;

    let created = versions
        .create(
            &ctx,
            &env_id,
            CreateSnapshotVersion::new("pve_4vcpu_6gb_32gb_9011", SandboxProvider::PveLxc),
        )
        .await
        .unwrap();
    assert_eq!(created.snapshot_id, "pvelxc_4vcpu_6gb_32gb_v1");
    assert_eq!(created.template_vmid, Some(9011));

    let canonical = versions
        .find_by_snapshot_id(&ctx, "pvelxc_4vcpu_6gb_32gb_v1", Some(SandboxProvider::PveLxc))
        .await
        .unwrap();
    assert_eq!(canonical.map(|v| v.id), Some(created.id.clone()));

    // Alias only when the caller does not pin a provider
    let by_alias = versions
        .find_by_snapshot_id(&ctx, "pve_4vcpu_6gb_32gb_9011", None)
        .await
        .unwrap();
    assert_eq!(by_alias.map(|v| v.id), Some(created.id.clone()));
    assert_eq!(
        versions
            .find_by_snapshot_id(&ctx, "pve_4vcpu_6gb_32gb_9011", Some(SandboxProvider::PveLxc))
            .await
            .unwrap(),
        None
    );

    // Other teams never see it
    let outsider = TeamContext::new("team_2", "user_1");
    assert_eq!(
        versions
            .find_by_snapshot_id(&outsider, "pvelxc_4vcpu_6gb_32gb_v1", None)
            .await
            .unwrap(),
        None
    );

    // Rows written before providers were recorded fall back to the ID shape
    sqlx::query(
        r#"
        INSERT INTO snapshot_versions (
            id, environment_id, team_id, snapshot_id, snapshot_provider, legacy_snapshot_id,
            version, created_at, created_by
        ) VALUES ('ver_old', ?1, 'team_1', 'snapshot_legacy', NULL, NULL, 99,
                  '2024-01-01T00:00:00.000000Z', 'user_1')
        "#,
    )
    .bind(&env_id)
    .execute(&pool)
    .await
    .unwrap();

    let legacy = versions
        .find_by_snapshot_id(&ctx, "snapshot_legacy", Some(SandboxProvider::Morph))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(legacy.provider, SandboxProvider::Morph);
}

#[tokio::test]
async fn test_empty_snapshot_id_is_rejected() {
    let (_pool, _environments, versions, ctx, env_id) = setup().await;

    assert!(matches!(
        versions
            .create(&ctx, &env_id, CreateSnapshotVersion::new("  ", SandboxProvider::Morph))
            .await,
        Err(SandboxError::Validation(_))
    ));
    assert!(matches!(
        versions.find_by_snapshot_id(&ctx, "", None).await,
        Err(SandboxError::Validation(_))
    ));
}

#[tokio::test]
async fn test_legacy_pointer_keeps_its_version_active() {
    let (_pool, environments, versions, ctx, _env_id) = setup().await;

    let environment = environments
        .create(
            &ctx,
            CreateEnvironment {
                name: "pve-box".to_string(),
                snapshot_id: "pve_4vcpu_6gb_32gb_9011".to_string(),
                snapshot_provider: SandboxProvider::PveLxc,
                template_vmid: Some(9011),
                maintenance_script: None,
                dev_script: None,
            },
        )
        .await
        .unwrap();

    let mut input = CreateSnapshotVersion::new("pve_4vcpu_6gb_32gb_9011", SandboxProvider::PveLxc);
    input.activate = false;
    let backfilled = versions.create(&ctx, &environment.id, input).await.unwrap();
    assert_eq!(backfilled.snapshot_id, "pvelxc_4vcpu_6gb_32gb_v1");

    let history = versions.list(&ctx, &environment.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_active);

    assert!(matches!(
        versions.remove(&ctx, &environment.id, &backfilled.id).await,
        Err(SandboxError::Conflict(_))
    ));
    assert_eq!(versions.list(&ctx, &environment.id).await.unwrap().len(), 1);
    assert_eq!(
        environments.get(&ctx, &environment.id).await.unwrap().snapshot_id,
        "pve_4vcpu_6gb_32gb_9011"
    );
}

#[tokio::test]
async fn test_snapshot_id_for_another_provider_is_rejected() {
    let (_pool, _environments, versions, ctx, env_id) = setup().await;

    let err = versions
        .create(
            &ctx,
            &env_id,
            CreateSnapshotVersion::new("morph_4vcpu_16gb_48gb_v1", SandboxProvider::PveLxc),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SandboxError::ProviderMismatch {
            embedded: SandboxProvider::Morph,
            requested: SandboxProvider::PveLxc,
            ..
        }
    ));
    assert!(versions.list(&ctx, &env_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_created_version_matches_stored_row() {
    let (_pool, _environments, versions, ctx, env_id) = setup().await;

    let created = versions
        .create(&ctx, &env_id, CreateSnapshotVersion::new("snapshot_abc", SandboxProvider::Morph))
        .await
        .unwrap();
    let stored = versions.get(&ctx, &env_id, &created.id).await.unwrap();
    assert_eq!(stored, created);
}
