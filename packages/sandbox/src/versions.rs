// ABOUTME: Per-environment snapshot version history and the environment's active pointer
// ABOUTME: All read-modify-write sequences run inside one SQLite transaction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::context::TeamContext;
use crate::environments::{self, effective_provider, Environment};
use crate::error::{Result, SandboxError};
use crate::provider::SandboxProvider;
use crate::resolver::SnapshotResolver;
use crate::rows;
use crate::snapshot_id::{parse_snapshot_id, SnapshotIdFormat};

const VERSION_COLUMNS: &str = r#"
    id, environment_id, team_id, snapshot_id, snapshot_provider, legacy_snapshot_id,
    version, template_vmid, label, maintenance_script, dev_script, created_at, created_by
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotVersion {
    pub id: String,
    pub environment_id: String,
    pub team_id: String,
    /// Canonical snapshot ID
    pub snapshot_id: String,
    pub provider: SandboxProvider,
    /// Pre-versioning ID this row was created from, kept for alias lookups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_snapshot_id: Option<String>,
    pub version: u32,
    pub template_vmid: Option<u32>,
    pub label: Option<String>,
    pub maintenance_script: Option<String>,
    pub dev_script: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotVersionWithStatus {
    #[serde(flatten)]
    pub version: SnapshotVersion,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct CreateSnapshotVersion {
    pub snapshot_id: String,
    pub provider: SandboxProvider,
    pub template_vmid: Option<u32>,
    pub label: Option<String>,
    pub maintenance_script: Option<String>,
    pub dev_script: Option<String>,
    /// Point the environment at the new version right away
    pub activate: bool,
}

impl CreateSnapshotVersion {
    pub fn new(snapshot_id: impl Into<String>, provider: SandboxProvider) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            provider,
            template_vmid: None,
            label: None,
            maintenance_script: None,
            dev_script: None,
            activate: true,
        }
    }
}

impl SnapshotVersion {
    /// Compared on canonical IDs, so a pointer still holding the legacy form
    /// matches the version created from it
    fn is_active_for(&self, environment: &Environment) -> bool {
        if self.provider != environment.snapshot_provider {
            return false;
        }
        let (pointer, _, _) = canonicalize(&environment.snapshot_id, environment.snapshot_provider);
        self.snapshot_id == pointer
            || self.legacy_snapshot_id.as_deref() == Some(environment.snapshot_id.as_str())
    }
}

pub struct SnapshotVersionStore {
    pool: SqlitePool,
}

impl SnapshotVersionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append the next version for an environment, optionally activating it
    pub async fn create(
        &self,
        ctx: &TeamContext,
        environment_id: &str,
        input: CreateSnapshotVersion,
    ) -> Result<SnapshotVersion> {
        let requested = input.snapshot_id.trim();
        if requested.is_empty() {
            return Err(SandboxError::Validation(
                "Snapshot ID must not be empty".to_string(),
            ));
        }

        if let Some(parsed) = parse_snapshot_id(requested) {
            if parsed.provider != input.provider {
                return Err(SandboxError::ProviderMismatch {
                    snapshot_id: requested.to_string(),
                    embedded: parsed.provider,
                    requested: input.provider,
                });
            }
        }

        let (snapshot_id, legacy_snapshot_id, catalog_vmid) =
            canonicalize(requested, input.provider);

        let mut tx = self.pool.begin().await?;

        let environment = environments::load_for_team(&mut tx, ctx, environment_id).await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM snapshot_versions WHERE environment_id = ?1")
                .bind(environment_id)
                .fetch_one(&mut *tx)
                .await?;
        let next = current.unwrap_or(0) as u32 + 1;

        let now = devbox_core::now();
        let version = SnapshotVersion {
            id: uuid::Uuid::new_v4().to_string(),
            environment_id: environment.id.clone(),
            team_id: ctx.team_id.clone(),
            snapshot_id,
            provider: input.provider,
            legacy_snapshot_id,
            version: next,
            template_vmid: input.template_vmid.or(catalog_vmid),
            label: input.label,
            maintenance_script: input.maintenance_script,
            dev_script: input.dev_script,
            created_at: now,
            created_by: ctx.user_id.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO snapshot_versions (
                id, environment_id, team_id, snapshot_id, snapshot_provider, legacy_snapshot_id,
                version, template_vmid, label, maintenance_script, dev_script, created_at, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&version.id)
        .bind(&version.environment_id)
        .bind(&version.team_id)
        .bind(&version.snapshot_id)
        .bind(version.provider.as_str())
        .bind(&version.legacy_snapshot_id)
        .bind(i64::from(version.version))
        .bind(version.template_vmid.map(i64::from))
        .bind(&version.label)
        .bind(&version.maintenance_script)
        .bind(&version.dev_script)
        .bind(devbox_core::format_timestamp(now))
        .bind(&version.created_by)
        .execute(&mut *tx)
        .await?;

        if input.activate {
            point_environment_at(&mut tx, &version).await?;
        }

        tx.commit().await?;

        info!(
            environment_id = %version.environment_id,
            version = version.version,
            snapshot_id = %version.snapshot_id,
            provider = %version.provider,
            activated = input.activate,
            "Created snapshot version"
        );

        Ok(version)
    }

    /// Make an existing version the environment's active snapshot
    pub async fn activate(
        &self,
        ctx: &TeamContext,
        environment_id: &str,
        version_id: &str,
    ) -> Result<SnapshotVersion> {
        let mut tx = self.pool.begin().await?;

        environments::load_for_team(&mut tx, ctx, environment_id).await?;
        let version = load_version(&mut tx, ctx, environment_id, version_id).await?;
        point_environment_at(&mut tx, &version).await?;

        tx.commit().await?;

        info!(
            environment_id,
            version = version.version,
            snapshot_id = %version.snapshot_id,
            "Activated snapshot version"
        );

        Ok(version)
    }

    /// Delete a version that is not the environment's active one
    pub async fn remove(&self, ctx: &TeamContext, environment_id: &str, version_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let environment = environments::load_for_team(&mut tx, ctx, environment_id).await?;
        let version = load_version(&mut tx, ctx, environment_id, version_id).await?;

        if version.is_active_for(&environment) {
            warn!(
                environment_id,
                version = version.version,
                "Refused to remove active snapshot version"
            );
            return Err(SandboxError::Conflict(format!(
                "Version {} ({}) is the active snapshot of environment {}; activate another version first",
                version.version, version.snapshot_id, environment_id
            )));
        }

        sqlx::query("DELETE FROM snapshot_versions WHERE id = ?1")
            .bind(&version.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            environment_id,
            version = version.version,
            "Removed snapshot version"
        );

        Ok(())
    }

    /// Version history, newest first, each marked against the active pointer
    pub async fn list(
        &self,
        ctx: &TeamContext,
        environment_id: &str,
    ) -> Result<Vec<SnapshotVersionWithStatus>> {
        let mut conn = self.pool.acquire().await?;
        let environment = environments::load_for_team(&mut conn, ctx, environment_id).await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM snapshot_versions WHERE environment_id = ?1 ORDER BY version DESC",
            VERSION_COLUMNS
        ))
        .bind(environment_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| {
                let version = row_to_version(row)?;
                Ok(SnapshotVersionWithStatus {
                    is_active: version.is_active_for(&environment),
                    version,
                })
            })
            .collect()
    }

    pub async fn get(
        &self,
        ctx: &TeamContext,
        environment_id: &str,
        version_id: &str,
    ) -> Result<SnapshotVersion> {
        let mut conn = self.pool.acquire().await?;
        environments::load_for_team(&mut conn, ctx, environment_id).await?;
        load_version(&mut conn, ctx, environment_id, version_id).await
    }

    /// The version the environment currently points at, if it is tracked in history
    pub async fn active_version(
        &self,
        ctx: &TeamContext,
        environment_id: &str,
    ) -> Result<Option<SnapshotVersion>> {
        Ok(self
            .list(ctx, environment_id)
            .await?
            .into_iter()
            .find(|v| v.is_active)
            .map(|v| v.version))
    }

    /// Look a snapshot up within the caller's team.
    ///
    /// The canonical ID is tried first. When no provider is given, rows created
    /// from a pre-versioning ID are also matched by that legacy alias.
    pub async fn find_by_snapshot_id(
        &self,
        ctx: &TeamContext,
        snapshot_id: &str,
        provider: Option<SandboxProvider>,
    ) -> Result<Option<SnapshotVersion>> {
        let snapshot_id = snapshot_id.trim();
        if snapshot_id.is_empty() {
            return Err(SandboxError::Validation(
                "Snapshot ID must not be empty".to_string(),
            ));
        }

        let canonical = self
            .fetch_team_versions(ctx, "snapshot_id", snapshot_id)
            .await?
            .into_iter()
            .find(|v| provider.map_or(true, |p| v.provider == p));
        if canonical.is_some() || provider.is_some() {
            return Ok(canonical);
        }

        let alias = self
            .fetch_team_versions(ctx, "legacy_snapshot_id", snapshot_id)
            .await?
            .into_iter()
            .next();
        if alias.is_some() {
            debug!(snapshot_id, "Matched snapshot version by legacy alias");
        }
        Ok(alias)
    }

    async fn fetch_team_versions(
        &self,
        ctx: &TeamContext,
        column: &'static str,
        value: &str,
    ) -> Result<Vec<SnapshotVersion>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM snapshot_versions WHERE team_id = ?1 AND {} = ?2 \
             ORDER BY created_at DESC, version DESC",
            VERSION_COLUMNS, column
        ))
        .bind(&ctx.team_id)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_version).collect()
    }
}

/// Map a legacy ID onto its canonical catalog entry when the catalog knows it
fn canonicalize(
    snapshot_id: &str,
    provider: SandboxProvider,
) -> (String, Option<String>, Option<u32>) {
    let is_legacy = matches!(
        parse_snapshot_id(snapshot_id),
        Some(parsed) if parsed.format == SnapshotIdFormat::Legacy && parsed.provider == provider
    );
    if !is_legacy {
        return (snapshot_id.to_string(), None, None);
    }

    match SnapshotResolver::builtin().resolve(snapshot_id, provider) {
        Ok(resolved) => (
            resolved.snapshot_id,
            Some(snapshot_id.to_string()),
            resolved.template_vmid,
        ),
        Err(e) => {
            debug!(snapshot_id, error = %e, "Keeping unresolvable legacy snapshot ID as-is");
            (snapshot_id.to_string(), None, None)
        }
    }
}

async fn load_version(
    conn: &mut SqliteConnection,
    ctx: &TeamContext,
    environment_id: &str,
    version_id: &str,
) -> Result<SnapshotVersion> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM snapshot_versions WHERE id = ?1",
        VERSION_COLUMNS
    ))
    .bind(version_id)
    .fetch_optional(&mut *conn)
    .await?;

    let version = match row {
        Some(row) => row_to_version(&row)?,
        None => return Err(SandboxError::not_found("snapshot version", version_id)),
    };

    if version.team_id != ctx.team_id {
        return Err(SandboxError::unauthorized("snapshot version", version_id));
    }
    if version.environment_id != environment_id {
        return Err(SandboxError::not_found("snapshot version", version_id));
    }

    Ok(version)
}

async fn point_environment_at(conn: &mut SqliteConnection, version: &SnapshotVersion) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE environments
        SET snapshot_id = ?1,
            snapshot_provider = ?2,
            template_vmid = ?3,
            maintenance_script = ?4,
            dev_script = ?5,
            updated_at = ?6
        WHERE id = ?7
        "#,
    )
    .bind(&version.snapshot_id)
    .bind(version.provider.as_str())
    .bind(version.template_vmid.map(i64::from))
    .bind(&version.maintenance_script)
    .bind(&version.dev_script)
    .bind(devbox_core::format_timestamp(devbox_core::now()))
    .bind(&version.environment_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn row_to_version(row: &SqliteRow) -> Result<SnapshotVersion> {
    let snapshot_id: String = row.try_get("snapshot_id")?;
    let recorded = rows::optional_provider(row, "snapshot_provider")?;
    let version: i64 = row.try_get("version")?;

    Ok(SnapshotVersion {
        id: row.try_get("id")?,
        environment_id: row.try_get("environment_id")?,
        team_id: row.try_get("team_id")?,
        provider: effective_provider(&snapshot_id, recorded),
        snapshot_id,
        legacy_snapshot_id: row.try_get("legacy_snapshot_id")?,
        version: version as u32,
        template_vmid: rows::optional_u32(row, "template_vmid")?,
        label: row.try_get("label")?,
        maintenance_script: row.try_get("maintenance_script")?,
        dev_script: row.try_get("dev_script")?,
        created_at: rows::timestamp(row, "created_at")?,
        created_by: row.try_get("created_by")?,
    })
}
