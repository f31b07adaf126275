// ABOUTME: Environment records holding the active snapshot pointer
// ABOUTME: Team-scoped create/get plus transaction-level loaders used by the version store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::context::TeamContext;
use crate::error::{Result, SandboxError};
use crate::provider::SandboxProvider;
use crate::rows;
use crate::snapshot_id::infer_provider;

/// Provider used for records written before providers were stored and whose ID shape says nothing
pub const LEGACY_DEFAULT_PROVIDER: SandboxProvider = SandboxProvider::Morph;

/// Recorded provider if present, otherwise whatever the snapshot ID's shape implies
pub fn effective_provider(snapshot_id: &str, recorded: Option<SandboxProvider>) -> SandboxProvider {
    recorded
        .or_else(|| infer_provider(snapshot_id))
        .unwrap_or(LEGACY_DEFAULT_PROVIDER)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: String,
    pub team_id: String,
    pub user_id: String,
    pub name: String,
    /// Active pointer: snapshot of the currently deployed version
    pub snapshot_id: String,
    pub snapshot_provider: SandboxProvider,
    pub template_vmid: Option<u32>,
    pub maintenance_script: Option<String>,
    pub dev_script: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateEnvironment {
    pub name: String,
    pub snapshot_id: String,
    pub snapshot_provider: SandboxProvider,
    pub template_vmid: Option<u32>,
    pub maintenance_script: Option<String>,
    pub dev_script: Option<String>,
}

pub struct EnvironmentStore {
    pool: SqlitePool,
}

impl EnvironmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, ctx: &TeamContext, input: CreateEnvironment) -> Result<Environment> {
        if input.name.trim().is_empty() {
            return Err(SandboxError::Validation(
                "Environment name must not be empty".to_string(),
            ));
        }
        if input.snapshot_id.trim().is_empty() {
            return Err(SandboxError::Validation(
                "Snapshot ID must not be empty".to_string(),
            ));
        }

        let now = devbox_core::now();
        let environment = Environment {
            id: format!("env_{}", uuid::Uuid::new_v4().simple()),
            team_id: ctx.team_id.clone(),
            user_id: ctx.user_id.clone(),
            name: input.name,
            snapshot_id: input.snapshot_id,
            snapshot_provider: input.snapshot_provider,
            template_vmid: input.template_vmid,
            maintenance_script: input.maintenance_script,
            dev_script: input.dev_script,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO environments (
                id, team_id, user_id, name,
                snapshot_id, snapshot_provider, template_vmid,
                maintenance_script, dev_script, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&environment.id)
        .bind(&environment.team_id)
        .bind(&environment.user_id)
        .bind(&environment.name)
        .bind(&environment.snapshot_id)
        .bind(environment.snapshot_provider.as_str())
        .bind(environment.template_vmid.map(i64::from))
        .bind(&environment.maintenance_script)
        .bind(&environment.dev_script)
        .bind(devbox_core::format_timestamp(now))
        .bind(devbox_core::format_timestamp(now))
        .execute(&self.pool)
        .await?;

        info!(
            environment_id = %environment.id,
            team_id = %environment.team_id,
            "Created environment"
        );

        Ok(environment)
    }

    pub async fn get(&self, ctx: &TeamContext, environment_id: &str) -> Result<Environment> {
        let mut conn = self.pool.acquire().await?;
        load_for_team(&mut conn, ctx, environment_id).await
    }
}

/// Load an environment and check it belongs to the caller's team
pub(crate) async fn load_for_team(
    conn: &mut SqliteConnection,
    ctx: &TeamContext,
    environment_id: &str,
) -> Result<Environment> {
    let row = sqlx::query(
        r#"
        SELECT id, team_id, user_id, name,
               snapshot_id, snapshot_provider, template_vmid,
               maintenance_script, dev_script, created_at, updated_at
        FROM environments
        WHERE id = ?1
        "#,
    )
    .bind(environment_id)
    .fetch_optional(&mut *conn)
    .await?;

    let environment = match row {
        Some(row) => row_to_environment(&row)?,
        None => return Err(SandboxError::not_found("environment", environment_id)),
    };

    if environment.team_id != ctx.team_id {
        warn!(
            environment_id,
            team_id = %ctx.team_id,
            "Rejected access to environment owned by another team"
        );
        return Err(SandboxError::unauthorized("environment", environment_id));
    }

    Ok(environment)
}

fn row_to_environment(row: &SqliteRow) -> Result<Environment> {
    use sqlx::Row;

    let snapshot_id: String = row.try_get("snapshot_id")?;
    let recorded = rows::optional_provider(row, "snapshot_provider")?;

    Ok(Environment {
        id: row.try_get("id")?,
        team_id: row.try_get("team_id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        snapshot_provider: effective_provider(&snapshot_id, recorded),
        snapshot_id,
        template_vmid: rows::optional_u32(row, "template_vmid")?,
        maintenance_script: row.try_get("maintenance_script")?,
        dev_script: row.try_get("dev_script")?,
        created_at: rows::timestamp(row, "created_at")?,
        updated_at: rows::timestamp(row, "updated_at")?,
    })
}
