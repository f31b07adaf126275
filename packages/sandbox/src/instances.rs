// ABOUTME: Registry of provider sandboxes keyed by provider sandbox ID with short user-facing IDs
// ABOUTME: Enforces per-(team, user) ownership and the instance status state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::context::TeamContext;
use crate::error::{Result, SandboxError};
use crate::preview_codes;
use crate::provider::SandboxProvider;
use crate::rows;

const MAX_ID_ATTEMPTS: usize = 5;

const INSTANCE_COLUMNS: &str = r#"
    instance_id, provider_sandbox_id, team_id, user_id, name, status, metadata,
    created_at, updated_at, stopped_at, last_accessed_at
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Starting,
    Running,
    Paused,
    Stopping,
    Stopped,
    Archived,
    Error,
    #[default]
    Unknown,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Archived => "archived",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "stopping" => Ok(Self::Stopping),
            "stopped" => Ok(Self::Stopped),
            "archived" => Ok(Self::Archived),
            "error" => Ok(Self::Error),
            "unknown" => Ok(Self::Unknown),
            _ => Err(SandboxError::Validation(format!(
                "Invalid instance status: {}",
                s
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Archived)
    }

    pub fn can_transition_to(&self, next: InstanceStatus) -> bool {
        use InstanceStatus::*;

        if *self == Archived {
            return false;
        }
        if *self == next || matches!(next, Archived | Unknown) {
            return true;
        }

        match self {
            Starting => matches!(next, Running | Stopping | Error),
            Running => matches!(next, Paused | Stopping | Error),
            Paused => matches!(next, Running | Stopping | Error),
            Stopping => matches!(next, Stopped | Error),
            Stopped => matches!(next, Starting | Error),
            Error => matches!(next, Starting | Stopping | Stopped),
            Unknown => true,
            Archived => false,
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing instance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub instance_id: String,
    pub provider_sandbox_id: String,
    pub team_id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub status: InstanceStatus,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

/// Provider-internal fields, read only by orchestration code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub instance_id: String,
    pub provider_sandbox_id: String,
    pub provider: SandboxProvider,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateInstance {
    pub provider_sandbox_id: String,
    pub provider: SandboxProvider,
    pub name: Option<String>,
    pub status: InstanceStatus,
    pub metadata: Option<serde_json::Value>,
    pub image: Option<String>,
}

impl CreateInstance {
    pub fn new(provider_sandbox_id: impl Into<String>, provider: SandboxProvider) -> Self {
        Self {
            provider_sandbox_id: provider_sandbox_id.into(),
            provider,
            name: None,
            status: InstanceStatus::Starting,
            metadata: None,
            image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceResult {
    pub instance_id: String,
    pub is_existing: bool,
}

pub struct InstanceRegistry {
    pool: SqlitePool,
}

impl InstanceRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Track a provider sandbox, or refresh it if this caller already tracks it
    pub async fn create(&self, ctx: &TeamContext, input: CreateInstance) -> Result<CreateInstanceResult> {
        let provider_sandbox_id = input.provider_sandbox_id.trim();
        if provider_sandbox_id.is_empty() {
            return Err(SandboxError::Validation(
                "Provider sandbox ID must not be empty".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let now = devbox_core::now();

        if let Some(existing) = fetch_by_provider_sandbox_id(&mut tx, provider_sandbox_id).await? {
            if !ctx.owns(&existing.team_id, &existing.user_id) {
                warn!(
                    provider_sandbox_id,
                    instance_id = %existing.instance_id,
                    team_id = %ctx.team_id,
                    user_id = %ctx.user_id,
                    "Rejected create for sandbox owned by another user"
                );
                return Err(SandboxError::unauthorized("instance", &existing.instance_id));
            }

            // Archived records stay archived; only descriptive fields refresh
            let status = if existing.status.is_terminal() {
                existing.status
            } else {
                input.status
            };
            apply_status(&mut tx, &existing, status, now).await?;

            let metadata = input.metadata.as_ref().map(serde_json::to_string).transpose()?;
            sqlx::query(
                r#"
                UPDATE instances
                SET name = COALESCE(?1, name),
                    metadata = COALESCE(?2, metadata)
                WHERE instance_id = ?3
                "#,
            )
            .bind(&input.name)
            .bind(metadata)
            .bind(&existing.instance_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;

            debug!(
                instance_id = %existing.instance_id,
                status = %status,
                "Refreshed existing instance"
            );

            return Ok(CreateInstanceResult {
                instance_id: existing.instance_id,
                is_existing: true,
            });
        }

        let instance_id = mint_instance_id(&mut tx).await?;
        let timestamp = devbox_core::format_timestamp(now);
        let metadata = input.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let last_accessed_at = (input.status == InstanceStatus::Running).then(|| timestamp.clone());
        let stopped_at = (input.status == InstanceStatus::Stopped).then(|| timestamp.clone());

        let inserted = sqlx::query(
            r#"
            INSERT INTO instances (
                instance_id, provider_sandbox_id, team_id, user_id, name, status, metadata,
                created_at, updated_at, stopped_at, last_accessed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9, ?10)
            "#,
        )
        .bind(&instance_id)
        .bind(provider_sandbox_id)
        .bind(&ctx.team_id)
        .bind(&ctx.user_id)
        .bind(&input.name)
        .bind(input.status.as_str())
        .bind(metadata)
        .bind(&timestamp)
        .bind(stopped_at)
        .bind(last_accessed_at)
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &inserted {
            if db_err.is_unique_violation() {
                return Err(SandboxError::Conflict(format!(
                    "Sandbox {} was registered concurrently",
                    provider_sandbox_id
                )));
            }
        }
        inserted?;

        sqlx::query(
            r#"
            INSERT INTO instance_provider_info (
                instance_id, provider_sandbox_id, provider, image, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&instance_id)
        .bind(provider_sandbox_id)
        .bind(input.provider.as_str())
        .bind(&input.image)
        .bind(&timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            %instance_id,
            provider_sandbox_id,
            provider = %input.provider,
            team_id = %ctx.team_id,
            "Registered instance"
        );

        Ok(CreateInstanceResult {
            instance_id,
            is_existing: false,
        })
    }

    /// Owner-initiated status change; rejects moves the state machine forbids
    pub async fn update_status(
        &self,
        ctx: &TeamContext,
        instance_id: &str,
        status: InstanceStatus,
    ) -> Result<Instance> {
        let mut tx = self.pool.begin().await?;
        let instance = load_owned(&mut tx, ctx, instance_id).await?;

        if !instance.status.can_transition_to(status) {
            return Err(SandboxError::InvalidTransition {
                from: instance.status.to_string(),
                to: status.to_string(),
            });
        }

        apply_status(&mut tx, &instance, status, devbox_core::now()).await?;
        let updated = load_owned(&mut tx, ctx, instance_id).await?;
        tx.commit().await?;

        info!(
            instance_id,
            from = %instance.status,
            to = %status,
            "Updated instance status"
        );

        Ok(updated)
    }

    /// Reconciliation path keyed by provider sandbox ID.
    ///
    /// Returns `false` without error when the sandbox is not tracked here or is
    /// archived. Background jobs see sandboxes created outside this registry.
    pub async fn update_status_internal(
        &self,
        provider_sandbox_id: &str,
        status: InstanceStatus,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let Some(instance) = fetch_by_provider_sandbox_id(&mut tx, provider_sandbox_id).await? else {
            debug!(provider_sandbox_id, "Ignoring status for untracked sandbox");
            return Ok(false);
        };

        if instance.status.is_terminal() && status != instance.status {
            debug!(
                provider_sandbox_id,
                reported = %status,
                "Ignoring status for archived instance"
            );
            return Ok(false);
        }

        apply_status(&mut tx, &instance, status, devbox_core::now()).await?;
        tx.commit().await?;

        debug!(
            provider_sandbox_id,
            from = %instance.status,
            to = %status,
            "Reconciled instance status"
        );

        Ok(true)
    }

    pub async fn record_access(&self, ctx: &TeamContext, instance_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        load_owned(&mut tx, ctx, instance_id).await?;

        let now = devbox_core::format_timestamp(devbox_core::now());
        sqlx::query(
            "UPDATE instances SET last_accessed_at = ?1, updated_at = ?1 WHERE instance_id = ?2",
        )
        .bind(&now)
        .bind(instance_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete an instance together with its provider info and preview codes
    pub async fn remove(&self, ctx: &TeamContext, instance_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let instance = load_owned(&mut tx, ctx, instance_id).await?;

        let codes = preview_codes::delete_for_sandbox(&mut tx, &instance.provider_sandbox_id).await?;

        sqlx::query("DELETE FROM instance_provider_info WHERE instance_id = ?1")
            .bind(instance_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM instances WHERE instance_id = ?1")
            .bind(instance_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            instance_id,
            provider_sandbox_id = %instance.provider_sandbox_id,
            preview_codes = codes,
            "Removed instance"
        );

        Ok(())
    }

    /// Caller's instances, newest first.
    ///
    /// Stopped instances are hidden unless they stopped at or after
    /// `include_stopped_after`.
    pub async fn list(
        &self,
        ctx: &TeamContext,
        include_stopped_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Instance>> {
        let cutoff = include_stopped_after.map(devbox_core::format_timestamp);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM instances
            WHERE team_id = ?1
              AND user_id = ?2
              AND (status != 'stopped'
                   OR (?3 IS NOT NULL AND stopped_at IS NOT NULL AND stopped_at >= ?3))
            ORDER BY created_at DESC, instance_id DESC
            "#,
            INSTANCE_COLUMNS
        ))
        .bind(&ctx.team_id)
        .bind(&ctx.user_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_instance).collect()
    }

    pub async fn get(&self, ctx: &TeamContext, instance_id: &str) -> Result<Instance> {
        let mut conn = self.pool.acquire().await?;
        load_owned(&mut conn, ctx, instance_id).await
    }

    /// Unscoped lookup for reconciliation jobs
    pub async fn get_by_provider_sandbox_id(&self, provider_sandbox_id: &str) -> Result<Option<Instance>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_provider_sandbox_id(&mut conn, provider_sandbox_id).await
    }

    pub async fn provider_info(&self, instance_id: &str) -> Result<Option<ProviderInfo>> {
        let row = sqlx::query(
            r#"
            SELECT instance_id, provider_sandbox_id, provider, image, created_at
            FROM instance_provider_info
            WHERE instance_id = ?1
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<ProviderInfo> {
            let provider: String = row.try_get("provider")?;
            Ok(ProviderInfo {
                instance_id: row.try_get("instance_id")?,
                provider_sandbox_id: row.try_get("provider_sandbox_id")?,
                provider: provider.parse()?,
                image: row.try_get("image")?,
                created_at: rows::timestamp(&row, "created_at")?,
            })
        })
        .transpose()
    }
}

async fn mint_instance_id(conn: &mut SqliteConnection) -> Result<String> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = devbox_core::generate_instance_id();
        let taken: Option<i64> = sqlx::query_scalar("SELECT 1 FROM instances WHERE instance_id = ?1")
            .bind(&candidate)
            .fetch_optional(&mut *conn)
            .await?;
        if taken.is_none() {
            return Ok(candidate);
        }
        debug!(candidate = %candidate, "Instance ID collision, retrying");
    }

    Err(SandboxError::Conflict(format!(
        "Could not allocate a unique instance ID after {} attempts",
        MAX_ID_ATTEMPTS
    )))
}

/// Write a status and the timestamps that go with entering it
async fn apply_status(
    conn: &mut SqliteConnection,
    instance: &Instance,
    status: InstanceStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let entering = instance.status != status;

    sqlx::query(
        r#"
        UPDATE instances
        SET status = ?1,
            updated_at = ?2,
            stopped_at = CASE WHEN ?3 THEN ?2 ELSE stopped_at END,
            last_accessed_at = CASE WHEN ?4 THEN ?2 ELSE last_accessed_at END
        WHERE instance_id = ?5
        "#,
    )
    .bind(status.as_str())
    .bind(devbox_core::format_timestamp(now))
    .bind(entering && status == InstanceStatus::Stopped)
    .bind(entering && status == InstanceStatus::Running)
    .bind(&instance.instance_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn load_owned(conn: &mut SqliteConnection, ctx: &TeamContext, instance_id: &str) -> Result<Instance> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM instances WHERE instance_id = ?1",
        INSTANCE_COLUMNS
    ))
    .bind(instance_id)
    .fetch_optional(&mut *conn)
    .await?;

    let instance = match row {
        Some(row) => row_to_instance(&row)?,
        None => return Err(SandboxError::not_found("instance", instance_id)),
    };

    if !ctx.owns(&instance.team_id, &instance.user_id) {
        warn!(
            instance_id,
            team_id = %ctx.team_id,
            user_id = %ctx.user_id,
            "Rejected access to instance owned by another user"
        );
        return Err(SandboxError::unauthorized("instance", instance_id));
    }

    Ok(instance)
}

async fn fetch_by_provider_sandbox_id(
    conn: &mut SqliteConnection,
    provider_sandbox_id: &str,
) -> Result<Option<Instance>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM instances WHERE provider_sandbox_id = ?1",
        INSTANCE_COLUMNS
    ))
    .bind(provider_sandbox_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_instance).transpose()
}

fn row_to_instance(row: &SqliteRow) -> Result<Instance> {
    let status: String = row.try_get("status")?;
    let metadata: Option<String> = row.try_get("metadata")?;

    Ok(Instance {
        instance_id: row.try_get("instance_id")?,
        provider_sandbox_id: row.try_get("provider_sandbox_id")?,
        team_id: row.try_get("team_id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        status: InstanceStatus::from_str(&status)?,
        metadata: metadata.map(|m| serde_json::from_str(&m)).transpose()?,
        created_at: rows::timestamp(row, "created_at")?,
        updated_at: rows::timestamp(row, "updated_at")?,
        stopped_at: rows::optional_timestamp(row, "stopped_at")?,
        last_accessed_at: rows::optional_timestamp(row, "last_accessed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use InstanceStatus::*;

    #[test]
    fn test_status_round_trip() {
        for status in [Starting, Running, Paused, Stopping, Stopped, Archived, Error, Unknown] {
            assert_eq!(InstanceStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(InstanceStatus::from_str("terminated").is_err());
        assert_eq!(InstanceStatus::default(), Unknown);
    }

    #[test]
    fn test_lifecycle_transitions() {
        assert!(Starting.can_transition_to(Running));
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));
        assert!(Stopped.can_transition_to(Starting));

        assert!(!Stopped.can_transition_to(Running));
        assert!(!Starting.can_transition_to(Paused));
        assert!(!Paused.can_transition_to(Stopped));
    }

    #[test]
    fn test_error_and_admin_states() {
        for status in [Starting, Running, Paused, Stopping, Stopped, Unknown] {
            assert!(status.can_transition_to(Error));
            assert!(status.can_transition_to(Archived));
        }
        assert!(Unknown.can_transition_to(Paused));
        assert!(Error.can_transition_to(Starting));

        for status in [Starting, Running, Archived, Unknown] {
            assert!(!Archived.can_transition_to(status));
        }
    }
}
