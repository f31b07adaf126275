// ABOUTME: Short shareable codes that map to a sandbox port's authenticated preview URL
// ABOUTME: One code per (sandbox, port), stable across token rotation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{Result, SandboxError};
use crate::rows;

const MAX_CODE_ATTEMPTS: usize = 3;

const PREVIEW_COLUMNS: &str =
    "code, provider_sandbox_id, port, target_url, token, user_id, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewCode {
    pub code: String,
    pub provider_sandbox_id: String,
    pub port: u16,
    pub target_url: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the preview proxy needs to forward a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRoute {
    pub provider_sandbox_id: String,
    pub port: u16,
    pub target_url: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct IssuePreviewCode {
    pub provider_sandbox_id: String,
    pub target_url: String,
    pub token: String,
    pub port: u16,
    pub user_id: String,
}

impl From<PreviewCode> for PreviewRoute {
    fn from(code: PreviewCode) -> Self {
        Self {
            provider_sandbox_id: code.provider_sandbox_id,
            port: code.port,
            target_url: code.target_url,
            token: code.token,
        }
    }
}

pub struct PreviewCodeIssuer {
    pool: SqlitePool,
}

impl PreviewCodeIssuer {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Return the code for (sandbox, port), creating it on first use and
    /// patching the stored URL and token when they have changed
    pub async fn get_or_create(&self, input: IssuePreviewCode) -> Result<PreviewCode> {
        validate(&input)?;

        let mut tx = self.pool.begin().await?;

        if let Some(existing) = fetch_for_port(&mut tx, &input.provider_sandbox_id, input.port).await? {
            let code = refresh(&mut tx, existing, &input).await?;
            tx.commit().await?;
            return Ok(code);
        }

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let now = devbox_core::now();
            let code = PreviewCode {
                code: devbox_core::generate_preview_code(),
                provider_sandbox_id: input.provider_sandbox_id.clone(),
                port: input.port,
                target_url: input.target_url.clone(),
                token: input.token.clone(),
                user_id: input.user_id.clone(),
                created_at: now,
                updated_at: now,
            };

            let inserted = sqlx::query(
                r#"
                INSERT INTO preview_codes (
                    code, provider_sandbox_id, port, target_url, token, user_id, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                "#,
            )
            .bind(&code.code)
            .bind(&code.provider_sandbox_id)
            .bind(i64::from(code.port))
            .bind(&code.target_url)
            .bind(&code.token)
            .bind(&code.user_id)
            .bind(devbox_core::format_timestamp(now))
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {
                    tx.commit().await?;
                    info!(
                        code = %code.code,
                        provider_sandbox_id = %code.provider_sandbox_id,
                        port = code.port,
                        "Issued preview code"
                    );
                    return Ok(code);
                }
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    // Another writer may have issued the (sandbox, port) code first
                    if let Some(existing) =
                        fetch_for_port(&mut tx, &input.provider_sandbox_id, input.port).await?
                    {
                        let code = refresh(&mut tx, existing, &input).await?;
                        tx.commit().await?;
                        return Ok(code);
                    }
                    warn!(attempt, "Preview code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SandboxError::Conflict(format!(
            "Could not allocate a unique preview code after {} attempts",
            MAX_CODE_ATTEMPTS
        )))
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<PreviewRoute>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM preview_codes WHERE code = ?1",
            PREVIEW_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .as_ref()
            .map(row_to_preview_code)
            .transpose()?
            .map(PreviewRoute::from))
    }

    /// Drop every code pointing at a sandbox; returns how many were removed
    pub async fn remove_for_sandbox(&self, provider_sandbox_id: &str) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        delete_for_sandbox(&mut conn, provider_sandbox_id).await
    }
}

/// Cascade step shared with instance removal, run on the caller's transaction
pub(crate) async fn delete_for_sandbox(
    conn: &mut SqliteConnection,
    provider_sandbox_id: &str,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM preview_codes WHERE provider_sandbox_id = ?1")
        .bind(provider_sandbox_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

fn validate(input: &IssuePreviewCode) -> Result<()> {
    if input.provider_sandbox_id.trim().is_empty() {
        return Err(SandboxError::Validation(
            "Provider sandbox ID must not be empty".to_string(),
        ));
    }
    if input.target_url.trim().is_empty() {
        return Err(SandboxError::Validation(
            "Target URL must not be empty".to_string(),
        ));
    }
    if input.token.is_empty() {
        return Err(SandboxError::Validation(
            "Preview token must not be empty".to_string(),
        ));
    }
    if input.port == 0 {
        return Err(SandboxError::Validation("Port must be non-zero".to_string()));
    }
    Ok(())
}

async fn fetch_for_port(
    conn: &mut SqliteConnection,
    provider_sandbox_id: &str,
    port: u16,
) -> Result<Option<PreviewCode>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM preview_codes WHERE provider_sandbox_id = ?1 AND port = ?2",
        PREVIEW_COLUMNS
    ))
    .bind(provider_sandbox_id)
    .bind(i64::from(port))
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_preview_code).transpose()
}

async fn refresh(
    conn: &mut SqliteConnection,
    mut existing: PreviewCode,
    input: &IssuePreviewCode,
) -> Result<PreviewCode> {
    if existing.token == input.token && existing.target_url == input.target_url {
        return Ok(existing);
    }

    let now = devbox_core::now();
    sqlx::query(
        "UPDATE preview_codes SET token = ?1, target_url = ?2, updated_at = ?3 WHERE code = ?4",
    )
    .bind(&input.token)
    .bind(&input.target_url)
    .bind(devbox_core::format_timestamp(now))
    .bind(&existing.code)
    .execute(&mut *conn)
    .await?;

    debug!(code = %existing.code, "Refreshed preview code target");

    existing.token = input.token.clone();
    existing.target_url = input.target_url.clone();
    existing.updated_at = now;
    Ok(existing)
}

fn row_to_preview_code(row: &SqliteRow) -> Result<PreviewCode> {
    let port: i64 = row.try_get("port")?;
    Ok(PreviewCode {
        code: row.try_get("code")?,
        provider_sandbox_id: row.try_get("provider_sandbox_id")?,
        port: port as u16,
        target_url: row.try_get("target_url")?,
        token: row.try_get("token")?,
        user_id: row.try_get("user_id")?,
        created_at: rows::timestamp(row, "created_at")?,
        updated_at: rows::timestamp(row, "updated_at")?,
    })
}
