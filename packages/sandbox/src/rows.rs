// ABOUTME: Column decoding helpers shared by the SQLite-backed stores

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::Result;
use crate::provider::SandboxProvider;

pub(crate) fn timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    decode_timestamp(column, &raw)
}

pub(crate) fn optional_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| decode_timestamp(column, &s)).transpose()
}

pub(crate) fn optional_u32(row: &SqliteRow, column: &str) -> Result<Option<u32>> {
    let raw: Option<i64> = row.try_get(column)?;
    Ok(raw.map(|v| v as u32))
}

pub(crate) fn optional_provider(row: &SqliteRow, column: &str) -> Result<Option<SandboxProvider>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| s.parse()).transpose()
}

fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    devbox_core::parse_timestamp(raw).map_err(|e| {
        sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        }
        .into()
    })
}
