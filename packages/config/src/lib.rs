// ABOUTME: Environment-driven configuration for Devbox
// ABOUTME: Reads database and logging settings with validation and sane defaults

pub mod constants;

use std::env;
use std::num::ParseIntError;
use std::path::PathBuf;
use thiserror::Error;

use constants::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid integer for {name}: {source}")]
    InvalidNumber {
        name: &'static str,
        #[source]
        source: ParseIntError,
    },
    #[error("Invalid boolean for {name}: {value}")]
    InvalidBool { name: &'static str, value: String },
    #[error("{name} must be at least 1")]
    OutOfRange { name: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
    pub enable_wal: bool,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source (tests pass a map here)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup(DEVBOX_DATABASE_PATH)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(devbox_core::database_file);

        let max_connections = match lookup(DEVBOX_DB_MAX_CONNECTIONS) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|source| ConfigError::InvalidNumber {
                    name: DEVBOX_DB_MAX_CONNECTIONS,
                    source,
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if max_connections == 0 {
            return Err(ConfigError::OutOfRange {
                name: DEVBOX_DB_MAX_CONNECTIONS,
            });
        }

        let busy_timeout_secs = match lookup(DEVBOX_DB_BUSY_TIMEOUT_SECS) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|source| ConfigError::InvalidNumber {
                    name: DEVBOX_DB_BUSY_TIMEOUT_SECS,
                    source,
                })?,
            None => DEFAULT_BUSY_TIMEOUT_SECS,
        };

        let enable_wal = match lookup(DEVBOX_DB_WAL) {
            Some(raw) => parse_bool(DEVBOX_DB_WAL, &raw)?,
            None => true,
        };

        // RUST_LOG wins so the usual tracing workflow keeps working
        let log_filter = lookup(RUST_LOG)
            .or_else(|| lookup(DEVBOX_LOG))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        tracing::debug!(
            database_path = %database_path.display(),
            max_connections,
            busy_timeout_secs,
            enable_wal,
            "Loaded configuration"
        );

        Ok(Config {
            database_path,
            max_connections,
            busy_timeout_secs,
            enable_wal,
            log_filter,
        })
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: raw.to_string(),
        }),
    }
}
