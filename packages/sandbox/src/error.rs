// ABOUTME: Error types for snapshot resolution, version history and instance tracking
// ABOUTME: Every variant carries the offending ID (and provider where relevant) for the caller

use thiserror::Error;

use crate::provider::SandboxProvider;

/// Main error type for sandbox core operations
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Malformed or empty input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing environment, version, instance or preset
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// No catalog entry matches the snapshot on the requested provider
    #[error("Snapshot '{snapshot_id}' not found for provider {provider}")]
    SnapshotNotFound {
        snapshot_id: String,
        provider: SandboxProvider,
    },

    /// The caller's team/user does not own the record
    #[error("Not authorized to access {kind} {id}")]
    Authorization { kind: &'static str, id: String },

    /// The snapshot ID embeds a different provider than the one requested
    #[error("Snapshot '{snapshot_id}' belongs to provider {embedded}, not {requested}")]
    ProviderMismatch {
        snapshot_id: String,
        embedded: SandboxProvider,
        requested: SandboxProvider,
    },

    /// Reachable provider arm with no implementation yet
    #[error("{operation} is not implemented for provider {provider}")]
    Unimplemented {
        provider: SandboxProvider,
        operation: &'static str,
    },

    /// The operation would break an invariant (e.g. removing the active version)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Status change not permitted by the instance state machine
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Embedded provider catalog could not be loaded
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used by transport layers to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authorization,
    ProviderMismatch,
    Unimplemented,
    Conflict,
    Internal,
}

impl SandboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } | Self::SnapshotNotFound { .. } => ErrorKind::NotFound,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::ProviderMismatch { .. } => ErrorKind::ProviderMismatch,
            Self::Unimplemented { .. } => ErrorKind::Unimplemented,
            Self::Conflict(_) | Self::InvalidTransition { .. } => ErrorKind::Conflict,
            Self::Catalog(_) | Self::Database(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn unauthorized(kind: &'static str, id: impl Into<String>) -> Self {
        Self::Authorization {
            kind,
            id: id.into(),
        }
    }
}

/// Type alias for Results that return SandboxError
pub type Result<T> = std::result::Result<T, SandboxError>;
