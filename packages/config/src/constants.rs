// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Devbox

// Database Configuration
pub const DEVBOX_DATABASE_PATH: &str = "DEVBOX_DATABASE_PATH";
pub const DEVBOX_DB_MAX_CONNECTIONS: &str = "DEVBOX_DB_MAX_CONNECTIONS";
pub const DEVBOX_DB_BUSY_TIMEOUT_SECS: &str = "DEVBOX_DB_BUSY_TIMEOUT_SECS";
pub const DEVBOX_DB_WAL: &str = "DEVBOX_DB_WAL";

// Logging
pub const DEVBOX_LOG: &str = "DEVBOX_LOG";
pub const RUST_LOG: &str = "RUST_LOG";

// Defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_FILTER: &str = "info";
