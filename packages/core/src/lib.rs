// ABOUTME: Core utilities for Devbox
// ABOUTME: Foundational package providing ID generation and timestamp encoding across all packages

pub mod constants;
pub mod utils;

// Re-export constants
pub use constants::{database_file, devbox_dir};

// Re-export utilities
pub use utils::{
    format_timestamp, generate_instance_id, generate_preview_code, now, parse_timestamp,
    INSTANCE_ID_PREFIX, PREVIEW_CODE_LENGTH,
};
