use std::env;
use std::path::PathBuf;

/// File name of the SQLite database inside the Devbox directory
pub const DATABASE_FILE_NAME: &str = "devbox.db";

/// Get the path to the Devbox directory (~/.devbox)
pub fn devbox_dir() -> PathBuf {
    // First try HOME environment variable (useful for tests)
    if let Ok(home) = env::var("HOME") {
        PathBuf::from(home).join(".devbox")
    } else {
        dirs::home_dir()
            .unwrap_or_else(env::temp_dir)
            .join(".devbox")
    }
}

/// Get the path to the default database file (~/.devbox/devbox.db)
pub fn database_file() -> PathBuf {
    devbox_dir().join(DATABASE_FILE_NAME)
}
