// ABOUTME: Shared utility functions for Devbox
// ABOUTME: Short instance IDs, preview codes and fixed-width timestamp encoding

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Prefix carried by every instance ID so they are recognisable in logs and URLs
pub const INSTANCE_ID_PREFIX: &str = "dbx_";

/// Length of a preview code (URL-safe alphabet, 6 bits per character)
pub const PREVIEW_CODE_LENGTH: usize = 12;

const INSTANCE_ID_LENGTH: usize = 8;

/// Generate a short, human-friendly instance ID like `dbx_k3v9q2xa`
pub fn generate_instance_id() -> String {
    use rand::Rng;
    // Lowercase only so IDs survive case-insensitive hostnames
    const CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..INSTANCE_ID_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();
    format!("{}{}", INSTANCE_ID_PREFIX, suffix)
}

/// Generate an opaque preview code from the URL-safe alphabet (`A-Za-z0-9_-`)
pub fn generate_preview_code() -> String {
    nanoid::nanoid!(PREVIEW_CODE_LENGTH)
}

/// Current time at the precision timestamps are stored with, so records
/// returned from a write compare equal to the same records read back
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Encode a timestamp as fixed-width RFC 3339 (microseconds, `Z` suffix).
///
/// Every stored timestamp goes through here so that lexical order in SQL
/// matches chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a timestamp written by [`format_timestamp`] (or any RFC 3339 string)
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}
