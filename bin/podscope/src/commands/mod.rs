//! Subcommand implementations.

pub(crate) mod activity;
pub(crate) mod alerts;
pub(crate) mod config;
pub(crate) mod cycle;
pub(crate) mod node;
pub(crate) mod nodes;
pub(crate) mod probe;
pub(crate) mod refresh;
pub(crate) mod run;
pub(crate) mod summary;

use std::time::{Duration, UNIX_EPOCH};

/// `2024-01-01T00:00:00Z` style timestamp for unix seconds.
pub(crate) fn format_timestamp(secs: u64) -> String {
    humantime::format_rfc3339_seconds(UNIX_EPOCH + Duration::from_secs(secs)).to_string()
}

/// Human age of a unix timestamp relative to `now`, e.g. `3m 20s ago`.
pub(crate) fn format_age(secs: u64, now: u64) -> String {
    if secs == 0 {
        return "never".to_string();
    }
    let age = Duration::from_secs(now.saturating_sub(secs));
    format!("{} ago", humantime::format_duration(age))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_age(0, 100), "never");
        assert_eq!(format_age(1_000, 1_200), "3m 20s ago");
        assert_eq!(format_age(1_300, 1_200), "0s ago");
    }
}
