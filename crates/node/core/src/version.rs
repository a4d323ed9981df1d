//! Version information for podscope.

/// The version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The short version information for podscope.
pub const SHORT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The git commit SHA from `PODSCOPE_GIT_SHA` at compile time, or `"unknown"` when it is unset.
pub const GIT_SHA: &str = {
    match option_env!("PODSCOPE_GIT_SHA") {
        Some(sha) => sha,
        None => "unknown",
    }
};

/// The long version information for podscope.
pub static LONG_VERSION: once_cell::sync::Lazy<String> =
    once_cell::sync::Lazy::new(|| format!("Version: {VERSION}\nCommit SHA: {GIT_SHA}"));

/// User agent sent with outbound HTTP requests.
pub const USER_AGENT: &str = concat!("podscope/", env!("CARGO_PKG_VERSION"));
