//! Constants used throughout podscope.

// =============================================================================
// Files & Directories
// =============================================================================

/// Config file name inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default name of the JSON store inside the data directory.
pub const DEFAULT_STORE_FILE_NAME: &str = "podscope.json";

/// Directory used when no platform data directory can be determined.
pub const FALLBACK_DATA_DIR: &str = ".podscope";

// =============================================================================
// Environment
// =============================================================================

/// Prefix of environment variables overriding configuration, e.g.
/// `PODSCOPE_CRAWLER__CHUNK_SIZE=10`.
pub const ENV_PREFIX: &str = "PODSCOPE_";

/// Separator between nested keys in environment variables.
pub const ENV_SEPARATOR: &str = "__";

// =============================================================================
// Metrics
// =============================================================================

/// Default bind address for local-only services.
pub const DEFAULT_LOCALHOST_ADDR: &str = "127.0.0.1";

/// Default port for the metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9464;

/// Interval of the prometheus upkeep task in seconds.
pub const METRICS_UPKEEP_INTERVAL_SECS: u64 = 5;
