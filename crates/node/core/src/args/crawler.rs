//! Crawler CLI overrides.

use clap::Args;

/// Crawler overrides.
#[derive(Debug, Args, Clone, Default, PartialEq, Eq)]
#[command(next_help_heading = "Crawler")]
pub struct CrawlerArgs {
    /// Bootstrap peer JSON-RPC endpoint. Repeat to query several peers;
    /// replaces the configured list.
    #[arg(long = "bootstrap", value_name = "URL")]
    pub bootstrap_peers: Vec<String>,

    /// Seconds between cycles.
    #[arg(long = "crawler.interval", value_name = "SECS")]
    pub cycle_interval_secs: Option<u64>,

    /// Seconds to wait after a failed cycle.
    #[arg(long = "crawler.cooldown", value_name = "SECS")]
    pub failure_cooldown_secs: Option<u64>,

    /// Pods reconciled concurrently.
    #[arg(long = "crawler.chunk-size", value_name = "N")]
    pub chunk_size: Option<usize>,

    /// Liveness window in seconds.
    #[arg(long = "crawler.liveness-window", value_name = "SECS")]
    pub liveness_window_secs: Option<u64>,
}
