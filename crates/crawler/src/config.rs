//! Engine configuration.

use std::time::Duration;

use podscope_score::DEFAULT_TARGET_VERSION;
use serde::{Deserialize, Serialize};

use crate::CrawlerError;

/// Well-known peers used as entry points into gossip.
pub const DEFAULT_BOOTSTRAP_PEERS: [&str; 5] = [
    "http://192.190.136.28:6000/rpc",
    "http://173.212.207.32:6000/rpc",
    "http://216.234.134.5:6000/rpc",
    "http://154.38.185.152:6000/rpc",
    "http://45.151.122.60:6000/rpc",
];

/// Port every pod serves JSON-RPC on.
pub const DEFAULT_RPC_PORT: u16 = 6000;

pub const DEFAULT_RPC_PATH: &str = "/rpc";

pub const DEFAULT_LIVENESS_WINDOW_SECS: u64 = 120;

pub const DEFAULT_CHUNK_SIZE: usize = 50;

pub const DEFAULT_CREDITS_URL: &str = "https://podcredits.xandeum.network/api/pods-credits";

pub const DEFAULT_CREDITS_INTERVAL_SECS: u64 = 5 * 60;

pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 15;

pub const DEFAULT_FAILURE_COOLDOWN_SECS: u64 = 60;

/// Crawler settings. Every field has a default, so a partial config file is
/// valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// JSON-RPC endpoints queried for gossip.
    pub bootstrap_peers: Vec<String>,
    pub rpc_port: u16,
    pub rpc_path: String,
    /// A pod is active when it was seen less than this many seconds ago.
    pub liveness_window_secs: u64,
    /// Pods reconciled concurrently.
    pub chunk_size: usize,
    pub stats_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub credits_url: String,
    pub credits_interval_secs: u64,
    pub geo_url: String,
    pub geo_timeout_secs: u64,
    pub cycle_interval_secs: u64,
    /// Wait after a failed cycle before the next attempt.
    pub failure_cooldown_secs: u64,
    pub target_version: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            bootstrap_peers: DEFAULT_BOOTSTRAP_PEERS.iter().map(|s| s.to_string()).collect(),
            rpc_port: DEFAULT_RPC_PORT,
            rpc_path: DEFAULT_RPC_PATH.to_string(),
            liveness_window_secs: DEFAULT_LIVENESS_WINDOW_SECS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            stats_timeout_secs: 10,
            probe_timeout_secs: 3,
            credits_url: DEFAULT_CREDITS_URL.to_string(),
            credits_interval_secs: DEFAULT_CREDITS_INTERVAL_SECS,
            geo_url: podscope_geo::DEFAULT_GEO_URL.to_string(),
            geo_timeout_secs: 5,
            cycle_interval_secs: DEFAULT_CYCLE_INTERVAL_SECS,
            failure_cooldown_secs: DEFAULT_FAILURE_COOLDOWN_SECS,
            target_version: DEFAULT_TARGET_VERSION.to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn validate(&self) -> Result<(), CrawlerError> {
        if self.chunk_size == 0 {
            return Err(CrawlerError::Config("chunk_size must be at least 1".into()));
        }
        if self.liveness_window_secs == 0 {
            return Err(CrawlerError::Config(
                "liveness_window_secs must be at least 1".into(),
            ));
        }
        if !self.rpc_path.starts_with('/') {
            return Err(CrawlerError::Config(format!(
                "rpc_path must start with '/': {}",
                self.rpc_path
            )));
        }
        for (name, value) in [
            ("credits_url", &self.credits_url),
            ("geo_url", &self.geo_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| CrawlerError::Config(format!("invalid {name} {value:?}: {e}")))?;
        }
        for peer in &self.bootstrap_peers {
            url::Url::parse(peer)
                .map_err(|e| CrawlerError::Config(format!("invalid bootstrap peer {peer:?}: {e}")))?;
        }
        Ok(())
    }

    pub fn stats_timeout(&self) -> Duration {
        Duration::from_secs(self.stats_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_secs(self.geo_timeout_secs)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_secs(self.failure_cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlerConfig::default();
        assert_eq!(config.bootstrap_peers.len(), 5);
        assert_eq!(config.rpc_port, 6000);
        assert_eq!(config.liveness_window_secs, 120);
        assert_eq!(config.chunk_size, 50);
        assert_eq!(config.credits_interval_secs, 300);
        assert_eq!(config.stats_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CrawlerConfig =
            serde_json::from_str(r#"{"chunk_size": 10, "bootstrap_peers": []}"#).unwrap();
        assert_eq!(config.chunk_size, 10);
        assert!(config.bootstrap_peers.is_empty());
        assert_eq!(config.rpc_path, "/rpc");
    }

    #[test]
    fn test_validate() {
        let config = CrawlerConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(CrawlerError::Config(_)));

        let config = CrawlerConfig {
            bootstrap_peers: vec!["not a url".into()],
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(CrawlerError::Config(_)));

        let config = CrawlerConfig {
            rpc_path: "rpc".into(),
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(CrawlerError::Config(_)));
    }
}
