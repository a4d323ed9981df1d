//! Figment-based configuration loading.
//!
//! Configuration priority (highest wins):
//! 1. CLI arguments (applied after Figment load)
//! 2. Config file (TOML)
//! 3. Environment variables (`PODSCOPE_` prefix, `__` between sections)
//! 4. Defaults

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use podscope_crawler::CrawlerConfig;
use podscope_storage::{DEFAULT_ACTIVITY_ENTRIES, DEFAULT_SAMPLES_PER_NODE, Retention};
use serde::{Deserialize, Serialize};

use crate::args::{CrawlerArgs, MetricsArgs};
use crate::constants::{DEFAULT_METRICS_PORT, DEFAULT_STORE_FILE_NAME, ENV_PREFIX, ENV_SEPARATOR};

/// Prometheus endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub addr: IpAddr,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_METRICS_PORT,
        }
    }
}

impl MetricsConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

/// Node store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store file, relative to the data directory unless absolute.
    pub file: PathBuf,
    /// Stat samples kept per node, oldest dropped first; `0` keeps all.
    pub samples_per_node: usize,
    /// Activity entries kept; `0` keeps all.
    pub activity_entries: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_STORE_FILE_NAME),
            samples_per_node: DEFAULT_SAMPLES_PER_NODE,
            activity_entries: DEFAULT_ACTIVITY_ENTRIES,
        }
    }
}

impl StorageConfig {
    pub fn retention(&self) -> Retention {
        Retention {
            samples_per_node: self.samples_per_node,
            activity_entries: self.activity_entries,
        }
    }
}

/// Complete podscope configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodscopeConfig {
    pub crawler: CrawlerConfig,
    pub metrics: MetricsConfig,
    pub storage: StorageConfig,
}

impl PodscopeConfig {
    /// Load configuration from defaults, environment, and config file.
    /// CLI overrides should be applied separately after loading.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR));

        if let Some(path) = config_path {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment.extract().wrap_err("Failed to load configuration")
    }

    /// Apply CLI overrides on top of the loaded configuration.
    pub fn apply_overrides(&mut self, crawler: &CrawlerArgs, metrics: &MetricsArgs) {
        if !crawler.bootstrap_peers.is_empty() {
            self.crawler.bootstrap_peers = crawler.bootstrap_peers.clone();
        }
        if let Some(secs) = crawler.cycle_interval_secs {
            self.crawler.cycle_interval_secs = secs;
        }
        if let Some(secs) = crawler.failure_cooldown_secs {
            self.crawler.failure_cooldown_secs = secs;
        }
        if let Some(size) = crawler.chunk_size {
            self.crawler.chunk_size = size;
        }
        if let Some(secs) = crawler.liveness_window_secs {
            self.crawler.liveness_window_secs = secs;
        }

        if metrics.enabled {
            self.metrics.enabled = true;
        }
        if let Some(addr) = metrics.addr {
            self.metrics.addr = addr;
        }
        if let Some(port) = metrics.port {
            self.metrics.port = port;
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).wrap_err("Failed to serialize configuration")
    }

    /// Write the configuration to `path`. Refuses to overwrite an existing
    /// file unless `force` is set.
    pub fn write(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            eyre::bail!("{} already exists", path.display());
        }
        fs::write(path, self.to_toml()?)
            .wrap_err_with(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = PodscopeConfig::default();
        assert_eq!(config.crawler.rpc_port, 6000);
        assert_eq!(config.crawler.liveness_window_secs, 120);
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.socket_addr().to_string(), "127.0.0.1:9464");
        assert_eq!(config.storage.file, PathBuf::from("podscope.json"));
        assert_eq!(config.storage.retention(), Retention::default());
    }

    #[test]
    fn test_storage_retention_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("PODSCOPE_STORAGE__SAMPLES_PER_NODE", "200");
            jail.create_file("config.toml", "[storage]\nactivity_entries = 0\n")?;

            let config = PodscopeConfig::load(Some(Path::new("config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(
                config.storage.retention(),
                Retention {
                    samples_per_node: 200,
                    activity_entries: 0,
                }
            );
            Ok(())
        });
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(
            &config_path,
            r#"
[crawler]
chunk_size = 10
bootstrap_peers = ["http://127.0.0.1:6000/rpc"]

[metrics]
enabled = true
port = 9000
"#,
        )
        .unwrap();

        let config = PodscopeConfig::load(Some(&config_path)).unwrap();
        assert_eq!(config.crawler.chunk_size, 10);
        assert_eq!(config.crawler.bootstrap_peers, vec!["http://127.0.0.1:6000/rpc"]);
        // untouched fields keep their defaults
        assert_eq!(config.crawler.credits_interval_secs, 300);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9000);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = PodscopeConfig::load(Some(&config_path)).unwrap();
        assert_eq!(config.crawler.chunk_size, 50);
    }

    #[test]
    fn test_env_and_file_priority() {
        Jail::expect_with(|jail| {
            jail.set_env("PODSCOPE_CRAWLER__CHUNK_SIZE", "7");
            jail.set_env("PODSCOPE_CRAWLER__CYCLE_INTERVAL_SECS", "30");
            jail.create_file("config.toml", "[crawler]\ncycle_interval_secs = 45\n")?;

            let config = PodscopeConfig::load(Some(Path::new("config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.crawler.chunk_size, 7);
            assert_eq!(config.crawler.cycle_interval_secs, 45);
            Ok(())
        });
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = PodscopeConfig::default();
        config.apply_overrides(
            &CrawlerArgs {
                bootstrap_peers: vec!["http://10.0.0.1:6000/rpc".into()],
                chunk_size: Some(5),
                ..Default::default()
            },
            &MetricsArgs {
                enabled: true,
                port: Some(9100),
                ..Default::default()
            },
        );
        assert_eq!(config.crawler.bootstrap_peers.len(), 1);
        assert_eq!(config.crawler.chunk_size, 5);
        assert_eq!(config.crawler.cycle_interval_secs, 15);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9100);
    }

    #[test]
    fn test_toml_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        let config = PodscopeConfig::default();

        config.write(&path, false).unwrap();
        assert!(config.write(&path, false).is_err());
        config.write(&path, true).unwrap();

        assert_eq!(PodscopeConfig::load(Some(&path)).unwrap(), config);
    }
}
