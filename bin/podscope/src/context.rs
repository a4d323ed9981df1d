//! Configuration and collaborators shared by the commands.

use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Result, WrapErr};
use podscope_crawler::{HttpCreditsFeed, ReconciliationEngine};
use podscope_geo::HttpGeoResolver;
use podscope_node_core::args::{CrawlerArgs, DataDirArgs, MetricsArgs};
use podscope_node_core::config::PodscopeConfig;
use podscope_node_core::dirs::DataDirs;
use podscope_node_core::version::USER_AGENT;
use podscope_notify::{LogSink, Notifier};
use podscope_rpc_client::{HttpNodeRpc, RpcClientConfig};
use podscope_storage::FileStore;
use tracing::debug;

#[derive(Debug)]
pub(crate) struct Context {
    pub(crate) dirs: DataDirs,
    pub(crate) config: PodscopeConfig,
}

impl Context {
    /// Resolve the data directory and load the configuration
    /// (defaults < env < config file).
    pub(crate) fn load(datadir: &DataDirArgs) -> Result<Self> {
        let dirs = DataDirs::new(datadir)?;
        let config = PodscopeConfig::load(Some(&dirs.config_file()))?;
        debug!(datadir = %dirs.root.display(), "configuration loaded");
        Ok(Self { dirs, config })
    }

    pub(crate) fn apply_overrides(&mut self, crawler: &CrawlerArgs, metrics: &MetricsArgs) {
        self.config.apply_overrides(crawler, metrics);
    }

    pub(crate) fn store_path(&self) -> PathBuf {
        self.dirs.store_file(&self.config.storage.file)
    }

    pub(crate) fn open_store(&self) -> Result<Arc<FileStore>> {
        let path = self.store_path();
        let store = FileStore::new_with_create_dir(&path)
            .wrap_err_with(|| format!("failed to open node store: {}", path.display()))?
            .with_retention(self.config.storage.retention());
        debug!(path = %path.display(), "node store opened");
        Ok(Arc::new(store))
    }

    /// Wire the HTTP collaborators around `store`.
    pub(crate) fn build_engine(&self, store: Arc<FileStore>) -> Result<ReconciliationEngine> {
        let crawler = &self.config.crawler;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .wrap_err("failed to build HTTP client")?;

        let rpc = HttpNodeRpc::new(RpcClientConfig {
            timeout: crawler.stats_timeout(),
            probe_timeout: crawler.probe_timeout(),
        })?;
        let geo = HttpGeoResolver::with_http(http.clone(), &crawler.geo_url, crawler.geo_timeout());
        let credits = HttpCreditsFeed::new(http, &crawler.credits_url, crawler.stats_timeout());
        let notifier = Notifier::new(store.clone(), LogSink);

        ReconciliationEngine::new(
            crawler.clone(),
            store,
            Arc::new(rpc),
            Arc::new(geo),
            Arc::new(credits),
            Arc::new(notifier),
        )
        .wrap_err("invalid crawler configuration")
    }
}
