//! The reconciliation engine.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use parking_lot::Mutex;
use podscope_geo::{GeoInfo, GeoResolver};
use podscope_notify::Notify;
use podscope_rpc_client::{NodeRpc, PodRecord};
use podscope_score::{DetailedScoreInput, QuickScoreInput, Scorer};
use podscope_storage::{
    ActivityKind, ActivityLogEntry, Location, Node, NodeAddress, NodeStore, StatSample,
};
use tracing::{debug, info, trace, warn};

use crate::credits::CreditsSource;
use crate::merge::{Discovery, merge_pods};
use crate::metrics::CrawlerMetrics;
use crate::report::{
    CreditsOutcome, CycleReport, GossipReport, MetricsReport, ProbeReport, RefreshReport,
};
use crate::{CrawlerConfig, CrawlerError};

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// What one bootstrap peer told us.
enum PeerView {
    Full(Vec<PodRecord>),
    Bare(Vec<String>),
    Silent,
}

/// Result of reconciling one gossip record.
#[derive(Debug, Default)]
struct PodOutcome {
    transition: Option<ActivityKind>,
    sample_written: bool,
}

fn merge_location(location: &mut Location, geo: &GeoInfo) {
    if geo.country.is_some() {
        location.country.clone_from(&geo.country);
    }
    if geo.city.is_some() {
        location.city.clone_from(&geo.city);
    }
    if geo.lat.is_some() && geo.lon.is_some() {
        location.latitude = geo.lat;
        location.longitude = geo.lon;
    }
    if geo.isp.is_some() {
        location.isp.clone_from(&geo.isp);
    }
}

fn transition_message(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::NewNode => "New node discovered",
        ActivityKind::Online => "Node went ONLINE",
        ActivityKind::Offline => "Node went OFFLINE",
        ActivityKind::Update => "Node updated",
    }
}

/// Discovers pods, reconciles them into the store and drives notifications.
///
/// The engine owns the only process-scoped mutable state of the crawler: the
/// time of the last credits sync (and, through its [`GeoResolver`], the geo
/// cache). Both start empty and are lost on restart.
pub struct ReconciliationEngine {
    config: CrawlerConfig,
    store: Arc<dyn NodeStore>,
    rpc: Arc<dyn NodeRpc>,
    geo: Arc<dyn GeoResolver>,
    credits: Arc<dyn CreditsSource>,
    notifier: Arc<dyn Notify>,
    scorer: Scorer,
    last_credits_sync: Mutex<Option<u64>>,
    metrics: CrawlerMetrics,
}

impl fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("config", &self.config)
            .field("scorer", &self.scorer)
            .field("last_credits_sync", &*self.last_credits_sync.lock())
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    pub fn new(
        config: CrawlerConfig,
        store: Arc<dyn NodeStore>,
        rpc: Arc<dyn NodeRpc>,
        geo: Arc<dyn GeoResolver>,
        credits: Arc<dyn CreditsSource>,
        notifier: Arc<dyn Notify>,
    ) -> Result<Self, CrawlerError> {
        config.validate()?;
        let scorer = Scorer::new(config.target_version.clone());
        Ok(Self {
            config,
            store,
            rpc,
            geo,
            credits,
            notifier,
            scorer,
            last_credits_sync: Mutex::new(None),
            metrics: CrawlerMetrics::default(),
        })
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    fn is_active(&self, last_seen: u64, now: u64) -> bool {
        now.saturating_sub(last_seen) < self.config.liveness_window_secs
    }

    fn canonical(&self, reported: &str) -> Result<NodeAddress, CrawlerError> {
        Ok(NodeAddress::with_rpc_port(reported, self.config.rpc_port)?)
    }

    /// Run one full cycle now.
    pub async fn run_cycle(&self) -> Result<CycleReport, CrawlerError> {
        self.run_cycle_at(unix_now()).await
    }

    /// Run gossip, public metrics and (when due) credits phases, then flush
    /// the store.
    pub async fn run_cycle_at(&self, now: u64) -> Result<CycleReport, CrawlerError> {
        let started = Instant::now();
        debug!(now, "starting cycle");

        let gossip = self.sync_gossip(now).await;
        let metrics = self.sync_public_metrics(now).await?;
        let credits = self.sync_credits_if_due(now).await;
        self.store.flush()?;

        let duration = started.elapsed();
        self.metrics.record_cycle(duration);

        let report = CycleReport {
            gossip,
            metrics,
            credits,
            duration,
        };
        info!(
            %report,
            elapsed = %humantime::format_duration(Duration::from_millis(
                u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
            )),
            "cycle finished"
        );
        Ok(report)
    }

    async fn query_peer(&self, peer: &str) -> PeerView {
        if let Some(pods) = self.rpc.get_pods_with_stats(peer).await {
            trace!(%peer, pods = pods.len(), "peer answered");
            return PeerView::Full(pods);
        }
        match self.rpc.get_pods(peer).await {
            Some(addresses) => {
                debug!(%peer, pods = addresses.len(), "peer answered legacy listing only");
                PeerView::Bare(addresses)
            }
            None => {
                debug!(%peer, "bootstrap peer unreachable");
                PeerView::Silent
            }
        }
    }

    /// Gossip discovery phase. Never fails as a whole: unreachable peers and
    /// pods that fail to reconcile are logged and counted.
    pub async fn sync_gossip(&self, now: u64) -> GossipReport {
        let mut report = GossipReport {
            peers_queried: self.config.bootstrap_peers.len(),
            ..Default::default()
        };

        let views = join_all(
            self.config
                .bootstrap_peers
                .iter()
                .map(|peer| self.query_peer(peer)),
        )
        .await;

        let mut full = Vec::new();
        let mut bare = Vec::new();
        for view in views {
            match view {
                PeerView::Full(pods) => {
                    report.peers_answered += 1;
                    full.push(pods);
                }
                PeerView::Bare(addresses) => {
                    report.peers_legacy += 1;
                    bare.extend(addresses);
                }
                PeerView::Silent => {}
            }
        }

        let discovery = Discovery::build(merge_pods(full), bare, self.config.rpc_port);
        report.pods_merged = discovery.pods.len();
        report.bare_addresses = discovery.bare.len();
        self.metrics.pods_merged.set(discovery.pods.len() as f64);
        self.metrics.peers_answered.set(report.peers_answered as f64);

        if discovery.is_empty() {
            warn!(
                peers = report.peers_queried,
                answered = report.peers_answered,
                "gossip returned no pods"
            );
            return report;
        }
        debug!(
            pods = report.pods_merged,
            bare = report.bare_addresses,
            invalid = discovery.invalid,
            "merged gossip views"
        );

        for chunk in discovery.pods.chunks(self.config.chunk_size) {
            let outcomes = join_all(
                chunk
                    .iter()
                    .map(|(address, pod)| self.reconcile_pod(address, pod, now)),
            )
            .await;

            for ((address, _), outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(outcome) => {
                        report.reconciled += 1;
                        self.metrics.pods_reconciled_total.increment(1);
                        if outcome.sample_written {
                            report.samples_written += 1;
                        }
                        match outcome.transition {
                            Some(ActivityKind::NewNode) => report.new_nodes += 1,
                            Some(ActivityKind::Online) => report.online += 1,
                            Some(ActivityKind::Offline) => report.offline += 1,
                            _ => {}
                        }
                    }
                    Err(error) => {
                        report.failed += 1;
                        self.metrics.pods_failed_total.increment(1);
                        warn!(%address, %error, "failed to reconcile pod");
                    }
                }
            }
        }

        for chunk in discovery.bare.chunks(self.config.chunk_size) {
            let outcomes =
                join_all(chunk.iter().map(|address| self.register_bare(address, now))).await;
            for (address, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(true) => report.new_nodes += 1,
                    Ok(false) => {}
                    Err(error) => {
                        report.failed += 1;
                        warn!(%address, %error, "failed to register bare address");
                    }
                }
            }
        }

        report
    }

    /// Reconcile one merged gossip record against the stored node.
    async fn reconcile_pod(
        &self,
        address: &NodeAddress,
        pod: &PodRecord,
        now: u64,
    ) -> Result<PodOutcome, CrawlerError> {
        let existing = self.store.node(address)?;
        let is_active = self.is_active(pod.last_seen_timestamp, now);

        let transition = match &existing {
            None => Some(ActivityKind::NewNode),
            Some(node) if node.is_active != is_active => Some(if is_active {
                ActivityKind::Online
            } else {
                ActivityKind::Offline
            }),
            Some(_) => None,
        };

        let geo = if existing
            .as_ref()
            .is_none_or(|node| !node.location.has_coordinates())
        {
            self.geo.lookup(address.ip()).await
        } else {
            None
        };

        let health_score = self.scorer.quick(&QuickScoreInput {
            is_public: pod.is_public,
            uptime_secs: pod.uptime,
            version: pod.version.as_deref(),
            is_active,
        });

        let node = self.store.upsert_node(address, now, &mut |node| {
            if pod.public_key.is_some() {
                node.public_key.clone_from(&pod.public_key);
            }
            if pod.version.is_some() {
                node.version.clone_from(&pod.version);
            }
            node.is_active = is_active;
            node.is_rpc_active = pod.is_public;
            node.last_seen_at = pod.last_seen_timestamp;
            node.storage_committed_bytes = pod.storage_committed;
            node.storage_used_bytes = pod.storage_used;
            node.gossip_uptime_secs = pod.uptime;
            node.health_score = health_score;
            if let Some(geo) = &geo {
                merge_location(&mut node.location, geo);
            }
        })?;

        if let Some(kind) = transition {
            self.record_transition(&node, kind, now).await;
        }

        // pods that cannot be polled directly get a best-effort sample
        let mut sample_written = false;
        if !(pod.is_public && is_active) {
            self.store.append_sample(
                address,
                StatSample::from_gossip(now, pod.storage_committed, pod.storage_used, pod.uptime),
            )?;
            self.metrics.samples_written_total.increment(1);
            sample_written = true;
        }

        Ok(PodOutcome {
            transition,
            sample_written,
        })
    }

    /// Remember an address known only from a bare listing. Stored nodes are
    /// left alone. Returns `true` when the node is new.
    async fn register_bare(&self, address: &NodeAddress, now: u64) -> Result<bool, CrawlerError> {
        if self.store.node(address)?.is_some() {
            return Ok(false);
        }
        let node = self.store.upsert_node(address, now, &mut |_| {})?;
        self.record_transition(&node, ActivityKind::NewNode, now)
            .await;
        Ok(true)
    }

    async fn record_transition(&self, node: &Node, kind: ActivityKind, now: u64) {
        self.metrics.record_transition(kind);
        info!(address = %node.address, %kind, "node transition");

        let entry = ActivityLogEntry::new(
            node.address.clone(),
            Some(node.country_or_unknown()),
            kind,
            transition_message(kind),
            now,
        );
        if let Err(error) = self.store.record_activity(entry) {
            warn!(address = %node.address, %kind, %error, "failed to record activity");
        }

        match kind {
            ActivityKind::Online => self.notifier.notify(&node.address, true).await,
            ActivityKind::Offline => self.notifier.notify(&node.address, false).await,
            _ => {}
        }
    }

    /// Public metrics phase: poll every active, directly reachable node.
    pub async fn sync_public_metrics(&self, now: u64) -> Result<MetricsReport, CrawlerError> {
        let nodes = self.store.pollable_nodes()?;
        debug!(nodes = nodes.len(), "polling public nodes");
        Ok(self.poll_nodes(&nodes, now).await)
    }

    async fn poll_nodes(&self, nodes: &[Node], now: u64) -> MetricsReport {
        let mut report = MetricsReport {
            polled: nodes.len(),
            ..Default::default()
        };
        for chunk in nodes.chunks(self.config.chunk_size) {
            let outcomes = join_all(chunk.iter().map(|node| self.poll_node(node, now))).await;
            for (node, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(true) => {
                        report.succeeded += 1;
                        self.metrics.polls_succeeded_total.increment(1);
                    }
                    Ok(false) => {
                        report.failed += 1;
                        self.metrics.polls_failed_total.increment(1);
                    }
                    Err(error) => {
                        report.failed += 1;
                        self.metrics.polls_failed_total.increment(1);
                        warn!(address = %node.address, %error, "failed to store polled stats");
                    }
                }
            }
        }
        report
    }

    /// Poll one node with `get-stats`. When the node does not answer, the
    /// stored record is left untouched and `false` is returned.
    async fn poll_node(&self, node: &Node, now: u64) -> Result<bool, CrawlerError> {
        let endpoint = node.address.rpc_url(&self.config.rpc_path);
        let Some(timed) = self.rpc.get_stats(&endpoint).await else {
            return Ok(false);
        };
        let latency_ms = timed.latency_ms();
        let stats = timed.value;

        let Some(updated) = self.store.update_node(&node.address, &mut |n| {
            n.packets_in = stats.packets_in;
            n.packets_out = stats.packets_out;
            n.block_height = stats.block_height;
            n.last_latency_ms = Some(latency_ms);
        })?
        else {
            return Ok(false);
        };

        // get-stats has no used-bytes figure; carry the last known one
        self.store.append_sample(
            &node.address,
            StatSample {
                recorded_at: now,
                cpu_percent: stats.cpu_percent,
                ram_used_bytes: stats.ram_used_bytes,
                ram_total_bytes: stats.ram_total_bytes,
                uptime_secs: stats.uptime_secs,
                active_streams: stats.active_streams,
                packets_in: stats.packets_in,
                packets_out: stats.packets_out,
                block_height: stats.block_height,
                total_bytes_stored: stats.total_bytes,
                used_bytes_stored: updated.storage_used_bytes,
            },
        )?;
        self.metrics.samples_written_total.increment(1);
        trace!(address = %node.address, latency_ms, "polled node");
        Ok(true)
    }

    /// Credits phase, gated by the configured interval.
    pub async fn sync_credits_if_due(&self, now: u64) -> CreditsOutcome {
        {
            let mut last = self.last_credits_sync.lock();
            if let Some(previous) = *last {
                if now.saturating_sub(previous) <= self.config.credits_interval_secs {
                    return CreditsOutcome::Skipped;
                }
            }
            *last = Some(now);
        }
        self.sync_credits().await
    }

    /// Fetch the credits feed and apply it to every node carrying each key.
    pub async fn sync_credits(&self) -> CreditsOutcome {
        let entries = match self.credits.fetch().await {
            Ok(entries) => entries,
            Err(error) => {
                self.metrics.record_credits_run("failed");
                warn!(kind = error.kind(), %error, "credits sync failed");
                return CreditsOutcome::Failed;
            }
        };

        let mut nodes_updated = 0;
        for entry in &entries {
            match self
                .store
                .set_credits_by_public_key(&entry.pod_id, entry.credits)
            {
                Ok(updated) => nodes_updated += updated,
                Err(error) => warn!(pod_id = %entry.pod_id, %error, "failed to store credits"),
            }
        }

        self.metrics.record_credits_run("synced");
        self.metrics
            .credits_nodes_updated_total
            .increment(nodes_updated as u64);
        info!(entries = entries.len(), nodes_updated, "credits synced");
        CreditsOutcome::Synced {
            entries: entries.len(),
            nodes_updated,
        }
    }

    /// Poll an explicit set of stored nodes right away.
    pub async fn refresh<S: AsRef<str>>(
        &self,
        addresses: &[S],
    ) -> Result<RefreshReport, CrawlerError> {
        self.refresh_at(addresses, unix_now()).await
    }

    /// Run the public metrics logic for `addresses` only. Unknown and
    /// malformed addresses are ignored.
    pub async fn refresh_at<S: AsRef<str>>(
        &self,
        addresses: &[S],
        now: u64,
    ) -> Result<RefreshReport, CrawlerError> {
        let mut report = RefreshReport {
            requested: addresses.len(),
            ..Default::default()
        };

        let mut wanted: Vec<NodeAddress> = Vec::with_capacity(addresses.len());
        for raw in addresses {
            match self.canonical(raw.as_ref()) {
                Ok(address) if !wanted.contains(&address) => wanted.push(address),
                Ok(_) => {}
                Err(error) => {
                    report.invalid += 1;
                    debug!(address = raw.as_ref(), %error, "ignoring refresh address");
                }
            }
        }

        let nodes = self.store.nodes_by_address(&wanted)?;
        report.found = nodes.len();
        let polled = self.poll_nodes(&nodes, now).await;
        report.updated = polled.succeeded;
        self.store.flush()?;

        info!(
            requested = report.requested,
            found = report.found,
            updated = report.updated,
            "refresh finished"
        );
        Ok(report)
    }

    /// Query one pod directly and score it from live metrics. Nothing is
    /// written to the store.
    pub async fn probe(&self, address: &str) -> Result<ProbeReport, CrawlerError> {
        let address = self.canonical(address)?;
        let endpoint = address.rpc_url(&self.config.rpc_path);

        let (version, stats) = futures::join!(
            self.rpc.get_version(&endpoint),
            self.rpc.get_stats(&endpoint)
        );
        let detailed_score = stats.as_ref().map(|timed| {
            self.scorer.detailed(&DetailedScoreInput {
                cpu_percent: timed.value.cpu_percent,
                uptime_secs: timed.value.uptime_secs,
                latency_ms: timed.latency_ms(),
                version: version.as_deref(),
                total_files: timed.value.total_pages,
            })
        });

        Ok(ProbeReport {
            address,
            version,
            stats,
            detailed_score,
        })
    }

    /// Re-key stored nodes recorded under a non-RPC port.
    pub fn repair_addresses(&self) -> Result<usize, CrawlerError> {
        let touched = self.store.normalize_addresses(self.config.rpc_port)?;
        if touched > 0 {
            info!(touched, "repaired legacy node addresses");
            self.store.flush()?;
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use podscope_rpc_client::{NodeStats, Timed};
    use podscope_storage::{FileStore, MemoryStore, StoreError};

    use super::*;
    use crate::credits::CreditEntry;
    use crate::CreditsError;

    const NOW: u64 = 1_700_000_000;
    const PEER_A: &str = "http://10.0.0.1:6000/rpc";
    const PEER_B: &str = "http://10.0.0.2:6000/rpc";

    #[derive(Default)]
    struct FakeRpc {
        gossip: Mutex<HashMap<String, Vec<PodRecord>>>,
        legacy: Mutex<HashMap<String, Vec<String>>>,
        stats: Mutex<HashMap<String, NodeStats>>,
        stats_calls: AtomicUsize,
    }

    impl FakeRpc {
        fn set_gossip(&self, peer: &str, pods: Vec<PodRecord>) {
            self.gossip.lock().insert(peer.to_string(), pods);
        }

        fn set_stats(&self, address: &str, stats: NodeStats) {
            self.stats
                .lock()
                .insert(format!("http://{address}/rpc"), stats);
        }
    }

    #[async_trait]
    impl NodeRpc for FakeRpc {
        async fn get_version(&self, endpoint: &str) -> Option<String> {
            self.stats
                .lock()
                .contains_key(endpoint)
                .then(|| "0.8.0".to_string())
        }

        async fn get_stats(&self, endpoint: &str) -> Option<Timed<NodeStats>> {
            self.stats_calls.fetch_add(1, Ordering::SeqCst);
            self.stats.lock().get(endpoint).cloned().map(|value| Timed {
                value,
                latency: Duration::from_millis(42),
            })
        }

        async fn get_pods_with_stats(&self, endpoint: &str) -> Option<Vec<PodRecord>> {
            self.gossip.lock().get(endpoint).cloned()
        }

        async fn get_pods(&self, endpoint: &str) -> Option<Vec<String>> {
            self.legacy.lock().get(endpoint).cloned()
        }
    }

    #[derive(Default)]
    struct FakeGeo {
        lookups: AtomicUsize,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl GeoResolver for FakeGeo {
        async fn lookup(&self, _ip: &str) -> Option<GeoInfo> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if *self.fail.lock() {
                return None;
            }
            Some(GeoInfo {
                country: Some("Germany".into()),
                city: Some("Falkenstein".into()),
                lat: Some(50.47),
                lon: Some(12.37),
                isp: Some("Hetzner".into()),
            })
        }
    }

    #[derive(Default)]
    struct FakeCredits {
        entries: Mutex<Option<Vec<CreditEntry>>>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl CreditsSource for FakeCredits {
        async fn fetch(&self) -> Result<Vec<CreditEntry>, CreditsError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.entries
                .lock()
                .clone()
                .ok_or_else(|| CreditsError::Unsuccessful("error".into()))
        }
    }

    #[derive(Default)]
    struct RecordingNotify {
        sent: Mutex<Vec<(NodeAddress, bool)>>,
    }

    #[async_trait]
    impl Notify for RecordingNotify {
        async fn notify(&self, address: &NodeAddress, is_now_active: bool) {
            self.sent.lock().push((address.clone(), is_now_active));
        }
    }

    struct Harness {
        engine: ReconciliationEngine,
        store: Arc<dyn NodeStore>,
        rpc: Arc<FakeRpc>,
        geo: Arc<FakeGeo>,
        credits: Arc<FakeCredits>,
        notify: Arc<RecordingNotify>,
    }

    fn harness_with(store: Arc<dyn NodeStore>, config: CrawlerConfig) -> Harness {
        let rpc = Arc::new(FakeRpc::default());
        let geo = Arc::new(FakeGeo::default());
        let credits = Arc::new(FakeCredits::default());
        let notify = Arc::new(RecordingNotify::default());
        let engine = ReconciliationEngine::new(
            config,
            store.clone(),
            rpc.clone(),
            geo.clone(),
            credits.clone(),
            notify.clone(),
        )
        .unwrap();
        Harness {
            engine,
            store,
            rpc,
            geo,
            credits,
            notify,
        }
    }

    fn harness() -> Harness {
        let config = CrawlerConfig {
            bootstrap_peers: vec![PEER_A.to_string(), PEER_B.to_string()],
            ..Default::default()
        };
        harness_with(Arc::new(MemoryStore::new()), config)
    }

    fn pod(address: &str, last_seen: u64, is_public: bool) -> PodRecord {
        PodRecord {
            address: address.to_string(),
            public_key: Some(format!("pk-{address}")),
            is_public,
            last_seen_timestamp: last_seen,
            rpc_port: Some(6000),
            storage_committed: 1_000_000,
            storage_used: 250_000,
            storage_usage_percent: 25.0,
            uptime: 100_000,
            version: Some("0.8.0".into()),
        }
    }

    fn addr(s: &str) -> NodeAddress {
        NodeAddress::with_rpc_port(s, 6000).unwrap()
    }

    fn live_stats() -> NodeStats {
        NodeStats {
            cpu_percent: 12.5,
            ram_used_bytes: 1_000,
            ram_total_bytes: 8_000,
            uptime_secs: 90_000,
            active_streams: 3,
            packets_in: 111,
            packets_out: 222,
            block_height: 77,
            total_bytes: 65_536,
            total_pages: 4,
            last_updated: None,
        }
    }

    #[tokio::test]
    async fn test_address_normalized_to_rpc_port() {
        let h = harness();
        h.rpc
            .set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, false)]);

        h.engine.run_cycle_at(NOW).await.unwrap();

        let nodes = h.store.nodes().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].address.as_str(), "1.2.3.4:6000");
        assert!(h.store.node(&addr("1.2.3.4")).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_liveness_window_boundary() {
        let h = harness();
        h.rpc.set_gossip(
            PEER_A,
            vec![
                pod("1.1.1.1:9001", NOW - 119, false),
                pod("2.2.2.2:9001", NOW - 120, false),
                pod("3.3.3.3:9001", NOW - 121, false),
            ],
        );

        h.engine.sync_gossip(NOW).await;

        assert!(h.store.node(&addr("1.1.1.1")).unwrap().unwrap().is_active);
        assert!(!h.store.node(&addr("2.2.2.2")).unwrap().unwrap().is_active);
        assert!(!h.store.node(&addr("3.3.3.3")).unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_online_transition_once() {
        let h = harness();
        let a = addr("1.2.3.4");
        h.store
            .upsert_node(&a, NOW - 1_000, &mut |n| n.is_active = false)
            .unwrap();

        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, false)]);
        let report = h.engine.sync_gossip(NOW).await;
        assert_eq!(report.online, 1);

        let activity = h.store.recent_activity(10).unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].kind, ActivityKind::Online);
        assert_eq!(activity[0].message, "Node went ONLINE");
        assert_eq!(*h.notify.sent.lock(), vec![(a.clone(), true)]);

        // same record again: no new transition
        let report = h.engine.sync_gossip(NOW + 5).await;
        assert_eq!(report.transitions(), 0);
        assert_eq!(h.store.recent_activity(10).unwrap().len(), 1);
        assert_eq!(h.notify.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_transition() {
        let h = harness();
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, false)]);
        h.engine.sync_gossip(NOW).await;

        // no gossip refresh for a while
        let report = h.engine.sync_gossip(NOW + 500).await;
        assert_eq!(report.offline, 1);

        let node = h.store.node(&addr("1.2.3.4")).unwrap().unwrap();
        assert!(!node.is_active);
        assert_eq!(node.health_score, 0);

        let activity = h.store.recent_activity(10).unwrap();
        assert_eq!(activity[0].kind, ActivityKind::Offline);
        assert_eq!(activity[0].country, "Germany");
        assert_eq!(*h.notify.sent.lock(), vec![(addr("1.2.3.4"), false)]);
    }

    #[tokio::test]
    async fn test_new_node_not_notified() {
        let h = harness();
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, true)]);

        let report = h.engine.sync_gossip(NOW).await;
        assert_eq!(report.new_nodes, 1);
        assert_eq!(report.transitions(), 0);

        let activity = h.store.recent_activity(10).unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].kind, ActivityKind::NewNode);
        assert!(h.notify.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_idempotent_reconcile() {
        let h = harness();
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, false)]);

        h.engine.sync_gossip(NOW).await;
        let once = h.store.node(&addr("1.2.3.4")).unwrap().unwrap();

        h.engine.sync_gossip(NOW).await;
        let twice = h.store.node(&addr("1.2.3.4")).unwrap().unwrap();

        assert_eq!(once, twice);
        assert_eq!(h.store.recent_activity(10).unwrap().len(), 1);
        // one sample per application
        assert_eq!(h.store.samples(&addr("1.2.3.4")).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_merge_prefers_public_key() {
        let h = harness();
        let mut without_key = pod("1.2.3.4:9001", NOW, false);
        without_key.public_key = None;
        h.rpc.set_gossip(PEER_A, vec![without_key]);
        h.rpc.set_gossip(PEER_B, vec![pod("1.2.3.4:9001", NOW, false)]);

        let report = h.engine.sync_gossip(NOW).await;
        assert_eq!(report.pods_merged, 1);
        assert_eq!(report.peers_answered, 2);

        let node = h.store.node(&addr("1.2.3.4")).unwrap().unwrap();
        assert_eq!(node.public_key.as_deref(), Some("pk-1.2.3.4:9001"));
    }

    #[tokio::test]
    async fn test_public_key_kept_when_gossip_lacks_it() {
        let h = harness();
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, false)]);
        h.engine.sync_gossip(NOW).await;

        let mut anonymous = pod("1.2.3.4:9001", NOW + 10, false);
        anonymous.public_key = None;
        anonymous.version = None;
        h.rpc.set_gossip(PEER_A, vec![anonymous]);
        h.engine.sync_gossip(NOW + 10).await;

        let node = h.store.node(&addr("1.2.3.4")).unwrap().unwrap();
        assert_eq!(node.public_key.as_deref(), Some("pk-1.2.3.4:9001"));
        assert_eq!(node.version.as_deref(), Some("0.8.0"));
        assert_eq!(node.last_seen_at, NOW + 10);
    }

    #[tokio::test]
    async fn test_private_history_continuity() {
        let h = harness();
        let a = addr("1.2.3.4");

        for cycle in 0..10u64 {
            let now = NOW + cycle * 15;
            let mut record = pod("1.2.3.4:9001", now, false);
            record.storage_committed = 1_000 + cycle;
            h.rpc.set_gossip(PEER_A, vec![record]);
            h.engine.run_cycle_at(now).await.unwrap();
        }

        let samples = h.store.samples(&a).unwrap();
        assert_eq!(samples.len(), 10);
        for (i, sample) in samples.iter().enumerate() {
            assert!(!sample.has_live_metrics());
            assert_eq!(sample.total_bytes_stored, 1_000 + i as u64);
            assert_eq!(sample.used_bytes_stored, 250_000);
        }
        // private nodes are never polled directly
        assert_eq!(h.rpc.stats_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_offline_public_node_gets_gossip_sample() {
        let h = harness();
        h.rpc
            .set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW - 600, true)]);

        let report = h.engine.run_cycle_at(NOW).await.unwrap();
        assert_eq!(report.gossip.samples_written, 1);
        assert_eq!(report.metrics.polled, 0);
    }

    #[tokio::test]
    async fn test_public_metrics_phase() {
        let h = harness();
        let a = addr("1.2.3.4");
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, true)]);
        h.rpc.set_stats("1.2.3.4:6000", live_stats());

        let report = h.engine.run_cycle_at(NOW).await.unwrap();
        // active public node: no gossip sample, one live sample
        assert_eq!(report.gossip.samples_written, 0);
        assert_eq!(report.metrics, MetricsReport {
            polled: 1,
            succeeded: 1,
            failed: 0
        });

        let node = h.store.node(&a).unwrap().unwrap();
        assert_eq!(node.packets_in, 111);
        assert_eq!(node.packets_out, 222);
        assert_eq!(node.block_height, 77);
        assert_eq!(node.last_latency_ms, Some(42));

        let samples = h.store.samples(&a).unwrap();
        assert_eq!(samples.len(), 1);
        let sample = &samples[0];
        assert!(sample.has_live_metrics());
        assert_eq!(sample.cpu_percent, 12.5);
        assert_eq!(sample.total_bytes_stored, 65_536);
        // carried forward from gossip
        assert_eq!(sample.used_bytes_stored, 250_000);
    }

    #[tokio::test]
    async fn test_failed_poll_leaves_node_untouched() {
        let h = harness();
        let a = addr("1.2.3.4");
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, true)]);
        h.engine.sync_gossip(NOW).await;
        let before = h.store.node(&a).unwrap().unwrap();

        // no stats registered: the poll yields nothing
        let report = h.engine.sync_public_metrics(NOW).await.unwrap();
        assert_eq!(report.failed, 1);

        let after = h.store.node(&a).unwrap().unwrap();
        assert_eq!(before, after);
        assert!(after.is_active);
        assert!(h.store.samples(&a).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credits_gated_by_interval() {
        let h = harness();
        *h.credits.entries.lock() = Some(vec![CreditEntry {
            pod_id: "pk-1.2.3.4:9001".into(),
            credits: 500,
        }]);
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, false)]);

        let first = h.engine.run_cycle_at(NOW).await.unwrap();
        assert_eq!(
            first.credits,
            CreditsOutcome::Synced {
                entries: 1,
                nodes_updated: 1
            }
        );
        let second = h.engine.run_cycle_at(NOW + 15).await.unwrap();
        assert_eq!(second.credits, CreditsOutcome::Skipped);
        let third = h.engine.run_cycle_at(NOW + 300).await.unwrap();
        assert_eq!(third.credits, CreditsOutcome::Skipped);
        assert_eq!(h.credits.fetches.load(Ordering::SeqCst), 1);

        h.engine.run_cycle_at(NOW + 301).await.unwrap();
        assert_eq!(h.credits.fetches.load(Ordering::SeqCst), 2);

        assert_eq!(h.store.node(&addr("1.2.3.4")).unwrap().unwrap().credits, 500);
    }

    #[tokio::test]
    async fn test_credits_update_every_matching_node() {
        let h = harness();
        let mut first = pod("1.1.1.1:9001", NOW, false);
        first.public_key = Some("shared".into());
        let mut second = pod("2.2.2.2:9001", NOW, false);
        second.public_key = Some("shared".into());
        h.rpc.set_gossip(PEER_A, vec![first, second]);
        h.engine.sync_gossip(NOW).await;

        *h.credits.entries.lock() = Some(vec![CreditEntry {
            pod_id: "shared".into(),
            credits: 7,
        }]);
        let outcome = h.engine.sync_credits().await;
        assert_eq!(
            outcome,
            CreditsOutcome::Synced {
                entries: 1,
                nodes_updated: 2
            }
        );
    }

    #[tokio::test]
    async fn test_credits_failure_does_not_fail_cycle() {
        let h = harness();
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, false)]);

        let report = h.engine.run_cycle_at(NOW).await.unwrap();
        assert_eq!(report.credits, CreditsOutcome::Failed);
        assert_eq!(report.gossip.reconciled, 1);
    }

    #[tokio::test]
    async fn test_geo_resolved_once() {
        let h = harness();
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, false)]);

        h.engine.sync_gossip(NOW).await;
        h.engine.sync_gossip(NOW + 15).await;

        assert_eq!(h.geo.lookups.load(Ordering::SeqCst), 1);
        let node = h.store.node(&addr("1.2.3.4")).unwrap().unwrap();
        assert_eq!(node.location.country.as_deref(), Some("Germany"));
        assert!(node.location.has_coordinates());
    }

    #[tokio::test]
    async fn test_geo_retried_after_failure() {
        let h = harness();
        *h.geo.fail.lock() = true;
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, false)]);

        h.engine.sync_gossip(NOW).await;
        let node = h.store.node(&addr("1.2.3.4")).unwrap().unwrap();
        assert!(!node.location.has_coordinates());

        *h.geo.fail.lock() = false;
        h.engine.sync_gossip(NOW + 15).await;
        assert_eq!(h.geo.lookups.load(Ordering::SeqCst), 2);
        assert!(
            h.store
                .node(&addr("1.2.3.4"))
                .unwrap()
                .unwrap()
                .location
                .has_coordinates()
        );
    }

    #[tokio::test]
    async fn test_all_peers_down_is_noop() {
        let h = harness();

        let report = h.engine.run_cycle_at(NOW).await.unwrap();
        assert_eq!(report.gossip.peers_queried, 2);
        assert_eq!(report.gossip.peers_answered, 0);
        assert_eq!(report.gossip.pods_merged, 0);
        assert!(h.store.nodes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_listing_fallback() {
        let h = harness();
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, false)]);
        h.rpc.legacy.lock().insert(
            PEER_B.to_string(),
            vec!["1.2.3.4:9001".to_string(), "5.6.7.8:9001".to_string()],
        );

        let report = h.engine.sync_gossip(NOW).await;
        assert_eq!(report.peers_answered, 1);
        assert_eq!(report.peers_legacy, 1);
        assert_eq!(report.bare_addresses, 1);
        assert_eq!(report.new_nodes, 2);

        // full record wins over the bare listing
        let full = h.store.node(&addr("1.2.3.4")).unwrap().unwrap();
        assert!(full.is_active);
        let bare = h.store.node(&addr("5.6.7.8")).unwrap().unwrap();
        assert!(!bare.is_active);
        assert!(h.store.samples(&bare.address).unwrap().is_empty());

        // a stored node seen only through the bare listing is left alone
        h.rpc.gossip.lock().clear();
        h.rpc
            .legacy
            .lock()
            .insert(PEER_B.to_string(), vec!["1.2.3.4:9001".to_string()]);
        let report = h.engine.sync_gossip(NOW + 15).await;
        assert_eq!(report.transitions() + report.new_nodes, 0);
        assert!(h.store.node(&addr("1.2.3.4")).unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_refresh_subset() {
        let h = harness();
        h.rpc.set_gossip(
            PEER_A,
            vec![pod("1.1.1.1:9001", NOW, true), pod("2.2.2.2:9001", NOW, true)],
        );
        h.engine.sync_gossip(NOW).await;
        h.rpc.set_stats("1.1.1.1:6000", live_stats());
        h.rpc.set_stats("2.2.2.2:6000", live_stats());

        let report = h
            .engine
            .refresh_at(&["1.1.1.1:9001", "1.1.1.1", "9.9.9.9", "::bad::"], NOW + 5)
            .await
            .unwrap();
        assert_eq!(
            report,
            RefreshReport {
                requested: 4,
                invalid: 1,
                found: 1,
                updated: 1
            }
        );
        assert_eq!(h.rpc.stats_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.store.samples(&addr("1.1.1.1")).unwrap().len(), 1);
        assert!(h.store.samples(&addr("2.2.2.2")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_probe_scores_live_metrics() {
        let h = harness();
        h.rpc.set_stats("1.2.3.4:6000", live_stats());

        let probe = h.engine.probe("1.2.3.4:9001").await.unwrap();
        assert_eq!(probe.address, addr("1.2.3.4"));
        assert_eq!(probe.version.as_deref(), Some("0.8.0"));
        assert_eq!(probe.detailed_score, Some(100));

        let silent = h.engine.probe("9.9.9.9").await.unwrap();
        assert!(silent.stats.is_none());
        assert_eq!(silent.detailed_score, None);
        assert!(h.store.nodes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_small_chunks() {
        let config = CrawlerConfig {
            bootstrap_peers: vec![PEER_A.to_string()],
            chunk_size: 1,
            ..Default::default()
        };
        let h = harness_with(Arc::new(MemoryStore::new()), config);
        h.rpc.set_gossip(
            PEER_A,
            (1..=5).map(|i| pod(&format!("10.1.0.{i}:9001"), NOW, false)).collect(),
        );

        let report = h.engine.sync_gossip(NOW).await;
        assert_eq!(report.reconciled, 5);
        assert_eq!(h.store.nodes().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_cycle_flushes_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podscope.json");
        let store = Arc::new(FileStore::new(&path).unwrap());
        let config = CrawlerConfig {
            bootstrap_peers: vec![PEER_A.to_string()],
            ..Default::default()
        };
        let h = harness_with(store.clone(), config);
        h.rpc.set_gossip(PEER_A, vec![pod("1.2.3.4:9001", NOW, false)]);

        h.engine.run_cycle_at(NOW).await.unwrap();
        assert!(!store.is_dirty());

        let reopened = FileStore::new(&path).unwrap();
        assert!(reopened.node(&addr("1.2.3.4")).unwrap().is_some());
    }

    /// Fails every write to one address.
    struct FlakyStore {
        inner: MemoryStore,
        broken: NodeAddress,
    }

    impl FlakyStore {
        fn check(&self, address: &NodeAddress) -> Result<(), StoreError> {
            if address == &self.broken {
                Err(StoreError::Io(std::io::Error::other("disk full")))
            } else {
                Ok(())
            }
        }
    }

    impl NodeStore for FlakyStore {
        fn node(&self, address: &NodeAddress) -> Result<Option<Node>, StoreError> {
            self.inner.node(address)
        }

        fn nodes(&self) -> Result<Vec<Node>, StoreError> {
            self.inner.nodes()
        }

        fn upsert_node(
            &self,
            address: &NodeAddress,
            now: u64,
            apply: &mut dyn FnMut(&mut Node),
        ) -> Result<Node, StoreError> {
            self.check(address)?;
            self.inner.upsert_node(address, now, apply)
        }

        fn update_node(
            &self,
            address: &NodeAddress,
            apply: &mut dyn FnMut(&mut Node),
        ) -> Result<Option<Node>, StoreError> {
            self.check(address)?;
            self.inner.update_node(address, apply)
        }

        fn set_credits_by_public_key(
            &self,
            public_key: &str,
            credits: u64,
        ) -> Result<usize, StoreError> {
            self.inner.set_credits_by_public_key(public_key, credits)
        }

        fn append_sample(
            &self,
            address: &NodeAddress,
            sample: StatSample,
        ) -> Result<(), StoreError> {
            self.check(address)?;
            self.inner.append_sample(address, sample)
        }

        fn samples(&self, address: &NodeAddress) -> Result<Vec<StatSample>, StoreError> {
            self.inner.samples(address)
        }

        fn record_activity(&self, entry: ActivityLogEntry) -> Result<(), StoreError> {
            self.inner.record_activity(entry)
        }

        fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityLogEntry>, StoreError> {
            self.inner.recent_activity(limit)
        }

        fn normalize_addresses(&self, rpc_port: u16) -> Result<usize, StoreError> {
            self.inner.normalize_addresses(rpc_port)
        }
    }

    #[tokio::test]
    async fn test_store_failure_isolated_to_node() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            broken: addr("2.2.2.2"),
        });
        let config = CrawlerConfig {
            bootstrap_peers: vec![PEER_A.to_string()],
            ..Default::default()
        };
        let h = harness_with(store, config);
        h.rpc.set_gossip(
            PEER_A,
            vec![
                pod("1.1.1.1:9001", NOW, false),
                pod("2.2.2.2:9001", NOW, false),
                pod("3.3.3.3:9001", NOW, false),
            ],
        );

        let report = h.engine.run_cycle_at(NOW).await.unwrap();
        assert_eq!(report.gossip.reconciled, 2);
        assert_eq!(report.gossip.failed, 1);
        assert!(h.store.node(&addr("1.1.1.1")).unwrap().is_some());
        assert!(h.store.node(&addr("2.2.2.2")).unwrap().is_none());
        assert!(h.store.node(&addr("3.3.3.3")).unwrap().is_some());
        // no activity for the node that was never stored
        assert_eq!(h.store.recent_activity(10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_repair_addresses() {
        let h = harness();
        let legacy: NodeAddress = "1.2.3.4:9001".parse().unwrap();
        h.store.upsert_node(&legacy, NOW, &mut |_| {}).unwrap();

        assert_eq!(h.engine.repair_addresses().unwrap(), 1);
        assert!(h.store.node(&addr("1.2.3.4")).unwrap().is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CrawlerConfig {
            chunk_size: 0,
            ..Default::default()
        };
        let result = ReconciliationEngine::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(FakeRpc::default()),
            Arc::new(FakeGeo::default()),
            Arc::new(FakeCredits::default()),
            Arc::new(RecordingNotify::default()),
        );
        assert_matches!(result, Err(CrawlerError::Config(_)));
    }
}
