//! Canonical result types.
//!
//! Wire payloads are decoded once here; everything downstream works with
//! these types only.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lenient;

/// JSON-RPC methods served by a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    GetVersion,
    GetStats,
    GetPodsWithStats,
    GetPods,
}

impl RpcMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GetVersion => "get-version",
            Self::GetStats => "get-stats",
            Self::GetPodsWithStats => "get-pods-with-stats",
            Self::GetPods => "get-pods",
        }
    }
}

impl std::fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A result together with the measured round-trip time of the call.
#[derive(Debug, Clone, PartialEq)]
pub struct Timed<T> {
    pub value: T,
    pub latency: Duration,
}

impl<T> Timed<T> {
    pub fn latency_ms(&self) -> u64 {
        u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Timed<U> {
        Timed {
            value: f(self.value),
            latency: self.latency,
        }
    }
}

/// One pod as seen through gossip by the queried peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRecord {
    /// Address as reported, usually `ip:gossip-port`.
    pub address: String,
    #[serde(
        default,
        rename = "pubkey",
        alias = "public_key",
        deserialize_with = "lenient::opt_string"
    )]
    pub public_key: Option<String>,
    #[serde(default, deserialize_with = "lenient::bool")]
    pub is_public: bool,
    /// Unix seconds.
    #[serde(default, deserialize_with = "lenient::u64")]
    pub last_seen_timestamp: u64,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub rpc_port: Option<u64>,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub storage_committed: u64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub storage_used: u64,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub storage_usage_percent: f64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub uptime: u64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub version: Option<String>,
}

impl PodRecord {
    /// Record carrying only an address, as returned by `get-pods`.
    pub fn bare(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            public_key: None,
            is_public: false,
            last_seen_timestamp: 0,
            rpc_port: None,
            storage_committed: 0,
            storage_used: 0,
            storage_usage_percent: 0.0,
            uptime: 0,
            version: None,
        }
    }
}

/// Live metrics of a single pod, from `get-stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    pub cpu_percent: f64,
    pub ram_used_bytes: u64,
    pub ram_total_bytes: u64,
    pub uptime_secs: u64,
    pub active_streams: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    /// Current index of the pod's storage log.
    pub block_height: u64,
    /// Raw size of the pod's storage file.
    pub total_bytes: u64,
    pub total_pages: u64,
    pub last_updated: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    total_bytes: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    total_pages: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    last_updated: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCounters {
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    cpu_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    ram_used: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    ram_total: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    uptime: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    packets_received: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    packets_sent: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    active_streams: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    current_index: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    total_bytes: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    total_pages: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    last_updated: Option<u64>,
}

/// `get-stats` payload. Newer pods nest counters under `stats` and storage
/// under `metadata`; older ones report everything at the top level.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawStats {
    #[serde(default)]
    metadata: Option<RawMetadata>,
    #[serde(default)]
    stats: Option<RawCounters>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    file_size: Option<u64>,
    #[serde(flatten)]
    flat: RawCounters,
}

/// First non-zero value, nested shape first.
fn pick(nested: Option<u64>, flat: Option<u64>) -> u64 {
    nested
        .filter(|v| *v != 0)
        .or(flat.filter(|v| *v != 0))
        .unwrap_or(0)
}

impl From<RawStats> for NodeStats {
    fn from(raw: RawStats) -> Self {
        let nested = raw.stats.unwrap_or_default();
        let meta = raw.metadata.unwrap_or_default();
        let flat = raw.flat;

        let cpu_percent = nested
            .cpu_percent
            .filter(|v| *v != 0.0)
            .or(flat.cpu_percent)
            .unwrap_or(0.0);

        Self {
            cpu_percent,
            ram_used_bytes: pick(nested.ram_used, flat.ram_used),
            ram_total_bytes: pick(nested.ram_total, flat.ram_total),
            uptime_secs: pick(nested.uptime, flat.uptime),
            active_streams: pick(nested.active_streams, flat.active_streams),
            packets_in: pick(nested.packets_received, flat.packets_received),
            packets_out: pick(nested.packets_sent, flat.packets_sent),
            block_height: pick(flat.current_index, nested.current_index),
            total_bytes: pick(raw.file_size, meta.total_bytes.or(flat.total_bytes)),
            total_pages: pick(meta.total_pages, flat.total_pages),
            last_updated: meta.last_updated.or(flat.last_updated),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionResult {
    pub(crate) version: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PodsResult {
    #[serde(default)]
    pub(crate) pods: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BareAddress {
    pub(crate) address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(json: &str) -> NodeStats {
        serde_json::from_str::<RawStats>(json).unwrap().into()
    }

    #[test]
    fn test_nested_stats() {
        let s = stats(
            r#"{
                "metadata": {"total_bytes": 4096, "total_pages": 3, "last_updated": 1700000000},
                "stats": {
                    "cpu_percent": 12.5, "ram_used": 1000, "ram_total": 8000,
                    "uptime": 90000, "packets_received": 11, "packets_sent": 22,
                    "active_streams": 2
                },
                "file_size": 65536,
                "current_index": 77
            }"#,
        );
        assert_eq!(s.cpu_percent, 12.5);
        assert_eq!(s.ram_used_bytes, 1000);
        assert_eq!(s.ram_total_bytes, 8000);
        assert_eq!(s.uptime_secs, 90000);
        assert_eq!(s.packets_in, 11);
        assert_eq!(s.packets_out, 22);
        assert_eq!(s.active_streams, 2);
        assert_eq!(s.block_height, 77);
        // file size wins over metadata
        assert_eq!(s.total_bytes, 65536);
        assert_eq!(s.total_pages, 3);
        assert_eq!(s.last_updated, Some(1_700_000_000));
    }

    #[test]
    fn test_flat_stats() {
        let s = stats(
            r#"{
                "cpu_percent": "3.5", "ram_used": 10, "ram_total": 20, "uptime": 30,
                "packets_received": 40, "packets_sent": 50, "active_streams": 1,
                "current_index": 9, "total_bytes": 2048, "total_pages": 1
            }"#,
        );
        assert_eq!(s.cpu_percent, 3.5);
        assert_eq!(s.ram_used_bytes, 10);
        assert_eq!(s.uptime_secs, 30);
        assert_eq!(s.packets_in, 40);
        assert_eq!(s.block_height, 9);
        assert_eq!(s.total_bytes, 2048);
        assert_eq!(s.total_pages, 1);
    }

    #[test]
    fn test_mixed_shape_prefers_nonzero() {
        let s = stats(
            r#"{
                "stats": {"cpu_percent": 0, "uptime": 0, "packets_received": 5},
                "uptime": 100,
                "cpu_percent": 7.0,
                "metadata": {"total_bytes": 512}
            }"#,
        );
        assert_eq!(s.uptime_secs, 100);
        assert_eq!(s.cpu_percent, 7.0);
        assert_eq!(s.packets_in, 5);
        assert_eq!(s.total_bytes, 512);
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(stats("{}"), NodeStats::default());
    }

    #[test]
    fn test_pod_record() {
        let pod: PodRecord = serde_json::from_str(
            r#"{
                "address": "109.199.96.218:9001",
                "is_public": true,
                "last_seen_timestamp": 1700000000,
                "pubkey": "ABCD",
                "rpc_port": 6000,
                "storage_committed": 1000000,
                "storage_usage_percent": 0.25,
                "storage_used": 2500,
                "uptime": 3600,
                "version": "0.8.0"
            }"#,
        )
        .unwrap();
        assert_eq!(pod.address, "109.199.96.218:9001");
        assert_eq!(pod.public_key.as_deref(), Some("ABCD"));
        assert!(pod.is_public);
        assert_eq!(pod.last_seen_timestamp, 1_700_000_000);
        assert_eq!(pod.storage_committed, 1_000_000);
        assert_eq!(pod.storage_used, 2500);
        assert_eq!(pod.version.as_deref(), Some("0.8.0"));
    }

    #[test]
    fn test_pod_record_sparse() {
        let pod: PodRecord =
            serde_json::from_str(r#"{"address": "1.2.3.4:9001", "pubkey": null, "is_public": null}"#)
                .unwrap();
        assert_eq!(pod, PodRecord::bare("1.2.3.4:9001"));
    }

    #[test]
    fn test_timed_latency() {
        let timed = Timed {
            value: 1,
            latency: Duration::from_micros(150_900),
        };
        assert_eq!(timed.latency_ms(), 150);
        assert_eq!(timed.map(|v| v + 1).value, 2);
    }
}
