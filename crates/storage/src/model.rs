//! Persisted records.
//!
//! All timestamps are unix seconds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::NodeAddress;

/// Country recorded when geolocation is unknown.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Geolocation fields of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub isp: Option<String>,
}

impl Location {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// One network participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub address: NodeAddress,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Seen by gossip within the liveness window.
    #[serde(default)]
    pub is_active: bool,
    /// Directly pollable over RPC.
    #[serde(default)]
    pub is_rpc_active: bool,
    #[serde(default)]
    pub storage_committed_bytes: u64,
    #[serde(default)]
    pub storage_used_bytes: u64,
    #[serde(default)]
    pub packets_in: u64,
    #[serde(default)]
    pub packets_out: u64,
    #[serde(default)]
    pub block_height: u64,
    #[serde(default)]
    pub last_latency_ms: Option<u64>,
    #[serde(default)]
    pub health_score: u8,
    #[serde(default)]
    pub credits: u64,
    #[serde(default, flatten)]
    pub location: Location,
    pub first_seen_at: u64,
    #[serde(default)]
    pub last_seen_at: u64,
    #[serde(default)]
    pub gossip_uptime_secs: u64,
}

impl Node {
    /// Empty record first seen at `now`.
    pub fn new(address: NodeAddress, now: u64) -> Self {
        Self {
            address,
            public_key: None,
            version: None,
            is_active: false,
            is_rpc_active: false,
            storage_committed_bytes: 0,
            storage_used_bytes: 0,
            packets_in: 0,
            packets_out: 0,
            block_height: 0,
            last_latency_ms: None,
            health_score: 0,
            credits: 0,
            location: Location::default(),
            first_seen_at: now,
            last_seen_at: 0,
            gossip_uptime_secs: 0,
        }
    }

    /// Country for activity entries, falling back to [`UNKNOWN_COUNTRY`].
    pub fn country_or_unknown(&self) -> &str {
        self.location.country.as_deref().unwrap_or(UNKNOWN_COUNTRY)
    }
}

/// One time-stamped measurement of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSample {
    pub recorded_at: u64,
    pub cpu_percent: f64,
    pub ram_used_bytes: u64,
    pub ram_total_bytes: u64,
    pub uptime_secs: u64,
    pub active_streams: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub block_height: u64,
    pub total_bytes_stored: u64,
    pub used_bytes_stored: u64,
}

impl StatSample {
    /// Best-effort sample for a node that could not be polled directly.
    /// Storage and uptime come from gossip, live metrics are zero.
    pub fn from_gossip(
        recorded_at: u64,
        storage_committed: u64,
        storage_used: u64,
        uptime_secs: u64,
    ) -> Self {
        Self {
            recorded_at,
            cpu_percent: 0.0,
            ram_used_bytes: 0,
            ram_total_bytes: 0,
            uptime_secs,
            active_streams: 0,
            packets_in: 0,
            packets_out: 0,
            block_height: 0,
            total_bytes_stored: storage_committed,
            used_bytes_stored: storage_used,
        }
    }

    pub fn has_live_metrics(&self) -> bool {
        self.cpu_percent != 0.0
            || self.ram_used_bytes != 0
            || self.ram_total_bytes != 0
            || self.active_streams != 0
            || self.packets_in != 0
            || self.packets_out != 0
            || self.block_height != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    NewNode,
    Online,
    Offline,
    Update,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewNode => "NEW_NODE",
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
            Self::Update => "UPDATE",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub node_address: NodeAddress,
    pub country: String,
    pub kind: ActivityKind,
    pub message: String,
    pub created_at: u64,
}

impl ActivityLogEntry {
    pub fn new(
        node_address: NodeAddress,
        country: Option<&str>,
        kind: ActivityKind,
        message: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            node_address,
            country: country.unwrap_or(UNKNOWN_COUNTRY).to_string(),
            kind,
            message: message.into(),
            created_at,
        }
    }
}

/// External party receiving alerts, identified by a short connect code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub connect_code: String,
    /// Notification-channel identity, set once pairing completes.
    #[serde(default)]
    pub channel_id: Option<String>,
    pub created_at: u64,
}

impl Subscriber {
    pub fn is_linked(&self) -> bool {
        self.channel_id.is_some()
    }
}

/// A subscriber watching a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatchedNode {
    pub connect_code: String,
    pub node_address: NodeAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> NodeAddress {
        NodeAddress::with_rpc_port("10.0.0.1", 6000).unwrap()
    }

    #[test]
    fn test_gossip_sample_has_no_live_metrics() {
        let sample = StatSample::from_gossip(100, 1_000, 250, 3_600);
        assert!(!sample.has_live_metrics());
        assert_eq!(sample.total_bytes_stored, 1_000);
        assert_eq!(sample.used_bytes_stored, 250);
        assert_eq!(sample.uptime_secs, 3_600);
    }

    #[test]
    fn test_activity_kind_wire_names() {
        let json = serde_json::to_string(&ActivityKind::NewNode).unwrap();
        assert_eq!(json, "\"NEW_NODE\"");
        assert_eq!(ActivityKind::Offline.to_string(), "OFFLINE");
    }

    #[test]
    fn test_activity_defaults_country() {
        let entry = ActivityLogEntry::new(addr(), None, ActivityKind::Online, "Node went ONLINE", 5);
        assert_eq!(entry.country, UNKNOWN_COUNTRY);
    }

    #[test]
    fn test_node_json_roundtrip_keeps_location() {
        let mut node = Node::new(addr(), 42);
        node.location.country = Some("Germany".into());
        node.location.latitude = Some(50.1);
        node.location.longitude = Some(8.6);

        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
        assert!(back.location.has_coordinates());
        assert_eq!(back.country_or_unknown(), "Germany");
    }
}
