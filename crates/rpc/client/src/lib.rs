//! JSON-RPC client for storage pods.
//!
//! Pods serve JSON-RPC 2.0 over plain HTTP at `http://<ip>:6000/rpc`. The
//! client exposes the four read-only methods the crawler needs and never
//! surfaces an error to its caller: timeouts, transport failures, protocol
//! errors and undecodable payloads all come back as `None`, after being
//! logged and counted.
//!
//! Both shapes of the `get-stats` payload are normalized into [`NodeStats`]
//! at this boundary.

use async_trait::async_trait;

mod client;
mod error;
pub mod lenient;
mod metrics;
mod types;

pub use client::{
    DEFAULT_PROBE_TIMEOUT, DEFAULT_TIMEOUT, HttpNodeRpc, RpcClient, RpcClientConfig,
};
pub use error::RpcError;
pub use types::{NodeStats, PodRecord, RpcMethod, Timed};

/// Queries against arbitrary pod endpoints.
#[async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait NodeRpc: Send + Sync {
    /// Software version, or `None` if the pod did not answer the probe.
    async fn get_version(&self, endpoint: &str) -> Option<String>;

    /// Live metrics with measured round-trip time.
    async fn get_stats(&self, endpoint: &str) -> Option<Timed<NodeStats>>;

    /// Gossip view of the queried peer. `None` means the peer did not
    /// answer; an empty list means it answered with no pods.
    async fn get_pods_with_stats(&self, endpoint: &str) -> Option<Vec<PodRecord>>;

    /// Legacy bare address list.
    async fn get_pods(&self, endpoint: &str) -> Option<Vec<String>>;
}
