//! Persistence traits and implementations (memory, file).

mod file;
mod memory;
mod state;

use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::NodeAddress;
use crate::model::{ActivityLogEntry, Node, StatSample, Subscriber};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Default number of stat samples kept per node.
pub const DEFAULT_SAMPLES_PER_NODE: usize = 1_000;

/// Default number of activity entries kept.
pub const DEFAULT_ACTIVITY_ENTRIES: usize = 10_000;

/// How much history a store keeps. The oldest entries go first; `0` keeps
/// everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Retention {
    pub samples_per_node: usize,
    pub activity_entries: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            samples_per_node: DEFAULT_SAMPLES_PER_NODE,
            activity_entries: DEFAULT_ACTIVITY_ENTRIES,
        }
    }
}

impl Retention {
    /// Keep the full history.
    pub const fn unbounded() -> Self {
        Self {
            samples_per_node: 0,
            activity_entries: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("unknown node: {0}")]
    UnknownNode(NodeAddress),
    #[error("unknown subscriber: {0}")]
    UnknownSubscriber(String),
}

/// Node state, stat history and the activity log.
///
/// Every method touching one node is atomic for that node: readers observe
/// either the previous record or the fully applied update.
#[auto_impl(&, Box, Arc)]
pub trait NodeStore: Send + Sync {
    fn node(&self, address: &NodeAddress) -> Result<Option<Node>, StoreError>;

    /// All nodes ordered by address.
    fn nodes(&self) -> Result<Vec<Node>, StoreError>;

    /// Stored nodes among `addresses`; unknown addresses are skipped.
    fn nodes_by_address(&self, addresses: &[NodeAddress]) -> Result<Vec<Node>, StoreError> {
        let mut found = Vec::with_capacity(addresses.len());
        for address in addresses {
            if let Some(node) = self.node(address)? {
                found.push(node);
            }
        }
        Ok(found)
    }

    /// Nodes that are gossip-active and directly pollable.
    fn pollable_nodes(&self) -> Result<Vec<Node>, StoreError> {
        Ok(self
            .nodes()?
            .into_iter()
            .filter(|n| n.is_active && n.is_rpc_active)
            .collect())
    }

    /// Apply `apply` to the node at `address`, creating it with
    /// `first_seen_at = now` when absent. Returns the stored result.
    fn upsert_node(
        &self,
        address: &NodeAddress,
        now: u64,
        apply: &mut dyn FnMut(&mut Node),
    ) -> Result<Node, StoreError>;

    /// Apply `apply` to an existing node. `None` when the node is unknown.
    fn update_node(
        &self,
        address: &NodeAddress,
        apply: &mut dyn FnMut(&mut Node),
    ) -> Result<Option<Node>, StoreError>;

    /// Set credits on every node carrying `public_key`. Returns the number
    /// of nodes updated.
    fn set_credits_by_public_key(&self, public_key: &str, credits: u64)
    -> Result<usize, StoreError>;

    /// Append a sample, keeping history ordered by `recorded_at` and within
    /// the store's retention.
    fn append_sample(&self, address: &NodeAddress, sample: StatSample) -> Result<(), StoreError>;

    /// History of a node, oldest first.
    fn samples(&self, address: &NodeAddress) -> Result<Vec<StatSample>, StoreError>;

    /// Up to `limit` newest samples of a node, oldest first.
    fn recent_samples(
        &self,
        address: &NodeAddress,
        limit: usize,
    ) -> Result<Vec<StatSample>, StoreError> {
        let mut samples = self.samples(address)?;
        let skip = samples.len().saturating_sub(limit);
        samples.drain(..skip);
        Ok(samples)
    }

    /// Most recent sample of a node.
    fn latest_sample(&self, address: &NodeAddress) -> Result<Option<StatSample>, StoreError> {
        Ok(self.samples(address)?.pop())
    }

    /// Record an entry, dropping the oldest beyond the store's retention.
    fn record_activity(&self, entry: ActivityLogEntry) -> Result<(), StoreError>;

    /// Up to `limit` entries, newest first.
    fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityLogEntry>, StoreError>;

    /// Re-key nodes stored under a port other than `rpc_port`. A legacy
    /// record is dropped when the canonical record already exists, otherwise
    /// it is moved with its history. Returns the number of records touched.
    fn normalize_addresses(&self, rpc_port: u16) -> Result<usize, StoreError>;

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Subscribers and their watchlists.
///
/// Backends that also implement [`NodeStore`] persist subscriber changes on
/// [`NodeStore::flush`]. Reads reflect changes other processes persisted to
/// the same backend.
#[auto_impl(&, Box, Arc)]
pub trait SubscriberStore: Send + Sync {
    fn subscriber(&self, connect_code: &str) -> Result<Option<Subscriber>, StoreError>;

    fn subscriber_by_channel(&self, channel_id: &str) -> Result<Option<Subscriber>, StoreError>;

    fn get_or_create_subscriber(
        &self,
        connect_code: &str,
        now: u64,
    ) -> Result<Subscriber, StoreError>;

    /// Complete pairing by attaching a channel identity. `None` when the
    /// code is unknown.
    fn link_channel(
        &self,
        connect_code: &str,
        channel_id: &str,
    ) -> Result<Option<Subscriber>, StoreError>;

    /// Returns `true` when the pair was newly added.
    fn watch(&self, connect_code: &str, address: &NodeAddress) -> Result<bool, StoreError>;

    /// Returns `true` when the pair existed.
    fn unwatch(&self, connect_code: &str, address: &NodeAddress) -> Result<bool, StoreError>;

    fn watched_by(&self, connect_code: &str) -> Result<Vec<NodeAddress>, StoreError>;

    /// Subscribers watching `address`.
    fn watchers(&self, address: &NodeAddress) -> Result<Vec<Subscriber>, StoreError>;
}
