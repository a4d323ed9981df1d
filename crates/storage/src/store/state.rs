//! Backend-independent store state shared by the memory and file stores.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::address::NodeAddress;
use crate::model::{ActivityLogEntry, Node, StatSample, Subscriber, WatchedNode};

use super::{Retention, StoreError};

/// A subscriber change, replayed onto state loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubscriberOp {
    Create { connect_code: String, now: u64 },
    Link { connect_code: String, channel_id: String },
    Watch { connect_code: String, address: NodeAddress },
    Unwatch { connect_code: String, address: NodeAddress },
}

/// Keep the last `cap` items of an oldest-first list; `0` keeps everything.
fn truncate_front<T>(items: &mut Vec<T>, cap: usize) {
    if cap > 0 && items.len() > cap {
        items.drain(..items.len() - cap);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NodeRecord {
    pub(crate) node: Node,
    #[serde(default)]
    pub(crate) samples: Vec<StatSample>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct StoreState {
    pub(crate) nodes: BTreeMap<NodeAddress, NodeRecord>,
    /// Oldest first.
    pub(crate) activity: Vec<ActivityLogEntry>,
    pub(crate) subscribers: BTreeMap<String, Subscriber>,
    pub(crate) watched: BTreeSet<WatchedNode>,
}

impl StoreState {
    pub(crate) fn node(&self, address: &NodeAddress) -> Option<Node> {
        self.nodes.get(address).map(|r| r.node.clone())
    }

    pub(crate) fn nodes(&self) -> Vec<Node> {
        self.nodes.values().map(|r| r.node.clone()).collect()
    }

    pub(crate) fn upsert_node(
        &mut self,
        address: &NodeAddress,
        now: u64,
        apply: &mut dyn FnMut(&mut Node),
    ) -> Node {
        let record = self
            .nodes
            .entry(address.clone())
            .or_insert_with(|| NodeRecord {
                node: Node::new(address.clone(), now),
                samples: Vec::new(),
            });
        apply(&mut record.node);
        // the key is the identity
        record.node.address = address.clone();
        record.node.clone()
    }

    pub(crate) fn update_node(
        &mut self,
        address: &NodeAddress,
        apply: &mut dyn FnMut(&mut Node),
    ) -> Option<Node> {
        let record = self.nodes.get_mut(address)?;
        apply(&mut record.node);
        record.node.address = address.clone();
        Some(record.node.clone())
    }

    /// Returns the addresses of the updated nodes.
    pub(crate) fn set_credits_by_public_key(
        &mut self,
        public_key: &str,
        credits: u64,
    ) -> Vec<NodeAddress> {
        let mut updated = Vec::new();
        for (address, record) in &mut self.nodes {
            if record.node.public_key.as_deref() == Some(public_key) {
                record.node.credits = credits;
                updated.push(address.clone());
            }
        }
        updated
    }

    pub(crate) fn append_sample(
        &mut self,
        address: &NodeAddress,
        sample: StatSample,
        cap: usize,
    ) -> Result<(), StoreError> {
        let record = self
            .nodes
            .get_mut(address)
            .ok_or_else(|| StoreError::UnknownNode(address.clone()))?;
        // samples with equal timestamps keep arrival order
        let at = record
            .samples
            .partition_point(|s| s.recorded_at <= sample.recorded_at);
        record.samples.insert(at, sample);
        truncate_front(&mut record.samples, cap);
        Ok(())
    }

    pub(crate) fn samples(&self, address: &NodeAddress) -> Vec<StatSample> {
        self.nodes
            .get(address)
            .map(|r| r.samples.clone())
            .unwrap_or_default()
    }

    pub(crate) fn latest_sample(&self, address: &NodeAddress) -> Option<StatSample> {
        self.nodes.get(address).and_then(|r| r.samples.last().cloned())
    }

    pub(crate) fn record_activity(&mut self, entry: ActivityLogEntry, cap: usize) {
        let at = self
            .activity
            .partition_point(|e| e.created_at <= entry.created_at);
        self.activity.insert(at, entry);
        truncate_front(&mut self.activity, cap);
    }

    /// Drop the oldest samples and activity entries beyond `retention`.
    pub(crate) fn enforce_retention(&mut self, retention: &Retention) {
        for record in self.nodes.values_mut() {
            truncate_front(&mut record.samples, retention.samples_per_node);
        }
        truncate_front(&mut self.activity, retention.activity_entries);
    }

    pub(crate) fn recent_activity(&self, limit: usize) -> Vec<ActivityLogEntry> {
        self.activity.iter().rev().take(limit).cloned().collect()
    }

    pub(crate) fn normalize_addresses(&mut self, rpc_port: u16) -> usize {
        let legacy: Vec<NodeAddress> = self
            .nodes
            .keys()
            .filter(|a| a.port() != Some(rpc_port))
            .cloned()
            .collect();

        let mut touched = 0;
        for old in legacy {
            let Ok(canonical) = NodeAddress::with_rpc_port(old.as_str(), rpc_port) else {
                continue;
            };
            let Some(mut record) = self.nodes.remove(&old) else {
                continue;
            };
            touched += 1;
            self.rekey_watches(&old, &canonical);
            if self.nodes.contains_key(&canonical) {
                tracing::debug!(legacy = %old, canonical = %canonical, "dropping duplicate legacy node");
                continue;
            }
            tracing::debug!(legacy = %old, canonical = %canonical, "re-keying legacy node");
            record.node.address = canonical.clone();
            self.nodes.insert(canonical, record);
        }
        touched
    }

    fn rekey_watches(&mut self, old: &NodeAddress, new: &NodeAddress) {
        let moved: Vec<WatchedNode> = self
            .watched
            .iter()
            .filter(|w| &w.node_address == old)
            .cloned()
            .collect();
        for watch in moved {
            self.watched.remove(&watch);
            self.watched.insert(WatchedNode {
                connect_code: watch.connect_code,
                node_address: new.clone(),
            });
        }
    }

    pub(crate) fn subscriber_by_channel(&self, channel_id: &str) -> Option<Subscriber> {
        self.subscribers
            .values()
            .find(|s| s.channel_id.as_deref() == Some(channel_id))
            .cloned()
    }

    pub(crate) fn get_or_create_subscriber(&mut self, connect_code: &str, now: u64) -> Subscriber {
        self.subscribers
            .entry(connect_code.to_string())
            .or_insert_with(|| Subscriber {
                connect_code: connect_code.to_string(),
                channel_id: None,
                created_at: now,
            })
            .clone()
    }

    pub(crate) fn link_channel(&mut self, connect_code: &str, channel_id: &str) -> Option<Subscriber> {
        let subscriber = self.subscribers.get_mut(connect_code)?;
        subscriber.channel_id = Some(channel_id.to_string());
        Some(subscriber.clone())
    }

    pub(crate) fn watch(
        &mut self,
        connect_code: &str,
        address: &NodeAddress,
    ) -> Result<bool, StoreError> {
        if !self.subscribers.contains_key(connect_code) {
            return Err(StoreError::UnknownSubscriber(connect_code.to_string()));
        }
        Ok(self.watched.insert(WatchedNode {
            connect_code: connect_code.to_string(),
            node_address: address.clone(),
        }))
    }

    pub(crate) fn unwatch(&mut self, connect_code: &str, address: &NodeAddress) -> bool {
        self.watched.remove(&WatchedNode {
            connect_code: connect_code.to_string(),
            node_address: address.clone(),
        })
    }

    pub(crate) fn apply_subscriber_op(&mut self, op: &SubscriberOp) {
        match op {
            SubscriberOp::Create { connect_code, now } => {
                self.get_or_create_subscriber(connect_code, *now);
            }
            SubscriberOp::Link {
                connect_code,
                channel_id,
            } => {
                self.link_channel(connect_code, channel_id);
            }
            SubscriberOp::Watch {
                connect_code,
                address,
            } => {
                if let Err(error) = self.watch(connect_code, address) {
                    tracing::debug!(%connect_code, %address, %error, "dropping watch");
                }
            }
            SubscriberOp::Unwatch {
                connect_code,
                address,
            } => {
                self.unwatch(connect_code, address);
            }
        }
    }

    pub(crate) fn watched_by(&self, connect_code: &str) -> Vec<NodeAddress> {
        self.watched
            .iter()
            .filter(|w| w.connect_code == connect_code)
            .map(|w| w.node_address.clone())
            .collect()
    }

    pub(crate) fn watchers(&self, address: &NodeAddress) -> Vec<Subscriber> {
        self.watched
            .iter()
            .filter(|w| &w.node_address == address)
            .filter_map(|w| self.subscribers.get(&w.connect_code).cloned())
            .collect()
    }
}
