//! In-memory store (does not persist across restarts).

use parking_lot::RwLock;

use crate::address::NodeAddress;
use crate::model::{ActivityLogEntry, Node, StatSample, Subscriber};

use super::state::StoreState;
use super::{NodeStore, Retention, StoreError, SubscriberStore};

/// In-memory store for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    retention: Retention,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retention` history.
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.set_retention(retention);
        self
    }

    pub(crate) fn set_retention(&mut self, retention: Retention) {
        self.state.get_mut().enforce_retention(&retention);
        self.retention = retention;
    }

    pub(crate) fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
            retention: Retention::default(),
        }
    }

    pub(crate) fn state(&self) -> &RwLock<StoreState> {
        &self.state
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }
}

impl NodeStore for MemoryStore {
    fn node(&self, address: &NodeAddress) -> Result<Option<Node>, StoreError> {
        Ok(self.state.read().node(address))
    }

    fn nodes(&self) -> Result<Vec<Node>, StoreError> {
        Ok(self.state.read().nodes())
    }

    fn upsert_node(
        &self,
        address: &NodeAddress,
        now: u64,
        apply: &mut dyn FnMut(&mut Node),
    ) -> Result<Node, StoreError> {
        Ok(self.state.write().upsert_node(address, now, apply))
    }

    fn update_node(
        &self,
        address: &NodeAddress,
        apply: &mut dyn FnMut(&mut Node),
    ) -> Result<Option<Node>, StoreError> {
        Ok(self.state.write().update_node(address, apply))
    }

    fn set_credits_by_public_key(
        &self,
        public_key: &str,
        credits: u64,
    ) -> Result<usize, StoreError> {
        Ok(self
            .state
            .write()
            .set_credits_by_public_key(public_key, credits)
            .len())
    }

    fn append_sample(&self, address: &NodeAddress, sample: StatSample) -> Result<(), StoreError> {
        self.state
            .write()
            .append_sample(address, sample, self.retention.samples_per_node)
    }

    fn samples(&self, address: &NodeAddress) -> Result<Vec<StatSample>, StoreError> {
        Ok(self.state.read().samples(address))
    }

    fn latest_sample(&self, address: &NodeAddress) -> Result<Option<StatSample>, StoreError> {
        Ok(self.state.read().latest_sample(address))
    }

    fn record_activity(&self, entry: ActivityLogEntry) -> Result<(), StoreError> {
        self.state
            .write()
            .record_activity(entry, self.retention.activity_entries);
        Ok(())
    }

    fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityLogEntry>, StoreError> {
        Ok(self.state.read().recent_activity(limit))
    }

    fn normalize_addresses(&self, rpc_port: u16) -> Result<usize, StoreError> {
        Ok(self.state.write().normalize_addresses(rpc_port))
    }
}

impl SubscriberStore for MemoryStore {
    fn subscriber(&self, connect_code: &str) -> Result<Option<Subscriber>, StoreError> {
        Ok(self.state.read().subscribers.get(connect_code).cloned())
    }

    fn subscriber_by_channel(&self, channel_id: &str) -> Result<Option<Subscriber>, StoreError> {
        Ok(self.state.read().subscriber_by_channel(channel_id))
    }

    fn get_or_create_subscriber(
        &self,
        connect_code: &str,
        now: u64,
    ) -> Result<Subscriber, StoreError> {
        Ok(self
            .state
            .write()
            .get_or_create_subscriber(connect_code, now))
    }

    fn link_channel(
        &self,
        connect_code: &str,
        channel_id: &str,
    ) -> Result<Option<Subscriber>, StoreError> {
        Ok(self.state.write().link_channel(connect_code, channel_id))
    }

    fn watch(&self, connect_code: &str, address: &NodeAddress) -> Result<bool, StoreError> {
        self.state.write().watch(connect_code, address)
    }

    fn unwatch(&self, connect_code: &str, address: &NodeAddress) -> Result<bool, StoreError> {
        Ok(self.state.write().unwatch(connect_code, address))
    }

    fn watched_by(&self, connect_code: &str) -> Result<Vec<NodeAddress>, StoreError> {
        Ok(self.state.read().watched_by(connect_code))
    }

    fn watchers(&self, address: &NodeAddress) -> Result<Vec<Subscriber>, StoreError> {
        Ok(self.state.read().watchers(address))
    }
}
