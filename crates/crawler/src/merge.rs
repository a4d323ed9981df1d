//! Merging gossip views from several peers.
//!
//! Each bootstrap peer reports its own view of the network, so the same pod
//! usually shows up several times. Views are merged by reported address; when
//! two reports disagree, a report carrying a public key beats one without,
//! otherwise the first report wins. The result is independent of which peer
//! answered first as far as the public key is concerned.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use podscope_rpc_client::PodRecord;
use podscope_storage::NodeAddress;
use tracing::trace;

fn prefer(existing: &PodRecord, candidate: &PodRecord) -> bool {
    existing.public_key.is_none() && candidate.public_key.is_some()
}

/// Insertion-ordered map applying the merge rule.
#[derive(Debug)]
struct Merger<K> {
    index: HashMap<K, usize>,
    records: Vec<(K, PodRecord)>,
}

impl<K> Default for Merger<K> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            records: Vec::new(),
        }
    }
}

impl<K: std::hash::Hash + Eq + Clone> Merger<K> {
    fn insert(&mut self, key: K, pod: PodRecord) {
        match self.index.entry(key) {
            Entry::Vacant(slot) => {
                let key = slot.key().clone();
                slot.insert(self.records.len());
                self.records.push((key, pod));
            }
            Entry::Occupied(slot) => {
                if let Some((_, existing)) = self.records.get_mut(*slot.get()) {
                    if prefer(existing, &pod) {
                        *existing = pod;
                    }
                }
            }
        }
    }

    fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    fn into_records(self) -> Vec<(K, PodRecord)> {
        self.records
    }
}

/// Merge peer views keyed by reported address.
pub fn merge_pods<I>(views: I) -> Vec<PodRecord>
where
    I: IntoIterator<Item = Vec<PodRecord>>,
{
    let mut merger = Merger::default();
    for view in views {
        for pod in view {
            merger.insert(pod.address.clone(), pod);
        }
    }
    merger.into_records().into_iter().map(|(_, pod)| pod).collect()
}

/// Pods of one cycle, keyed by canonical address.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Full gossip records.
    pub pods: Vec<(NodeAddress, PodRecord)>,
    /// Addresses only known from the legacy bare listing.
    pub bare: Vec<NodeAddress>,
    /// Reported addresses that could not be normalized.
    pub invalid: usize,
}

impl Discovery {
    /// Normalize merged records to canonical addresses. Pods reported under
    /// several ports of the same host collapse into one record with the same
    /// merge rule. Bare addresses already covered by a full record are
    /// dropped.
    pub fn build(merged: Vec<PodRecord>, bare: Vec<String>, rpc_port: u16) -> Self {
        let mut invalid = 0;
        let mut full = Merger::default();
        for pod in merged {
            match NodeAddress::with_rpc_port(&pod.address, rpc_port) {
                Ok(address) => full.insert(address, pod),
                Err(error) => {
                    trace!(address = %pod.address, %error, "skipping unparsable pod address");
                    invalid += 1;
                }
            }
        }

        let mut seen_bare = std::collections::HashSet::new();
        let mut bare_addresses = Vec::new();
        for reported in bare {
            match NodeAddress::with_rpc_port(&reported, rpc_port) {
                Ok(address) => {
                    if !full.contains(&address) && seen_bare.insert(address.clone()) {
                        bare_addresses.push(address);
                    }
                }
                Err(_) => invalid += 1,
            }
        }

        Self {
            pods: full.into_records(),
            bare: bare_addresses,
            invalid,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty() && self.bare.is_empty()
    }
}
