//! Per-cycle summaries.

use std::fmt;
use std::time::Duration;

use podscope_rpc_client::{NodeStats, Timed};
use podscope_storage::NodeAddress;

/// Gossip discovery phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GossipReport {
    pub peers_queried: usize,
    pub peers_answered: usize,
    /// Peers that only answered the legacy bare listing.
    pub peers_legacy: usize,
    pub pods_merged: usize,
    pub bare_addresses: usize,
    pub reconciled: usize,
    pub failed: usize,
    pub new_nodes: usize,
    pub online: usize,
    pub offline: usize,
    pub samples_written: usize,
}

impl GossipReport {
    pub fn transitions(&self) -> usize {
        self.online + self.offline
    }
}

/// Public metrics phase, also used for refresh requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsReport {
    pub polled: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Credits phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditsOutcome {
    /// Interval not yet elapsed.
    Skipped,
    Synced { entries: usize, nodes_updated: usize },
    Failed,
}

/// Refresh request for an explicit address list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub requested: usize,
    /// Requested addresses that are not valid node addresses.
    pub invalid: usize,
    /// Requested addresses with a stored node.
    pub found: usize,
    pub updated: usize,
}

/// Direct query of a single pod.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub address: NodeAddress,
    pub version: Option<String>,
    pub stats: Option<Timed<NodeStats>>,
    /// Score from live metrics; `None` when `get-stats` failed.
    pub detailed_score: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub gossip: GossipReport,
    pub metrics: MetricsReport,
    pub credits: CreditsOutcome,
    pub duration: Duration,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pods={} reconciled={} failed={} new={} online={} offline={} samples={} polled={}/{}",
            self.gossip.pods_merged,
            self.gossip.reconciled,
            self.gossip.failed,
            self.gossip.new_nodes,
            self.gossip.online,
            self.gossip.offline,
            self.gossip.samples_written + self.metrics.succeeded,
            self.metrics.succeeded,
            self.metrics.polled,
        )?;
        match &self.credits {
            CreditsOutcome::Skipped => Ok(()),
            CreditsOutcome::Synced {
                entries,
                nodes_updated,
            } => write!(f, " credits={nodes_updated}/{entries}"),
            CreditsOutcome::Failed => write!(f, " credits=failed"),
        }
    }
}
