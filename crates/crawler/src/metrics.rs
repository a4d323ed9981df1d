//! Crawler metrics

use std::time::Duration;

use metrics::{Counter, Gauge, Histogram};
use podscope_storage::ActivityKind;

/// Crawler metrics
#[derive(Clone, Debug)]
pub(crate) struct CrawlerMetrics {
    /// Completed cycles
    pub(crate) cycles_total: Counter,
    /// Wall-clock duration of a cycle
    pub(crate) cycle_duration_seconds: Histogram,
    /// Unique pods after merging the last gossip round
    pub(crate) pods_merged: Gauge,
    /// Bootstrap peers that answered the last gossip round
    pub(crate) peers_answered: Gauge,
    /// Pods reconciled into the store
    pub(crate) pods_reconciled_total: Counter,
    /// Pods that failed to reconcile
    pub(crate) pods_failed_total: Counter,
    /// Stat samples appended
    pub(crate) samples_written_total: Counter,
    /// Successful direct stats polls
    pub(crate) polls_succeeded_total: Counter,
    /// Direct stats polls without data
    pub(crate) polls_failed_total: Counter,
    /// Nodes whose credits were updated
    pub(crate) credits_nodes_updated_total: Counter,
}

impl Default for CrawlerMetrics {
    fn default() -> Self {
        Self {
            cycles_total: metrics::counter!("crawler.cycles_total"),
            cycle_duration_seconds: metrics::histogram!("crawler.cycle_duration_seconds"),
            pods_merged: metrics::gauge!("crawler.gossip.pods_merged"),
            peers_answered: metrics::gauge!("crawler.gossip.peers_answered"),
            pods_reconciled_total: metrics::counter!("crawler.gossip.pods_reconciled_total"),
            pods_failed_total: metrics::counter!("crawler.gossip.pods_failed_total"),
            samples_written_total: metrics::counter!("crawler.samples_written_total"),
            polls_succeeded_total: metrics::counter!("crawler.public.polls_succeeded_total"),
            polls_failed_total: metrics::counter!("crawler.public.polls_failed_total"),
            credits_nodes_updated_total: metrics::counter!(
                "crawler.credits.nodes_updated_total"
            ),
        }
    }
}

impl CrawlerMetrics {
    pub(crate) fn record_cycle(&self, duration: Duration) {
        self.cycles_total.increment(1);
        self.cycle_duration_seconds.record(duration.as_secs_f64());
    }

    pub(crate) fn record_transition(&self, kind: ActivityKind) {
        metrics::counter!("crawler.transitions_total", "kind" => kind.as_str()).increment(1);
    }

    pub(crate) fn record_credits_run(&self, outcome: &'static str) {
        metrics::counter!("crawler.credits.runs_total", "outcome" => outcome).increment(1);
    }
}
