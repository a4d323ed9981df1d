//! Crawler for a network of storage pods.
//!
//! Every cycle the [`ReconciliationEngine`] runs three phases:
//!
//! 1. **Gossip**: query the bootstrap peers for their view of the network,
//!    merge the views, and reconcile every pod into the [`NodeStore`]. Liveness
//!    transitions are logged and dispatched to subscribers.
//! 2. **Public metrics**: poll active public pods directly with `get-stats`
//!    and append a live [`StatSample`].
//! 3. **Credits**: at most once per interval, fetch the credits feed and
//!    update every node with a matching public key.
//!
//! Failures of individual peers, pods or feeds are logged and never abort the
//! cycle; only a store failure outside a single pod does.
//!
//! [`NodeStore`]: podscope_storage::NodeStore
//! [`StatSample`]: podscope_storage::StatSample

mod config;
mod credits;
mod engine;
mod error;
mod merge;
mod metrics;
mod report;

pub use config::{
    CrawlerConfig, DEFAULT_BOOTSTRAP_PEERS, DEFAULT_CHUNK_SIZE, DEFAULT_CREDITS_INTERVAL_SECS,
    DEFAULT_CREDITS_URL, DEFAULT_CYCLE_INTERVAL_SECS, DEFAULT_FAILURE_COOLDOWN_SECS,
    DEFAULT_LIVENESS_WINDOW_SECS, DEFAULT_RPC_PATH, DEFAULT_RPC_PORT,
};
pub use credits::{CreditEntry, CreditsSource, HttpCreditsFeed, parse_feed};
pub use engine::{ReconciliationEngine, unix_now};
pub use error::{CrawlerError, CreditsError};
pub use merge::{Discovery, merge_pods};
pub use report::{
    CreditsOutcome, CycleReport, GossipReport, MetricsReport, ProbeReport, RefreshReport,
};
