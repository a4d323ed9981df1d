//! Logical data model and persistence for the pod crawler.
//!
//! - [`address`] - canonical `host:rpc-port` node keys
//! - [`model`] - nodes, stat samples, activity entries, subscribers
//! - [`store`] - [`NodeStore`] / [`SubscriberStore`] traits with memory and JSON file backends
//! - [`query`] - listing filters and network analytics over stored nodes

pub mod address;
pub mod model;
pub mod query;
pub mod store;

pub use address::{AddressError, NodeAddress};
pub use model::{
    ActivityKind, ActivityLogEntry, Location, Node, StatSample, Subscriber, WatchedNode,
    UNKNOWN_COUNTRY,
};
pub use query::{
    GroupCount, GrowthPoint, NetworkSummary, NodeQuery, Reachability, SortKey, SortOrder,
    network_growth, provider_distribution,
};
pub use store::{
    DEFAULT_ACTIVITY_ENTRIES, DEFAULT_SAMPLES_PER_NODE, FileStore, MemoryStore, NodeStore,
    Retention, StoreError, SubscriberStore,
};
