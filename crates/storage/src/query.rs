//! Read-side queries over stored nodes: listing filters and network analytics.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Node, UNKNOWN_COUNTRY};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// How many countries and providers are listed by name.
pub const TOP_GROUPS: usize = 5;

/// Label of the bucket collecting providers beyond the top ones.
pub const OTHER_PROVIDERS: &str = "Others";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// Directly reachable over RPC.
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Score,
    Credits,
    Height,
    /// Used storage bytes.
    Storage,
    /// Uptime reported by gossip.
    Uptime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Node listing filter. Nodes tied on the sort key are ordered by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeQuery {
    pub active_only: bool,
    pub reachability: Option<Reachability>,
    /// Exact country name.
    pub country: Option<String>,
    /// Exact version string.
    pub version: Option<String>,
    /// Substring of the address.
    pub search: Option<String>,
    pub sort: SortKey,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl NodeQuery {
    pub fn matches(&self, node: &Node) -> bool {
        if self.active_only && !node.is_active {
            return false;
        }
        match self.reachability {
            Some(Reachability::Public) if !node.is_rpc_active => return false,
            Some(Reachability::Private) if node.is_rpc_active => return false,
            _ => {}
        }
        if let Some(country) = &self.country {
            if node.location.country.as_ref() != Some(country) {
                return false;
            }
        }
        if let Some(version) = &self.version {
            if node.version.as_ref() != Some(version) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !node.address.as_str().contains(search.as_str()) {
                return false;
            }
        }
        true
    }

    fn compare(&self, a: &Node, b: &Node) -> Ordering {
        let by_key = match self.sort {
            SortKey::Score => a.health_score.cmp(&b.health_score),
            SortKey::Credits => a.credits.cmp(&b.credits),
            SortKey::Height => a.block_height.cmp(&b.block_height),
            SortKey::Storage => a.storage_used_bytes.cmp(&b.storage_used_bytes),
            SortKey::Uptime => a.gossip_uptime_secs.cmp(&b.gossip_uptime_secs),
        };
        let by_key = match self.order {
            SortOrder::Asc => by_key,
            SortOrder::Desc => by_key.reverse(),
        };
        by_key.then_with(|| a.address.cmp(&b.address))
    }

    /// Filter, sort and truncate `nodes`.
    pub fn apply(&self, mut nodes: Vec<Node>) -> Vec<Node> {
        nodes.retain(|node| self.matches(node));
        nodes.sort_by(|a, b| self.compare(a, b));
        if let Some(limit) = self.limit {
            nodes.truncate(limit);
        }
        nodes
    }
}

/// Named group and the number of nodes in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub name: String,
    pub count: usize,
}

/// Network-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkSummary {
    pub total_nodes: usize,
    pub active_nodes: usize,
    /// Committed storage of active nodes.
    pub storage_active_bytes: u64,
    /// Committed storage of every known node.
    pub storage_all_bytes: u64,
    /// Mean last latency of active public nodes, rounded.
    pub average_latency_ms: u64,
    /// Most common countries among active nodes.
    pub top_countries: Vec<GroupCount>,
    pub countries_active: usize,
    pub countries_all: usize,
}

fn known(name: Option<&String>) -> Option<&str> {
    name.map(String::as_str)
        .filter(|n| !n.is_empty() && *n != UNKNOWN_COUNTRY)
}

/// Group by name, largest first, ties by name.
fn ranked<'a>(names: impl Iterator<Item = &'a str>) -> Vec<GroupCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in names {
        *counts.entry(name).or_default() += 1;
    }
    let mut groups: Vec<GroupCount> = counts
        .into_iter()
        .map(|(name, count)| GroupCount {
            name: name.to_string(),
            count,
        })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    groups
}

impl NetworkSummary {
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let active = || nodes.iter().filter(|n| n.is_active);

        let latencies: Vec<u64> = active()
            .filter(|n| n.is_rpc_active)
            .filter_map(|n| n.last_latency_ms)
            .collect();
        let average_latency_ms = match latencies.len() as u64 {
            0 => 0,
            len => (latencies.iter().sum::<u64>() + len / 2) / len,
        };

        let mut top_countries = ranked(active().filter_map(|n| known(n.location.country.as_ref())));
        let countries_active = top_countries.len();
        top_countries.truncate(TOP_GROUPS);

        Self {
            total_nodes: nodes.len(),
            active_nodes: active().count(),
            storage_active_bytes: active().map(|n| n.storage_committed_bytes).sum(),
            storage_all_bytes: nodes.iter().map(|n| n.storage_committed_bytes).sum(),
            average_latency_ms,
            top_countries,
            countries_active,
            countries_all: ranked(nodes.iter().filter_map(|n| known(n.location.country.as_ref())))
                .len(),
        }
    }
}

/// Providers of every known node: the top ones by name, the rest summed
/// under [`OTHER_PROVIDERS`].
pub fn provider_distribution(nodes: &[Node]) -> Vec<GroupCount> {
    let mut groups = ranked(nodes.iter().filter_map(|n| known(n.location.isp.as_ref())));
    if groups.len() > TOP_GROUPS {
        let others = groups.split_off(TOP_GROUPS).iter().map(|g| g.count).sum();
        groups.push(GroupCount {
            name: OTHER_PROVIDERS.to_string(),
            count: others,
        });
    }
    groups
}

/// Known nodes at the end of one UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GrowthPoint {
    /// Unix time of the start of the day.
    pub day_start: u64,
    pub total: usize,
}

/// Running count of known nodes for the last `days` UTC days, ending with
/// the day containing `now`, bucketed by first-seen time.
pub fn network_growth(nodes: &[Node], now: u64, days: u64) -> Vec<GrowthPoint> {
    let today = now / SECS_PER_DAY;
    let first_day = today.saturating_sub(days.saturating_sub(1));

    let mut per_day: HashMap<u64, usize> = HashMap::new();
    for node in nodes {
        *per_day.entry(node.first_seen_at / SECS_PER_DAY).or_default() += 1;
    }

    let in_range: usize = (first_day..=today)
        .map(|day| per_day.get(&day).copied().unwrap_or_default())
        .sum();
    let mut total = nodes.len().saturating_sub(in_range);

    (first_day..=today)
        .map(|day| {
            total += per_day.get(&day).copied().unwrap_or_default();
            GrowthPoint {
                day_start: day * SECS_PER_DAY,
                total,
            }
        })
        .collect()
}
