//! `nodes` - list stored nodes.

use clap::{Args, ValueEnum};
use eyre::Result;
use podscope_crawler::unix_now;
use podscope_storage::{NodeQuery, NodeStore, Reachability, SortKey, SortOrder};

use super::format_age;
use crate::context::Context;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum StatusFilter {
    #[default]
    All,
    /// Seen by gossip within the liveness window.
    Active,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum AccessFilter {
    #[default]
    All,
    /// Directly reachable over RPC.
    Public,
    /// Not directly reachable.
    Private,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum SortArg {
    #[default]
    Score,
    Credits,
    /// Block height.
    Height,
    /// Used storage.
    Storage,
    /// Gossip uptime.
    Uptime,
}

#[derive(Debug, Args)]
pub(crate) struct NodesArgs {
    #[arg(long, value_enum, default_value_t = StatusFilter::All)]
    pub(crate) status: StatusFilter,

    #[arg(long = "type", value_enum, default_value_t = AccessFilter::All)]
    pub(crate) access: AccessFilter,

    /// Only nodes located in this country.
    #[arg(long)]
    pub(crate) country: Option<String>,

    /// Only nodes running this version.
    #[arg(long)]
    pub(crate) version: Option<String>,

    /// Only nodes whose address contains this text.
    #[arg(short = 's', long)]
    pub(crate) search: Option<String>,

    #[arg(long, value_enum, default_value_t = SortArg::Score)]
    pub(crate) sort: SortArg,

    /// Sort ascending instead of descending.
    #[arg(long)]
    pub(crate) asc: bool,

    /// Show at most this many nodes.
    #[arg(short = 'n', long)]
    pub(crate) limit: Option<usize>,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub(crate) json: bool,
}

impl NodesArgs {
    pub(crate) fn query(&self) -> NodeQuery {
        NodeQuery {
            active_only: self.status == StatusFilter::Active,
            reachability: match self.access {
                AccessFilter::All => None,
                AccessFilter::Public => Some(Reachability::Public),
                AccessFilter::Private => Some(Reachability::Private),
            },
            country: self.country.clone(),
            version: self.version.clone(),
            search: self.search.clone(),
            sort: match self.sort {
                SortArg::Score => SortKey::Score,
                SortArg::Credits => SortKey::Credits,
                SortArg::Height => SortKey::Height,
                SortArg::Storage => SortKey::Storage,
                SortArg::Uptime => SortKey::Uptime,
            },
            order: if self.asc { SortOrder::Asc } else { SortOrder::Desc },
            limit: self.limit,
        }
    }
}

pub(crate) fn run(ctx: Context, args: &NodesArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let nodes = args.query().apply(store.nodes()?);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    let now = unix_now();
    println!(
        "{:<24} {:>5} {:<7} {:<7} {:<10} {:<16} {:>10}  LAST SEEN",
        "ADDRESS", "SCORE", "STATUS", "ACCESS", "VERSION", "COUNTRY", "CREDITS"
    );
    for node in &nodes {
        println!(
            "{:<24} {:>5} {:<7} {:<7} {:<10} {:<16} {:>10}  {}",
            node.address.as_str(),
            node.health_score,
            if node.is_active { "online" } else { "offline" },
            if node.is_rpc_active { "public" } else { "private" },
            node.version.as_deref().unwrap_or("-"),
            node.country_or_unknown(),
            node.credits,
            format_age(node.last_seen_at, now),
        );
    }
    println!("{} nodes", nodes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Commands};

    fn parse(args: &[&str]) -> NodesArgs {
        let cli = Cli::try_parse_from(["podscope", "nodes"].iter().chain(args).copied()).unwrap();
        let Commands::Nodes(args) = cli.command else {
            panic!("expected nodes");
        };
        args
    }

    #[test]
    fn test_default_query() {
        assert_eq!(parse(&[]).query(), NodeQuery::default());
    }

    #[test]
    fn test_flags_build_query() {
        let query = parse(&[
            "--status",
            "active",
            "--type",
            "private",
            "--country",
            "Germany",
            "--version",
            "0.8.0",
            "-s",
            "10.0.",
            "--sort",
            "uptime",
            "--asc",
            "-n",
            "5",
        ])
        .query();
        assert_eq!(
            query,
            NodeQuery {
                active_only: true,
                reachability: Some(Reachability::Private),
                country: Some("Germany".into()),
                version: Some("0.8.0".into()),
                search: Some("10.0.".into()),
                sort: SortKey::Uptime,
                order: SortOrder::Asc,
                limit: Some(5),
            }
        );
    }

    #[test]
    fn test_rejects_unknown_sort_key() {
        assert!(Cli::try_parse_from(["podscope", "nodes", "--sort", "rank"]).is_err());
    }
}
