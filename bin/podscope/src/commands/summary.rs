//! `summary` - network totals, providers and growth.

use eyre::Result;
use podscope_crawler::unix_now;
use podscope_storage::{NetworkSummary, NodeStore, network_growth, provider_distribution};

use super::format_timestamp;
use crate::context::Context;

/// Days covered by the growth series.
const GROWTH_DAYS: u64 = 7;

pub(crate) fn run(ctx: Context, json: bool) -> Result<()> {
    let store = ctx.open_store()?;
    let nodes = store.nodes()?;
    let summary = NetworkSummary::from_nodes(&nodes);
    let providers = provider_distribution(&nodes);
    let growth = network_growth(&nodes, unix_now(), GROWTH_DAYS);

    if json {
        let report = serde_json::json!({
            "summary": summary,
            "providers": providers,
            "growth": growth,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "nodes:      {} active / {} known",
        summary.active_nodes, summary.total_nodes
    );
    println!(
        "storage:    {} bytes active / {} bytes total",
        summary.storage_active_bytes, summary.storage_all_bytes
    );
    println!("latency:    {}ms average", summary.average_latency_ms);
    println!(
        "countries:  {} active / {} known",
        summary.countries_active, summary.countries_all
    );
    for country in &summary.top_countries {
        println!("  {:<24} {:>6}", country.name, country.count);
    }

    println!("providers:");
    for provider in &providers {
        println!("  {:<24} {:>6}", provider.name, provider.count);
    }

    println!("growth:");
    for point in &growth {
        // date part of the RFC 3339 timestamp
        let day = format_timestamp(point.day_start);
        println!("  {:<24} {:>6}", day.get(..10).unwrap_or(day.as_str()), point.total);
    }
    Ok(())
}
