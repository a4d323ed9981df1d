//! `node` - one stored node and its recent history.

use eyre::{Result, bail};
use podscope_storage::{NodeAddress, NodeStore};

use super::{format_age, format_timestamp};
use crate::context::Context;

/// Samples shown when `--samples` is not given.
pub(crate) const DEFAULT_DETAIL_SAMPLES: usize = 200;

pub(crate) fn run(ctx: Context, address: &str, samples: usize, json: bool) -> Result<()> {
    let address = NodeAddress::with_rpc_port(address, ctx.config.crawler.rpc_port)?;
    let store = ctx.open_store()?;
    let Some(node) = store.node(&address)? else {
        bail!("unknown node {address}");
    };
    let history = store.recent_samples(&address, samples)?;

    if json {
        let detail = serde_json::json!({ "node": node, "samples": history });
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let now = podscope_crawler::unix_now();
    println!("address:    {}", node.address);
    println!("public key: {}", node.public_key.as_deref().unwrap_or("-"));
    println!("version:    {}", node.version.as_deref().unwrap_or("-"));
    println!(
        "status:     {}, {}",
        if node.is_active { "online" } else { "offline" },
        if node.is_rpc_active { "public" } else { "private" }
    );
    println!("score:      {}", node.health_score);
    println!("credits:    {}", node.credits);
    println!(
        "storage:    {} used / {} committed bytes",
        node.storage_used_bytes, node.storage_committed_bytes
    );
    println!("height:     {}", node.block_height);
    match node.last_latency_ms {
        Some(latency) => println!("latency:    {latency}ms"),
        None => println!("latency:    -"),
    }
    println!(
        "location:   {}, {} ({})",
        node.location.city.as_deref().unwrap_or("-"),
        node.country_or_unknown(),
        node.location.isp.as_deref().unwrap_or("-")
    );
    println!("first seen: {}", format_timestamp(node.first_seen_at));
    println!("last seen:  {}", format_age(node.last_seen_at, now));

    if history.is_empty() {
        println!("no samples recorded");
        return Ok(());
    }
    println!();
    println!(
        "{:<20} {:>6} {:>14} {:>10} {:>8} {:>16}",
        "RECORDED", "CPU%", "RAM USED", "HEIGHT", "STREAMS", "USED BYTES"
    );
    for sample in &history {
        println!(
            "{:<20} {:>6.1} {:>14} {:>10} {:>8} {:>16}",
            format_timestamp(sample.recorded_at),
            sample.cpu_percent,
            sample.ram_used_bytes,
            sample.block_height,
            sample.active_streams,
            sample.used_bytes_stored,
        );
    }
    Ok(())
}
