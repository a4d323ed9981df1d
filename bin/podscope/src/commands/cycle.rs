//! `cycle` - one full pass.

use eyre::Result;
use podscope_crawler::CreditsOutcome;

use crate::context::Context;

pub(crate) async fn run(ctx: Context) -> Result<()> {
    let store = ctx.open_store()?;
    let engine = ctx.build_engine(store)?;
    engine.repair_addresses()?;

    let report = engine.run_cycle().await?;
    let gossip = &report.gossip;

    println!(
        "peers:       {}/{} answered ({} legacy only)",
        gossip.peers_answered, gossip.peers_queried, gossip.peers_legacy
    );
    println!(
        "pods:        {} merged, {} bare addresses",
        gossip.pods_merged, gossip.bare_addresses
    );
    println!(
        "reconciled:  {} ok, {} failed",
        gossip.reconciled, gossip.failed
    );
    println!(
        "transitions: {} new, {} online, {} offline",
        gossip.new_nodes, gossip.online, gossip.offline
    );
    println!(
        "public:      {}/{} polled",
        report.metrics.succeeded, report.metrics.polled
    );
    let credits = match report.credits {
        CreditsOutcome::Skipped => "skipped".to_string(),
        CreditsOutcome::Synced {
            entries,
            nodes_updated,
        } => format!("{nodes_updated} nodes updated from {entries} entries"),
        CreditsOutcome::Failed => "failed".to_string(),
    };
    println!("credits:     {credits}");
    println!(
        "duration:    {}",
        humantime::format_duration(std::time::Duration::from_millis(
            u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX)
        ))
    );
    Ok(())
}
