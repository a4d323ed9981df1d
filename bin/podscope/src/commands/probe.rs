//! `probe` - query one pod directly.

use eyre::Result;

use crate::context::Context;

pub(crate) async fn run(ctx: Context, address: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let engine = ctx.build_engine(store)?;

    let probe = engine.probe(address).await?;
    println!("address:  {}", probe.address);
    println!(
        "version:  {}",
        probe.version.as_deref().unwrap_or("unreachable")
    );

    let Some(timed) = &probe.stats else {
        println!("stats:    unavailable");
        return Ok(());
    };
    let stats = &timed.value;
    println!("latency:  {}ms", timed.latency_ms());
    println!("cpu:      {:.1}%", stats.cpu_percent);
    println!("ram:      {} / {} bytes", stats.ram_used_bytes, stats.ram_total_bytes);
    println!(
        "uptime:   {}",
        humantime::format_duration(std::time::Duration::from_secs(stats.uptime_secs))
    );
    println!("streams:  {}", stats.active_streams);
    println!("packets:  {} in / {} out", stats.packets_in, stats.packets_out);
    println!("index:    {}", stats.block_height);
    println!("storage:  {} bytes, {} pages", stats.total_bytes, stats.total_pages);
    if let Some(score) = probe.detailed_score {
        println!("score:    {score}");
    }
    Ok(())
}
