//! `activity` - recent transitions.

use eyre::Result;
use podscope_storage::NodeStore;

use super::format_timestamp;
use crate::context::Context;

pub(crate) fn run(ctx: Context, limit: usize) -> Result<()> {
    let store = ctx.open_store()?;
    let entries = store.recent_activity(limit)?;
    if entries.is_empty() {
        println!("no activity recorded");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {:<8} {:<24} {:<16} {}",
            format_timestamp(entry.created_at),
            entry.kind,
            entry.node_address.as_str(),
            entry.country,
            entry.message
        );
    }
    Ok(())
}
