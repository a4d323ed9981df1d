//! `refresh` - poll selected nodes now.

use eyre::Result;

use crate::context::Context;

pub(crate) async fn run(ctx: Context, addresses: &[String]) -> Result<()> {
    let store = ctx.open_store()?;
    let engine = ctx.build_engine(store)?;

    let report = engine.refresh(addresses).await?;
    println!(
        "requested {}, invalid {}, found {}, updated {}",
        report.requested, report.invalid, report.found, report.updated
    );
    Ok(())
}
