//! `run` - crawl until interrupted.

use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr};
use podscope_metrics::{MetricsServer, install_prometheus_recorder};
use podscope_node_core::constants::METRICS_UPKEEP_INTERVAL_SECS;
use podscope_storage::NodeStore;
use podscope_tasks::{Supervisor, SupervisorConfig, shutdown_signal};
use tracing::{error, info};

use crate::context::Context;

pub(crate) async fn run(ctx: Context) -> Result<()> {
    let metrics_server = if ctx.config.metrics.enabled {
        let recorder = install_prometheus_recorder()?;
        recorder.spawn_upkeep(Duration::from_secs(METRICS_UPKEEP_INTERVAL_SECS));
        let server = MetricsServer::new(ctx.config.metrics.socket_addr(), recorder.handle().clone());
        server.start().wrap_err("failed to start metrics server")?;
        Some(server)
    } else {
        None
    };

    let store = ctx.open_store()?;
    let engine = Arc::new(ctx.build_engine(store.clone())?);
    engine.repair_addresses()?;

    let crawler = engine.config();
    info!(
        peers = crawler.bootstrap_peers.len(),
        store = %ctx.store_path().display(),
        "crawler starting (press Ctrl+C to stop)"
    );

    let supervisor = Supervisor::new(
        "crawler",
        SupervisorConfig::new(crawler.cycle_interval(), crawler.failure_cooldown()),
    );
    let report = supervisor
        .run_until(
            {
                let engine = engine.clone();
                move || {
                    let engine = engine.clone();
                    async move { engine.run_cycle().await.map(|_| ()) }
                }
            },
            shutdown_signal(),
        )
        .await;
    info!(
        cycles = report.runs,
        failures = report.failures,
        panics = report.panics,
        "crawler stopped"
    );

    if let Err(e) = store.flush() {
        error!(error = %e, "failed to flush node store");
    }
    if let Some(server) = metrics_server {
        server.shutdown();
    }
    Ok(())
}
