//! Global prometheus recorder

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use metrics_util::layers::{PrefixLayer, Stack};
use once_cell::sync::OnceCell;

/// Prefix of every exported metric.
pub const METRICS_PREFIX: &str = "podscope";

/// Global prometheus recorder
static PROMETHEUS_RECORDER: OnceCell<PrometheusRecorder> = OnceCell::new();

/// Install the prometheus recorder as the global metrics recorder. Calling
/// this again returns the recorder installed first.
pub fn install_prometheus_recorder() -> eyre::Result<PrometheusRecorder> {
    PROMETHEUS_RECORDER
        .get_or_try_init(|| PrometheusRecorder::install(METRICS_PREFIX))
        .cloned()
}

/// Handle to the prometheus metrics recorder
#[derive(Clone)]
pub struct PrometheusRecorder {
    handle: PrometheusHandle,
    upkeep_started: Arc<AtomicBool>,
}

impl std::fmt::Debug for PrometheusRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusRecorder")
            .field("upkeep_started", &self.upkeep_started.load(Ordering::Relaxed))
            .finish()
    }
}

impl PrometheusRecorder {
    fn install(prefix: &str) -> eyre::Result<Self> {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        Stack::new(recorder)
            .push(PrefixLayer::new(prefix))
            .install()?;

        Ok(Self {
            handle,
            upkeep_started: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get the prometheus handle
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Start the upkeep task draining histogram buckets. Only the first call
    /// spawns a task.
    pub fn spawn_upkeep(&self, interval: Duration) {
        if self
            .upkeep_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let handle = self.handle.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                handle.run_upkeep();
            }
        });
    }
}
