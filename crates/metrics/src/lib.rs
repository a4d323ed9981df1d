//! Prometheus metrics for podscope.
//!
//! [`install_prometheus_recorder`] installs a global recorder that prefixes
//! every metric with `podscope`, and [`MetricsServer`] exposes the rendered
//! metrics over HTTP.

mod recorder;
mod server;

pub use recorder::{METRICS_PREFIX, PrometheusRecorder, install_prometheus_recorder};
pub use server::MetricsServer;

/// Re-export metrics crate for convenience
pub use metrics;
