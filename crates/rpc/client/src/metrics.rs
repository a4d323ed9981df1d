//! RPC client metrics

use std::time::Duration;

use crate::RpcMethod;

/// Per-method call outcomes and latency.
#[derive(Clone, Debug, Default)]
pub(crate) struct RpcClientMetrics;

impl RpcClientMetrics {
    pub(crate) fn record_success(&self, method: RpcMethod, latency: Duration) {
        metrics::counter!(
            "rpc_client.requests_total",
            "method" => method.as_str(),
            "outcome" => "ok"
        )
        .increment(1);
        metrics::histogram!("rpc_client.latency_seconds", "method" => method.as_str())
            .record(latency.as_secs_f64());
    }

    pub(crate) fn record_failure(&self, method: RpcMethod, kind: &'static str) {
        metrics::counter!(
            "rpc_client.requests_total",
            "method" => method.as_str(),
            "outcome" => kind
        )
        .increment(1);
    }
}
