//! HTTP server for metrics

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Metrics server that exposes a prometheus endpoint
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    handle: PrometheusHandle,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl MetricsServer {
    pub fn new(addr: SocketAddr, handle: PrometheusHandle) -> Self {
        Self {
            addr,
            handle,
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Bind and serve in the background. Returns the bound address, which
    /// differs from the configured one when port 0 was requested.
    pub fn start(&self) -> eyre::Result<SocketAddr> {
        let app = Router::new()
            .route("/", get(root))
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(Arc::new(self.handle.clone()))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        let server = axum::Server::try_bind(&self.addr)?.serve(app.into_make_service());
        let local_addr = server.local_addr();
        let server = server.with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });

        tracing::info!(addr = %local_addr, "metrics server listening");

        tokio::spawn(async move {
            if let Err(error) = server.await {
                tracing::error!(%error, "metrics server error");
            }
        });

        Ok(local_addr)
    }

    /// Shutdown the metrics server
    pub fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
            tracing::debug!("metrics server shutdown signal sent");
        }
    }
}

async fn root() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
    <head><title>podscope metrics</title></head>
    <body>
        <h1>podscope metrics</h1>
        <ul>
            <li><a href="/metrics">Prometheus Metrics</a></li>
            <li><a href="/health">Health Check</a></li>
        </ul>
    </body>
</html>
"#,
    )
}

async fn metrics_handler(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
