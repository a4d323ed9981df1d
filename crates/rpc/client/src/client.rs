//! JSON-RPC over HTTP.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::RpcError;
use crate::metrics::RpcClientMetrics;
use crate::types::{BareAddress, PodsResult, RawStats, VersionResult};
use crate::{NodeRpc, NodeStats, PodRecord, RpcMethod, Timed};

/// Default timeout for metric polling and gossip queries.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for `get-version` liveness probes.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcClientConfig {
    pub timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Option<()>,
    id: u64,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

fn remote_error(error: serde_json::Value) -> RpcError {
    let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
    let message = match error.get("message").and_then(|m| m.as_str()) {
        Some(message) => message.to_string(),
        None => error.to_string(),
    };
    RpcError::Remote { code, message }
}

/// Client bound to one pod endpoint (`http://host:port/rpc`).
///
/// Every public call returns `None` on any failure; the reason is logged at
/// `debug` and counted.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: String,
    config: RpcClientConfig,
    metrics: RpcClientMetrics,
}

impl RpcClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(RpcError::Transport)?;
        Ok(Self::with_http(http, endpoint, RpcClientConfig::default()))
    }

    pub fn with_http(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        config: RpcClientConfig,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            config,
            metrics: RpcClientMetrics,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        timeout: Duration,
    ) -> Result<Timed<T>, RpcError> {
        let request = Request {
            jsonrpc: JSONRPC_VERSION,
            method: method.as_str(),
            params: None,
            id: 1,
        };

        let started = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        let latency = started.elapsed();

        if !status.is_success() {
            return Err(RpcError::Status(status.as_u16()));
        }

        let envelope: Response =
            serde_json::from_slice(&body).map_err(|e| RpcError::Malformed(e.to_string()))?;
        if let Some(error) = envelope.error.filter(|e| !e.is_null()) {
            return Err(remote_error(error));
        }
        let result = envelope
            .result
            .filter(|r| !r.is_null())
            .ok_or(RpcError::EmptyResult)?;
        let value =
            serde_json::from_value(result).map_err(|e| RpcError::Malformed(e.to_string()))?;

        Ok(Timed { value, latency })
    }

    /// Run a call and degrade any failure to `None`.
    async fn query<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        timeout: Duration,
    ) -> Option<Timed<T>> {
        match self.call(method, timeout).await {
            Ok(timed) => {
                self.metrics.record_success(method, timed.latency);
                trace!(endpoint = %self.endpoint, %method, latency_ms = timed.latency_ms(), "rpc ok");
                Some(timed)
            }
            Err(error) => {
                self.metrics.record_failure(method, error.kind());
                debug!(endpoint = %self.endpoint, %method, kind = error.kind(), %error, "rpc failed");
                None
            }
        }
    }

    /// Software version, probed with the short timeout.
    pub async fn get_version(&self) -> Option<String> {
        self.query::<VersionResult>(RpcMethod::GetVersion, self.config.probe_timeout)
            .await
            .map(|timed| timed.value.version)
    }

    /// Live metrics together with the measured round-trip time.
    pub async fn get_stats(&self) -> Option<Timed<NodeStats>> {
        self.query::<RawStats>(RpcMethod::GetStats, self.config.timeout)
            .await
            .map(|timed| timed.map(NodeStats::from))
    }

    /// Pods known to this peer through gossip. Entries that fail to decode
    /// are skipped.
    pub async fn get_pods_with_stats(&self) -> Option<Vec<PodRecord>> {
        let pods = self
            .query::<PodsResult>(RpcMethod::GetPodsWithStats, self.config.timeout)
            .await?
            .value
            .pods;

        let total = pods.len();
        let records: Vec<PodRecord> = pods
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<PodRecord>(raw) {
                Ok(pod) if !pod.address.trim().is_empty() => Some(pod),
                Ok(_) => None,
                Err(error) => {
                    trace!(endpoint = %self.endpoint, %error, "skipping malformed pod");
                    None
                }
            })
            .collect();
        if records.len() < total {
            debug!(
                endpoint = %self.endpoint,
                skipped = total - records.len(),
                "dropped undecodable pod records"
            );
        }
        Some(records)
    }

    /// Bare pod addresses, from the legacy `get-pods` method.
    pub async fn get_pods(&self) -> Option<Vec<String>> {
        let pods = self
            .query::<PodsResult>(RpcMethod::GetPods, self.config.timeout)
            .await?
            .value
            .pods;
        Some(
            pods.into_iter()
                .filter_map(|raw| serde_json::from_value::<BareAddress>(raw).ok())
                .map(|bare| bare.address)
                .filter(|address| !address.trim().is_empty())
                .collect(),
        )
    }
}

/// [`NodeRpc`] over HTTP, sharing one connection pool across endpoints.
#[derive(Debug, Clone)]
pub struct HttpNodeRpc {
    http: reqwest::Client,
    config: RpcClientConfig,
}

impl HttpNodeRpc {
    pub fn new(config: RpcClientConfig) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(RpcError::Transport)?;
        Ok(Self { http, config })
    }

    pub fn client(&self, endpoint: &str) -> RpcClient {
        RpcClient::with_http(self.http.clone(), endpoint, self.config)
    }
}

#[async_trait]
impl NodeRpc for HttpNodeRpc {
    async fn get_version(&self, endpoint: &str) -> Option<String> {
        self.client(endpoint).get_version().await
    }

    async fn get_stats(&self, endpoint: &str) -> Option<Timed<NodeStats>> {
        self.client(endpoint).get_stats().await
    }

    async fn get_pods_with_stats(&self, endpoint: &str) -> Option<Vec<PodRecord>> {
        self.client(endpoint).get_pods_with_stats().await
    }

    async fn get_pods(&self, endpoint: &str) -> Option<Vec<String>> {
        self.client(endpoint).get_pods().await
    }
}
