//! ip-api compatible resolver.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::{GeoError, GeoInfo, GeoResolver};

pub const DEFAULT_GEO_URL: &str = "http://ip-api.com/json";

pub const DEFAULT_GEO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct Answer {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    isp: Option<String>,
}

/// Resolver backed by `GET {base_url}/{ip}`.
#[derive(Debug)]
pub struct HttpGeoResolver {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    cache: DashMap<String, GeoInfo>,
}

impl HttpGeoResolver {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeoError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(GeoError::Transport)?;
        Ok(Self::with_http(http, base_url, timeout))
    }

    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            cache: DashMap::new(),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    async fn fetch(&self, ip: &str) -> Result<GeoInfo, GeoError> {
        let url = format!("{}/{}", self.base_url, ip);
        let response = self.http.get(&url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status(status.as_u16()));
        }
        let answer: Answer = response.json().await?;

        if answer.status != "success" {
            return Err(GeoError::Rejected(
                answer.message.unwrap_or(answer.status),
            ));
        }

        Ok(GeoInfo {
            country: answer.country,
            city: answer.city,
            lat: answer.lat,
            lon: answer.lon,
            isp: answer.isp,
        })
    }
}

#[async_trait]
impl GeoResolver for HttpGeoResolver {
    async fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        if let Some(hit) = self.cache.get(ip) {
            metrics::counter!("geo.lookups_total", "outcome" => "cache_hit").increment(1);
            trace!(%ip, "geo cache hit");
            return Some(hit.clone());
        }

        match self.fetch(ip).await {
            Ok(info) => {
                metrics::counter!("geo.lookups_total", "outcome" => "resolved").increment(1);
                self.cache.insert(ip.to_string(), info.clone());
                Some(info)
            }
            Err(error) => {
                metrics::counter!("geo.lookups_total", "outcome" => error.kind()).increment(1);
                debug!(%ip, kind = error.kind(), %error, "geo lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::{Path, State};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service());
        tokio::spawn(server);
        format!("http://{addr}/json/")
    }

    async fn handler(State(hits): State<Arc<AtomicUsize>>, Path(ip): Path<String>) -> Json<Value> {
        hits.fetch_add(1, Ordering::SeqCst);
        if ip == "10.0.0.1" {
            Json(json!({"status": "fail", "message": "private range"}))
        } else {
            Json(json!({
                "status": "success", "country": "Germany", "city": "Nuremberg",
                "lat": 49.45, "lon": 11.07, "isp": "Hetzner"
            }))
        }
    }

    #[tokio::test]
    async fn test_lookup_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/json/:ip", get(handler))
            .with_state(hits.clone());
        let base = serve(app).await;
        let resolver = HttpGeoResolver::new(base, DEFAULT_GEO_TIMEOUT).unwrap();

        let info = resolver.lookup("1.2.3.4").await.unwrap();
        assert_eq!(info.country.as_deref(), Some("Germany"));
        assert_eq!(info.lat, Some(49.45));
        assert_eq!(info.isp.as_deref(), Some("Hetzner"));

        let again = resolver.lookup("1.2.3.4").await.unwrap();
        assert_eq!(again, info);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached(), 1);
    }

    #[tokio::test]
    async fn test_failures_not_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/json/:ip", get(handler))
            .with_state(hits.clone());
        let base = serve(app).await;
        let resolver = HttpGeoResolver::new(base, DEFAULT_GEO_TIMEOUT).unwrap();

        assert!(resolver.lookup("10.0.0.1").await.is_none());
        assert!(resolver.lookup("10.0.0.1").await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached(), 0);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let resolver =
            HttpGeoResolver::new(format!("http://127.0.0.1:{port}/json"), DEFAULT_GEO_TIMEOUT)
                .unwrap();
        assert!(resolver.lookup("1.2.3.4").await.is_none());
    }
}
