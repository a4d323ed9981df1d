//! Bulk credits feed.

use std::time::Duration;

use async_trait::async_trait;
use podscope_rpc_client::lenient;
use serde::Deserialize;

use crate::CreditsError;

/// Credits balance of one pod, keyed by its public key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreditEntry {
    pub pod_id: String,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub credits: u64,
}

#[async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait CreditsSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<CreditEntry>, CreditsError>;
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default)]
    status: String,
    #[serde(default)]
    pods_credits: Option<Vec<serde_json::Value>>,
}

/// Decode a feed body: `{"status": "success", "pods_credits": [...]}`.
/// Entries without a usable `pod_id` are skipped.
pub fn parse_feed(body: &[u8]) -> Result<Vec<CreditEntry>, CreditsError> {
    let feed: Feed =
        serde_json::from_slice(body).map_err(|e| CreditsError::Malformed(e.to_string()))?;
    if feed.status != "success" {
        return Err(CreditsError::Unsuccessful(feed.status));
    }
    let entries = feed
        .pods_credits
        .ok_or_else(|| CreditsError::Malformed("missing pods_credits".into()))?;

    Ok(entries
        .into_iter()
        .filter_map(|raw| serde_json::from_value::<CreditEntry>(raw).ok())
        .filter(|entry| !entry.pod_id.trim().is_empty())
        .collect())
}

/// Credits feed fetched over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCreditsFeed {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpCreditsFeed {
    pub fn new(http: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CreditsSource for HttpCreditsFeed {
    async fn fetch(&self) -> Result<Vec<CreditEntry>, CreditsError> {
        let response = self.http.get(&self.url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CreditsError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        parse_feed(&body)
    }
}
