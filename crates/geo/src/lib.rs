//! IP geolocation.
//!
//! [`GeoResolver`] maps a bare IP to a location. [`HttpGeoResolver`] queries
//! an ip-api compatible service and keeps every successful answer for the
//! lifetime of the resolver; failures are never cached, so a later lookup
//! retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod error;
mod http;

pub use error::GeoError;
pub use http::{DEFAULT_GEO_TIMEOUT, DEFAULT_GEO_URL, HttpGeoResolver};

/// Location of an IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub isp: Option<String>,
}

#[async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait GeoResolver: Send + Sync {
    /// Location of `ip`, or `None` when it cannot be resolved.
    async fn lookup(&self, ip: &str) -> Option<GeoInfo>;
}
