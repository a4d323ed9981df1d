//! Canonical node addresses.
//!
//! Gossip reports a pod under whatever port it happens to gossip on
//! (`1.2.3.4:9001`), while every pod answers RPC on one well-known port.
//! Nodes are keyed by `host:rpc-port` so that reports from different sources
//! land on the same record.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("empty address")]
    Empty,
    #[error("invalid address: {0}")]
    Invalid(String),
    #[error("invalid port in address: {0}")]
    InvalidPort(String),
    #[error("address has no port: {0}")]
    MissingPort(String),
}

/// Normalized `host:port` key of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeAddress(String);

impl NodeAddress {
    /// Canonical RPC address for a reported address: any reported port is
    /// replaced with `rpc_port`. Accepts `ip`, `ip:port`, `[v6]:port`,
    /// `host:port` and full `http://host:port/path` endpoints.
    pub fn with_rpc_port(reported: &str, rpc_port: u16) -> Result<Self, AddressError> {
        let (host, _) = split_host_port(reported)?;
        Ok(Self::from_parts(&host, rpc_port))
    }

    fn from_parts(host: &str, port: u16) -> Self {
        Self(format!("{host}:{port}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host part, with IPv6 literals in brackets.
    pub fn host(&self) -> &str {
        self.0.rsplit_once(':').map_or(self.0.as_str(), |(host, _)| host)
    }

    /// Bare host usable for IP lookups (IPv6 brackets stripped).
    pub fn ip(&self) -> &str {
        let host = self.host();
        host.strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host)
    }

    pub fn port(&self) -> Option<u16> {
        self.0.rsplit_once(':').and_then(|(_, port)| port.parse().ok())
    }

    /// HTTP endpoint serving JSON-RPC at `path`.
    pub fn rpc_url(&self, path: &str) -> String {
        format!("http://{}{}", self.0, path)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parses an address that must carry an explicit port.
impl FromStr for NodeAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match split_host_port(s)? {
            (host, Some(port)) => Ok(Self::from_parts(&host, port)),
            (_, None) => Err(AddressError::MissingPort(s.to_string())),
        }
    }
}

fn format_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}

fn split_host_port(input: &str) -> Result<(String, Option<u16>), AddressError> {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let authority = without_scheme
        .split_once('/')
        .map_or(without_scheme, |(authority, _)| authority);

    if authority.is_empty() {
        return Err(AddressError::Empty);
    }

    if let Ok(sock) = authority.parse::<SocketAddr>() {
        return Ok((format_ip(sock.ip()), Some(sock.port())));
    }
    if let Ok(ip) = authority.parse::<IpAddr>() {
        return Ok((format_ip(ip), None));
    }
    if let Some(inner) = authority
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        let ip = inner
            .parse::<IpAddr>()
            .map_err(|_| AddressError::Invalid(input.to_string()))?;
        return Ok((format_ip(ip), None));
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| AddressError::InvalidPort(input.to_string()))?;
            (host, Some(port))
        }
        None => (authority, None),
    };

    if host.is_empty() || host.contains([':', '[', ']']) || host.contains(char::is_whitespace) {
        return Err(AddressError::Invalid(input.to_string()));
    }

    Ok((host.to_ascii_lowercase(), port))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_gossip_port_replaced() {
        let addr = NodeAddress::with_rpc_port("1.2.3.4:9001", 6000).unwrap();
        assert_eq!(addr.as_str(), "1.2.3.4:6000");
        assert_eq!(addr.host(), "1.2.3.4");
        assert_eq!(addr.port(), Some(6000));
    }

    #[test]
    fn test_same_node_from_different_ports() {
        let a = NodeAddress::with_rpc_port("1.2.3.4:9001", 6000).unwrap();
        let b = NodeAddress::with_rpc_port("1.2.3.4:6000", 6000).unwrap();
        let c = NodeAddress::with_rpc_port("1.2.3.4", 6000).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_endpoint_url() {
        let addr = NodeAddress::with_rpc_port("http://192.190.136.28:6000/rpc", 6000).unwrap();
        assert_eq!(addr.as_str(), "192.190.136.28:6000");
        assert_eq!(addr.rpc_url("/rpc"), "http://192.190.136.28:6000/rpc");
    }

    #[test]
    fn test_ipv6() {
        let addr = NodeAddress::with_rpc_port("[2001:db8::1]:9001", 6000).unwrap();
        assert_eq!(addr.as_str(), "[2001:db8::1]:6000");
        assert_eq!(addr.ip(), "2001:db8::1");

        let bare = NodeAddress::with_rpc_port("2001:db8::1", 6000).unwrap();
        assert_eq!(bare, addr);
    }

    #[test]
    fn test_hostname() {
        let addr = NodeAddress::with_rpc_port("Pod.Example.org:9001", 6000).unwrap();
        assert_eq!(addr.as_str(), "pod.example.org:6000");
    }

    #[test]
    fn test_invalid() {
        assert_matches!(NodeAddress::with_rpc_port("", 6000), Err(AddressError::Empty));
        assert_matches!(NodeAddress::with_rpc_port("   ", 6000), Err(AddressError::Empty));
        assert_matches!(
            NodeAddress::with_rpc_port("1.2.3.4:notaport", 6000),
            Err(AddressError::InvalidPort(_))
        );
        assert_matches!(
            NodeAddress::with_rpc_port(":9001", 6000),
            Err(AddressError::Invalid(_))
        );
    }

    #[test]
    fn test_from_str_requires_port() {
        let addr: NodeAddress = "1.2.3.4:6000".parse().unwrap();
        assert_eq!(addr.port(), Some(6000));
        assert_matches!(
            "1.2.3.4".parse::<NodeAddress>(),
            Err(AddressError::MissingPort(_))
        );
    }

    #[test]
    fn test_serde_transparent() {
        let addr = NodeAddress::with_rpc_port("1.2.3.4:9001", 6000).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"1.2.3.4:6000\"");
        let back: NodeAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
