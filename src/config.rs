//! Client configuration and coordinator endpoint parsing.
//!
//! All tunables live here, with defaults matching the reference server.
//! A [`ClientConfig`] can be built in code or deserialised from a TOML
//! file; timeouts are expressed in milliseconds in the file form.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default block size for newly created files (128 MiB).
pub const DEFAULT_BLOCK_SIZE: u64 = 128 * 1024 * 1024;

/// Default replication factor for newly created files.
pub const DEFAULT_REPLICATION: u32 = 3;

/// Default storage-node data transfer port.
pub const DEFAULT_DATA_PORT: u16 = 9866;

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_DATA_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DATA_READ_TIMEOUT_MS: u64 = 30_000;

/// A coordinator endpoint of the form `dfs://host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("dfs://")
            .ok_or_else(|| Error::InvalidArgument(format!("endpoint must be dfs://host:port, got {s:?}")))?;
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidArgument(format!("endpoint is missing a port: {s:?}")))?;
        if host.is_empty() {
            return Err(Error::InvalidArgument(format!("endpoint has an empty host: {s:?}")));
        }
        let port: u16 = port
            .parse()
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| Error::InvalidArgument(format!("endpoint has an invalid port: {s:?}")))?;
        Ok(Endpoint { host: host.to_string(), port })
    }
}

impl TryFrom<String> for Endpoint {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dfs://{}:{}", self.host, self.port)
    }
}

/// Client configuration.
///
/// `endpoints` are tried in order by every coordinator operation. The
/// auth identity is a plain config input; nothing is looked up behind the
/// caller's back beyond the `USER` environment fallback in [`Default`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Coordinator endpoints, in retry order.
    pub endpoints: Vec<Endpoint>,
    /// User presented in the connection context.
    pub effective_user: String,
    /// Optional proxy user presented alongside `effective_user`.
    pub real_user: Option<String>,
    /// Coordinator TCP connect timeout, milliseconds.
    pub connect_timeout_ms: u64,
    /// Coordinator framed-read timeout, milliseconds.
    pub read_timeout_ms: u64,
    /// Storage-node TCP connect timeout, milliseconds.
    pub data_connect_timeout_ms: u64,
    /// Storage-node read timeout, milliseconds.
    pub data_read_timeout_ms: u64,
    /// Block size for newly created files.
    pub block_size: u64,
    /// Replication factor for newly created files.
    pub replication: u32,
    /// Rewrite replica hostnames from coordinator metadata to
    /// `localhost`. Useful when the cluster's internal hostnames are not
    /// resolvable from the client.
    pub local_mode: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoints: Vec::new(),
            effective_user: std::env::var("USER").unwrap_or_else(|_| "dfs".into()),
            real_user: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            data_connect_timeout_ms: DEFAULT_DATA_CONNECT_TIMEOUT_MS,
            data_read_timeout_ms: DEFAULT_DATA_READ_TIMEOUT_MS,
            block_size: DEFAULT_BLOCK_SIZE,
            replication: DEFAULT_REPLICATION,
            local_mode: false,
        }
    }
}

impl ClientConfig {
    /// Builds a config pointing at a single endpoint, defaults elsewhere.
    pub fn for_endpoint(endpoint: Endpoint) -> Self {
        ClientConfig { endpoints: vec![endpoint], ..ClientConfig::default() }
    }

    /// Parses a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::InvalidArgument(format!("bad config: {e}")))
    }

    /// Reads and parses a TOML config file.
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| Error::InvalidArgument(format!("cannot read config: {e}")))?;
        Self::from_toml_str(&text)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn data_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.data_connect_timeout_ms)
    }

    pub fn data_read_timeout(&self) -> Duration {
        Duration::from_millis(self.data_read_timeout_ms)
    }
}
