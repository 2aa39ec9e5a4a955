//! ws:// and wss:// URL handling.

use url::Url;

use crate::error::{Error, Result};

/// A parsed WebSocket endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsUrl {
    /// Whether the scheme is `wss` (TLS).
    pub secure: bool,
    /// Hostname or IP literal.
    pub host: String,
    /// Port, with the scheme default filled in.
    pub port: u16,
    /// Request target: path plus query string.
    pub resource: String,
}

impl WsUrl {
    /// Parse and validate a WebSocket URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` for unparseable input, a scheme other
    /// than `ws`/`wss`, or a missing host.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))?;

        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => {
                return Err(Error::InvalidUrl(format!(
                    "unsupported scheme: {other} (expected ws or wss)"
                )));
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(format!("{input}: missing host")))?
            .to_string();

        let port = url.port().unwrap_or(if secure { 443 } else { 80 });

        let mut resource = if url.path().is_empty() {
            "/".to_string()
        } else {
            url.path().to_string()
        };
        if let Some(query) = url.query() {
            resource.push('?');
            resource.push_str(query);
        }

        Ok(Self {
            secure,
            host,
            port,
            resource,
        })
    }

    /// `host:port` address for the TCP connect.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `Host` header value: the port is omitted when it is the scheme
    /// default.
    #[must_use]
    pub fn host_header(&self) -> String {
        let default = if self.secure { 443 } else { 80 };
        if self.port == default {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Display for WsUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = if self.secure { "wss" } else { "ws" };
        write!(f, "{scheme}://{}{}", self.host_header(), self.resource)
    }
}
