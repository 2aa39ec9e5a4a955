//! HTTP Upgrade handshake (RFC 6455 Section 4).
//!
//! The client side builds the `GET` upgrade request and verifies the 101
//! response, including the `Sec-WebSocket-Accept` proof. A minimal server
//! side accepts upgrades so a peer can be stood up entirely in-process.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// GUID appended to the nonce in the accept-key calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this crate speaks.
pub const WS_VERSION: u8 = 13;

/// Compute `Sec-WebSocket-Accept` from a `Sec-WebSocket-Key`:
/// `Base64(SHA-1(key + GUID))`.
///
/// # Example
///
/// ```
/// use wsclient::protocol::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh 16-byte nonce for `Sec-WebSocket-Key`.
#[must_use]
pub fn generate_nonce() -> String {
    let mut raw = [0u8; 16];
    if getrandom::getrandom(&mut raw).is_err() {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        raw[..16].copy_from_slice(&nanos.to_le_bytes());
    }
    BASE64.encode(raw)
}

fn reject_crlf(header: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHandshake(format!(
            "{header} value contains CR or LF"
        )));
    }
    Ok(())
}

/// Parse HTTP header lines into a lowercase-keyed map.
///
/// Duplicates of headers named in `no_duplicates` are rejected; they are the
/// ones an attacker could smuggle conflicting values through.
fn parse_headers<'a, I>(lines: I, no_duplicates: &[&str]) -> Result<HashMap<String, String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_lowercase();
        if no_duplicates.contains(&name.as_str()) && headers.contains_key(&name) {
            return Err(Error::InvalidHandshake(format!("duplicate header: {name}")));
        }
        headers.insert(name, value.trim().to_string());
    }

    Ok(headers)
}

/// Client side of the upgrade: request construction plus response
/// verification, keyed by the nonce the request carried.
#[derive(Debug, Clone)]
pub struct ClientHandshake {
    key: String,
    host: String,
    path: String,
    origin: Option<String>,
    subprotocols: Vec<String>,
}

impl ClientHandshake {
    /// Prepare a handshake for `host` (as it should appear in the `Host`
    /// header, including any non-default port) and request `path`.
    #[must_use]
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            key: generate_nonce(),
            host: host.into(),
            path: path.into(),
            origin: None,
            subprotocols: Vec::new(),
        }
    }

    /// Add an `Origin` header.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Offer subprotocols in preference order.
    #[must_use]
    pub fn with_subprotocols(mut self, protocols: Vec<String>) -> Self {
        self.subprotocols = protocols;
        self
    }

    /// The nonce sent as `Sec-WebSocket-Key`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serialize the upgrade request.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` if a caller-supplied header value
    /// would split the request (CR/LF injection).
    pub fn request_bytes(&self) -> Result<Vec<u8>> {
        reject_crlf("Host", &self.host)?;
        reject_crlf("path", &self.path)?;
        if let Some(origin) = &self.origin {
            reject_crlf("Origin", origin)?;
        }
        for proto in &self.subprotocols {
            reject_crlf("Sec-WebSocket-Protocol", proto)?;
        }

        let mut req = format!(
            "GET {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {}\r\n\
             Sec-WebSocket-Version: {}\r\n",
            self.path, self.host, self.key, WS_VERSION
        );
        if let Some(origin) = &self.origin {
            req.push_str(&format!("Origin: {origin}\r\n"));
        }
        if !self.subprotocols.is_empty() {
            req.push_str(&format!(
                "Sec-WebSocket-Protocol: {}\r\n",
                self.subprotocols.join(", ")
            ));
        }
        req.push_str("\r\n");
        Ok(req.into_bytes())
    }

    /// Verify the server's 101 response against this handshake.
    ///
    /// Returns the negotiated subprotocol, if any.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` when the status is not 101, the
    /// accept key does not match the nonce, or the server selected a
    /// subprotocol that was never offered.
    pub fn verify_response(&self, response: &UpgradeResponse) -> Result<Option<String>> {
        let expected = compute_accept_key(&self.key);
        if response.accept != expected {
            return Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Accept mismatch: expected {expected}, got {}",
                response.accept
            )));
        }

        if let Some(proto) = &response.protocol {
            if !self.subprotocols.iter().any(|p| p == proto) {
                return Err(Error::InvalidHandshake(format!(
                    "server selected unoffered subprotocol: {proto}"
                )));
            }
        }

        Ok(response.protocol.clone())
    }
}

/// Parsed server 101 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeResponse {
    /// `Sec-WebSocket-Accept` value.
    pub accept: String,
    /// Selected subprotocol, if the server picked one.
    pub protocol: Option<String>,
}

impl UpgradeResponse {
    /// Parse a complete HTTP response head (through the blank line).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` on a non-101 status, a missing or
    /// wrong `Upgrade`/`Connection` header, or a missing accept key.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("response is not valid UTF-8".into()))?;
        let mut lines = text.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("empty response".into()))?;
        if !status_line.starts_with("HTTP/1.1 101") {
            return Err(Error::InvalidHandshake(format!(
                "expected 101 Switching Protocols, got: {status_line}"
            )));
        }

        let headers = parse_headers(
            lines,
            &["upgrade", "connection", "sec-websocket-accept"],
        )?;

        let upgrade = headers
            .get("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("missing Upgrade header".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "invalid Upgrade header: {upgrade}"
            )));
        }

        let connection = headers
            .get("connection")
            .ok_or_else(|| Error::InvalidHandshake("missing Connection header".into()))?;
        if !connection.to_lowercase().contains("upgrade") {
            return Err(Error::InvalidHandshake(format!(
                "invalid Connection header: {connection}"
            )));
        }

        let accept = headers
            .get("sec-websocket-accept")
            .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Accept".into()))?
            .clone();

        Ok(Self {
            accept,
            protocol: headers.get("sec-websocket-protocol").cloned(),
        })
    }
}

/// Parsed client upgrade request, for accepting connections in-process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Request path.
    pub path: String,
    /// `Sec-WebSocket-Key` nonce.
    pub key: String,
    /// Offered subprotocols in preference order.
    pub protocols: Vec<String>,
}

impl UpgradeRequest {
    /// Parse a complete HTTP request head (through the blank line).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` for a non-GET method, a missing
    /// required header, or an unsupported protocol version.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("request is not valid UTF-8".into()))?;
        let mut lines = text.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("empty request".into()))?;
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 || parts[0] != "GET" || !parts[2].starts_with("HTTP/1.1") {
            return Err(Error::InvalidHandshake(format!(
                "invalid request line: {request_line}"
            )));
        }
        let path = parts[1].to_string();

        let headers = parse_headers(
            lines,
            &[
                "host",
                "upgrade",
                "connection",
                "sec-websocket-key",
                "sec-websocket-version",
            ],
        )?;

        let upgrade = headers
            .get("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("missing Upgrade header".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "invalid Upgrade header: {upgrade}"
            )));
        }

        let version = headers
            .get("sec-websocket-version")
            .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Version".into()))?;
        if version != "13" {
            return Err(Error::InvalidHandshake(format!(
                "unsupported version: {version}"
            )));
        }

        let key = headers
            .get("sec-websocket-key")
            .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Key".into()))?
            .clone();
        match BASE64.decode(&key) {
            Ok(decoded) if decoded.len() == 16 => {}
            _ => {
                return Err(Error::InvalidHandshake(
                    "Sec-WebSocket-Key must decode to 16 bytes".into(),
                ));
            }
        }

        let protocols = headers
            .get("sec-websocket-protocol")
            .map(|p| p.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        Ok(Self {
            path,
            key,
            protocols,
        })
    }

    /// Build the 101 response accepting this request, optionally selecting a
    /// subprotocol.
    #[must_use]
    pub fn accept_response(&self, protocol: Option<&str>) -> Vec<u8> {
        let mut resp = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n",
            compute_accept_key(&self.key)
        );
        if let Some(proto) = protocol {
            resp.push_str(&format!("Sec-WebSocket-Protocol: {proto}\r\n"));
        }
        resp.push_str("\r\n");
        resp.into_bytes()
    }
}

/// Find the end of the HTTP head (`\r\n\r\n`) in `data`.
///
/// Returns the index one past the terminator, or `None` if the head is not
/// complete yet.
#[must_use]
pub fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}
