//! Configuration and limits for WebSocket client connections.

use std::path::PathBuf;
use std::time::Duration;

/// Resource limits for a connection.
///
/// These bound memory use on both directions and reject oversized input
/// before it is buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a single inbound frame payload in bytes.
    ///
    /// Default: 16 MB
    pub max_frame_size: usize,

    /// Maximum size of a complete reassembled message in bytes.
    ///
    /// Default: 64 MB
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 128
    pub max_fragment_count: usize,

    /// Maximum size of the handshake response in bytes.
    ///
    /// Default: 8 KB
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
            max_fragment_count: 128,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
            max_handshake_size,
        }
    }

    /// Limits suitable for constrained environments.
    ///
    /// - Max frame: 64 KB
    /// - Max message: 256 KB
    /// - Max fragments: 16
    /// - Max handshake: 4 KB
    #[must_use]
    pub const fn small() -> Self {
        Self {
            max_frame_size: 64 * 1024,
            max_message_size: 256 * 1024,
            max_fragment_count: 16,
            max_handshake_size: 4096,
        }
    }

    /// Validate a frame payload size against the limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) on overflow.
    pub const fn check_frame_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_frame_size {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate a reassembled message size against the limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) on overflow.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate a fragment count against the limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`](crate::Error::TooManyFragments) on overflow.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        if count > self.max_fragment_count {
            Err(crate::Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }

    /// Validate handshake data size against the limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) on overflow.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Connect-phase timeouts.
///
/// The close-handshake grace period is the only timeout built into the core
/// (see [`Config::close_grace`]); these are application-supplied bounds for
/// the establishment phase. When `timeouts` is `None` the client waits as
/// long as the OS does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum time to establish the TCP (and TLS) connection.
    ///
    /// Default: 30 seconds
    pub connect: Duration,

    /// Maximum time to complete the upgrade handshake after connecting.
    ///
    /// Default: 30 seconds
    pub handshake: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            handshake: Duration::from_secs(30),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values.
    #[must_use]
    pub const fn new(connect: Duration, handshake: Duration) -> Self {
        Self { connect, handshake }
    }
}

/// Server certificate verification policy for wss:// connections.
///
/// Carried in [`Config`] unconditionally so configuration stays the same
/// shape whether or not the `tls-rustls` feature is enabled; it only takes
/// effect when connecting to a `wss://` URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum TlsPolicy {
    /// Verify the server certificate against the bundled web PKI roots.
    #[default]
    Verify,
    /// Verify against a PEM bundle of additional trusted roots.
    CustomRoots(PathBuf),
    /// Skip certificate verification entirely.
    ///
    /// Only suitable for tests and closed networks.
    NoVerify,
}

/// WebSocket client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Maximum outbound frame payload size in bytes.
    ///
    /// Messages larger than this are split into continuation frames.
    ///
    /// Default: 16 KB
    pub max_frame_size: usize,

    /// Outbound queue byte limit (the backpressure contract).
    ///
    /// `send` calls that would push the queue past this limit are rejected
    /// with `BackpressureExceeded`; data is never silently dropped and queue
    /// memory is bounded.
    ///
    /// Default: 1 MB
    pub max_send_queue_bytes: usize,

    /// Grace period to wait for the peer's close acknowledgement before
    /// forcing teardown.
    ///
    /// Default: 10 seconds
    pub close_grace: Duration,

    /// Send an empty ping after the session has been quiet for this long.
    ///
    /// Any traffic in either direction restarts the timer, so pings only
    /// flow on a fully idle connection.
    ///
    /// `None` disables keepalive pings. Default: None
    pub ping_interval: Option<Duration>,

    /// Connect-phase timeouts. `None` leaves establishment unbounded.
    ///
    /// Default: None
    pub timeouts: Option<Timeouts>,

    /// Subprotocols to offer in `Sec-WebSocket-Protocol`, in preference order.
    pub subprotocols: Vec<String>,

    /// Value for the `Origin` request header, if any.
    pub origin: Option<String>,

    /// Certificate verification policy for wss:// URLs.
    pub tls: TlsPolicy,

    /// Read buffer size in bytes. Default: 8 KB
    pub read_buffer_size: usize,

    /// Write buffer size in bytes. Default: 8 KB
    pub write_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            max_frame_size: 16 * 1024,
            max_send_queue_bytes: 1024 * 1024,
            close_grace: Duration::from_secs(10),
            ping_interval: None,
            timeouts: None,
            subprotocols: Vec::new(),
            origin: None,
            tls: TlsPolicy::default(),
            read_buffer_size: 8192,
            write_buffer_size: 8192,
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the maximum outbound frame payload size.
    #[must_use]
    pub const fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the outbound queue byte limit.
    #[must_use]
    pub const fn with_max_send_queue_bytes(mut self, bytes: usize) -> Self {
        self.max_send_queue_bytes = bytes;
        self
    }

    /// Set the close-handshake grace period.
    #[must_use]
    pub const fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Enable keepalive pings after the given quiet interval.
    #[must_use]
    pub const fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    /// Set connect-phase timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Offer subprotocols during the handshake, in preference order.
    #[must_use]
    pub fn with_subprotocols(mut self, protocols: Vec<String>) -> Self {
        self.subprotocols = protocols;
        self
    }

    /// Set the `Origin` request header.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set the TLS verification policy.
    #[must_use]
    pub fn with_tls_policy(mut self, policy: TlsPolicy) -> Self {
        self.tls = policy;
        self
    }
}
