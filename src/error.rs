//! Error types for the WebSocket client.
//!
//! The taxonomy distinguishes four classes of failures:
//!
//! - **Invalid state**: an operation was called in the wrong lifecycle state.
//!   Returned to the caller; the connection is unaffected.
//! - **Protocol errors**: malformed handshake or frame data. Fatal; the
//!   connection is torn down.
//! - **Transport errors**: connect, read or write failures. Fatal.
//! - **Backpressure**: the outbound queue is full. Recoverable; the caller
//!   retries once the queue drains. The connection stays open.
//!
//! Every fatal class converges on the same close sequence and culminates in
//! exactly one `on_close` callback. No panic crosses the public boundary.

use thiserror::Error;

/// Result type alias for WebSocket client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket client operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Operation called in a lifecycle state that does not permit it.
    #[error("Invalid state: cannot {op} while {state}")]
    InvalidState {
        /// The operation that was attempted.
        op: &'static str,
        /// The state the client was in.
        state: &'static str,
    },

    /// The connection URL could not be parsed or is not ws:// / wss://.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Outbound queue would exceed the configured byte limit.
    ///
    /// The connection stays open; retry after the queue drains.
    #[error("Backpressure limit exceeded: {queued} bytes queued (limit: {limit})")]
    BackpressureExceeded {
        /// Bytes currently queued plus the rejected payload.
        queued: usize,
        /// Configured queue limit.
        limit: usize,
    },

    /// Invalid WebSocket upgrade handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake data exceeds the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Actual handshake size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in a text message.
    #[error("Invalid UTF-8 in text message")]
    InvalidUtf8,

    /// Frame payload exceeds the configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reassembled message exceeds the configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Control frame fragmented (RFC 6455 violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload larger than 125 bytes.
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Reserved bits set without a negotiated extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Invalid close status code.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Masked frame received from the server (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Unmasked frame received from a client (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Incomplete frame data; more bytes are needed.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// The connection has been closed, optionally with a peer close code.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<u16>),

    /// A configured timeout elapsed.
    #[error("Timed out during {0}")]
    Timeout(&'static str),

    /// TLS setup or negotiation failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether this error forces the connection to close.
    ///
    /// `InvalidState`, `InvalidUrl` and `BackpressureExceeded` are reported
    /// to the caller without touching the connection; everything else
    /// converges on the teardown path.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::InvalidState { .. }
                | Error::BackpressureExceeded { .. }
                | Error::InvalidUrl(_)
                | Error::IncompleteFrame { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
