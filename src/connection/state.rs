//! Client connection lifecycle.

use crate::message::CloseFrame;

/// Lifecycle state of a client connection.
///
/// Transitions only move forward:
///
/// ```text
/// Idle -> Connecting -> Open -> Closing -> Closed
///             |           \___________________^
///             \_______________________________^
/// ```
///
/// A failed establishment skips `Open` and goes straight to `Closed`; an
/// abrupt transport loss skips `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ClientState {
    /// No connection attempt has been made yet.
    #[default]
    Idle,
    /// TCP/TLS connect and upgrade handshake in progress.
    Connecting,
    /// Handshake complete; data frames flow in both directions.
    Open,
    /// Close frame sent, waiting for the peer's acknowledgement.
    Closing,
    /// Fully torn down. Terminal.
    Closed,
}

impl ClientState {
    /// Whether a transition from `self` to `next` is legal.
    #[must_use]
    pub const fn can_transition_to(self, next: ClientState) -> bool {
        matches!(
            (self, next),
            (ClientState::Idle, ClientState::Connecting)
                | (ClientState::Connecting, ClientState::Open)
                | (ClientState::Connecting, ClientState::Closed)
                | (ClientState::Open, ClientState::Closing)
                | (ClientState::Open, ClientState::Closed)
                | (ClientState::Closing, ClientState::Closed)
        )
    }

    /// Whether application data may be sent in this state.
    #[inline]
    #[must_use]
    pub const fn can_send(self) -> bool {
        matches!(self, ClientState::Open)
    }

    /// Whether a connection attempt or live connection exists.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            ClientState::Connecting | ClientState::Open | ClientState::Closing
        )
    }

    /// Whether this is the terminal state.
    #[inline]
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, ClientState::Closed)
    }

    /// Short name for logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ClientState::Idle => "Idle",
            ClientState::Connecting => "Connecting",
            ClientState::Open => "Open",
            ClientState::Closing => "Closing",
            ClientState::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a connection ended, recorded when entering `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CloseReason {
    /// This side initiated the close handshake.
    Local(Option<CloseFrame>),
    /// The peer initiated the close handshake.
    Peer(Option<CloseFrame>),
    /// Establishment never completed.
    ConnectFailed(String),
    /// A protocol or transport error forced teardown.
    Error(String),
}

impl CloseReason {
    /// The close frame involved, if the teardown was orderly.
    #[must_use]
    pub fn close_frame(&self) -> Option<&CloseFrame> {
        match self {
            CloseReason::Local(frame) | CloseReason::Peer(frame) => frame.as_ref(),
            _ => None,
        }
    }
}
