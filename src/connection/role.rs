//! Connection role and the masking rules it implies (RFC 6455 Section 5.1).

/// Which end of the connection this endpoint is.
///
/// Clients mask every outgoing frame; servers never do, and each side
/// rejects frames that violate the rule for the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Initiating endpoint; masks outgoing frames.
    Client,
    /// Accepting endpoint; sends frames unmasked.
    Server,
}

impl Role {
    /// Whether outgoing frames from this role carry a mask.
    #[inline]
    #[must_use]
    pub const fn must_mask(self) -> bool {
        matches!(self, Role::Client)
    }

    /// Whether incoming frames are required to be masked.
    #[inline]
    #[must_use]
    pub const fn expects_masked(self) -> bool {
        matches!(self, Role::Server)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}
