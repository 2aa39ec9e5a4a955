//! Pre-buffer frame validation (RFC 6455 Sections 5.1 and 5.2).
//!
//! The codec runs these checks against the frame header before the payload
//! is buffered, so an oversized or malformed frame is rejected without
//! allocating for it.

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};

/// Validates incoming frame headers for one side of a connection.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    role: Role,
    limits: Limits,
}

impl FrameValidator {
    #[must_use]
    pub fn new(role: Role, limits: Limits) -> Self {
        Self { role, limits }
    }

    /// Check masking, reserved bits and payload size for an incoming frame.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedClientFrame` when a server receives an unmasked frame
    /// - `Error::MaskedServerFrame` when a client receives a masked frame
    /// - `Error::ReservedBitsSet` when any RSV bit is set
    /// - `Error::FrameTooLarge` when the payload exceeds the limit
    pub fn validate_incoming(
        &self,
        masked: bool,
        rsv1: bool,
        rsv2: bool,
        rsv3: bool,
        payload_len: usize,
    ) -> Result<()> {
        match self.role {
            Role::Server if !masked => return Err(Error::UnmaskedClientFrame),
            Role::Client if masked => return Err(Error::MaskedServerFrame),
            _ => {}
        }

        if rsv1 || rsv2 || rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        self.limits.check_frame_size(payload_len)
    }
}
