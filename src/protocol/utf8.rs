//! Incremental UTF-8 validation for fragmented text messages (RFC 6455).
//!
//! A multi-byte code point may straddle a fragment boundary; the validator
//! carries the incomplete suffix into the next fragment and only rejects
//! sequences that can never become valid.

use crate::error::{Error, Result};

/// Incremental UTF-8 validator.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    /// Incomplete trailing sequence from the previous fragment (at most 3
    /// bytes: a 4-byte code point missing its last byte).
    carry: [u8; 4],
    carry_len: usize,
}

impl Utf8Validator {
    /// Create a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the next fragment.
    ///
    /// With `is_final = false` an incomplete multi-byte sequence at the end
    /// is carried over; with `is_final = true` every byte must complete.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` on a definitively invalid sequence.
    pub fn validate(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        if self.carry_len == 0 {
            return self.validate_inner(data, is_final);
        }

        // Stitch the carried suffix onto the new fragment and re-check.
        let mut combined = Vec::with_capacity(self.carry_len + data.len());
        combined.extend_from_slice(&self.carry[..self.carry_len]);
        combined.extend_from_slice(data);
        self.carry_len = 0;
        self.validate_inner(&combined, is_final)
    }

    fn validate_inner(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        match std::str::from_utf8(data) {
            Ok(_) => Ok(()),
            Err(e) => {
                // error_len() == None means the data ends mid-sequence;
                // that is fine on a non-final fragment.
                if !is_final && e.error_len().is_none() {
                    let tail = &data[e.valid_up_to()..];
                    if tail.len() < 4 {
                        self.carry[..tail.len()].copy_from_slice(tail);
                        self.carry_len = tail.len();
                        return Ok(());
                    }
                }
                Err(Error::InvalidUtf8)
            }
        }
    }

    /// Discard any carried partial sequence.
    pub fn reset(&mut self) {
        self.carry_len = 0;
    }

    /// Whether a partial sequence is pending completion.
    #[must_use]
    pub fn has_incomplete(&self) -> bool {
        self.carry_len > 0
    }
}

/// Validate a complete byte slice as UTF-8.
///
/// # Errors
///
/// Returns `Error::InvalidUtf8` if the data is not valid UTF-8.
pub fn validate_utf8(data: &[u8]) -> Result<()> {
    std::str::from_utf8(data).map(|_| ()).map_err(Error::from)
}
