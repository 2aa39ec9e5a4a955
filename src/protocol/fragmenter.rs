//! Outbound message fragmentation (RFC 6455 Section 5.4).

use crate::protocol::{Frame, OpCode};

/// Splits an outbound message into frames no larger than `fragment_size`.
///
/// The first frame carries the message opcode, the rest are continuations;
/// only the last frame has FIN set. An empty payload still yields one empty
/// final frame.
pub struct Fragmenter<'a> {
    payload: &'a [u8],
    opcode: OpCode,
    fragment_size: usize,
    offset: usize,
    emitted: bool,
}

impl<'a> Fragmenter<'a> {
    #[must_use]
    pub fn new(payload: &'a [u8], opcode: OpCode, fragment_size: usize) -> Self {
        Self {
            payload,
            opcode,
            fragment_size: fragment_size.max(1),
            offset: 0,
            emitted: false,
        }
    }

    /// Number of frames this message will produce.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        if self.payload.is_empty() {
            1
        } else {
            self.payload.len().div_ceil(self.fragment_size)
        }
    }
}

impl Iterator for Fragmenter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.offset >= self.payload.len() {
            if self.emitted {
                return None;
            }
            self.emitted = true;
            return Some(Frame::new(true, self.opcode, Vec::new()));
        }

        let end = (self.offset + self.fragment_size).min(self.payload.len());
        let fin = end == self.payload.len();
        let opcode = if self.emitted {
            OpCode::Continuation
        } else {
            self.opcode
        };

        let chunk = self.payload[self.offset..end].to_vec();
        self.offset = end;
        self.emitted = true;

        Some(Frame::new(fin, opcode, chunk))
    }
}
