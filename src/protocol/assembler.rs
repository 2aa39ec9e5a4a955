//! Inbound message reassembly (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::utf8::Utf8Validator;
use crate::protocol::{Frame, OpCode};

/// Reassembles fragmented messages from data frames.
///
/// Control frames are never fed to the assembler; they are handled by the
/// connection driver directly. Text payloads are UTF-8 validated
/// incrementally as fragments arrive, so an invalid message fails as early
/// as the wire allows.
pub struct MessageAssembler {
    buffer: BytesMut,
    opcode: Option<OpCode>,
    fragment_count: usize,
    utf8: Option<Utf8Validator>,
    limits: Limits,
}

/// A complete, validated message.
#[derive(Debug)]
pub struct AssembledMessage {
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl AssembledMessage {
    /// Convert into the payload string. The assembler has already validated
    /// text payloads, so this only fails for messages built by hand.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` if the payload is not valid UTF-8.
    pub fn into_text(self) -> Result<String> {
        String::from_utf8(self.payload).map_err(|_| Error::InvalidUtf8)
    }

    #[must_use]
    pub fn into_binary(self) -> Vec<u8> {
        self.payload
    }
}

impl MessageAssembler {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            opcode: None,
            fragment_count: 0,
            utf8: None,
            limits,
        }
    }

    /// Feed the next data frame.
    ///
    /// Returns the complete message once a frame with FIN arrives, `None`
    /// while more fragments are expected.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a continuation with no message in
    ///   progress, or a new data opcode while one is in progress
    /// - `Error::MessageTooLarge` / `Error::TooManyFragments` on limits
    /// - `Error::InvalidUtf8` for invalid text payloads
    pub fn push(&mut self, frame: Frame) -> Result<Option<AssembledMessage>> {
        debug_assert!(frame.opcode.is_data());

        match (frame.opcode, self.opcode) {
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "continuation frame with no message in progress".into(),
                ));
            }
            (OpCode::Continuation, Some(_)) => {}
            (opcode, None) => {
                self.opcode = Some(opcode);
                if opcode == OpCode::Text {
                    self.utf8 = Some(Utf8Validator::new());
                }
            }
            (_, Some(_)) => {
                return Err(Error::ProtocolViolation(
                    "expected continuation frame".into(),
                ));
            }
        }

        self.limits.check_fragment_count(self.fragment_count + 1)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        if let Some(validator) = self.utf8.as_mut() {
            validator.validate(frame.payload(), frame.fin)?;
        }

        self.buffer.extend_from_slice(frame.payload());
        self.fragment_count += 1;

        if !frame.fin {
            return Ok(None);
        }

        let payload = self.buffer.split().to_vec();
        let opcode = self.opcode.take().unwrap_or(OpCode::Binary);
        self.fragment_count = 0;
        self.utf8 = None;

        Ok(Some(AssembledMessage { opcode, payload }))
    }

    /// Whether a fragmented message is currently being assembled.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Discard any partially assembled message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.opcode = None;
        self.fragment_count = 0;
        self.utf8 = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tight_limits() -> Limits {
        Limits::new(1024, 100, 3, 4096)
    }

    #[test]
    fn test_single_frame_message() {
        let mut asm = MessageAssembler::new(Limits::default());
        let msg = asm.push(Frame::text(b"Hello".to_vec())).unwrap().unwrap();
        assert_eq!(msg.opcode, OpCode::Text);
        assert_eq!(msg.payload, b"Hello");
        assert!(!asm.is_assembling());
    }

    #[test]
    fn test_two_fragments() {
        let mut asm = MessageAssembler::new(Limits::default());
        assert!(
            asm.push(Frame::new(false, OpCode::Text, b"Hel".to_vec()))
                .unwrap()
                .is_none()
        );
        assert!(asm.is_assembling());

        let msg = asm
            .push(Frame::new(true, OpCode::Continuation, b"lo".to_vec()))
            .unwrap()
            .unwrap();
        assert_eq!(msg.opcode, OpCode::Text);
        assert_eq!(msg.payload, b"Hello");
    }

    #[test]
    fn test_many_fragments_binary() {
        let mut asm = MessageAssembler::new(Limits::default());
        asm.push(Frame::new(false, OpCode::Binary, vec![1, 2])).unwrap();
        asm.push(Frame::new(false, OpCode::Continuation, vec![3, 4]))
            .unwrap();
        let msg = asm
            .push(Frame::new(true, OpCode::Continuation, vec![5, 6]))
            .unwrap()
            .unwrap();
        assert_eq!(msg.opcode, OpCode::Binary);
        assert_eq!(msg.payload, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_continuation_without_start() {
        let mut asm = MessageAssembler::new(Limits::default());
        let result = asm.push(Frame::new(true, OpCode::Continuation, b"x".to_vec()));
        assert!(matches!(result, Err(Error::ProtocolViolation(_))));
    }

    #[test]
    fn test_new_opcode_mid_message() {
        let mut asm = MessageAssembler::new(Limits::default());
        asm.push(Frame::new(false, OpCode::Text, b"first".to_vec()))
            .unwrap();
        let result = asm.push(Frame::text(b"second".to_vec()));
        assert!(matches!(result, Err(Error::ProtocolViolation(_))));
    }

    #[test]
    fn test_message_size_limit() {
        let mut asm = MessageAssembler::new(tight_limits());
        let result = asm.push(Frame::binary(vec![0; 150]));
        assert!(matches!(result, Err(Error::MessageTooLarge { .. })));
    }

    #[test]
    fn test_fragment_count_limit() {
        let mut asm = MessageAssembler::new(tight_limits());
        asm.push(Frame::new(false, OpCode::Binary, vec![1])).unwrap();
        asm.push(Frame::new(false, OpCode::Continuation, vec![2]))
            .unwrap();
        asm.push(Frame::new(false, OpCode::Continuation, vec![3]))
            .unwrap();
        let result = asm.push(Frame::new(true, OpCode::Continuation, vec![4]));
        assert!(matches!(result, Err(Error::TooManyFragments { .. })));
    }

    #[test]
    fn test_utf8_split_across_fragments() {
        let mut asm = MessageAssembler::new(Limits::default());
        asm.push(Frame::new(false, OpCode::Text, vec![0xf0, 0x9f]))
            .unwrap();
        let msg = asm
            .push(Frame::new(true, OpCode::Continuation, vec![0x8e, 0x89]))
            .unwrap()
            .unwrap();
        assert_eq!(msg.into_text().unwrap(), "🎉");
    }

    #[test]
    fn test_invalid_utf8_rejected_early() {
        let mut asm = MessageAssembler::new(Limits::default());
        let result = asm.push(Frame::new(false, OpCode::Text, vec![0x80, 0x81]));
        assert!(matches!(result, Err(Error::InvalidUtf8)));
    }

    #[test]
    fn test_binary_skips_utf8_validation() {
        let mut asm = MessageAssembler::new(Limits::default());
        let msg = asm
            .push(Frame::binary(vec![0x80, 0x81, 0xff]))
            .unwrap()
            .unwrap();
        assert_eq!(msg.into_binary(), vec![0x80, 0x81, 0xff]);
    }

    #[test]
    fn test_reset_clears_partial_message() {
        let mut asm = MessageAssembler::new(Limits::default());
        asm.push(Frame::new(false, OpCode::Text, b"partial".to_vec()))
            .unwrap();
        asm.reset();
        assert!(!asm.is_assembling());

        let msg = asm.push(Frame::text(b"fresh".to_vec())).unwrap();
        assert!(msg.is_some());
    }
}
