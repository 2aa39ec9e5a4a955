//! Frame parsing and serialization (RFC 6455 Section 5).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                 Masking key (if MASK set)                     |
//! +---------------------------------------------------------------+
//! |                         Payload data                          |
//! +---------------------------------------------------------------+
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask;

/// Maximum payload size for control frames (RFC 6455 Section 5.5).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Decoded fixed header of a frame.
///
/// Exposed crate-internally so the codec can validate masking, reserved
/// bits and payload size before the full payload has been buffered.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    pub payload_len: usize,
    /// Total header size including extended length and mask key.
    pub header_len: usize,
}

/// Parse the frame header from the start of `buf`.
///
/// Returns `Error::IncompleteFrame` until enough header bytes are present.
pub(crate) fn parse_header(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() < 2 {
        return Err(Error::IncompleteFrame {
            needed: 2 - buf.len(),
        });
    }

    let byte0 = buf[0];
    let byte1 = buf[1];

    let fin = byte0 & 0x80 != 0;
    let rsv1 = byte0 & 0x40 != 0;
    let rsv2 = byte0 & 0x20 != 0;
    let rsv3 = byte0 & 0x10 != 0;
    let opcode = OpCode::from_u8(byte0 & 0x0F)?;

    let masked = byte1 & 0x80 != 0;
    let len7 = byte1 & 0x7F;

    let (payload_len, len_field_end) = match len7 {
        0..=125 => (len7 as usize, 2),
        126 => {
            if buf.len() < 4 {
                return Err(Error::IncompleteFrame {
                    needed: 4 - buf.len(),
                });
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
        }
        127 => {
            if buf.len() < 10 {
                return Err(Error::IncompleteFrame {
                    needed: 10 - buf.len(),
                });
            }
            let len = u64::from_be_bytes([
                buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
            ]);
            let len = usize::try_from(len).map_err(|_| Error::FrameTooLarge {
                size: usize::MAX,
                max: usize::MAX,
            })?;
            (len, 10)
        }
        _ => unreachable!(),
    };

    let header_len = if masked {
        len_field_end + 4
    } else {
        len_field_end
    };
    if buf.len() < header_len {
        return Err(Error::IncompleteFrame {
            needed: header_len - buf.len(),
        });
    }

    let mask = masked.then(|| {
        [
            buf[len_field_end],
            buf[len_field_end + 1],
            buf[len_field_end + 2],
            buf[len_field_end + 3],
        ]
    });

    Ok(FrameHeader {
        fin,
        rsv1,
        rsv2,
        rsv3,
        opcode,
        mask,
        payload_len,
        header_len,
    })
}

/// A single WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1; must be 0 without a negotiated extension.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Unmasked payload bytes.
    payload: Vec<u8>,
}

impl Frame {
    /// Create a frame with the given parameters.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            payload,
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Create a close frame with optional status code and reason.
    ///
    /// The reason is truncated on a UTF-8 boundary so the payload stays
    /// within the 125-byte control frame limit.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = code.to_be_bytes().to_vec();
                let mut reason = reason;
                while reason.len() > MAX_CONTROL_FRAME_PAYLOAD - 2 {
                    let mut cut = reason.len() - 1;
                    while !reason.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    reason = &reason[..cut];
                }
                data.extend_from_slice(reason.as_bytes());
                data
            }
            None => Vec::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Borrow the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Parse one frame from `buf`, returning it and the bytes consumed.
    ///
    /// Masked payloads are unmasked during parsing.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` until the whole frame is buffered
    /// - `Error::ReservedOpcode` / `Error::InvalidOpcode` on bad opcodes
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = parse_header(buf)?;

        let total = header
            .header_len
            .checked_add(header.payload_len)
            .ok_or(Error::FrameTooLarge {
                size: header.payload_len,
                max: usize::MAX - header.header_len,
            })?;

        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        let mut payload = buf[header.header_len..total].to_vec();
        if let Some(mask) = header.mask {
            apply_mask(&mut payload, mask);
        }

        Ok((
            Frame {
                fin: header.fin,
                rsv1: header.rsv1,
                rsv2: header.rsv2,
                rsv3: header.rsv3,
                opcode: header.opcode,
                payload,
            },
            total,
        ))
    }

    /// Validate frame invariants (RFC 6455 Sections 5.2 and 5.5).
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if any RSV bit is set
    /// - `Error::FragmentedControlFrame` for a control frame with FIN=0
    /// - `Error::ControlFrameTooLarge` for a control payload over 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }

        Ok(())
    }

    /// Append the wire encoding of this frame to `buf`.
    ///
    /// `mask` must be `Some` for client frames and `None` for server frames.
    pub fn encode(&self, buf: &mut BytesMut, mask: Option<[u8; 4]>) {
        buf.reserve(self.wire_size(mask.is_some()));

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }
        buf.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0 };
        let len = self.payload.len();
        if len <= 125 {
            buf.put_u8(mask_bit | len as u8);
        } else if len <= u16::MAX as usize {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(len as u16);
        } else {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(len as u64);
        }

        match mask {
            Some(key) => {
                buf.put_slice(&key);
                let start = buf.len();
                buf.put_slice(&self.payload);
                apply_mask(&mut buf[start..], key);
            }
            None => buf.put_slice(&self.payload),
        }
    }

    /// Size of this frame on the wire.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let len = self.payload.len();
        let len_field = if len <= 125 {
            0
        } else if len <= u16::MAX as usize {
            2
        } else {
            8
        };
        2 + len_field + if masked { 4 } else { 0 } + len
    }
}

/// Decode and validate a close frame payload.
///
/// # Errors
///
/// - `Error::ProtocolViolation` for a 1-byte payload
/// - `Error::InvalidCloseCode` for codes that must not appear on the wire
/// - `Error::InvalidUtf8` for a non-UTF-8 reason
pub fn parse_close_payload(payload: &[u8]) -> Result<Option<CloseFrame>> {
    match payload.len() {
        0 => Ok(None),
        1 => Err(Error::ProtocolViolation(
            "Close payload must be empty or at least 2 bytes".into(),
        )),
        _ => {
            let raw = u16::from_be_bytes([payload[0], payload[1]]);
            let code = CloseCode::from_u16(raw);
            if !code.is_valid() {
                return Err(Error::InvalidCloseCode(raw));
            }
            let reason = std::str::from_utf8(&payload[2..])?;
            Ok(Some(CloseFrame::new(code, reason)))
        }
    }
}
