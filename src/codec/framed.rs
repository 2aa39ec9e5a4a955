//! Async frame codec over any byte stream.
//!
//! Reads are validated in two stages: the header alone is checked against
//! masking, RSV and size rules first, so an oversized or malformed frame is
//! rejected before its payload is ever buffered.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::frame::parse_header;
use crate::protocol::{Frame, FrameValidator, generate_mask};

/// Frame reader/writer bound to one transport stream.
pub struct FrameCodec<T> {
    io: T,
    read_buf: BytesMut,
    write_buf: BytesMut,
    role: Role,
    validator: FrameValidator,
}

impl<T> FrameCodec<T> {
    #[must_use]
    pub fn new(io: T, role: Role, config: &Config) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            write_buf: BytesMut::with_capacity(config.write_buffer_size),
            role,
            validator: FrameValidator::new(role, config.limits.clone()),
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Seed the read buffer with bytes that arrived alongside an earlier
    /// exchange on the same stream (e.g. frames pipelined after the
    /// handshake response).
    pub fn feed(&mut self, bytes: &[u8]) {
        self.read_buf.extend_from_slice(bytes);
    }

    /// Hand back the transport, discarding buffered data.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> FrameCodec<T> {
    /// Read and validate the next frame.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed(None)` on EOF
    /// - validation errors per [`FrameValidator`] and [`Frame::validate`]
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            match parse_header(&self.read_buf) {
                Ok(header) => {
                    self.validator.validate_incoming(
                        header.mask.is_some(),
                        header.rsv1,
                        header.rsv2,
                        header.rsv3,
                        header.payload_len,
                    )?;

                    match Frame::parse(&self.read_buf) {
                        Ok((frame, consumed)) => {
                            self.read_buf.advance(consumed);
                            frame.validate()?;
                            return Ok(frame);
                        }
                        Err(Error::IncompleteFrame { .. }) => {}
                        Err(e) => return Err(e),
                    }
                }
                Err(Error::IncompleteFrame { .. }) => {}
                Err(e) => return Err(e),
            }

            let n = self.io.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed(None));
            }
        }
    }

    /// Encode and write one frame, masking it if the role requires.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mask = self.role.must_mask().then(generate_mask);

        self.write_buf.clear();
        frame.encode(&mut self.write_buf, mask);
        self.io.write_all(&self.write_buf).await?;
        Ok(())
    }

    /// Flush the transport.
    pub async fn flush(&mut self) -> Result<()> {
        self.io.flush().await?;
        Ok(())
    }
}
