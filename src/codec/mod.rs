//! Async frame I/O over a transport stream.

mod framed;

pub use framed::FrameCodec;
