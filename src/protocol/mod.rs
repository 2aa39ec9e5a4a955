//! Wire protocol: framing, masking, handshake, fragmentation and
//! reassembly (RFC 6455).

pub mod assembler;
pub mod fragmenter;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod utf8;
pub mod validation;

pub use assembler::{AssembledMessage, MessageAssembler};
pub use fragmenter::Fragmenter;
pub use frame::{Frame, MAX_CONTROL_FRAME_PAYLOAD, parse_close_payload};
pub use handshake::{ClientHandshake, UpgradeRequest, UpgradeResponse, compute_accept_key};
pub use mask::{apply_mask, generate_mask};
pub use opcode::OpCode;
pub use utf8::Utf8Validator;
pub use validation::FrameValidator;
