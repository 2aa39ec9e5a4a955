//! Connection lifecycle: endpoint role and the client state machine.

pub mod role;
pub mod state;

pub use role::Role;
pub use state::{ClientState, CloseReason};
