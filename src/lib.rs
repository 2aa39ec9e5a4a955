//! # wsclient - Asynchronous WebSocket Client
//!
//! `wsclient` is an RFC 6455 WebSocket client built around a single
//! connection lifecycle: open, exchange messages, close.
//!
//! ## Features
//!
//! - **Callback-driven API**: lifecycle and data events arrive through a
//!   [`Listener`], serially and in order
//! - **One handle, any thread**: [`WebSocketClient`] is clonable and every
//!   method is safe to call from listener callbacks
//! - **Bounded memory**: a byte-counted send queue rejects writes instead
//!   of buffering without limit, and inbound frames are size-checked before
//!   their payloads are buffered
//! - **Orderly shutdown**: close handshake with a configurable grace
//!   period, and exactly one `on_close` however the connection ends
//! - **TLS** for wss:// via rustls (feature `tls-rustls`)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsclient::{Config, Listener, WebSocketClient};
//!
//! struct Echo;
//!
//! impl Listener for Echo {
//!     fn on_connect(&mut self, result: wsclient::Result<()>) {
//!         println!("connected: {result:?}");
//!     }
//!     fn on_text(&mut self, text: String) {
//!         println!("received: {text}");
//!     }
//!     fn on_binary(&mut self, data: Vec<u8>) {
//!         println!("received {} bytes", data.len());
//!     }
//!     fn on_close(&mut self) {
//!         println!("closed");
//!     }
//! }
//!
//! let client = WebSocketClient::with_config(Config::default());
//! client.set_listener(Echo);
//! client.open("ws://127.0.0.1:9001/echo")?;
//! // ... later, from any thread:
//! client.send_text("hello")?;
//! client.close();
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod listener;
pub mod message;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod client;
#[cfg(feature = "async-tokio")]
pub mod codec;

#[cfg(feature = "tls-rustls")]
pub mod tls;

pub use config::{Config, Limits, Timeouts, TlsPolicy};
pub use connection::{ClientState, CloseReason, Role};
pub use error::{Error, Result};
pub use listener::{CallbackExecutor, InlineExecutor, Listener};
pub use message::{CloseCode, CloseFrame};
pub use protocol::{OpCode, compute_accept_key};

#[cfg(feature = "async-tokio")]
pub use client::{WebSocketClient, WsUrl};
#[cfg(feature = "async-tokio")]
pub use codec::FrameCodec;
