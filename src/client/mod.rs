//! The asynchronous client: public handle, URL handling, send budget and
//! the connection driver.

mod backpressure;
#[allow(clippy::module_inception)]
mod client;
mod stream;
mod task;
mod url;

pub use client::WebSocketClient;
pub use url::WsUrl;
