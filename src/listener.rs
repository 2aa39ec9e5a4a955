//! Application-facing event delivery: the [`Listener`] trait and the
//! [`CallbackExecutor`] seam.
//!
//! All callbacks for one client are delivered serially, in order, from a
//! single logical execution context; the application never has to
//! synchronize around its own listener. The executor decides *where* that
//! context runs (inline on the connection driver by default, or posted to
//! the application's preferred thread/event loop).

use crate::error::Error;

/// Receives connection lifecycle and data events.
///
/// Contract, per connection:
/// - `on_connect` fires at most once per `open()` call: `Ok(())` on a
///   successful handshake, `Err(e)` on any establishment failure.
/// - `on_text` / `on_binary` fire once per fully reassembled message, in
///   arrival order.
/// - `on_close` fires exactly once per connection lifetime, regardless of
///   how closing was triggered (local close, peer close, error, failed
///   connect). It is the definitive teardown signal.
///
/// The listener is optional: a client with no listener set simply drops
/// events. This is a deliberate configuration choice, not an error.
///
/// Calling back into the client (e.g. `close()`) from inside a callback is
/// safe and does not deadlock.
pub trait Listener: Send {
    /// Connection establishment finished.
    fn on_connect(&mut self, result: Result<(), Error>);

    /// A complete text message arrived.
    fn on_text(&mut self, text: String);

    /// A complete binary message arrived.
    fn on_binary(&mut self, data: Vec<u8>);

    /// The connection is fully torn down.
    fn on_close(&mut self);
}

/// Runs listener callbacks on the application's preferred execution context.
///
/// The client hands every callback to the executor in order, one at a time.
/// Implementations must execute closures serially and in submission order to
/// preserve the delivery contract; a single-threaded event loop or a
/// dedicated dispatch thread both qualify.
pub trait CallbackExecutor: Send + Sync {
    /// Execute the callback closure.
    fn execute(&self, f: Box<dyn FnOnce() + Send>);
}

/// Default executor: runs callbacks inline on the connection driver task.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, f: Box<dyn FnOnce() + Send>) {
        f();
    }
}
