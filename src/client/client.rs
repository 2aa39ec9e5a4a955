//! The public client handle.
//!
//! A [`WebSocketClient`] owns one connection lifecycle. The handle is cheap
//! to clone and every method is callable from any thread, including from
//! inside listener callbacks; actual I/O runs on a driver task spawned by
//! [`WebSocketClient::open`].

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::client::backpressure::SendBudget;
use crate::client::task;
use crate::client::url::WsUrl;
use crate::config::Config;
use crate::connection::{ClientState, CloseReason};
use crate::error::{Error, Result};
use crate::listener::{CallbackExecutor, InlineExecutor, Listener};
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::OpCode;

/// Commands from the handle to the driver task.
pub(crate) enum Command {
    Send { opcode: OpCode, payload: Vec<u8> },
    Close { frame: Option<CloseFrame> },
}

/// Lifecycle fields guarded by one lock so state, close reason and the
/// command channel always change together.
pub(crate) struct Lifecycle {
    pub state: ClientState,
    pub close_reason: Option<CloseReason>,
    pub cmd_tx: Option<mpsc::UnboundedSender<Command>>,
    pub subprotocol: Option<String>,
}

/// Listener storage. The epoch counts installs and removals so a dispatch
/// that temporarily took the listener out can tell whether the callback
/// replaced it.
pub(crate) struct ListenerSlot {
    pub listener: Option<Box<dyn Listener>>,
    pub epoch: u64,
}

/// State shared between the handle and the driver task.
pub(crate) struct Shared {
    pub lifecycle: Mutex<Lifecycle>,
    pub budget: SendBudget,
    pub listener: Mutex<ListenerSlot>,
    pub executor: Arc<dyn CallbackExecutor>,
    pub config: Config,
    pub close_delivered: AtomicBool,
}

impl Shared {
    /// Lock the lifecycle, recovering from a poisoned lock. A callback that
    /// panicked must not wedge every handle afterwards.
    pub(crate) fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn listener(&self) -> MutexGuard<'_, ListenerSlot> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run a listener callback through the executor.
///
/// The listener is taken out of its lock for the duration of the callback,
/// so a listener that calls back into the client (including
/// `set_listener`/`clear_listener`) cannot deadlock. It is put back
/// afterwards unless the callback installed a replacement or cleared it.
pub(crate) fn dispatch<F>(shared: &Arc<Shared>, f: F)
where
    F: FnOnce(&mut dyn Listener) + Send + 'static,
{
    let executor = Arc::clone(&shared.executor);
    let shared = Arc::clone(shared);
    executor.execute(Box::new(move || {
        let (mut listener, epoch) = {
            let mut slot = shared.listener();
            match slot.listener.take() {
                Some(listener) => (listener, slot.epoch),
                None => return,
            }
        };

        f(listener.as_mut());

        let mut slot = shared.listener();
        if slot.epoch == epoch {
            slot.listener = Some(listener);
        }
    }));
}

/// Asynchronous WebSocket client for one connection lifecycle.
///
/// ```no_run
/// use wsclient::{Config, WebSocketClient};
///
/// # async fn example() -> wsclient::Result<()> {
/// let client = WebSocketClient::with_config(Config::default());
/// client.open("ws://127.0.0.1:9001/echo")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WebSocketClient {
    shared: Arc<Shared>,
}

impl Default for WebSocketClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketClient {
    /// Create a client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a client with the given configuration. Callbacks run inline
    /// on the driver task.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_executor(config, Arc::new(InlineExecutor))
    }

    /// Create a client that delivers callbacks through `executor`.
    #[must_use]
    pub fn with_executor(config: Config, executor: Arc<dyn CallbackExecutor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle {
                    state: ClientState::Idle,
                    close_reason: None,
                    cmd_tx: None,
                    subprotocol: None,
                }),
                budget: SendBudget::new(config.max_send_queue_bytes),
                listener: Mutex::new(ListenerSlot {
                    listener: None,
                    epoch: 0,
                }),
                executor,
                config,
                close_delivered: AtomicBool::new(false),
            }),
        }
    }

    /// Install the event listener. Replaces any previous one. Safe to call
    /// from inside a callback.
    pub fn set_listener<L: Listener + 'static>(&self, listener: L) {
        let mut slot = self.shared.listener();
        slot.epoch += 1;
        slot.listener = Some(Box::new(listener));
    }

    /// Remove the listener. Subsequent events are dropped. Safe to call
    /// from inside a callback.
    pub fn clear_listener(&self) {
        let mut slot = self.shared.listener();
        slot.epoch += 1;
        slot.listener = None;
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        self.shared.lifecycle().state
    }

    /// Why the connection closed. `None` until the client reaches `Closed`.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.lifecycle().close_reason.clone()
    }

    /// Subprotocol the server selected, once open.
    #[must_use]
    pub fn subprotocol(&self) -> Option<String> {
        self.shared.lifecycle().subprotocol.clone()
    }

    /// Bytes currently queued for sending.
    #[must_use]
    pub fn queued_bytes(&self) -> usize {
        self.shared.budget.queued()
    }

    /// Start connecting to `url` (`ws://` or `wss://`).
    ///
    /// Returns immediately; the TCP connect, optional TLS negotiation and
    /// upgrade handshake run on a spawned driver task. The outcome arrives
    /// via `Listener::on_connect`. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidUrl` for an unusable URL; the client stays `Idle`
    /// - `Error::InvalidState` when not in `Idle` (one connection per client)
    pub fn open(&self, url: &str) -> Result<()> {
        let parsed = WsUrl::parse(url)?;

        let rx = {
            let mut lc = self.shared.lifecycle();
            if lc.state != ClientState::Idle {
                return Err(Error::InvalidState {
                    op: "open",
                    state: lc.state.name(),
                });
            }
            let (tx, rx) = mpsc::unbounded_channel();
            lc.cmd_tx = Some(tx);
            lc.state = ClientState::Connecting;
            rx
        };

        tokio::spawn(task::run(Arc::clone(&self.shared), parsed, rx));
        Ok(())
    }

    /// Queue a text message. Returns the total number of bytes queued for
    /// sending after this message was accepted.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` unless the connection is `Open`
    /// - `Error::BackpressureExceeded` when the queue limit would be passed;
    ///   nothing is queued and the connection is unaffected
    pub fn send_text(&self, text: impl Into<String>) -> Result<usize> {
        self.send(OpCode::Text, text.into().into_bytes())
    }

    /// Queue a binary message. Returns the total number of bytes queued for
    /// sending after this message was accepted.
    ///
    /// # Errors
    ///
    /// Same as [`WebSocketClient::send_text`].
    pub fn send_binary(&self, data: Vec<u8>) -> Result<usize> {
        self.send(OpCode::Binary, data)
    }

    fn send(&self, opcode: OpCode, payload: Vec<u8>) -> Result<usize> {
        let len = payload.len();

        let tx = {
            let lc = self.shared.lifecycle();
            if !lc.state.can_send() {
                return Err(Error::InvalidState {
                    op: "send",
                    state: lc.state.name(),
                });
            }
            lc.cmd_tx.clone().ok_or(Error::InvalidState {
                op: "send",
                state: lc.state.name(),
            })?
        };

        let total = self
            .shared
            .budget
            .try_reserve(len)
            .map_err(|queued| Error::BackpressureExceeded {
                queued,
                limit: self.shared.budget.limit(),
            })?;

        if tx.send(Command::Send { opcode, payload }).is_err() {
            // Driver already gone; the state check above raced with teardown.
            self.shared.budget.release(len);
            return Err(Error::ConnectionClosed(None));
        }
        Ok(total)
    }

    /// Close with status 1000 (normal closure).
    pub fn close(&self) {
        self.close_with(CloseCode::Normal, "");
    }

    /// Start an orderly close with the given status code and reason.
    ///
    /// In `Open` this sends a close frame and waits (bounded by the
    /// configured grace period) for the peer's acknowledgement. In
    /// `Connecting` it abandons the attempt. In `Idle`, `Closing` or
    /// `Closed` it does nothing. Safe to call any number of times.
    pub fn close_with(&self, code: CloseCode, reason: &str) {
        let tx = {
            let mut lc = self.shared.lifecycle();
            match lc.state {
                ClientState::Idle | ClientState::Closing | ClientState::Closed => return,
                ClientState::Open => lc.state = ClientState::Closing,
                ClientState::Connecting => {}
            }
            lc.cmd_tx.clone()
        };

        if let Some(tx) = tx {
            let _ = tx.send(Command::Close {
                frame: Some(CloseFrame::new(code, reason)),
            });
        }
    }
}

impl std::fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lc = self.shared.lifecycle();
        f.debug_struct("WebSocketClient")
            .field("state", &lc.state)
            .field("queued_bytes", &self.shared.budget.queued())
            .finish_non_exhaustive()
    }
}
