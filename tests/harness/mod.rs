//! Shared fixtures for client integration tests: an in-process WebSocket
//! server and a listener that records events onto a channel.

mod server;

pub use server::{ServerMode, TestServer};

use std::time::Duration;

use tokio::sync::mpsc;

use wsclient::Listener;

/// Everything a listener can observe, flattened for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ev {
    ConnectOk,
    ConnectErr(String),
    Text(String),
    Binary(Vec<u8>),
    Close,
}

/// Listener that forwards every callback onto an unbounded channel.
pub struct RecordingListener {
    tx: mpsc::UnboundedSender<Ev>,
}

impl Listener for RecordingListener {
    fn on_connect(&mut self, result: Result<(), wsclient::Error>) {
        let ev = match result {
            Ok(()) => Ev::ConnectOk,
            Err(e) => Ev::ConnectErr(e.to_string()),
        };
        let _ = self.tx.send(ev);
    }

    fn on_text(&mut self, text: String) {
        let _ = self.tx.send(Ev::Text(text));
    }

    fn on_binary(&mut self, data: Vec<u8>) {
        let _ = self.tx.send(Ev::Binary(data));
    }

    fn on_close(&mut self) {
        let _ = self.tx.send(Ev::Close);
    }
}

/// Build a recording listener and the receiving end of its event stream.
pub fn recording_listener() -> (RecordingListener, mpsc::UnboundedReceiver<Ev>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RecordingListener { tx }, rx)
}

/// Receive the next event, failing the test after `secs` seconds.
pub async fn next_ev(rx: &mut mpsc::UnboundedReceiver<Ev>, secs: u64) -> Ev {
    tokio::time::timeout(Duration::from_secs(secs), rx.recv())
        .await
        .expect("timed out waiting for listener event")
        .expect("event channel closed")
}

/// Assert that no further event arrives within the window.
pub async fn assert_no_ev(rx: &mut mpsc::UnboundedReceiver<Ev>, millis: u64) {
    let got = tokio::time::timeout(Duration::from_millis(millis), rx.recv()).await;
    assert!(got.is_err(), "unexpected event: {:?}", got.unwrap());
}
