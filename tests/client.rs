//! End-to-end client tests against an in-process server.

mod harness;

use std::time::Duration;

use harness::{Ev, RecordingListener, ServerMode, TestServer, assert_no_ev, next_ev, recording_listener};
use wsclient::{ClientState, CloseCode, CloseReason, Config, Error, Listener, WebSocketClient};

#[tokio::test]
async fn test_echo_text_and_binary() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let client = WebSocketClient::new();
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/echo")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);
    assert_eq!(client.state(), ClientState::Open);

    client.send_text("hello").unwrap();
    client.send_binary(vec![0xDE, 0xAD, 0xBE, 0xEF]).unwrap();

    assert_eq!(next_ev(&mut rx, 5).await, Ev::Text("hello".into()));
    assert_eq!(
        next_ev(&mut rx, 5).await,
        Ev::Binary(vec![0xDE, 0xAD, 0xBE, 0xEF])
    );

    client.close();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);
    assert_eq!(client.state(), ClientState::Closed);
}

#[tokio::test]
async fn test_message_order_preserved() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let client = WebSocketClient::new();
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);

    for i in 0..20 {
        client.send_text(format!("msg-{i}")).unwrap();
    }
    for i in 0..20 {
        assert_eq!(next_ev(&mut rx, 5).await, Ev::Text(format!("msg-{i}")));
    }
}

#[tokio::test]
async fn test_connect_refused_reports_error_then_close() {
    let client = WebSocketClient::new();
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    // Nothing listens on port 1.
    client.open("ws://127.0.0.1:1").unwrap();

    assert!(matches!(next_ev(&mut rx, 10).await, Ev::ConnectErr(_)));
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);
    assert_no_ev(&mut rx, 200).await;

    assert_eq!(client.state(), ClientState::Closed);
    assert!(matches!(
        client.close_reason(),
        Some(CloseReason::ConnectFailed(_))
    ));
}

#[tokio::test]
async fn test_rejected_upgrade_reports_error() {
    let server = TestServer::spawn(ServerMode::RejectUpgrade).await;
    let client = WebSocketClient::new();
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/nope")).unwrap();

    assert!(matches!(next_ev(&mut rx, 5).await, Ev::ConnectErr(_)));
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);
    assert_eq!(client.state(), ClientState::Closed);
}

#[tokio::test]
async fn test_peer_initiated_close() {
    let server = TestServer::spawn(ServerMode::CloseOnConnect).await;
    let client = WebSocketClient::new();
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);

    match client.close_reason() {
        Some(CloseReason::Peer(Some(frame))) => {
            assert_eq!(frame.code, CloseCode::Normal);
            assert_eq!(frame.reason, "bye");
        }
        other => panic!("unexpected close reason: {other:?}"),
    }
}

#[tokio::test]
async fn test_double_close_delivers_one_event() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let client = WebSocketClient::new();
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);

    client.close();
    client.close();

    assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);
    assert_no_ev(&mut rx, 200).await;
}

#[tokio::test]
async fn test_send_in_wrong_state() {
    let client = WebSocketClient::new();
    assert!(matches!(
        client.send_text("too early"),
        Err(Error::InvalidState {
            op: "send",
            state: "Idle"
        })
    ));

    let server = TestServer::spawn(ServerMode::Echo).await;
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);
    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);
    client.close();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);

    assert!(matches!(
        client.send_text("too late"),
        Err(Error::InvalidState {
            op: "send",
            state: "Closed"
        })
    ));
}

#[tokio::test]
async fn test_backpressure_rejects_oversized_send() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let config = Config::default().with_max_send_queue_bytes(8);
    let client = WebSocketClient::with_config(config);
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);

    // A 100-byte payload cannot fit an 8-byte queue, ever.
    let err = client.send_text("x".repeat(100)).unwrap_err();
    assert!(matches!(
        err,
        Error::BackpressureExceeded { queued: 100, limit: 8 }
    ));

    // The connection itself is unaffected.
    client.send_text("ok").unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Text("ok".into()));
}

#[tokio::test]
async fn test_subprotocol_negotiation() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let config = Config::default().with_subprotocols(vec!["chat".into(), "superchat".into()]);
    let client = WebSocketClient::with_config(config);
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);

    // The test server accepts the first offered protocol.
    assert_eq!(client.subprotocol().as_deref(), Some("chat"));
}

#[tokio::test]
async fn test_close_grace_expires_without_ack() {
    let server = TestServer::spawn(ServerMode::IgnoreClose).await;
    let config = Config::default().with_close_grace(Duration::from_millis(200));
    let client = WebSocketClient::with_config(config);
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);

    client.close();

    // The peer never acknowledges; the grace timer must force teardown.
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);
    assert_eq!(client.state(), ClientState::Closed);
    assert!(matches!(client.close_reason(), Some(CloseReason::Local(_))));
}

#[tokio::test]
async fn test_keepalive_pings() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let config = Config::default().with_ping_interval(Duration::from_millis(100));
    let client = WebSocketClient::with_config(config);
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(
        server.pings_received() >= 2,
        "expected at least 2 pings, got {}",
        server.pings_received()
    );

    client.close();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);
}

#[tokio::test]
async fn test_fragmented_message_roundtrip() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    // Small outbound frames force fragmentation on the wire.
    let config = Config::default().with_max_frame_size(64);
    let client = WebSocketClient::with_config(config);
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);

    let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    client.send_binary(payload.clone()).unwrap();

    assert_eq!(next_ev(&mut rx, 5).await, Ev::Binary(payload));
}

#[tokio::test]
async fn test_close_while_connecting() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let client = WebSocketClient::new();
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    client.close();

    // Whether the handshake won the race or not, exactly one close event
    // must arrive and the terminal state must be Closed.
    loop {
        match next_ev(&mut rx, 5).await {
            Ev::Close => break,
            Ev::ConnectOk | Ev::ConnectErr(_) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_no_ev(&mut rx, 200).await;
    assert_eq!(client.state(), ClientState::Closed);
}

#[tokio::test]
async fn test_open_rejected_after_use() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let client = WebSocketClient::new();
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);

    // One handle drives one connection lifecycle.
    assert!(matches!(
        client.open(&server.url("/")),
        Err(Error::InvalidState { op: "open", .. })
    ));

    client.close();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);
    assert!(matches!(
        client.open(&server.url("/")),
        Err(Error::InvalidState { op: "open", .. })
    ));
}

#[tokio::test]
async fn test_send_reports_cumulative_queued_bytes() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let client = WebSocketClient::new();
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);

    // On the current-thread runtime the driver cannot drain the queue
    // between two synchronous sends, so the totals are deterministic.
    assert_eq!(client.send_text("0123456789").unwrap(), 10);
    assert_eq!(client.send_binary(vec![0; 5]).unwrap(), 15);

    assert_eq!(next_ev(&mut rx, 5).await, Ev::Text("0123456789".into()));
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Binary(vec![0; 5]));
}

struct ClearOnConnect {
    client: WebSocketClient,
    done: tokio::sync::mpsc::UnboundedSender<()>,
}

impl Listener for ClearOnConnect {
    fn on_connect(&mut self, result: wsclient::Result<()>) {
        result.unwrap();
        self.client.clear_listener();
        let _ = self.done.send(());
    }
    fn on_text(&mut self, _text: String) {}
    fn on_binary(&mut self, _data: Vec<u8>) {}
    fn on_close(&mut self) {}
}

#[tokio::test]
async fn test_clear_listener_from_callback() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let client = WebSocketClient::new();
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
    client.set_listener(ClearOnConnect {
        client: client.clone(),
        done: done_tx,
    });

    client.open(&server.url("/")).unwrap();

    // The callback must run to completion instead of blocking on the
    // listener slot it is being delivered from.
    tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
        .await
        .expect("on_connect never finished")
        .unwrap();
    assert_eq!(client.state(), ClientState::Open);

    // No listener remains, so teardown is observed through the state.
    client.close();
    for _ in 0..50 {
        if client.state() == ClientState::Closed {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("client never reached Closed");
}

struct HandoffOnConnect {
    client: WebSocketClient,
    replacement: Option<RecordingListener>,
}

impl Listener for HandoffOnConnect {
    fn on_connect(&mut self, result: wsclient::Result<()>) {
        result.unwrap();
        if let Some(next) = self.replacement.take() {
            self.client.set_listener(next);
        }
    }
    fn on_text(&mut self, _text: String) {}
    fn on_binary(&mut self, _data: Vec<u8>) {}
    fn on_close(&mut self) {}
}

#[tokio::test]
async fn test_replace_listener_from_callback() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let client = WebSocketClient::new();
    let (replacement, mut rx) = recording_listener();
    client.set_listener(HandoffOnConnect {
        client: client.clone(),
        replacement: Some(replacement),
    });

    client.open(&server.url("/")).unwrap();

    // The original listener consumed the connect event; wait on the state.
    for _ in 0..50 {
        if client.state() == ClientState::Open {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(client.state(), ClientState::Open);

    // A listener installed mid-callback must not be overwritten when the
    // callback returns; later events belong to the replacement.
    client.send_text("routed").unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Text("routed".into()));

    client.close();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);
}

#[tokio::test]
async fn test_queue_accounting_reaches_zero_on_close() {
    let server = TestServer::spawn(ServerMode::CloseOnConnect).await;

    // Sends racing the peer's close may never reach the wire; teardown must
    // still return their byte reservations. Repeat to cover both outcomes
    // of the race.
    for _ in 0..20 {
        let client = WebSocketClient::new();
        let (listener, mut rx) = recording_listener();
        client.set_listener(listener);

        client.open(&server.url("/")).unwrap();
        assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);

        for _ in 0..4 {
            let _ = client.send_text("left in the queue");
        }

        assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);
        assert_eq!(client.queued_bytes(), 0);
    }
}

#[tokio::test]
async fn test_clone_shares_connection() {
    let server = TestServer::spawn(ServerMode::Echo).await;
    let client = WebSocketClient::new();
    let (listener, mut rx) = recording_listener();
    client.set_listener(listener);

    client.open(&server.url("/")).unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::ConnectOk);

    let other = client.clone();
    other.send_text("from the clone").unwrap();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Text("from the clone".into()));

    other.close();
    assert_eq!(next_ev(&mut rx, 5).await, Ev::Close);
    assert_eq!(client.state(), ClientState::Closed);
}
