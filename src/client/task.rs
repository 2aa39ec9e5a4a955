//! Connection driver task.
//!
//! One task per `open()` call owns the transport end to end: connect, TLS,
//! upgrade, the frame session, the close handshake, and the final teardown.
//! The handle talks to it only through the command channel and the shared
//! lifecycle lock.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::client::client::{Command, Shared, dispatch};
use crate::client::stream::ClientStream;
use crate::client::url::WsUrl;
use crate::codec::FrameCodec;
use crate::config::Config;
use crate::connection::{ClientState, CloseReason, Role};
use crate::error::{Error, Result};
use crate::message::CloseFrame;
use crate::protocol::handshake::find_head_end;
use crate::protocol::{
    AssembledMessage, ClientHandshake, Fragmenter, Frame, MessageAssembler, OpCode,
    UpgradeResponse, parse_close_payload,
};

/// How the frame session ended.
enum SessionEnd {
    /// `close()` was called locally.
    LocalClose(Option<CloseFrame>),
    /// The peer sent a close frame.
    PeerClose(Option<CloseFrame>),
    /// A protocol or transport error forced teardown.
    Fatal(Error),
}

enum Established {
    Ready(Box<FrameCodec<ClientStream>>, Option<String>),
    Cancelled,
}

/// Entry point of the driver task.
pub(crate) async fn run(shared: Arc<Shared>, url: WsUrl, mut rx: UnboundedReceiver<Command>) {
    debug!(url = %url, "connecting");

    let (mut codec, protocol) = match establish(&shared, &url, &mut rx).await {
        Ok(Established::Ready(codec, protocol)) => (codec, protocol),
        Ok(Established::Cancelled) => {
            debug!("connection attempt abandoned by close()");
            shutdown(&shared, CloseReason::Local(None), &mut rx).await;
            return;
        }
        Err(e) => {
            warn!(error = %e, "connect failed");
            let reason = CloseReason::ConnectFailed(e.to_string());
            dispatch(&shared, move |l| l.on_connect(Err(e)));
            shutdown(&shared, reason, &mut rx).await;
            return;
        }
    };

    {
        let mut lc = shared.lifecycle();
        if lc.state == ClientState::Connecting {
            lc.state = ClientState::Open;
        }
        lc.subprotocol = protocol;
    }
    dispatch(&shared, |l| l.on_connect(Ok(())));
    debug!("connection open");

    let reason = match session(&shared, &mut codec, &mut rx).await {
        SessionEnd::LocalClose(frame) => {
            {
                let mut lc = shared.lifecycle();
                if lc.state == ClientState::Open {
                    lc.state = ClientState::Closing;
                }
            }
            let code = frame.as_ref().map_or(1000, |f| f.code.as_u16());
            let text = frame.as_ref().map_or("", |f| f.reason.as_str());
            let sent = codec.write_frame(&Frame::close(Some(code), text)).await;
            let _ = codec.flush().await;
            if sent.is_ok() {
                await_close_ack(&mut codec, shared.config.close_grace).await;
            }
            CloseReason::Local(frame)
        }
        SessionEnd::PeerClose(frame) => {
            // Echo the peer's status code before tearing down.
            let code = frame.as_ref().map(|f| f.code.as_u16());
            let _ = codec.write_frame(&Frame::close(code, "")).await;
            let _ = codec.flush().await;
            CloseReason::Peer(frame)
        }
        SessionEnd::Fatal(e) => {
            warn!(error = %e, "connection failed");
            if let Some(code) = close_code_for(&e) {
                let _ = codec.write_frame(&Frame::close(Some(code), "")).await;
                let _ = codec.flush().await;
            }
            CloseReason::Error(e.to_string())
        }
    };

    drop(codec);
    shutdown(&shared, reason, &mut rx).await;
}

/// Close the command channel, release reservations for sends that will
/// never be written, then tear down. Commands queued while the session was
/// ending would otherwise pin their bytes in the budget forever.
async fn shutdown(
    shared: &Arc<Shared>,
    reason: CloseReason,
    rx: &mut UnboundedReceiver<Command>,
) {
    rx.close();
    while let Some(cmd) = rx.recv().await {
        if let Command::Send { payload, .. } = cmd {
            shared.budget.release(payload.len());
        }
    }
    finish(shared, reason);
}

/// Connect, negotiate TLS if needed, and run the upgrade handshake.
/// A `close()` arriving at any point abandons the attempt.
async fn establish(
    shared: &Arc<Shared>,
    url: &WsUrl,
    rx: &mut UnboundedReceiver<Command>,
) -> Result<Established> {
    let config = &shared.config;

    let connect = async {
        let tcp = match config.timeouts {
            Some(t) => timeout(t.connect, TcpStream::connect(url.addr()))
                .await
                .map_err(|_| Error::Timeout("connect"))??,
            None => TcpStream::connect(url.addr()).await?,
        };
        let _ = tcp.set_nodelay(true);

        let mut stream = if url.secure {
            connect_tls(tcp, url, config).await?
        } else {
            ClientStream::Plain(tcp)
        };

        let upgrade = upgrade(&mut stream, url, config);
        let (protocol, leftover) = match config.timeouts {
            Some(t) => timeout(t.handshake, upgrade)
                .await
                .map_err(|_| Error::Timeout("handshake"))??,
            None => upgrade.await?,
        };

        Ok::<_, Error>((stream, protocol, leftover))
    };

    tokio::select! {
        result = connect => {
            let (stream, protocol, leftover) = result?;
            let mut codec = FrameCodec::new(stream, Role::Client, config);
            codec.feed(&leftover);
            Ok(Established::Ready(Box::new(codec), protocol))
        }
        () = await_cancel(rx) => Ok(Established::Cancelled),
    }
}

/// Resolve only when a close command arrives.
async fn await_cancel(rx: &mut UnboundedReceiver<Command>) {
    loop {
        match rx.recv().await {
            Some(Command::Close { .. }) | None => return,
            // The state gate rejects sends before Open; a race here is
            // dropped the same way an unset listener drops events.
            Some(Command::Send { .. }) => {}
        }
    }
}

#[cfg(feature = "tls-rustls")]
async fn connect_tls(tcp: TcpStream, url: &WsUrl, config: &Config) -> Result<ClientStream> {
    let tls = crate::tls::connect(tcp, &url.host, &config.tls).await?;
    Ok(ClientStream::Tls(Box::new(tls)))
}

#[cfg(not(feature = "tls-rustls"))]
async fn connect_tls(_tcp: TcpStream, url: &WsUrl, _config: &Config) -> Result<ClientStream> {
    Err(Error::Tls(format!(
        "cannot connect to {url}: built without the tls-rustls feature"
    )))
}

/// Send the upgrade request and verify the response. Returns the selected
/// subprotocol and any bytes the server pipelined after the response head.
async fn upgrade(
    stream: &mut ClientStream,
    url: &WsUrl,
    config: &Config,
) -> Result<(Option<String>, Vec<u8>)> {
    let mut handshake = ClientHandshake::new(url.host_header(), url.resource.clone());
    if let Some(origin) = &config.origin {
        handshake = handshake.with_origin(origin.clone());
    }
    if !config.subprotocols.is_empty() {
        handshake = handshake.with_subprotocols(config.subprotocols.clone());
    }

    stream.write_all(&handshake.request_bytes()?).await?;
    stream.flush().await?;

    let mut buf = Vec::with_capacity(1024);
    let head_end = loop {
        if let Some(end) = find_head_end(&buf) {
            break end;
        }
        config.limits.check_handshake_size(buf.len())?;

        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::InvalidHandshake(
                "connection closed during handshake".into(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    };
    config.limits.check_handshake_size(head_end)?;

    let response = UpgradeResponse::parse(&buf[..head_end])?;
    let protocol = handshake.verify_response(&response)?;
    trace!(?protocol, "upgrade accepted");

    Ok((protocol, buf[head_end..].to_vec()))
}

enum Event {
    Cmd(Option<Command>),
    Frame(Result<Frame>),
    KeepaliveDue,
}

/// The open-state loop: pump commands out and frames in until something
/// ends the session.
async fn session(
    shared: &Arc<Shared>,
    codec: &mut FrameCodec<ClientStream>,
    rx: &mut UnboundedReceiver<Command>,
) -> SessionEnd {
    let mut assembler = MessageAssembler::new(shared.config.limits.clone());

    loop {
        // The keepalive timer restarts each iteration, so pings only go
        // out after a full quiet interval.
        let event = {
            let keepalive = async {
                match shared.config.ping_interval {
                    Some(interval) => tokio::time::sleep(interval).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                cmd = rx.recv() => Event::Cmd(cmd),
                frame = codec.read_frame() => Event::Frame(frame),
                () = keepalive => Event::KeepaliveDue,
            }
        };

        match event {
            Event::Cmd(Some(Command::Send { opcode, payload })) => {
                let len = payload.len();
                let result = write_message(codec, opcode, &payload, &shared.config).await;
                shared.budget.release(len);
                if let Err(e) = result {
                    return SessionEnd::Fatal(e);
                }
            }
            Event::Cmd(Some(Command::Close { frame })) => {
                return SessionEnd::LocalClose(frame);
            }
            Event::Cmd(None) => return SessionEnd::LocalClose(None),

            Event::Frame(Ok(frame)) => match frame.opcode {
                OpCode::Ping => {
                    trace!(len = frame.payload().len(), "ping");
                    let pong = Frame::pong(frame.into_payload());
                    if let Err(e) = write_control(codec, &pong).await {
                        return SessionEnd::Fatal(e);
                    }
                }
                OpCode::Pong => {
                    trace!(len = frame.payload().len(), "pong");
                }
                OpCode::Close => match parse_close_payload(frame.payload()) {
                    Ok(cf) => return SessionEnd::PeerClose(cf),
                    Err(e) => return SessionEnd::Fatal(e),
                },
                _ => match assembler.push(frame) {
                    Ok(Some(message)) => deliver(shared, message),
                    Ok(None) => {}
                    Err(e) => return SessionEnd::Fatal(e),
                },
            },
            Event::Frame(Err(e)) => return SessionEnd::Fatal(e),

            Event::KeepaliveDue => {
                trace!("keepalive ping");
                if let Err(e) = write_control(codec, &Frame::ping(Vec::new())).await {
                    return SessionEnd::Fatal(e);
                }
            }
        }
    }
}

async fn write_message(
    codec: &mut FrameCodec<ClientStream>,
    opcode: OpCode,
    payload: &[u8],
    config: &Config,
) -> Result<()> {
    for frame in Fragmenter::new(payload, opcode, config.max_frame_size) {
        codec.write_frame(&frame).await?;
    }
    codec.flush().await
}

async fn write_control(codec: &mut FrameCodec<ClientStream>, frame: &Frame) -> Result<()> {
    codec.write_frame(frame).await?;
    codec.flush().await
}

/// Hand a reassembled message to the listener.
fn deliver(shared: &Arc<Shared>, message: AssembledMessage) {
    match message.opcode {
        OpCode::Text => {
            // The assembler has already validated the payload.
            if let Ok(text) = message.into_text() {
                dispatch(shared, move |l| l.on_text(text));
            }
        }
        _ => {
            let data = message.into_binary();
            dispatch(shared, move |l| l.on_binary(data));
        }
    }
}

/// After sending our close frame, wait (bounded) for the peer's close.
/// Data still in flight is drained and dropped.
async fn await_close_ack(codec: &mut FrameCodec<ClientStream>, grace: Duration) {
    let drain = async {
        loop {
            match codec.read_frame().await {
                Ok(frame) if frame.opcode == OpCode::Close => return,
                Ok(_) => {}
                Err(_) => return,
            }
        }
    };

    if timeout(grace, drain).await.is_err() {
        debug!("close acknowledgement not received within grace period");
    }
}

/// Close status to send for a fatal error, when one still can be sent.
fn close_code_for(e: &Error) -> Option<u16> {
    match e {
        Error::InvalidUtf8 => Some(1007),
        Error::FrameTooLarge { .. }
        | Error::MessageTooLarge { .. }
        | Error::TooManyFragments { .. }
        | Error::ControlFrameTooLarge(_) => Some(1009),
        Error::ProtocolViolation(_)
        | Error::ReservedBitsSet
        | Error::ReservedOpcode(_)
        | Error::InvalidOpcode(_)
        | Error::InvalidCloseCode(_)
        | Error::MaskedServerFrame
        | Error::UnmaskedClientFrame
        | Error::FragmentedControlFrame => Some(1002),
        _ => None,
    }
}

/// Single teardown point: records the close reason, moves to `Closed`,
/// drops the command channel and delivers `on_close` exactly once.
fn finish(shared: &Arc<Shared>, reason: CloseReason) {
    {
        let mut lc = shared.lifecycle();
        lc.state = ClientState::Closed;
        lc.close_reason.get_or_insert(reason);
        lc.cmd_tx = None;
    }
    if !shared.close_delivered.swap(true, Ordering::SeqCst) {
        dispatch(shared, |l| l.on_close());
    }
    debug!("connection closed");
}
