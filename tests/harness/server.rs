//! In-process WebSocket server driven by the crate's own server-role codec.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use wsclient::protocol::handshake::{UpgradeRequest, find_head_end};
use wsclient::protocol::{Frame, OpCode};
use wsclient::{Config, FrameCodec, Role};

/// How the server behaves after accepting a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Accept the upgrade and echo every data frame back.
    Echo,
    /// Answer the upgrade request with 403 Forbidden.
    RejectUpgrade,
    /// Accept, then immediately start a server-side close (1000).
    CloseOnConnect,
    /// Echo, but never acknowledge the client's close frame and keep the
    /// socket open, forcing the client's close grace timer to fire.
    IgnoreClose,
}

/// An echo server on an OS-assigned port, one task per connection.
pub struct TestServer {
    addr: SocketAddr,
    pings: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn spawn(mode: ServerMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let pings = Arc::new(AtomicUsize::new(0));

        let counter = pings.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let counter = counter.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, mode, counter).await;
                });
            }
        });

        Self { addr, pings }
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Pings received across all connections.
    pub fn pings_received(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

async fn serve(
    mut stream: TcpStream,
    mode: ServerMode,
    pings: Arc<AtomicUsize>,
) -> std::io::Result<()> {
    // Read the upgrade request head.
    let mut buf = Vec::new();
    let head_end = loop {
        if let Some(end) = find_head_end(&buf) {
            break end;
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let Ok(request) = UpgradeRequest::parse(&buf[..head_end]) else {
        stream
            .write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n")
            .await?;
        return Ok(());
    };

    if mode == ServerMode::RejectUpgrade {
        stream.write_all(b"HTTP/1.1 403 Forbidden\r\n\r\n").await?;
        return Ok(());
    }

    // Accept, selecting the client's first offered subprotocol.
    let protocol = request.protocols.first().map(String::as_str);
    stream.write_all(&request.accept_response(protocol)).await?;
    stream.flush().await?;

    let mut codec = FrameCodec::new(stream, Role::Server, &Config::default());
    codec.feed(&buf[head_end..]);

    if mode == ServerMode::CloseOnConnect {
        let _ = codec.write_frame(&Frame::close(Some(1000), "bye")).await;
        let _ = codec.flush().await;
        // Wait for the client's echo, then drop the connection.
        while let Ok(frame) = codec.read_frame().await {
            if frame.opcode == OpCode::Close {
                break;
            }
        }
        return Ok(());
    }

    loop {
        let Ok(frame) = codec.read_frame().await else {
            return Ok(());
        };
        match frame.opcode {
            OpCode::Ping => {
                pings.fetch_add(1, Ordering::SeqCst);
                let _ = codec.write_frame(&Frame::pong(frame.into_payload())).await;
                let _ = codec.flush().await;
            }
            OpCode::Pong => {}
            OpCode::Close => {
                if mode == ServerMode::IgnoreClose {
                    // Leave the socket open without acknowledging.
                    tokio::time::sleep(Duration::from_secs(60)).await;
                } else {
                    let _ = codec.write_frame(&frame).await;
                    let _ = codec.flush().await;
                }
                return Ok(());
            }
            _ => {
                // Echo the data frame as-is, fragmentation included.
                if codec.write_frame(&frame).await.is_err() {
                    return Ok(());
                }
                let _ = codec.flush().await;
            }
        }
    }
}
