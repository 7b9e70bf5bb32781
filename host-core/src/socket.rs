//! Duplex socket abstraction over the coordinator connection.
//!
//! A thin wrapper that turns a persistent bidirectional byte channel into an
//! event source (`Connected` / `Message` / `Closed`) plus a `send` operation.
//! The socket does not interpret payloads; envelope framing lives one layer
//! up in `host-protocol`.
//!
//! The real implementation is a split-pump design over `tokio-tungstenite`:
//! one task drains the WebSocket stream into an event channel, one task
//! drains a command channel into WebSocket writes. Neither task holds a lock
//! the other can block on.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::{HostError, Result};

/// Lifecycle and data events a [`Socket`] emits.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// The connection handshake completed.
    Connected,
    /// A text or binary payload arrived from the peer.
    Message(Vec<u8>),
    /// The connection closed, cleanly or otherwise.
    Closed {
        /// Close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason, if the peer sent one.
        reason: String,
    },
}

/// Handle for receiving socket lifecycle and message events.
pub type SocketMonitor = mpsc::UnboundedReceiver<SocketEvent>;
type SocketEventSender = mpsc::UnboundedSender<SocketEvent>;

/// A duplex, framed message transport over a persistent connection.
///
/// Implementations must serialize concurrent `send` calls themselves; callers
/// may invoke `send` from multiple tasks.
#[async_trait]
pub trait Socket: Send + Sync {
    /// Send a single payload to the peer. Fails with
    /// [`HostError::SendFailed`] if the channel is not open.
    async fn send(&self, payload: Vec<u8>) -> Result<()>;

    /// Close the connection.
    async fn close(&self) -> Result<()>;
}

/// A [`Socket`] backed by a live `tokio-tungstenite` WebSocket connection.
pub struct WsSocket {
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
}

enum WsCommand {
    Send(Vec<u8>),
    Close,
}

impl WsSocket {
    /// Connect to `url` and spawn the split-pump pumps. Returns the socket
    /// handle and a monitor stream of lifecycle/message events.
    pub async fn connect(url: &str) -> Result<(Self, SocketMonitor)> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| HostError::connection_failed(e.to_string()))?;

        let (event_tx, event_rx): (SocketEventSender, SocketMonitor) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_pumps(stream, event_tx, cmd_rx));

        Ok((Self { cmd_tx }, event_rx))
    }
}

#[async_trait]
impl Socket for WsSocket {
    async fn send(&self, payload: Vec<u8>) -> Result<()> {
        self.cmd_tx
            .send(WsCommand::Send(payload))
            .map_err(|_| HostError::SendFailed)
    }

    async fn close(&self) -> Result<()> {
        self.cmd_tx
            .send(WsCommand::Close)
            .map_err(|_| HostError::SendFailed)
    }
}

async fn run_pumps(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    event_tx: SocketEventSender,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
) {
    let (mut write, mut read) = stream.split();
    let _ = event_tx.send(SocketEvent::Connected);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(WsCommand::Send(bytes)) => {
                        if write.send(WsMessage::Binary(bytes)).await.is_err() {
                            let _ = event_tx.send(SocketEvent::Closed { code: None, reason: "write failed".into() });
                            return;
                        }
                    }
                    Some(WsCommand::Close) | None => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        let _ = event_tx.send(SocketEvent::Closed { code: None, reason: "closed by host".into() });
                        return;
                    }
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        let _ = event_tx.send(SocketEvent::Message(bytes));
                    }
                    Some(Ok(WsMessage::Text(text))) => {
                        let _ = event_tx.send(SocketEvent::Message(text.into_bytes()));
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                            .unwrap_or((None, String::new()));
                        let _ = event_tx.send(SocketEvent::Closed { code, reason });
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = event_tx.send(SocketEvent::Closed { code: None, reason: e.to_string() });
                        return;
                    }
                    None => {
                        let _ = event_tx.send(SocketEvent::Closed { code: None, reason: "stream ended".into() });
                        return;
                    }
                }
            }
        }
    }
}

/// An in-memory loopback [`Socket`] for driving the RPC and render loop in
/// tests without a real network connection.
#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::{Result, Socket, SocketEvent, SocketMonitor};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    /// A [`Socket`] whose sends are observable by the test harness and whose
    /// inbound events are injected by the test harness.
    pub struct MockSocket {
        sent_tx: mpsc::UnboundedSender<Vec<u8>>,
        event_tx: mpsc::UnboundedSender<SocketEvent>,
        closed: std::sync::atomic::AtomicBool,
    }

    impl MockSocket {
        /// Build a mock socket plus the two ends the test harness drives:
        /// a receiver of bytes the code under test sent, and a sender of
        /// events the code under test should observe.
        #[must_use]
        pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>, mpsc::UnboundedSender<SocketEvent>, SocketMonitor) {
            let (sent_tx, sent_rx) = mpsc::unbounded_channel();
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let driver_tx = event_tx.clone();
            (
                Self {
                    sent_tx,
                    event_tx,
                    closed: std::sync::atomic::AtomicBool::new(false),
                },
                sent_rx,
                driver_tx,
                event_rx,
            )
        }
    }

    #[async_trait]
    impl Socket for MockSocket {
        async fn send(&self, payload: Vec<u8>) -> Result<()> {
            if self.closed.load(std::sync::atomic::Ordering::Acquire) {
                return Err(super::HostError::SendFailed);
            }
            self.sent_tx
                .send(payload)
                .map_err(|_| super::HostError::SendFailed)
        }

        async fn close(&self) -> Result<()> {
            self.closed.store(true, std::sync::atomic::Ordering::Release);
            let _ = self.event_tx.send(SocketEvent::Closed {
                code: None,
                reason: "closed".into(),
            });
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn send_is_observable_by_harness() {
            let (socket, mut sent_rx, _event_tx, _event_rx) = MockSocket::new();
            socket.send(b"hello".to_vec()).await.unwrap();
            assert_eq!(sent_rx.recv().await, Some(b"hello".to_vec()));
        }

        #[tokio::test]
        async fn send_after_close_fails() {
            let (socket, _sent_rx, _event_tx, mut event_rx) = MockSocket::new();
            socket.close().await.unwrap();
            assert!(matches!(event_rx.recv().await, Some(SocketEvent::Closed { .. })));
            assert!(socket.send(b"too late".to_vec()).await.is_err());
        }
    }
}
