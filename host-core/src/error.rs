//! Host SDK error types.
//!
//! Comprehensive error handling for all action-host operations.

use std::io;
use thiserror::Error;

/// Main error type for action-host operations.
#[derive(Error, Debug)]
pub enum HostError {
    /// IO error during socket operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Handshake with the coordinator was rejected
    #[error("authentication rejected by coordinator")]
    AuthInvalid,

    /// Initial connect failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Socket closed while a call or render was in flight
    #[error("transport closed")]
    TransportClosed,

    /// Inputs or return value failed schema validation
    #[error("schema validation failed: {0}")]
    RpcSchema(String),

    /// An RPC call exceeded its configured timeout
    #[error("RPC call timed out")]
    RpcTimeout,

    /// A response's shape did not match the outbound batch
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// The coordinator canceled the current transaction
    #[error("transaction canceled")]
    Canceled,

    /// Further IO was attempted after the transaction was canceled
    #[error("transaction closed")]
    TransactionClosed,

    /// A second render was attempted while one was already in flight
    #[error("a render is already in progress for this IO client")]
    RenderBusy,

    /// A group was constructed containing an exclusive promise
    #[error("group contains an exclusive promise")]
    GroupContainsExclusive,

    /// A per-component or group validator rejected the returned values
    #[error("validation failed: {0}")]
    Validation(String),

    /// Channel send failed (peer task gone)
    #[error("channel send error")]
    ChannelSend,

    /// Channel receive failed (peer task gone)
    #[error("channel receive error")]
    ChannelRecv,

    /// Send attempted on a socket that is not open
    #[error("send failed: socket not open")]
    SendFailed,
}

/// Result type alias for action-host operations.
pub type Result<T> = std::result::Result<T, HostError>;

impl HostError {
    /// Create a connection-failed error with a message.
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    /// Create a schema validation error.
    pub fn rpc_schema(msg: impl Into<String>) -> Self {
        Self::RpcSchema(msg.into())
    }

    /// Create a protocol mismatch error.
    pub fn protocol_mismatch(msg: impl Into<String>) -> Self {
        Self::ProtocolMismatch(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether a reconnect loop should keep retrying after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::TransportClosed | Self::WebSocket(_) | Self::Io(_)
        )
    }

    /// Whether this error reflects a dead connection rather than a protocol bug.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::TransportClosed | Self::ConnectionFailed(_) | Self::SendFailed
        )
    }
}
