//! Host Core
//!
//! Runtime-agnostic building blocks shared by the protocol and SDK layers:
//! - Duplex socket abstraction over the coordinator connection (`socket`)
//! - Cyclic-step reconnect backoff (`reconnect`)
//! - The `{json, meta}` value codec (`codec`)
//! - Id generation for transactions, calls and render batches (`ids`)
//! - Error types (`error`)

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod error;
pub mod ids;
pub mod reconnect;
pub mod socket;

// Optional: a small prelude to make downstream crates ergonomic.
// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::codec::{deserialize, serialize, HostValue};
    pub use crate::error::{HostError, Result};
    pub use crate::ids::{fresh, CallId, InputGroupKey, RenderId, TxId};
    pub use crate::reconnect::{CancelHandle, ReconnectState};
    pub use crate::socket::{Socket, SocketEvent, SocketMonitor, WsSocket};
}
