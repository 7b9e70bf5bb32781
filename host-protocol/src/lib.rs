//! # Host Protocol
//!
//! **Protocol implementation crate for the Interactive Action Host SDK.**
//!
//! This crate implements the duplex RPC multiplex and the IO rendering state
//! machine that sit on top of the transport in `host-core`: wire envelopes,
//! the schema registry boundary, components, IO promises and groups, the
//! per-transaction render loop, and transaction loading state. Application
//! code depends on `host-sdk`, which wires these pieces to a connection and
//! exposes the `io` namespace.
//!
//! ## Layout
//!
//! - [`envelope`]: wire envelopes exchanged with the coordinator.
//! - [`schema`]: the `MethodName` / `Schema` / `SchemaRegistry` boundary.
//! - [`component`]: `ComponentInstance`, the props/state/return cell.
//! - [`io_client`]: the per-transaction render loop.
//! - [`promise`]: `IoPromise` and the `IoGroupPromise` family.
//! - [`loading`]: transaction loading state.
//! - [`rpc`]: the duplex RPC multiplex.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::unused_async)]
#![allow(clippy::let_underscore_future)]
#![allow(clippy::future_not_send)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::while_let_loop)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::never_loop)]

pub mod component;
pub mod envelope;
pub mod io_client;
pub mod loading;
pub mod promise;
pub mod rpc;
pub mod schema;

pub use component::ComponentInstance;
pub use io_client::IoClient;
pub use loading::TransactionLoadingState;
pub use promise::{IoGroupPromise2, IoGroupPromise3, IoGroupPromise4, IoGroupPromise5, IoPromise};
pub use rpc::DuplexRpc;
pub use schema::{default_registry, MethodName, Schema, SchemaRegistry};

/// Prelude module for convenient imports
///
/// ```rust
/// use host_protocol::prelude::*;
/// ```
pub mod prelude {
    pub use super::component::ComponentInstance;
    pub use super::envelope::{
        InboundMessage, InitializeHostRequest, InitializeHostResponse, IoResponseEnvelope,
        MarkTransactionComplete, OutboundMessage, RenderPacket, ResponsePacket, RpcWireEnvelope,
        SendIoCall, StartTransaction, ToRender, UpdateLoadingState,
    };
    pub use super::io_client::IoClient;
    pub use super::loading::{LoadingOpts, LoadingState, TransactionLoadingState};
    pub use super::promise::{
        IoGroupPromise2, IoGroupPromise3, IoGroupPromise4, IoGroupPromise5, IoPromise,
    };
    pub use super::rpc::{DuplexRpc, RpcEnvelope, RpcHandler};
    pub use super::schema::{default_registry, MethodName, Schema, SchemaRegistry};
}
