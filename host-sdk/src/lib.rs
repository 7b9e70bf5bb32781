//! # Host SDK
//!
//! SDK for building interactive actions hosted against a cloud coordinator.
//!
//! A host is a long-lived process that connects to a coordinator over a
//! persistent duplex channel, registers a table of named *actions*, and
//! executes them when the coordinator dispatches `START_TRANSACTION`. Each
//! action drives an interactive session with a remote operator through the
//! [`Io`] namespace: rendering forms, tables and confirmations, and awaiting
//! typed responses.
//!
//! ```rust,no_run
//! use host_sdk::{action, Host, HostConfig};
//!
//! # async fn run() -> host_core::error::Result<()> {
//! let config = HostConfig::builder()
//!     .with_api_key("sk_live_...")
//!     .with_action(
//!         "greet",
//!         action(|io| async move {
//!             let name = io.input().text("Your name")?.await?;
//!             Ok(serde_json::json!({ "greeting": format!("hello, {name}") }))
//!         }),
//!     )
//!     .build()?;
//!
//! let host = Host::new(config);
//! host.run().await
//! # }
//! ```

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::future_not_send)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub mod actions;
pub mod config;
pub mod dev_tracing;
pub mod host;
pub mod io;
pub mod transaction;

pub use actions::{action, ActionFn};
pub use config::{HostConfig, HostConfigBuilder, LogLevel};
pub use host::Host;
pub use io::Io;
pub use transaction::Transaction;

/// Re-exported for convenience when constructing a [`HostConfig`] with a
/// custom [`host_protocol::schema::SchemaRegistry`].
pub use host_protocol::schema;
