//! The action table: user-registered async functions driving one transaction.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use host_core::error::Result;
use serde_json::Value;

use crate::io::Io;

/// One registered action: given the `io` namespace for its transaction,
/// drives an interactive session and resolves with a JSON-serializable
/// result (or fails, in which case the host never sends
/// `MARK_TRANSACTION_COMPLETE` for it).
pub type ActionFn = Arc<dyn Fn(Io) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

/// Wrap a plain async closure as an [`ActionFn`].
pub fn action<F, Fut>(f: F) -> ActionFn
where
    F: Fn(Io) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |io| Box::pin(f(io)))
}
