//! The IO component: a schema-typed props/state cell plus a single-shot
//! return value and an observer hookup that triggers re-renders.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use host_core::error::{HostError, Result};

use crate::schema::{MethodName, Schema};

/// Callback invoked when a non-null `SET_STATE` arrives, mapping the new
/// (validated) state to replacement props. May await, e.g. to recompute a
/// search result set.
pub type StateHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Value> + Send>> + Send + Sync>;

/// Single callback slot fired whenever props or state change externally and
/// a fresh render is needed. Re-registration replaces, it is not a
/// subscription list.
pub type Observer = Arc<dyn Fn() + Send + Sync>;

/// One instance of one IO method: props, state, and a return cell.
pub struct ComponentInstance {
    pub method_name: MethodName,
    pub label: String,
    schema: Schema,
    props: Mutex<Value>,
    state: Mutex<Option<Value>>,
    state_handler: Option<StateHandler>,
    observer: Mutex<Option<Observer>>,
    return_tx: Mutex<Option<oneshot::Sender<Value>>>,
    return_set: AtomicBool,
    exclusive: bool,
}

impl ComponentInstance {
    /// Construct a component, validating `initial_props` if present.
    /// Returns the component plus the receiver half of its single-shot
    /// return value; the receiver may be awaited exactly once.
    pub fn new(
        method_name: MethodName,
        label: impl Into<String>,
        initial_props: Option<Value>,
        schema: Schema,
        state_handler: Option<StateHandler>,
        exclusive: bool,
    ) -> Result<(Arc<Self>, oneshot::Receiver<Value>)> {
        let props = match initial_props {
            Some(p) => (schema.props)(&p).map_err(HostError::rpc_schema)?,
            None => Value::Null,
        };
        let (return_tx, return_rx) = oneshot::channel();
        let component = Arc::new(Self {
            method_name,
            label: label.into(),
            schema,
            props: Mutex::new(props),
            state: Mutex::new(None),
            state_handler,
            observer: Mutex::new(None),
            return_tx: Mutex::new(Some(return_tx)),
            return_set: AtomicBool::new(false),
            exclusive,
        });
        Ok((component, return_rx))
    }

    /// Whether this component is exclusive (cannot be grouped, e.g. `confirm`).
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// The minimal payload needed to render this component remotely.
    #[must_use]
    pub fn render_info(&self) -> (MethodName, String, Value) {
        (self.method_name.clone(), self.label.clone(), self.props.lock().clone())
    }

    /// Snapshot of the current validated state, if any.
    #[must_use]
    pub fn current_state(&self) -> Option<Value> {
        self.state.lock().clone()
    }

    /// Replace the observer callback. A fresh registration always replaces
    /// any prior one.
    pub fn set_observer(&self, observer: Observer) {
        *self.observer.lock() = Some(observer);
    }

    fn notify_observer(&self) {
        if let Some(observer) = self.observer.lock().clone() {
            observer();
        }
    }

    /// Validate and apply a `SET_STATE` update. If an `onIncomingState`
    /// handler is registered, await it and replace props with its result.
    /// If state is non-null and no handler is registered, warn but do not
    /// fail.
    pub async fn set_state(&self, new_state: Value) -> Result<()> {
        let validated = (self.schema.state)(&new_state).map_err(HostError::rpc_schema)?;
        *self.state.lock() = Some(validated.clone());

        if let Some(handler) = &self.state_handler {
            let new_props = handler(validated).await;
            *self.props.lock() = new_props;
        } else if !validated.is_null() {
            warn!(method = %self.method_name, "received SET_STATE with no onIncomingState handler");
        }

        self.notify_observer();
        Ok(())
    }

    /// Replace props directly (used by external writers, not `SET_STATE`).
    pub fn set_props(&self, new_props: Value) {
        *self.props.lock() = new_props;
        self.notify_observer();
    }

    /// Validate and resolve the return cell exactly once. Subsequent calls
    /// are no-ops. A validation failure does not consume the single-resolve
    /// slot: a later, valid call still resolves normally.
    pub fn set_return_value(&self, raw: Value) -> Result<()> {
        if self.return_set.load(Ordering::Acquire) {
            return Ok(());
        }
        let validated = (self.schema.returns)(&raw).map_err(HostError::rpc_schema)?;
        if self.return_set.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(tx) = self.return_tx.lock().take() {
            let _ = tx.send(validated);
        }
        Ok(())
    }
}
