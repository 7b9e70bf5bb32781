//! The per-transaction IO Client render loop.
//!
//! Batches one or more components into a single `RENDER`, reconciles
//! `SET_STATE` / `RETURN` / `CANCELED` responses, runs validators, and
//! resolves each component's return value. Exactly one render loop is
//! active at a time per client: a second concurrent `render_components`
//! call rejects with [`HostError::RenderBusy`] rather than racing the first.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use host_core::codec::HostValue;
use host_core::error::{HostError, Result};

use crate::component::ComponentInstance;
use crate::envelope::{RenderKind, RenderPacket, ResponseKind, ResponsePacket, ToRender};

/// A value-level validator run against one component's raw return, after
/// mapping it through the promise's `getValue`. Returns `Some(message)` to
/// reject the batch and trigger a re-render.
pub type ItemValidator = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// A validator run once against the whole ordered tuple of returns.
pub type GroupValidator = Arc<dyn Fn(&[Value]) -> Option<String> + Send + Sync>;

type SendFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Sends one outbound render packet. Wraps the `SEND_IO_CALL` envelope
/// construction so the render loop only deals in [`RenderPacket`]s.
pub type SendFn = Arc<dyn Fn(RenderPacket) -> SendFuture + Send + Sync>;

/// One component in a render batch, plus its validator and the receiver
/// half of its single-shot return cell.
pub struct RenderItem {
    pub component: Arc<ComponentInstance>,
    pub return_rx: oneshot::Receiver<Value>,
    pub validator: Option<ItemValidator>,
}

/// Owns the render loop for one transaction.
pub struct IoClient {
    send: SendFn,
    is_canceled: AtomicBool,
    render_active: AtomicBool,
    response_tx: Mutex<Option<flume::Sender<ResponsePacket>>>,
}

impl IoClient {
    #[must_use]
    pub fn new(send: SendFn) -> Arc<Self> {
        Arc::new(Self {
            send,
            is_canceled: AtomicBool::new(false),
            render_active: AtomicBool::new(false),
            response_tx: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.is_canceled.load(Ordering::Acquire)
    }

    /// Deliver an `IO_RESPONSE` to whichever render loop is currently
    /// active. Dropped silently if no loop is active (a stale response).
    pub fn on_response(&self, packet: ResponsePacket) {
        let tx = self.response_tx.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(packet);
        }
    }

    /// Run one top-level `renderComponents` invocation: render `items`,
    /// reconcile state/return/cancel responses, and return the ordered raw
    /// return values once every component has resolved.
    pub async fn render_components(
        self: &Arc<Self>,
        items: Vec<RenderItem>,
        group_validator: Option<GroupValidator>,
    ) -> Result<Vec<Value>> {
        if self.is_canceled() {
            return Err(HostError::TransactionClosed);
        }
        if self.render_active.swap(true, Ordering::AcqRel) {
            return Err(HostError::RenderBusy);
        }
        let result = self.render_components_inner(items, group_validator).await;
        self.render_active.store(false, Ordering::Release);
        *self.response_tx.lock() = None;
        result
    }

    async fn render_components_inner(
        self: &Arc<Self>,
        items: Vec<RenderItem>,
        group_validator: Option<GroupValidator>,
    ) -> Result<Vec<Value>> {
        let input_group_key = Uuid::new_v4();
        let mut validation_error_message: Option<String> = None;

        let (resp_tx, resp_rx) = flume::unbounded::<ResponsePacket>();
        *self.response_tx.lock() = Some(resp_tx);

        let (rerender_tx, rerender_rx) = flume::unbounded::<()>();
        for item in &items {
            let tx = rerender_tx.clone();
            item.component.set_observer(Arc::new(move || {
                let _ = tx.send(());
            }));
        }

        self.render(&items, input_group_key, &validation_error_message).await?;

        loop {
            tokio::select! {
                signal = rerender_rx.recv_async() => {
                    if signal.is_err() {
                        continue;
                    }
                    debug!(%input_group_key, "external state change, re-rendering");
                    self.render(&items, input_group_key, &validation_error_message).await?;
                }
                response = resp_rx.recv_async() => {
                    let Ok(response) = response else {
                        return Err(HostError::ChannelRecv);
                    };

                    if let Some(key) = response.input_group_key {
                        if key != input_group_key {
                            debug!(%key, %input_group_key, "dropping stale IO_RESPONSE");
                            continue;
                        }
                    }
                    if self.is_canceled() {
                        continue;
                    }

                    match response.kind {
                        ResponseKind::Canceled => {
                            self.is_canceled.store(true, Ordering::Release);
                            return Err(HostError::Canceled);
                        }
                        ResponseKind::SetState => {
                            self.handle_set_state(&items, response).await?;
                            self.render(&items, input_group_key, &validation_error_message).await?;
                        }
                        ResponseKind::Return => {
                            let values = decode_values(&response)?;
                            if values.len() != items.len() {
                                return Err(HostError::protocol_mismatch(format!(
                                    "RETURN carried {} values for {} components",
                                    values.len(),
                                    items.len()
                                )));
                            }

                            let mut rejection = first_item_rejection(&items, &values);
                            if rejection.is_none() {
                                if let Some(validator) = &group_validator {
                                    rejection = validator(&values);
                                }
                            }

                            if let Some(message) = rejection {
                                validation_error_message = Some(message);
                                self.render(&items, input_group_key, &validation_error_message).await?;
                                continue;
                            }

                            for (item, value) in items.iter().zip(values.iter()) {
                                item.component.set_return_value(value.clone())?;
                            }

                            let mut ordered = Vec::with_capacity(items.len());
                            for item in items {
                                let value = item.return_rx.await.map_err(|_| HostError::ChannelRecv)?;
                                ordered.push(value);
                            }
                            return Ok(ordered);
                        }
                    }
                }
            }
        }
    }

    async fn handle_set_state(&self, items: &[RenderItem], response: ResponsePacket) -> Result<()> {
        let values = decode_values(&response)?;
        if values.len() != items.len() {
            return Err(HostError::protocol_mismatch(format!(
                "SET_STATE carried {} values for {} components",
                values.len(),
                items.len()
            )));
        }
        for (item, new_state) in items.iter().zip(values) {
            if item.component.current_state().as_ref() != Some(&new_state) {
                item.component.set_state(new_state).await?;
            }
        }
        Ok(())
    }

    async fn render(
        &self,
        items: &[RenderItem],
        input_group_key: Uuid,
        validation_error_message: &Option<String>,
    ) -> Result<()> {
        let to_render = items
            .iter()
            .map(|item| {
                let (method_name, label, props) = item.component.render_info();
                let (json, meta) = host_core::codec::serialize(&HostValue::from(&props));
                ToRender {
                    method_name: method_name.to_string(),
                    label,
                    props: json,
                    props_meta: meta,
                }
            })
            .collect();

        let packet = RenderPacket {
            id: Uuid::new_v4(),
            input_group_key,
            to_render,
            validation_error_message: validation_error_message.clone(),
            kind: RenderKind::Render,
        };

        (self.send)(packet).await
    }
}

fn decode_values(response: &ResponsePacket) -> Result<Vec<Value>> {
    let Some(meta) = &response.values_meta else {
        return Ok(response.values.clone());
    };
    let array = Value::Array(response.values.clone());
    let decoded = host_core::codec::deserialize(&array, meta).map_err(HostError::protocol_mismatch)?;
    match decoded {
        HostValue::Array(items) => Ok(items.into_iter().map(HostValue::into_json).collect()),
        other => {
            warn!("values_meta decoded to a non-array shape");
            Ok(vec![other.into_json()])
        }
    }
}

fn first_item_rejection(items: &[RenderItem], values: &[Value]) -> Option<String> {
    items.iter().zip(values.iter()).find_map(|(item, value)| {
        item.validator.as_ref().and_then(|validator| validator(value))
    })
}
