//! Duplex RPC: schema-validated request/response multiplex on top of a
//! single connection.
//!
//! Distinct from the `IoClient` render loop. Knows a `canCall` set
//! (methods this side may invoke) and a `canRespondTo` set (methods this
//! side answers), with a handler table keyed by the responded method.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;
use uuid::Uuid;

use host_core::error::{HostError, Result};

use crate::schema::{MethodName, Schema};

/// One RPC envelope, in either direction.
#[derive(Debug, Clone)]
pub struct RpcEnvelope {
    pub call_id: Uuid,
    pub method_name: MethodName,
    /// `Some` for a request or a successful response; `None` paired with
    /// `error` for a failed response.
    pub payload: Value,
    pub error: Option<String>,
    pub is_response: bool,
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// A handler for one `canRespondTo` method.
pub type RpcHandler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

type SendFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Transmits one outbound [`RpcEnvelope`].
pub type RpcSendFn = Arc<dyn Fn(RpcEnvelope) -> SendFuture + Send + Sync>;

struct Pending {
    returns: Schema,
    tx: oneshot::Sender<Result<Value>>,
}

/// Schema-validated request/response multiplex. One instance serves one
/// connection and may be shared across many concurrently in-flight calls.
pub struct DuplexRpc {
    send: RpcSendFn,
    can_call: HashMap<MethodName, Schema>,
    can_respond_to: HashMap<MethodName, Schema>,
    handlers: HashMap<MethodName, RpcHandler>,
    pending: Mutex<HashMap<Uuid, Pending>>,
    call_timeout: Duration,
}

impl DuplexRpc {
    #[must_use]
    pub fn new(
        send: RpcSendFn,
        can_call: HashMap<MethodName, Schema>,
        can_respond_to: HashMap<MethodName, Schema>,
        handlers: HashMap<MethodName, RpcHandler>,
        call_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            send,
            can_call,
            can_respond_to,
            handlers,
            pending: Mutex::new(HashMap::new()),
            call_timeout,
        })
    }

    /// Validate `inputs` against the `canCall` schema for `method_name`,
    /// send the request, and await a matching response.
    pub async fn call(self: &Arc<Self>, method_name: MethodName, inputs: Value) -> Result<Value> {
        let schema = self
            .can_call
            .get(&method_name)
            .ok_or_else(|| HostError::rpc_schema(format!("no canCall schema for {method_name}")))?;
        let validated_inputs = (schema.props)(&inputs).map_err(HostError::rpc_schema)?;

        let call_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(call_id, Pending { returns: schema.clone(), tx });

        let envelope = RpcEnvelope {
            call_id,
            method_name,
            payload: validated_inputs,
            error: None,
            is_response: false,
        };
        if let Err(err) = (self.send)(envelope).await {
            self.pending.lock().remove(&call_id);
            return Err(err);
        }

        let outcome = tokio::time::timeout(self.call_timeout, rx).await;
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(HostError::ChannelRecv),
            Err(_) => {
                self.pending.lock().remove(&call_id);
                Err(HostError::RpcTimeout)
            }
        }
    }

    /// Dispatch one inbound envelope: resolves a pending call, or routes a
    /// request to its handler and replies with the same `callId`.
    pub async fn handle_inbound(self: &Arc<Self>, envelope: RpcEnvelope) {
        if envelope.is_response {
            self.resolve_response(envelope);
            return;
        }
        self.dispatch_request(envelope).await;
    }

    fn resolve_response(&self, envelope: RpcEnvelope) {
        let Some(pending) = self.pending.lock().remove(&envelope.call_id) else {
            warn!(call_id = %envelope.call_id, "response for unknown or already-resolved call");
            return;
        };
        let result = match envelope.error {
            Some(message) => Err(HostError::rpc_schema(message)),
            None => (pending.returns.returns)(&envelope.payload)
                .map_err(HostError::rpc_schema),
        };
        let _ = pending.tx.send(result);
    }

    async fn dispatch_request(self: &Arc<Self>, envelope: RpcEnvelope) {
        let call_id = envelope.call_id;
        let method_name = envelope.method_name.clone();

        let reply = match self.handle_request(envelope).await {
            Ok(value) => RpcEnvelope {
                call_id,
                method_name,
                payload: value,
                error: None,
                is_response: true,
            },
            Err(err) => RpcEnvelope {
                call_id,
                method_name,
                payload: Value::Null,
                error: Some(err.to_string()),
                is_response: true,
            },
        };

        if let Err(err) = (self.send)(reply).await {
            warn!(%call_id, error = %err, "failed to send RPC reply");
        }
    }

    async fn handle_request(&self, envelope: RpcEnvelope) -> Result<Value> {
        let schema = self
            .can_respond_to
            .get(&envelope.method_name)
            .ok_or_else(|| HostError::rpc_schema(format!("unknown method {}", envelope.method_name)))?;
        let validated = (schema.props)(&envelope.payload).map_err(HostError::rpc_schema)?;

        let handler = self
            .handlers
            .get(&envelope.method_name)
            .ok_or_else(|| HostError::rpc_schema(format!("no handler registered for {}", envelope.method_name)))?;

        let result = handler(validated).await?;
        (schema.returns)(&result).map_err(HostError::rpc_schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn relay() -> (RpcSendFn, Arc<Mutex<Vec<RpcEnvelope>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent2 = sent.clone();
        let send: RpcSendFn = Arc::new(move |envelope: RpcEnvelope| {
            let sent = sent2.clone();
            Box::pin(async move {
                sent.lock().push(envelope);
                Ok(())
            })
        });
        (send, sent)
    }

    #[tokio::test]
    async fn call_resolves_on_matching_response() {
        let (send, sent) = relay();
        let mut can_call = HashMap::new();
        can_call.insert(MethodName::new("PING"), Schema::permissive());

        let rpc = DuplexRpc::new(send, can_call, HashMap::new(), HashMap::new(), Duration::from_secs(1));
        let rpc2 = rpc.clone();

        let task = tokio::spawn(async move { rpc2.call(MethodName::new("PING"), serde_json::json!("hi")).await });

        loop {
            if let Some(envelope) = sent.lock().first().cloned() {
                rpc.handle_inbound(RpcEnvelope {
                    call_id: envelope.call_id,
                    method_name: envelope.method_name,
                    payload: serde_json::json!("pong"),
                    error: None,
                    is_response: true,
                })
                .await;
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(task.await.unwrap().unwrap(), serde_json::json!("pong"));
    }

    #[tokio::test]
    async fn call_to_unknown_method_rejects_with_no_traffic() {
        let (send, sent) = relay();
        let rpc = DuplexRpc::new(send, HashMap::new(), HashMap::new(), HashMap::new(), Duration::from_secs(1));
        let err = rpc.call(MethodName::new("NOPE"), Value::Null).await.unwrap_err();
        assert!(matches!(err, HostError::RpcSchema(_)));
        assert!(sent.lock().is_empty());
    }

    #[tokio::test]
    async fn call_times_out_when_no_response_arrives() {
        let (send, _sent) = relay();
        let mut can_call = HashMap::new();
        can_call.insert(MethodName::new("SLOW"), Schema::permissive());
        let rpc = DuplexRpc::new(send, can_call, HashMap::new(), HashMap::new(), Duration::from_millis(10));
        let err = rpc.call(MethodName::new("SLOW"), Value::Null).await.unwrap_err();
        assert!(matches!(err, HostError::RpcTimeout));
    }

    #[tokio::test]
    async fn inbound_request_is_routed_to_handler_and_replies_with_same_call_id() {
        let (send, sent) = relay();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let mut can_respond_to = HashMap::new();
        can_respond_to.insert(MethodName::new("ECHO"), Schema::permissive());
        let mut handlers: HashMap<MethodName, RpcHandler> = HashMap::new();
        handlers.insert(
            MethodName::new("ECHO"),
            Arc::new(move |value: Value| {
                calls2.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move { Ok(value) })
            }),
        );

        let rpc = DuplexRpc::new(send, HashMap::new(), can_respond_to, handlers, Duration::from_secs(1));
        let call_id = Uuid::new_v4();
        rpc.handle_inbound(RpcEnvelope {
            call_id,
            method_name: MethodName::new("ECHO"),
            payload: serde_json::json!({ "x": 1 }),
            error: None,
            is_response: false,
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let reply = sent.lock().first().cloned().unwrap();
        assert_eq!(reply.call_id, call_id);
        assert!(reply.is_response);
        assert_eq!(reply.payload, serde_json::json!({ "x": 1 }));
    }

    #[tokio::test]
    async fn inbound_request_for_unknown_method_replies_with_error_and_does_not_panic() {
        let (send, sent) = relay();
        let rpc = DuplexRpc::new(send, HashMap::new(), HashMap::new(), HashMap::new(), Duration::from_secs(1));
        let call_id = Uuid::new_v4();
        rpc.handle_inbound(RpcEnvelope {
            call_id,
            method_name: MethodName::new("MYSTERY"),
            payload: Value::Null,
            error: None,
            is_response: false,
        })
        .await;

        let reply = sent.lock().first().cloned().unwrap();
        assert_eq!(reply.call_id, call_id);
        assert!(reply.error.is_some());
    }
}
