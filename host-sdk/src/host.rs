//! The Host Controller: connects, handshakes over the duplex RPC multiplex,
//! dispatches `START_TRANSACTION` to a fresh IO Client, routes `IO_RESPONSE`
//! by `txId`, and supervises reconnects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use host_core::error::{HostError, Result};
use host_core::reconnect::{CancelHandle, ReconnectState};
use host_core::socket::{Socket, SocketEvent, SocketMonitor, WsSocket};
use host_protocol::envelope::{
    InboundMessage, InitializeHostRequest, InitializeHostResponse, IoResponseEnvelope,
    MarkTransactionComplete, OutboundMessage, ResponsePacket, RpcWireEnvelope, SendIoCall,
    StartTransaction, UpdateLoadingState,
};
use host_protocol::io_client::{IoClient, SendFn};
use host_protocol::loading::TransactionLoadingState;
use host_protocol::rpc::{DuplexRpc, RpcEnvelope, RpcHandler};
use host_protocol::schema::{MethodName, Schema};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::HostConfig;
use crate::io::Io;
use crate::transaction::Transaction;

/// Connects to the coordinator, runs the handshake, and dispatches inbound
/// transactions to registered actions for the lifetime of the process (or
/// until [`Host::shutdown`] is called).
pub struct Host {
    config: HostConfig,
    transactions: DashMap<Uuid, Arc<Transaction>>,
    socket: Mutex<Option<Arc<dyn Socket>>>,
    shutting_down: AtomicBool,
    reconnect: Mutex<ReconnectState>,
}

/// Why the inbound pump for one connection stopped.
enum ConnectionOutcome {
    ShuttingDown,
    Closed(HostError),
}

impl Host {
    #[must_use]
    pub fn new(config: HostConfig) -> Arc<Self> {
        let reconnect = ReconnectState::new(config.reconnect_steps.clone(), config.retries_per_step);
        Arc::new(Self {
            config,
            transactions: DashMap::new(),
            socket: Mutex::new(None),
            shutting_down: AtomicBool::new(false),
            reconnect: Mutex::new(reconnect),
        })
    }

    /// Stop the reconnect loop and close the socket. In-flight transactions
    /// are left to finish naturally; the host does not force-abort them.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        self.reconnect.lock().cancel_handle().cancel();
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Run the connect/handshake/dispatch loop, reconnecting on recoverable
    /// errors until `shutdown()` is called or a fatal error (e.g. rejected
    /// auth) occurs.
    pub async fn run(self: &Arc<Self>) -> Result<()> {
        loop {
            if self.is_shutting_down() {
                return Ok(());
            }

            match self.connect_and_serve().await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_recoverable() && !self.is_shutting_down() => {
                    warn!(error = %err, "connection lost, scheduling reconnect");
                    *self.socket.lock() = None;
                    let cancel = self.reconnect.lock().cancel_handle();
                    let delay = self.reconnect.lock().next_delay();
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = wait_for_cancel(cancel) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn connect_and_serve(self: &Arc<Self>) -> Result<()> {
        let (socket, mut monitor) = WsSocket::connect(self.config.endpoint.as_str()).await?;
        let socket: Arc<dyn Socket> = Arc::new(socket);

        match monitor.recv().await {
            Some(SocketEvent::Connected) => {}
            Some(SocketEvent::Closed { reason, .. }) => return Err(HostError::connection_failed(reason)),
            _ => return Err(HostError::connection_failed("socket closed before handshake")),
        }

        self.serve(socket, monitor).await
    }

    /// Build the `DuplexRpc` for one connection, run the handshake over it,
    /// then pump inbound socket events into it until the connection closes
    /// or `shutdown()` is called.
    async fn serve(self: &Arc<Self>, socket: Arc<dyn Socket>, monitor: SocketMonitor) -> Result<()> {
        let rpc = self.build_rpc(socket.clone());

        let host = self.clone();
        let rpc_for_pump = rpc.clone();
        let pump = tokio::spawn(async move { pump_inbound(host, monitor, rpc_for_pump).await });

        if let Err(err) = self.handshake(&rpc).await {
            pump.abort();
            return Err(err);
        }

        *self.socket.lock() = Some(socket);
        self.reconnect.lock().reset();
        info!("host connected and initialized");

        let outcome = pump.await.unwrap_or(ConnectionOutcome::Closed(HostError::TransportClosed));
        *self.socket.lock() = None;
        match outcome {
            ConnectionOutcome::ShuttingDown => Ok(()),
            ConnectionOutcome::Closed(err) => Err(err),
        }
    }

    /// Wire a [`DuplexRpc`] over `socket`: `INITIALIZE_HOST` as the one
    /// method this side calls; `START_TRANSACTION` / `IO_RESPONSE` as the
    /// methods this side answers. `SEND_IO_CALL`, `MARK_TRANSACTION_COMPLETE`
    /// and `UPDATE_LOADING_STATE` are a separate, non-`callId`-paired
    /// reconciliation mechanism and stay as direct socket sends below.
    fn build_rpc(self: &Arc<Self>, socket: Arc<dyn Socket>) -> Arc<DuplexRpc> {
        let send_socket = socket.clone();
        let rpc_send: host_protocol::rpc::RpcSendFn = Arc::new(move |envelope: RpcEnvelope| {
            let socket = send_socket.clone();
            Box::pin(async move {
                let wire = RpcWireEnvelope {
                    call_id: envelope.call_id,
                    method_name: envelope.method_name.to_string(),
                    payload: envelope.payload,
                    error: envelope.error,
                    is_response: envelope.is_response,
                };
                let bytes = serde_json::to_vec(&OutboundMessage::Rpc(wire))
                    .map_err(|e| HostError::protocol_mismatch(e.to_string()))?;
                socket.send(bytes).await
            })
        });

        let mut can_call = HashMap::new();
        can_call.insert(MethodName::new("INITIALIZE_HOST"), Schema::permissive());

        let mut can_respond_to = HashMap::new();
        can_respond_to.insert(MethodName::new("START_TRANSACTION"), Schema::permissive());
        can_respond_to.insert(MethodName::new("IO_RESPONSE"), Schema::permissive());

        let mut handlers: HashMap<MethodName, RpcHandler> = HashMap::new();

        let start_host = self.clone();
        let start_socket = socket;
        handlers.insert(
            MethodName::new("START_TRANSACTION"),
            Arc::new(move |payload: Value| {
                let host = start_host.clone();
                let socket = start_socket.clone();
                Box::pin(async move {
                    let start: StartTransaction =
                        serde_json::from_value(payload).map_err(|e| HostError::protocol_mismatch(e.to_string()))?;
                    host.start_transaction(socket, start);
                    Ok(Value::Null)
                })
            }),
        );

        let response_host = self.clone();
        handlers.insert(
            MethodName::new("IO_RESPONSE"),
            Arc::new(move |payload: Value| {
                let host = response_host.clone();
                Box::pin(async move {
                    let envelope: IoResponseEnvelope =
                        serde_json::from_value(payload).map_err(|e| HostError::protocol_mismatch(e.to_string()))?;
                    host.route_io_response(envelope);
                    Ok(Value::Null)
                })
            }),
        );

        DuplexRpc::new(rpc_send, can_call, can_respond_to, handlers, self.config.rpc_timeout)
    }

    async fn handshake(&self, rpc: &Arc<DuplexRpc>) -> Result<()> {
        let request = InitializeHostRequest {
            api_key: self.config.api_key.clone(),
            callable_action_names: self.config.actions.keys().cloned().collect(),
        };
        let inputs = serde_json::to_value(&request).map_err(|e| HostError::protocol_mismatch(e.to_string()))?;
        let result = rpc.call(MethodName::new("INITIALIZE_HOST"), inputs).await?;
        let response: InitializeHostResponse =
            serde_json::from_value(result).map_err(|e| HostError::protocol_mismatch(e.to_string()))?;

        match response {
            InitializeHostResponse::Accepted { dashboard_url } => {
                info!(%dashboard_url, "host initialized");
                Ok(())
            }
            InitializeHostResponse::Rejected(false) => Err(HostError::AuthInvalid),
            InitializeHostResponse::Rejected(true) => Ok(()),
        }
    }

    fn start_transaction(self: &Arc<Self>, socket: Arc<dyn Socket>, start: StartTransaction) {
        let StartTransaction { transaction_id, action_name } = start;

        let Some(action) = self.config.actions.get(&action_name).cloned() else {
            warn!(%transaction_id, %action_name, "no action registered for this name");
            return;
        };

        let send_socket = socket.clone();
        let send: SendFn = Arc::new(move |packet| {
            let socket = send_socket.clone();
            Box::pin(async move {
                let io_call =
                    serde_json::to_string(&packet).map_err(|e| HostError::protocol_mismatch(e.to_string()))?;
                let envelope = OutboundMessage::SendIoCall(SendIoCall { transaction_id, io_call });
                let bytes =
                    serde_json::to_vec(&envelope).map_err(|e| HostError::protocol_mismatch(e.to_string()))?;
                socket.send(bytes).await
            })
        });
        let io_client = IoClient::new(send);

        let loading_socket = socket;
        let loading = Arc::new(TransactionLoadingState::new(Arc::new(move |state| {
            let socket = loading_socket.clone();
            Box::pin(async move {
                let payload = serde_json::to_value(&state).map_err(|e| e.to_string())?;
                let envelope =
                    OutboundMessage::UpdateLoadingState(UpdateLoadingState { transaction_id, state: payload });
                let bytes = serde_json::to_vec(&envelope).map_err(|e| e.to_string())?;
                socket.send(bytes).await.map_err(|e| e.to_string())
            })
        })));

        let transaction = Arc::new(Transaction::new(
            transaction_id,
            action_name.clone(),
            io_client.clone(),
            loading.clone(),
        ));
        self.transactions.insert(transaction_id, transaction);

        let io = Io::new(io_client, self.config.schema_registry.clone(), loading);
        let host = self.clone();
        let span = info_span!("transaction", tx_id = %transaction_id, action = %action_name);

        tokio::spawn(
            async move {
                let result = (action)(io).await;
                host.transactions.remove(&transaction_id);
                match result {
                    Ok(_) => host.send_mark_complete(transaction_id).await,
                    Err(err) => {
                        error!(error = %err, "action failed; not sending MARK_TRANSACTION_COMPLETE");
                    }
                }
            }
            .instrument(span),
        );
    }

    async fn send_mark_complete(&self, transaction_id: Uuid) {
        let Some(socket) = self.socket.lock().clone() else {
            warn!(%transaction_id, "no active socket to send MARK_TRANSACTION_COMPLETE on");
            return;
        };
        let envelope = OutboundMessage::MarkTransactionComplete(MarkTransactionComplete { transaction_id });
        match serde_json::to_vec(&envelope) {
            Ok(bytes) => {
                if let Err(err) = socket.send(bytes).await {
                    warn!(%transaction_id, error = %err, "failed to send MARK_TRANSACTION_COMPLETE");
                }
            }
            Err(err) => warn!(%transaction_id, error = %err, "failed to serialize MARK_TRANSACTION_COMPLETE"),
        }
    }

    fn route_io_response(&self, response: IoResponseEnvelope) {
        let IoResponseEnvelope { transaction_id, value } = response;
        let Some(transaction) = self.transactions.get(&transaction_id) else {
            debug!(%transaction_id, "IO_RESPONSE for unknown or completed transaction, dropping");
            return;
        };

        let packet: ResponsePacket = match serde_json::from_str(&value) {
            Ok(p) => p,
            Err(err) => {
                warn!(%transaction_id, error = %err, "malformed IO_RESPONSE value");
                return;
            }
        };
        transaction.io_client.on_response(packet);
    }
}

/// Drain `monitor` into `rpc`, returning once the socket closes or the host
/// is asked to shut down.
async fn pump_inbound(host: Arc<Host>, mut monitor: SocketMonitor, rpc: Arc<DuplexRpc>) -> ConnectionOutcome {
    loop {
        if host.is_shutting_down() {
            if let Some(socket) = host.socket.lock().clone() {
                let _ = socket.close().await;
            }
            return ConnectionOutcome::ShuttingDown;
        }

        match monitor.recv().await {
            Some(SocketEvent::Message(bytes)) => match serde_json::from_slice::<InboundMessage>(&bytes) {
                Ok(InboundMessage::Rpc(wire)) => {
                    let envelope = RpcEnvelope {
                        call_id: wire.call_id,
                        method_name: MethodName::owned(wire.method_name),
                        payload: wire.payload,
                        error: wire.error,
                        is_response: wire.is_response,
                    };
                    rpc.handle_inbound(envelope).await;
                }
                Err(err) => warn!(error = %err, "dropping malformed inbound message"),
            },
            Some(SocketEvent::Closed { reason, .. }) => {
                return ConnectionOutcome::Closed(HostError::connection_failed(reason));
            }
            Some(SocketEvent::Connected) => {}
            None => return ConnectionOutcome::Closed(HostError::TransportClosed),
        }
    }
}

#[cfg(feature = "test-util")]
impl Host {
    /// Drive one connect/handshake/dispatch pass over an already-constructed
    /// socket, bypassing `WsSocket::connect`. For exercising the host loop
    /// end-to-end against `host_core::socket::mock::MockSocket`.
    pub async fn serve_once(self: &Arc<Self>, socket: Arc<dyn Socket>, monitor: SocketMonitor) -> Result<()> {
        self.serve(socket, monitor).await
    }
}

async fn wait_for_cancel(cancel: CancelHandle) {
    while !cancel.is_canceled() {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
