//! End-to-end exercise of `Host` over `MockSocket`: the `INITIALIZE_HOST`
//! handshake over the duplex RPC multiplex, a `START_TRANSACTION` dispatch
//! through a registered action, `IO_RESPONSE` routing back into the render
//! loop, and `MARK_TRANSACTION_COMPLETE`.

use std::sync::Arc;
use std::time::Duration;

use host_core::socket::mock::MockSocket;
use host_core::socket::{Socket, SocketEvent};
use host_protocol::envelope::{OutboundMessage, RenderPacket, ResponseKind, ResponsePacket, RpcWireEnvelope};
use host_sdk::{action, Host, HostConfig};
use serde_json::{json, Value};
use uuid::Uuid;

async fn recv_sent(sent_rx: &mut tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>) -> OutboundMessage {
    let bytes = tokio::time::timeout(Duration::from_secs(1), sent_rx.recv())
        .await
        .expect("timed out waiting for outbound message")
        .expect("socket closed before sending");
    serde_json::from_slice(&bytes).expect("outbound message did not match envelope shape")
}

fn rpc_request(method_name: &str, payload: Value) -> Value {
    json!({
        "type": "RPC",
        "callId": Uuid::new_v4(),
        "methodName": method_name,
        "payload": payload,
        "isResponse": false,
    })
}

fn rpc_response(call_id: Uuid, payload: Value) -> Value {
    json!({
        "type": "RPC",
        "callId": call_id,
        "methodName": "INITIALIZE_HOST",
        "payload": payload,
        "isResponse": true,
    })
}

#[tokio::test]
async fn full_transaction_round_trip() {
    let config = HostConfig::builder()
        .with_api_key("test-key")
        .with_action(
            "echo",
            action(|io| async move {
                let text = io.input().text("say something")?.await?;
                Ok(json!({ "echoed": text }))
            }),
        )
        .build()
        .unwrap();
    let host = Host::new(config);

    let (socket, mut sent_rx, event_tx, monitor) = MockSocket::new();
    let socket: Arc<dyn Socket> = Arc::new(socket);

    let serve_host = host.clone();
    let serve_task = tokio::spawn(async move { serve_host.serve_once(socket, monitor).await });

    let init_call_id = match recv_sent(&mut sent_rx).await {
        OutboundMessage::Rpc(RpcWireEnvelope { call_id, method_name, payload, is_response, .. }) => {
            assert_eq!(method_name, "INITIALIZE_HOST");
            assert!(!is_response);
            assert_eq!(payload["apiKey"], "test-key");
            assert_eq!(payload["callableActionNames"], json!(["echo"]));
            call_id
        }
        other => panic!("expected INITIALIZE_HOST RPC call, got {other:?}"),
    };

    let accepted = rpc_response(
        init_call_id,
        json!({ "dashboardUrl": "https://dashboard.example.com/run/1" }),
    );
    event_tx
        .send(SocketEvent::Message(serde_json::to_vec(&accepted).unwrap()))
        .unwrap();

    let transaction_id = Uuid::new_v4();
    let start = rpc_request(
        "START_TRANSACTION",
        json!({ "transactionId": transaction_id, "actionName": "echo" }),
    );
    event_tx
        .send(SocketEvent::Message(serde_json::to_vec(&start).unwrap()))
        .unwrap();

    // The host acks START_TRANSACTION before the action's first render.
    match recv_sent(&mut sent_rx).await {
        OutboundMessage::Rpc(RpcWireEnvelope { method_name, is_response, .. }) => {
            assert_eq!(method_name, "START_TRANSACTION");
            assert!(is_response);
        }
        other => panic!("expected START_TRANSACTION ack, got {other:?}"),
    }

    let render_packet: RenderPacket = match recv_sent(&mut sent_rx).await {
        OutboundMessage::SendIoCall(call) => {
            assert_eq!(call.transaction_id, transaction_id);
            serde_json::from_str(&call.io_call).unwrap()
        }
        other => panic!("expected SEND_IO_CALL, got {other:?}"),
    };
    assert_eq!(render_packet.to_render.len(), 1);
    assert_eq!(render_packet.to_render[0].method_name, "INPUT_TEXT");

    let response = ResponsePacket {
        input_group_key: Some(render_packet.input_group_key),
        kind: ResponseKind::Return,
        values: vec![Value::String("hello".to_string())],
        values_meta: None,
    };
    let io_response = rpc_request(
        "IO_RESPONSE",
        json!({ "transactionId": transaction_id, "value": serde_json::to_string(&response).unwrap() }),
    );
    event_tx
        .send(SocketEvent::Message(serde_json::to_vec(&io_response).unwrap()))
        .unwrap();

    // The host acks IO_RESPONSE before MARK_TRANSACTION_COMPLETE arrives.
    match recv_sent(&mut sent_rx).await {
        OutboundMessage::Rpc(RpcWireEnvelope { method_name, is_response, .. }) => {
            assert_eq!(method_name, "IO_RESPONSE");
            assert!(is_response);
        }
        other => panic!("expected IO_RESPONSE ack, got {other:?}"),
    }

    match recv_sent(&mut sent_rx).await {
        OutboundMessage::MarkTransactionComplete(mark) => {
            assert_eq!(mark.transaction_id, transaction_id);
        }
        other => panic!("expected MARK_TRANSACTION_COMPLETE, got {other:?}"),
    }

    event_tx
        .send(SocketEvent::Closed { code: None, reason: "test done".into() })
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), serve_task)
        .await
        .expect("serve_once did not return")
        .unwrap();
    assert!(result.is_err(), "serve_once should surface the closed connection as a recoverable error");
}

#[tokio::test]
async fn unknown_action_name_is_ignored_without_crashing() {
    let config = HostConfig::builder().with_api_key("test-key").build().unwrap();
    let host = Host::new(config);

    let (socket, mut sent_rx, event_tx, monitor) = MockSocket::new();
    let socket: Arc<dyn Socket> = Arc::new(socket);

    let serve_host = host.clone();
    let serve_task = tokio::spawn(async move { serve_host.serve_once(socket, monitor).await });

    let init_call_id = match recv_sent(&mut sent_rx).await {
        OutboundMessage::Rpc(RpcWireEnvelope { call_id, method_name, .. }) => {
            assert_eq!(method_name, "INITIALIZE_HOST");
            call_id
        }
        other => panic!("expected INITIALIZE_HOST RPC call, got {other:?}"),
    };
    let accepted = rpc_response(
        init_call_id,
        json!({ "dashboardUrl": "https://dashboard.example.com/run/2" }),
    );
    event_tx
        .send(SocketEvent::Message(serde_json::to_vec(&accepted).unwrap()))
        .unwrap();

    let start = rpc_request(
        "START_TRANSACTION",
        json!({ "transactionId": Uuid::new_v4(), "actionName": "does-not-exist" }),
    );
    event_tx
        .send(SocketEvent::Message(serde_json::to_vec(&start).unwrap()))
        .unwrap();

    // Still acked, even though no action ran for it.
    match recv_sent(&mut sent_rx).await {
        OutboundMessage::Rpc(RpcWireEnvelope { method_name, is_response, .. }) => {
            assert_eq!(method_name, "START_TRANSACTION");
            assert!(is_response);
        }
        other => panic!("expected START_TRANSACTION ack, got {other:?}"),
    }

    event_tx
        .send(SocketEvent::Closed { code: None, reason: "test done".into() })
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), serve_task)
        .await
        .expect("serve_once did not return")
        .unwrap();
    assert!(result.is_err());
}
