//! Wire envelopes exchanged with the coordinator.
//!
//! These mirror the JSON-compatible objects the core sends and receives over
//! the duplex channel. `INITIALIZE_HOST`, `START_TRANSACTION` and
//! `IO_RESPONSE` all ride the `DuplexRpc` substrate as an `RPC`-tagged
//! [`RpcWireEnvelope`]; `SEND_IO_CALL`, `MARK_TRANSACTION_COMPLETE` and
//! `UPDATE_LOADING_STATE` are one-way notifications with no reply, framed
//! directly as their own envelope kinds below.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire shape for one [`crate::rpc::RpcEnvelope`], request or response, in
/// either direction. `method_name` travels as a plain string; the
/// `MethodName` newtype is a `host-protocol`-internal concern only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcWireEnvelope {
    pub call_id: Uuid,
    pub method_name: String,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub is_response: bool,
}

/// `INITIALIZE_HOST` request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeHostRequest {
    pub api_key: String,
    pub callable_action_names: Vec<String>,
}

/// `INITIALIZE_HOST` response: either an accepted session with a dashboard
/// URL, or a bare rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged, rename_all = "camelCase")]
pub enum InitializeHostResponse {
    Accepted { dashboard_url: String },
    Rejected(bool),
}

/// `SEND_IO_CALL` outbound envelope. `io_call` carries the serialized
/// [`RenderPacket`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendIoCall {
    pub transaction_id: Uuid,
    pub io_call: String,
}

/// `MARK_TRANSACTION_COMPLETE` outbound envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkTransactionComplete {
    pub transaction_id: Uuid,
}

/// `UPDATE_LOADING_STATE` outbound envelope: the wire shape for the
/// transaction progress side channel. Every transmit here is best-effort,
/// matching `TransactionLoadingState`'s never-throws contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLoadingState {
    pub transaction_id: Uuid,
    pub state: serde_json::Value,
}

/// `START_TRANSACTION` RPC request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTransaction {
    pub transaction_id: Uuid,
    pub action_name: String,
}

/// `IO_RESPONSE` RPC request payload. `value` carries the serialized
/// [`ResponsePacket`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoResponseEnvelope {
    pub transaction_id: Uuid,
    pub value: String,
}

/// One component's render payload inside a [`RenderPacket`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToRender {
    pub method_name: String,
    pub label: String,
    pub props: serde_json::Value,
    pub props_meta: serde_json::Value,
}

/// The batch a render loop transmits for one top-level `renderComponents`
/// invocation (or a re-render within it).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPacket {
    pub id: Uuid,
    pub input_group_key: Uuid,
    pub to_render: Vec<ToRender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error_message: Option<String>,
    pub kind: RenderKind,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum RenderKind {
    #[serde(rename = "RENDER")]
    Render,
}

/// The kind of response the coordinator sent back for a render batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ResponseKind {
    #[serde(rename = "RETURN")]
    Return,
    #[serde(rename = "SET_STATE")]
    SetState,
    #[serde(rename = "CANCELED")]
    Canceled,
}

/// The response packet extracted from `IO_RESPONSE.value`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePacket {
    pub input_group_key: Option<Uuid>,
    pub kind: ResponseKind,
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
    #[serde(default)]
    pub values_meta: Option<serde_json::Value>,
}

/// One outbound wire message, tagged by `type` so the coordinator can
/// dispatch without a separate framing layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "RPC")]
    Rpc(RpcWireEnvelope),
    #[serde(rename = "SEND_IO_CALL")]
    SendIoCall(SendIoCall),
    #[serde(rename = "MARK_TRANSACTION_COMPLETE")]
    MarkTransactionComplete(MarkTransactionComplete),
    #[serde(rename = "UPDATE_LOADING_STATE")]
    UpdateLoadingState(UpdateLoadingState),
}

/// One inbound wire message, dispatched by `type`. Every message the
/// coordinator sends rides the RPC substrate: `INITIALIZE_HOST`'s response,
/// and `START_TRANSACTION` / `IO_RESPONSE` as RPC requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "RPC")]
    Rpc(RpcWireEnvelope),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_packet_serializes_kind_as_render() {
        let packet = RenderPacket {
            id: Uuid::nil(),
            input_group_key: Uuid::nil(),
            to_render: vec![],
            validation_error_message: None,
            kind: RenderKind::Render,
        };
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json["kind"], "RENDER");
        assert!(json.get("validationErrorMessage").is_none() || json["validationErrorMessage"].is_null());
    }

    #[test]
    fn response_packet_deserializes_return_kind() {
        let raw = serde_json::json!({
            "inputGroupKey": "00000000-0000-0000-0000-000000000000",
            "kind": "RETURN",
            "values": [42]
        });
        let packet: ResponsePacket = serde_json::from_value(raw).unwrap();
        assert_eq!(packet.kind, ResponseKind::Return);
        assert_eq!(packet.values, vec![serde_json::json!(42)]);
    }

    #[test]
    fn response_packet_canceled_ignores_values() {
        let raw = serde_json::json!({ "kind": "CANCELED" });
        let packet: ResponsePacket = serde_json::from_value(raw).unwrap();
        assert_eq!(packet.kind, ResponseKind::Canceled);
        assert!(packet.values.is_empty());
    }

    #[test]
    fn inbound_message_dispatches_on_type_tag() {
        let raw = serde_json::json!({
            "type": "RPC",
            "callId": "00000000-0000-0000-0000-000000000000",
            "methodName": "START_TRANSACTION",
            "payload": { "transactionId": "00000000-0000-0000-0000-000000000000", "actionName": "greet" },
            "isResponse": false
        });
        let message: InboundMessage = serde_json::from_value(raw).unwrap();
        let InboundMessage::Rpc(envelope) = message;
        assert_eq!(envelope.method_name, "START_TRANSACTION");
    }

    #[test]
    fn outbound_message_serializes_type_tag() {
        let message = OutboundMessage::MarkTransactionComplete(MarkTransactionComplete {
            transaction_id: Uuid::nil(),
        });
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "MARK_TRANSACTION_COMPLETE");
    }
}
