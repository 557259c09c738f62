//! `Network` domain events used for traffic capture.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
	pub url: String,
	pub method: String,
	#[serde(default)]
	pub headers: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub post_data: Option<String>,
}

/// Payload of `Network.requestWillBeSent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWillBeSent {
	pub request_id: String,
	pub request: NetworkRequest,
	#[serde(default)]
	pub timestamp: f64,
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub resource_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkResponse {
	pub url: String,
	pub status: i64,
	#[serde(default)]
	pub status_text: String,
	#[serde(default)]
	pub headers: Value,
	#[serde(default)]
	pub mime_type: String,
}

/// Payload of `Network.responseReceived`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
	pub request_id: String,
	pub response: NetworkResponse,
	#[serde(default)]
	pub timestamp: f64,
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub resource_type: Option<String>,
}

/// Payload of `Network.webSocketCreated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketCreated {
	pub request_id: String,
	pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketFrame {
	/// 1 for text frames, 2 for binary (base64 payload).
	pub opcode: f64,
	#[serde(default)]
	pub mask: bool,
	pub payload_data: String,
}

/// Payload of `Network.webSocketFrameSent` and `Network.webSocketFrameReceived`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketFrameEvent {
	pub request_id: String,
	#[serde(default)]
	pub timestamp: f64,
	pub response: WebSocketFrame,
}

/// Payload of `Network.webSocketClosed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketClosed {
	pub request_id: String,
	#[serde(default)]
	pub timestamp: f64,
}
