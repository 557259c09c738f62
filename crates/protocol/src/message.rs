//! Envelope types shared by every CDP exchange.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command sent to the browser.
///
/// When `session_id` is set the command is routed to the attached target
/// (flattened session mode); otherwise it addresses the browser endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
	pub id: u64,
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Reply correlated to a [`Request`] by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
	pub id: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Error object carried by a failed [`Response`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub code: i64,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Unsolicited notification such as `Network.webSocketFrameReceived`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

impl Event {
	/// Decodes the params into a typed event payload.
	pub fn parse<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
		serde_json::from_value(self.params.clone())
	}
}

/// Discriminated union of inbound messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	/// Has an `id` field.
	Response(Response),
	/// Has a `method` field and no `id`.
	Event(Event),
	/// Anything else (forward-compatible catch-all).
	Unknown(Value),
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn response_is_distinguished_from_event() {
		let msg: Message = serde_json::from_value(json!({
			"id": 7,
			"result": {"frameId": "F1"},
			"sessionId": "S1"
		}))
		.unwrap();
		match msg {
			Message::Response(r) => {
				assert_eq!(r.id, 7);
				assert_eq!(r.session_id.as_deref(), Some("S1"));
				assert_eq!(r.result.unwrap()["frameId"], "F1");
			}
			other => panic!("expected response, got {other:?}"),
		}
	}

	#[test]
	fn event_without_params_defaults_to_null() {
		let msg: Message =
			serde_json::from_value(json!({"method": "Page.loadEventFired"})).unwrap();
		match msg {
			Message::Event(e) => {
				assert_eq!(e.method, "Page.loadEventFired");
				assert!(e.params.is_null());
				assert!(e.session_id.is_none());
			}
			other => panic!("expected event, got {other:?}"),
		}
	}

	#[test]
	fn error_response_keeps_code_and_message() {
		let msg: Message = serde_json::from_value(json!({
			"id": 3,
			"error": {"code": -32000, "message": "No node with given id found"}
		}))
		.unwrap();
		let Message::Response(r) = msg else {
			panic!("expected response");
		};
		let err = r.error.unwrap();
		assert_eq!(err.code, -32000);
		assert!(err.message.contains("No node"));
	}

	#[test]
	fn unknown_shapes_are_kept() {
		let msg: Message = serde_json::from_value(json!({"hello": "world"})).unwrap();
		assert!(matches!(msg, Message::Unknown(_)));
	}

	#[test]
	fn request_omits_absent_session() {
		let req = Request {
			id: 1,
			method: "Target.getTargets".into(),
			params: json!({}),
			session_id: None,
		};
		let value = serde_json::to_value(&req).unwrap();
		assert!(value.get("sessionId").is_none());
		assert_eq!(value["method"], "Target.getTargets");
	}
}
