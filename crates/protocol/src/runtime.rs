//! `Runtime` domain: script evaluation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
	pub expression: String,
	pub return_by_value: bool,
	pub await_promise: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_gesture: Option<bool>,
}

impl EvaluateParams {
	/// Evaluation that resolves promises and returns JSON-serializable values.
	pub fn by_value(expression: impl Into<String>) -> Self {
		Self {
			expression: expression.into(),
			return_by_value: true,
			await_promise: true,
			user_gesture: Some(true),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
	pub result: RemoteObject,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub exception_details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
	#[serde(rename = "type")]
	pub object_type: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subtype: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
	pub text: String,
	#[serde(default)]
	pub line_number: i64,
	#[serde(default)]
	pub column_number: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
	/// Best human-readable message: the thrown object's description when present.
	pub fn message(&self) -> String {
		self.exception
			.as_ref()
			.and_then(|e| e.description.clone())
			.unwrap_or_else(|| self.text.clone())
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn exception_message_prefers_description() {
		let details: ExceptionDetails = serde_json::from_value(json!({
			"text": "Uncaught",
			"lineNumber": 0,
			"columnNumber": 5,
			"exception": {"type": "object", "subtype": "error", "description": "TypeError: x is null"}
		}))
		.unwrap();
		assert_eq!(details.message(), "TypeError: x is null");
	}

	#[test]
	fn evaluate_params_serialize_camel_case() {
		let value = serde_json::to_value(EvaluateParams::by_value("1 + 1")).unwrap();
		assert_eq!(value["returnByValue"], true);
		assert_eq!(value["awaitPromise"], true);
	}
}
