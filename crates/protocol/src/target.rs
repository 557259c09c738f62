//! `Target` domain: browser contexts, page targets and session attachment.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBrowserContextParams {
	/// Dispose the context when the debugging session that created it detaches.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dispose_on_detach: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBrowserContextResult {
	pub browser_context_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetParams {
	pub url: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub browser_context_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub width: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetResult {
	pub target_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetParams {
	pub target_id: String,
	/// Route the session's traffic over the browser socket with a `sessionId`.
	pub flatten: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetResult {
	pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	pub target_id: String,
	#[serde(rename = "type")]
	pub target_type: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	#[serde(default)]
	pub attached: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub browser_context_id: Option<String>,
}

/// Payload of `Target.detachedFromTarget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachedFromTarget {
	pub session_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub target_id: Option<String>,
}
