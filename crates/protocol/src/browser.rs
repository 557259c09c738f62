//! `Browser` domain: download routing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DownloadBehavior {
	Deny,
	Allow,
	AllowAndName,
	Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDownloadBehaviorParams {
	pub behavior: DownloadBehavior,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub browser_context_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub download_path: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub events_enabled: Option<bool>,
}

/// Payload of `Browser.downloadWillBegin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadWillBegin {
	pub guid: String,
	pub url: String,
	pub suggested_filename: String,
}

/// Payload of `Browser.downloadProgress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
	pub guid: String,
	#[serde(default)]
	pub total_bytes: f64,
	#[serde(default)]
	pub received_bytes: f64,
	/// `inProgress`, `completed` or `canceled`.
	pub state: String,
}
