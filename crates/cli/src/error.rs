use serde_json::json;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Godel(#[from] godel::Error),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl From<godel_runtime::Error> for CliError {
	fn from(err: godel_runtime::Error) -> Self {
		CliError::Godel(godel::Error::Runtime(err))
	}
}

fn classify_runtime(err: &godel_runtime::Error) -> ErrorCode {
	use godel_runtime::Error as E;

	if err.is_timeout() {
		return ErrorCode::Timeout;
	}
	if err.is_target_closed() {
		return ErrorCode::SessionError;
	}
	match err {
		E::BrowserNotFound | E::LaunchFailed(_) | E::ConnectionFailed(_) => ErrorCode::BrowserLaunchFailed,
		E::TransportError(_) => ErrorCode::SessionError,
		E::InvalidArgument(_) => ErrorCode::InvalidInput,
		E::Io(_) => ErrorCode::IoError,
		_ => ErrorCode::InternalError,
	}
}

/// Code, message and details for a core error.
fn describe(err: &godel::Error) -> (ErrorCode, String, Option<serde_json::Value>) {
	use godel::Error as E;

	let message = err.to_string();
	match err {
		E::Runtime(inner) => (classify_runtime(inner), message, None),
		E::JsEval(_) => (ErrorCode::JsEvalFailed, message, None),
		E::ElementNotFound { selector } => (
			ErrorCode::SelectorNotFound,
			message,
			Some(json!({ "selector": selector })),
		),
		E::Timeout { condition, ms } => (
			ErrorCode::Timeout,
			message,
			Some(json!({ "condition": condition, "timeoutMs": ms })),
		),
		E::NoNewWindow { command, ms } => (
			ErrorCode::NoNewWindow,
			message,
			Some(json!({ "command": command, "timeoutMs": ms })),
		),
		E::Navigation { url, .. } => (ErrorCode::NavigationFailed, message, Some(json!({ "url": url }))),
		E::LoginFailed(_) => (ErrorCode::LoginFailed, message, None),
		E::LayoutNotFound(layout) => (ErrorCode::LayoutNotFound, message, Some(json!({ "layout": layout }))),
		E::UnknownCommand { name, available } => (
			ErrorCode::UnknownCommand,
			message,
			Some(json!({ "name": name, "available": available })),
		),
		E::Extraction { command, .. } => (
			ErrorCode::ExtractionFailed,
			message,
			Some(json!({ "command": command })),
		),
		E::Download(_) => (ErrorCode::DownloadFailed, message, None),
		E::InvalidInput(_) => (ErrorCode::InvalidInput, message, None),
		E::Config(_) => (ErrorCode::ConfigError, message, None),
		E::SessionNotFound(_) => (ErrorCode::SessionError, message, None),
		E::Storage(_) => (ErrorCode::StorageError, message, None),
		E::Csv(_) | E::Io(_) => (ErrorCode::IoError, message, None),
		E::Json(_) => (ErrorCode::InternalError, message, None),
	}
}

impl CliError {
	/// Convert this error to a CommandError for structured output
	pub fn to_command_error(&self) -> CommandError {
		let (code, message, details) = match self {
			CliError::Godel(err) => describe(err),
			CliError::InvalidInput(msg) => (ErrorCode::InvalidInput, msg.clone(), None),
			CliError::Io(err) => (ErrorCode::IoError, err.to_string(), None),
			CliError::Json(err) => (ErrorCode::InternalError, format!("JSON error: {err}"), None),
			CliError::Anyhow(err) => (ErrorCode::InternalError, format!("{err:#}"), None),
		};

		CommandError {
			code,
			message,
			details,
		}
	}
}
