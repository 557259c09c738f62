//! Error types for the godel runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the browser process and its socket.
#[derive(Debug, Error)]
pub enum Error {
	/// No Chromium-based browser could be located.
	#[error(
		"Chromium-based browser not found. Install Google Chrome or Chromium, or set GODEL_CHROME to its path"
	)]
	BrowserNotFound,

	/// The browser process failed to start or never reported its endpoint.
	#[error("Failed to launch browser: {0}")]
	LaunchFailed(String),

	/// Failed to open the DevTools socket.
	#[error("Failed to connect to DevTools endpoint: {0}")]
	ConnectionFailed(String),

	/// WebSocket-level failure.
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Malformed or unexpected protocol traffic.
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// Error reported by the browser for a command.
	#[error("{method} failed ({code}): {message}")]
	Remote {
		method: String,
		code: i64,
		message: String,
		data: Option<String>,
	},

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// A command did not receive its response in time.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// Target was closed (browser, context, or page).
	#[error("Target closed: Cannot perform operation on closed {target_type}. {context}")]
	TargetClosed {
		target_type: String,
		context: String,
	},

	/// The socket closed while requests were still pending.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}

impl Error {
	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}

	/// Returns true if the target behind the session is gone.
	pub fn is_target_closed(&self) -> bool {
		match self {
			Error::TargetClosed { .. } | Error::ChannelClosed => true,
			Error::Remote { message, .. } => {
				message.contains("Target closed")
					|| message.contains("Session with given id not found")
					|| message.contains("No target with given id")
			}
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_session_loss_counts_as_target_closed() {
		let err = Error::Remote {
			method: "Runtime.evaluate".into(),
			code: -32001,
			message: "Session with given id not found.".into(),
			data: None,
		};
		assert!(err.is_target_closed());
		assert!(!err.is_timeout());
		assert_eq!(
			err.to_string(),
			"Runtime.evaluate failed (-32001): Session with given id not found."
		);
	}

	#[test]
	fn timeout_is_detected() {
		assert!(Error::Timeout("Page.navigate after 30000ms".into()).is_timeout());
		assert!(!Error::ChannelClosed.is_timeout());
	}
}
