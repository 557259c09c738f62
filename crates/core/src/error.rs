//! Error types for terminal automation.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while driving the terminal UI.
#[derive(Debug, Error)]
pub enum Error {
	/// Transport, launch or CDP failure from the runtime layer.
	#[error(transparent)]
	Runtime(#[from] godel_runtime::Error),

	/// A script evaluated in the page threw.
	#[error("JavaScript error: {0}")]
	JsEval(String),

	/// No element matched a selector that was required to exist.
	#[error("Element not found: {selector}")]
	ElementNotFound { selector: String },

	/// A polled condition did not hold before its deadline.
	#[error("Timed out after {ms}ms waiting for {condition}")]
	Timeout { condition: String, ms: u64 },

	/// A command was sent but no new terminal window appeared.
	#[error("No new window appeared for '{command}' within {ms}ms")]
	NoNewWindow { command: String, ms: u64 },

	/// Page navigation failed.
	#[error("Navigation to {url} failed: {reason}")]
	Navigation { url: String, reason: String },

	#[error("Login failed: {0}")]
	LoginFailed(String),

	#[error("Layout not found: {0}")]
	LayoutNotFound(String),

	/// Command name not present in the registry.
	#[error("Unknown command '{name}' (available: {})", available.join(", "))]
	UnknownCommand { name: String, available: Vec<String> },

	/// A window rendered but its contents could not be scraped.
	#[error("{command} extraction failed: {reason}")]
	Extraction { command: String, reason: String },

	#[error("Download failed: {0}")]
	Download(String),

	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error("No session named '{0}'")]
	SessionNotFound(String),

	#[error("Storage error: {0}")]
	Storage(#[from] rusqlite::Error),

	#[error("CSV error: {0}")]
	Csv(#[from] csv::Error),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Builds an [`Error::Extraction`].
	pub fn extraction(command: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::Extraction {
			command: command.into(),
			reason: reason.into(),
		}
	}

	/// True for local wait timeouts and CDP request timeouts alike.
	pub fn is_timeout(&self) -> bool {
		match self {
			Self::Timeout { .. } | Self::NoNewWindow { .. } => true,
			Self::Runtime(e) => e.is_timeout(),
			_ => false,
		}
	}

	/// True when the page or its session has gone away.
	pub fn is_target_closed(&self) -> bool {
		matches!(self, Self::Runtime(e) if e.is_target_closed())
	}
}
