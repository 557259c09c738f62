//! Structured output envelope for all CLI commands.
//!
//! ## Output Contract
//!
//! Every command produces a result envelope on stdout:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": true,
//!   "command": "run",
//!   "inputs": { "command": "DES", "ticker": "AAPL" },
//!   "data": { ... },
//!   "timings": { "durationMs": 5321 },
//!   "artifacts": [{ "type": "json", "path": "output/DES_AAPL_20250101_120000.json" }]
//! }
//! ```
//!
//! On failure:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": false,
//!   "command": "run",
//!   "error": {
//!     "code": "NO_NEW_WINDOW",
//!     "message": "No new window appeared for 'AAPL EQ DES' within 10000ms"
//!   }
//! }
//! ```


use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Current schema version for command output.
///
/// Increment this when making breaking changes to the output structure.
pub const SCHEMA_VERSION: u32 = 1;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// TOON output (default, token-efficient for LLMs)
	#[default]
	Toon,
	/// JSON output
	Json,
	/// Newline-delimited JSON (streaming)
	Ndjson,
	/// Human-readable text
	Text,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"toon" => Ok(OutputFormat::Toon),
			"json" => Ok(OutputFormat::Json),
			"ndjson" => Ok(OutputFormat::Ndjson),
			"text" => Ok(OutputFormat::Text),
			_ => Err(format!("unknown format: {s}")),
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Toon => write!(f, "toon"),
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}

/// The main result envelope returned by all commands.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	/// Always [`SCHEMA_VERSION`].
	pub schema_version: u32,

	pub ok: bool,

	/// Subcommand name (`run`, `most`, `chat`, ...).
	pub command: String,

	/// Inputs used for this command (for traceability)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub inputs: Option<CommandInputs>,

	/// Command-specific result data (only present on success)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	/// Error information (only present on failure)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,

	/// Files written by the command
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub artifacts: Vec<Artifact>,

	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub diagnostics: Vec<Diagnostic>,

	/// Effective configuration used for this command
	#[serde(skip_serializing_if = "Option::is_none")]
	pub config: Option<EffectiveConfig>,
}

/// Inputs that were used for the command (for traceability)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommandInputs {
	/// Terminal mnemonic (`DES`, `MOST`, ...).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub command: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ticker: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tickers: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub output_path: Option<PathBuf>,
	/// Additional command-specific inputs
	#[serde(flatten, skip_serializing_if = "Option::is_none")]
	pub extra: Option<serde_json::Value>,
}

/// Error information for failed commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Standardized error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Browser failed to launch or could not be reached
	BrowserLaunchFailed,
	NavigationFailed,
	/// A required element never appeared
	SelectorNotFound,
	/// A wait condition did not hold in time
	Timeout,
	/// A command was typed but no window opened
	NoNewWindow,
	LoginFailed,
	LayoutNotFound,
	/// Command mnemonic not in the registry
	UnknownCommand,
	/// A window rendered but could not be scraped
	ExtractionFailed,
	DownloadFailed,
	JsEvalFailed,
	/// SQLite failure
	StorageError,
	/// Missing credentials or malformed configuration
	ConfigError,
	IoError,
	/// Page, context or browser connection went away
	SessionError,
	InvalidInput,
	InternalError,
}

impl ErrorCode {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorCode::BrowserLaunchFailed => "BROWSER_LAUNCH_FAILED",
			ErrorCode::NavigationFailed => "NAVIGATION_FAILED",
			ErrorCode::SelectorNotFound => "SELECTOR_NOT_FOUND",
			ErrorCode::Timeout => "TIMEOUT",
			ErrorCode::NoNewWindow => "NO_NEW_WINDOW",
			ErrorCode::LoginFailed => "LOGIN_FAILED",
			ErrorCode::LayoutNotFound => "LAYOUT_NOT_FOUND",
			ErrorCode::UnknownCommand => "UNKNOWN_COMMAND",
			ErrorCode::ExtractionFailed => "EXTRACTION_FAILED",
			ErrorCode::DownloadFailed => "DOWNLOAD_FAILED",
			ErrorCode::JsEvalFailed => "JS_EVAL_FAILED",
			ErrorCode::StorageError => "STORAGE_ERROR",
			ErrorCode::ConfigError => "CONFIG_ERROR",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::SessionError => "SESSION_ERROR",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		}
	}
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
	/// Time spent inside the terminal command itself, excluding launch and
	/// login.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub command_ms: Option<u64>,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: duration.as_millis() as u64,
			command_ms: None,
		}
	}
}

/// File produced by a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
	#[serde(rename = "type")]
	pub artifact_type: ArtifactType,
	pub path: PathBuf,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub size_bytes: Option<u64>,
}

impl Artifact {
	/// Classifies `path` by extension and reads its size if it exists.
	pub fn from_path(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		Self {
			artifact_type: ArtifactType::for_path(&path),
			size_bytes: std::fs::metadata(&path).ok().map(|m| m.len()),
			path,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
	Json,
	Csv,
	Pdf,
	/// Any other downloaded file
	Download,
}

impl ArtifactType {
	pub fn for_path(path: &Path) -> Self {
		let ext = path
			.extension()
			.and_then(|e| e.to_str())
			.map(str::to_ascii_lowercase);
		match ext.as_deref() {
			Some("json") => ArtifactType::Json,
			Some("csv") => ArtifactType::Csv,
			Some("pdf") => ArtifactType::Pdf,
			_ => ArtifactType::Download,
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
	pub level: DiagnosticLevel,
	pub message: String,
	/// Source of the diagnostic (e.g., "storage", "chat")
	#[serde(skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
	Info,
	Warning,
	Error,
}

/// Settings the command actually ran with.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
	pub url: String,
	pub layout: String,
	pub headless: bool,
	pub background: bool,
	/// CDP endpoint attached to instead of launching, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub endpoint: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub database: Option<PathBuf>,
}

/// Builder for constructing command results
pub struct ResultBuilder<T: Serialize> {
	command: String,
	inputs: Option<CommandInputs>,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
	command_ms: Option<u64>,
	artifacts: Vec<Artifact>,
	diagnostics: Vec<Diagnostic>,
	config: Option<EffectiveConfig>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			inputs: None,
			data: None,
			error: None,
			start_time: Instant::now(),
			command_ms: None,
			artifacts: Vec::new(),
			diagnostics: Vec::new(),
			config: None,
		}
	}

	/// Measures total duration from `start` instead of from `new`.
	pub fn started_at(mut self, start: Instant) -> Self {
		self.start_time = start;
		self
	}

	pub fn inputs(mut self, inputs: CommandInputs) -> Self {
		self.inputs = Some(inputs);
		self
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
			details: None,
		});
		self
	}

	pub fn error_with_details(
		mut self,
		code: ErrorCode,
		message: impl Into<String>,
		details: serde_json::Value,
	) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
			details: Some(details),
		});
		self
	}

	pub fn artifact(mut self, artifact: Artifact) -> Self {
		self.artifacts.push(artifact);
		self
	}

	pub fn artifacts(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
		self.artifacts.extend(paths.into_iter().map(Artifact::from_path));
		self
	}

	pub fn diagnostic(mut self, level: DiagnosticLevel, message: impl Into<String>) -> Self {
		self.diagnostics.push(Diagnostic {
			level,
			message: message.into(),
			source: None,
		});
		self
	}

	pub fn diagnostic_with_source(
		mut self,
		level: DiagnosticLevel,
		message: impl Into<String>,
		source: impl Into<String>,
	) -> Self {
		self.diagnostics.push(Diagnostic {
			level,
			message: message.into(),
			source: Some(source.into()),
		});
		self
	}

	pub fn config(mut self, config: EffectiveConfig) -> Self {
		self.config = Some(config);
		self
	}

	/// Records time spent in the terminal command alone.
	pub fn command_ms(mut self, ms: u64) -> Self {
		self.command_ms = Some(ms);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none() && self.data.is_some();
		let mut timings = Timings::from(self.start_time.elapsed());
		timings.command_ms = self.command_ms;

		CommandResult {
			schema_version: SCHEMA_VERSION,
			ok,
			command: self.command,
			inputs: self.inputs,
			data: self.data,
			error: self.error,
			timings: Some(timings),
			artifacts: self.artifacts,
			diagnostics: self.diagnostics,
			config: self.config,
		}
	}
}

/// Print a command result to stdout in the specified format
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Toon => {
			if let Ok(json_value) = serde_json::to_value(result) {
				println!("{}", toon::encode(&json_value, None));
			}
		}
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => {
			print_result_text(result);
		}
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if result.ok {
		if let Some(ref data) = result.data {
			if let Ok(json) = serde_json::to_string_pretty(data) {
				let _ = writeln!(stdout, "{json}");
			}
		}
	} else if let Some(ref error) = result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
		if let Some(ref details) = error.details {
			if let Ok(json) = serde_json::to_string_pretty(details) {
				let _ = writeln!(stdout, "Details: {json}");
			}
		}
	}

	for diag in &result.diagnostics {
		let prefix = match diag.level {
			DiagnosticLevel::Info => "info",
			DiagnosticLevel::Warning => "warning",
			DiagnosticLevel::Error => "error",
		};
		if let Some(ref source) = diag.source {
			let _ = writeln!(stdout, "[{prefix}:{source}] {}", diag.message);
		} else {
			let _ = writeln!(stdout, "[{prefix}] {}", diag.message);
		}
	}

	for artifact in &result.artifacts {
		let _ = writeln!(
			stdout,
			"Saved {:?}: {}",
			artifact.artifact_type,
			artifact.path.display()
		);
	}

	if let Some(ref timings) = result.timings {
		let _ = writeln!(stdout, "Completed in {}ms", timings.duration_ms);
	}
}

/// Print an error to stderr in human-readable format
pub fn print_error_stderr(error: &CommandError) {
	eprintln!("{} [{}]: {}", "Error".red().bold(), error.code, error.message);
}
