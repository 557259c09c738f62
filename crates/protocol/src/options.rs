//! Browser launch options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default timeout in milliseconds for browser-level operations.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Browser window dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
	pub width: u32,
	pub height: u32,
}

impl Default for Viewport {
	fn default() -> Self {
		Self {
			width: 1920,
			height: 1080,
		}
	}
}

/// How to start the browser process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOptions {
	/// Run without a visible window.
	#[serde(default)]
	pub headless: bool,

	/// Keep a real window but place it off-screen.
	#[serde(default)]
	pub background: bool,

	/// Explicit browser binary; discovered when absent.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub executable_path: Option<PathBuf>,

	/// Extra command-line switches appended after the defaults.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub args: Vec<String>,

	#[serde(default)]
	pub window_size: Viewport,

	/// Maximum time to wait for the DevTools endpoint in milliseconds.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timeout: Option<u64>,
}

impl LaunchOptions {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets headless mode.
	pub fn headless(mut self, headless: bool) -> Self {
		self.headless = headless;
		self
	}

	/// Sets background (off-screen) mode.
	pub fn background(mut self, background: bool) -> Self {
		self.background = background;
		self
	}

	/// Sets the browser executable.
	pub fn executable_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.executable_path = Some(path.into());
		self
	}

	/// Appends a command-line switch.
	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}

	/// Sets the window size.
	pub fn window_size(mut self, width: u32, height: u32) -> Self {
		self.window_size = Viewport { width, height };
		self
	}

	/// Sets the launch timeout.
	pub fn timeout(mut self, timeout_ms: u64) -> Self {
		self.timeout = Some(timeout_ms);
		self
	}

	/// Effective launch timeout.
	pub fn timeout_ms(&self) -> u64 {
		self.timeout.unwrap_or(DEFAULT_TIMEOUT_MS)
	}
}
