//! Chromium process management.
//!
//! Locates a Chromium-based browser, launches it with remote debugging on an
//! ephemeral port and a throwaway profile, and reads the DevTools WebSocket
//! endpoint from the process's stderr.

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use godel_protocol::LaunchOptions;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

/// Environment variables consulted for an explicit browser binary, in order.
pub const EXECUTABLE_ENV_VARS: [&str; 2] = ["GODEL_CHROME", "CHROME_PATH"];

const EXECUTABLE_NAMES: &[&str] = &[
	"google-chrome",
	"google-chrome-stable",
	"chromium",
	"chromium-browser",
	"chrome",
	"microsoft-edge",
	"msedge",
];

const DEVTOOLS_PREFIX: &str = "DevTools listening on ";

/// Offset that keeps a background window out of sight.
const OFFSCREEN_POSITION: &str = "--window-position=-2400,-2400";

/// Get the path to a Chromium-based browser executable.
///
/// Search order:
/// 1. The explicit path from [`LaunchOptions::executable_path`]
/// 2. `GODEL_CHROME` and `CHROME_PATH` environment variables
/// 3. Well-known executable names on `PATH`
/// 4. Platform install locations
pub fn find_browser_executable(explicit: Option<&Path>) -> Result<PathBuf> {
	if let Some(path) = explicit {
		if path.is_file() {
			return Ok(path.to_path_buf());
		}
		return Err(Error::LaunchFailed(format!(
			"configured browser executable does not exist: {}",
			path.display()
		)));
	}

	for var in EXECUTABLE_ENV_VARS {
		if let Ok(value) = std::env::var(var) {
			let path = PathBuf::from(&value);
			if path.is_file() {
				debug!(target = "godel", source = var, path = %path.display(), "Using browser from environment");
				return Ok(path);
			}
			warn!(target = "godel", source = var, path = %value, "Browser path from environment does not exist");
		}
	}

	for name in EXECUTABLE_NAMES {
		if let Ok(path) = which::which(name) {
			debug!(target = "godel", path = %path.display(), "Found browser on PATH");
			return Ok(path);
		}
	}

	platform_paths()
		.into_iter()
		.find(|p| p.is_file())
		.ok_or(Error::BrowserNotFound)
}

fn platform_paths() -> Vec<PathBuf> {
	let mut paths = Vec::new();
	if cfg!(target_os = "macos") {
		paths.push(PathBuf::from(
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
		));
		paths.push(PathBuf::from(
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
		));
	} else if cfg!(target_os = "windows") {
		for base in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
			if let Ok(dir) = std::env::var(base) {
				paths.push(Path::new(&dir).join("Google/Chrome/Application/chrome.exe"));
			}
		}
	} else {
		paths.push(PathBuf::from("/usr/bin/google-chrome"));
		paths.push(PathBuf::from("/usr/bin/chromium"));
		paths.push(PathBuf::from("/snap/bin/chromium"));
	}
	paths
}

/// Command-line switches for a debuggable browser using `profile_dir`.
pub fn browser_args(options: &LaunchOptions, profile_dir: &Path) -> Vec<String> {
	let mut args = vec![
		"--remote-debugging-port=0".to_string(),
		format!("--user-data-dir={}", profile_dir.display()),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
		"--no-sandbox".to_string(),
		"--disable-dev-shm-usage".to_string(),
		format!(
			"--window-size={},{}",
			options.window_size.width, options.window_size.height
		),
	];
	if options.headless {
		args.push("--headless=new".to_string());
	} else if options.background {
		args.push(OFFSCREEN_POSITION.to_string());
	}
	args.extend(options.args.iter().cloned());
	args.push("about:blank".to_string());
	args
}

/// Extracts the endpoint from a `DevTools listening on ws://...` line.
pub fn parse_devtools_line(line: &str) -> Option<String> {
	let rest = line.trim().strip_prefix(DEVTOOLS_PREFIX)?;
	(rest.starts_with("ws://") || rest.starts_with("wss://")).then(|| rest.to_string())
}

/// A running browser launched by us.
///
/// The process is killed and its profile directory removed on drop.
pub struct BrowserProcess {
	child: Child,
	ws_endpoint: String,
	_profile: TempDir,
}

impl BrowserProcess {
	pub async fn launch(options: &LaunchOptions) -> Result<Self> {
		let executable = find_browser_executable(options.executable_path.as_deref())?;
		let profile = tempfile::Builder::new().prefix("godel-profile-").tempdir()?;
		let args = browser_args(options, profile.path());

		debug!(
			target = "godel",
			executable = %executable.display(),
			headless = options.headless,
			background = options.background,
			"Launching browser"
		);

		let mut child = Command::new(&executable)
			.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| Error::LaunchFailed(format!("{}: {e}", executable.display())))?;

		let stderr = child
			.stderr
			.take()
			.ok_or_else(|| Error::LaunchFailed("browser stderr unavailable".to_string()))?;
		let mut lines = BufReader::new(stderr).lines();
		let timeout = Duration::from_millis(options.timeout_ms());

		let mut seen = Vec::new();
		let endpoint = tokio::time::timeout(timeout, async {
			while let Some(line) = lines.next_line().await? {
				if let Some(endpoint) = parse_devtools_line(&line) {
					return Ok(Some(endpoint));
				}
				seen.push(line);
			}
			Ok::<_, std::io::Error>(None)
		})
		.await;

		let ws_endpoint = match endpoint {
			Ok(Ok(Some(endpoint))) => endpoint,
			Ok(Ok(None)) => {
				return Err(Error::LaunchFailed(format!(
					"browser exited before reporting a DevTools endpoint: {}",
					tail(&seen)
				)));
			}
			Ok(Err(e)) => return Err(Error::Io(e)),
			Err(_) => {
				let _ = child.start_kill();
				return Err(Error::LaunchFailed(format!(
					"no DevTools endpoint after {}ms: {}",
					timeout.as_millis(),
					tail(&seen)
				)));
			}
		};

		// Keep draining so a chatty browser never blocks on a full pipe.
		tokio::spawn(async move {
			while let Ok(Some(line)) = lines.next_line().await {
				trace!(target = "godel", browser = %line);
			}
		});

		debug!(target = "godel", endpoint = %ws_endpoint, pid = ?child.id(), "Browser ready");

		Ok(Self {
			child,
			ws_endpoint,
			_profile: profile,
		})
	}

	pub fn ws_endpoint(&self) -> &str {
		&self.ws_endpoint
	}

	pub fn pid(&self) -> Option<u32> {
		self.child.id()
	}

	/// Kills the process and waits for it to exit.
	pub async fn kill(&mut self) -> Result<()> {
		if self.child.id().is_some() {
			self.child.kill().await?;
		}
		Ok(())
	}
}

fn tail(lines: &[String]) -> String {
	let start = lines.len().saturating_sub(5);
	let text = lines[start..].join(" | ");
	if text.is_empty() {
		"no output".to_string()
	} else {
		text
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
	web_socket_debugger_url: String,
}

/// Resolves the browser WebSocket endpoint of an already running browser.
///
/// Accepts `ws://` endpoints unchanged; for `http://host:port` queries
/// `/json/version`.
pub async fn discover_ws_endpoint(endpoint: &str) -> Result<String> {
	if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
		return Ok(endpoint.to_string());
	}

	let url = format!("{}/json/version", endpoint.trim_end_matches('/'));
	let info: VersionInfo = reqwest::get(&url)
		.await
		.map_err(|e| Error::ConnectionFailed(format!("{url}: {e}")))?
		.error_for_status()
		.map_err(|e| Error::ConnectionFailed(format!("{url}: {e}")))?
		.json()
		.await
		.map_err(|e| Error::ConnectionFailed(format!("{url}: invalid version payload: {e}")))?;

	Ok(info.web_socket_debugger_url)
}
