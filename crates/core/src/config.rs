//! Terminal configuration: defaults, optional JSON file, environment.
//!
//! Precedence, lowest first: [`TerminalConfig::default`], a config file
//! ([`TerminalConfig::load`]), `GODEL_*` environment variables
//! ([`TerminalConfig::with_env`]), then whatever the caller sets explicitly.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use godel_protocol::LaunchOptions;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::wait::WaitOptions;

pub const DEFAULT_URL: &str = "https://app.godelterminal.com";
pub const DEFAULT_LAYOUT: &str = "dev";

/// Login credentials. The password is never printed or serialized.
#[derive(Clone, Deserialize)]
pub struct Credentials {
	pub username: String,
	pub password: String,
}

impl Credentials {
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self {
			username: username.into(),
			password: password.into(),
		}
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

impl Serialize for Credentials {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		use serde::ser::SerializeStruct;
		let mut s = serializer.serialize_struct("Credentials", 1)?;
		s.serialize_field("username", &self.username)?;
		s.end()
	}
}

/// Timeouts in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Timeouts {
	/// New window after a command is sent.
	pub window_ms: u64,
	/// Spinner in a new window.
	pub loading_ms: u64,
	pub login_ms: u64,
	pub navigation_ms: u64,
	/// Batch analysis (`PRT`) progress.
	pub batch_ms: u64,
	/// Exported file appearing on disk.
	pub download_ms: u64,
	pub poll_ms: u64,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			window_ms: 10_000,
			loading_ms: 30_000,
			login_ms: 15_000,
			navigation_ms: 30_000,
			batch_ms: 120_000,
			download_ms: 10_000,
			poll_ms: 100,
		}
	}
}

impl Timeouts {
	pub fn poll(&self) -> Duration {
		Duration::from_millis(self.poll_ms.max(1))
	}

	/// Wait options for `timeout_ms` at the configured poll interval.
	pub fn wait(&self, timeout_ms: u64) -> WaitOptions {
		WaitOptions::from_millis(timeout_ms).with_interval(self.poll())
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TerminalConfig {
	pub url: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub credentials: Option<Credentials>,
	/// Layout tab loaded after login.
	pub layout: String,
	pub launch: LaunchOptions,
	pub timeouts: Timeouts,
	pub output_dir: PathBuf,
	pub downloads_dir: PathBuf,
	pub database_path: PathBuf,
	/// Pause between consecutive logins when creating several sessions.
	pub login_stagger_ms: u64,
	/// Attach to a running browser instead of launching one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cdp_endpoint: Option<String>,
}

impl Default for TerminalConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_URL.to_string(),
			credentials: None,
			layout: DEFAULT_LAYOUT.to_string(),
			launch: LaunchOptions::default(),
			timeouts: Timeouts::default(),
			output_dir: PathBuf::from("output"),
			downloads_dir: default_downloads_dir(),
			database_path: default_database_path(),
			login_stagger_ms: 2_000,
			cdp_endpoint: None,
		}
	}
}

fn default_downloads_dir() -> PathBuf {
	dirs::download_dir()
		.map(|d| d.join("godel"))
		.unwrap_or_else(|| PathBuf::from("downloads"))
}

fn default_database_path() -> PathBuf {
	dirs::data_local_dir()
		.map(|d| d.join("godel").join("godel.db"))
		.unwrap_or_else(|| PathBuf::from("godel.db"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
	match value.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" | "" => Ok(false),
		other => Err(Error::Config(format!("{key}: expected a boolean, got '{other}'"))),
	}
}

impl TerminalConfig {
	/// Reads a JSON config file; missing keys keep their defaults.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path)
			.map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
		serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
	}

	/// Applies `GODEL_*` variables from the process environment.
	pub fn with_env(self) -> Result<Self> {
		self.apply_env_from(|key| std::env::var(key).ok())
	}

	/// Applies `GODEL_*` variables looked up through `lookup`.
	pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		if let Some(url) = lookup("GODEL_URL") {
			self.url = url;
		}
		match (lookup("GODEL_USERNAME"), lookup("GODEL_PASSWORD")) {
			(Some(username), Some(password)) => {
				self.credentials = Some(Credentials::new(username, password));
			}
			(Some(username), None) => {
				let password = self
					.credentials
					.take()
					.map(|c| c.password)
					.unwrap_or_default();
				self.credentials = Some(Credentials::new(username, password));
			}
			(None, Some(password)) => {
				if let Some(creds) = self.credentials.as_mut() {
					creds.password = password;
				}
			}
			(None, None) => {}
		}
		if let Some(layout) = lookup("GODEL_LAYOUT") {
			self.layout = layout;
		}
		if let Some(headless) = lookup("GODEL_HEADLESS") {
			self.launch.headless = parse_bool("GODEL_HEADLESS", &headless)?;
		}
		if let Some(path) = lookup("GODEL_DB_PATH") {
			self.database_path = PathBuf::from(path);
		}
		if let Some(path) = lookup("GODEL_OUTPUT_DIR") {
			self.output_dir = PathBuf::from(path);
		}
		if let Some(path) = lookup("GODEL_DOWNLOADS_DIR") {
			self.downloads_dir = PathBuf::from(path);
		}
		if let Some(path) = lookup("GODEL_CHROME") {
			self.launch.executable_path = Some(PathBuf::from(path));
		}
		if let Some(endpoint) = lookup("GODEL_CDP_ENDPOINT") {
			self.cdp_endpoint = Some(endpoint);
		}
		Ok(self)
	}

	/// Credentials, or [`Error::Config`] naming the variables to set.
	pub fn require_credentials(&self) -> Result<&Credentials> {
		self.credentials
			.as_ref()
			.filter(|c| !c.username.is_empty() && !c.password.is_empty())
			.ok_or_else(|| Error::Config("credentials missing: set GODEL_USERNAME and GODEL_PASSWORD".into()))
	}

	pub fn login_stagger(&self) -> Duration {
		Duration::from_millis(self.login_stagger_ms)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |key| map.get(key).cloned()
	}

	#[test]
	fn defaults() {
		let config = TerminalConfig::default();
		assert_eq!(config.url, DEFAULT_URL);
		assert_eq!(config.layout, "dev");
		assert_eq!(config.timeouts.window_ms, 10_000);
		assert!(config.credentials.is_none());
		assert!(config.database_path.ends_with("godel.db"));
	}

	#[test]
	fn env_overrides() {
		let config = TerminalConfig::default()
			.apply_env_from(env(&[
				("GODEL_URL", "http://localhost:3000"),
				("GODEL_USERNAME", "trader@example.com"),
				("GODEL_PASSWORD", "hunter2"),
				("GODEL_HEADLESS", "yes"),
				("GODEL_DB_PATH", "/tmp/chat.db"),
			]))
			.unwrap();
		assert_eq!(config.url, "http://localhost:3000");
		assert!(config.launch.headless);
		assert_eq!(config.database_path, PathBuf::from("/tmp/chat.db"));
		let creds = config.require_credentials().unwrap();
		assert_eq!(creds.username, "trader@example.com");
		assert_eq!(creds.password, "hunter2");
	}

	#[test]
	fn bad_boolean_is_rejected() {
		let err = TerminalConfig::default()
			.apply_env_from(env(&[("GODEL_HEADLESS", "maybe")]))
			.unwrap_err();
		assert!(matches!(err, Error::Config(m) if m.contains("GODEL_HEADLESS")));
	}

	#[test]
	fn missing_credentials_are_a_config_error() {
		let config = TerminalConfig::default();
		assert!(matches!(config.require_credentials(), Err(Error::Config(_))));
	}

	#[test]
	fn password_is_never_exposed() {
		let mut config = TerminalConfig::default();
		config.credentials = Some(Credentials::new("me", "s3cret"));
		assert!(!format!("{config:?}").contains("s3cret"));
		assert!(!serde_json::to_string(&config).unwrap().contains("s3cret"));
	}

	#[test]
	fn file_keeps_defaults_for_missing_keys() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("godel.json");
		std::fs::write(
			&path,
			r#"{ "layout": "research", "timeouts": { "windowMs": 5000 }, "loginStaggerMs": 0 }"#,
		)
		.unwrap();
		let config = TerminalConfig::load(&path).unwrap();
		assert_eq!(config.layout, "research");
		assert_eq!(config.timeouts.window_ms, 5000);
		assert_eq!(config.timeouts.loading_ms, 30_000);
		assert_eq!(config.login_stagger(), Duration::ZERO);
		assert_eq!(config.url, DEFAULT_URL);
	}
}
