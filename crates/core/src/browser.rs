//! [`Browser`] and [`BrowserContext`]: one Chromium process, many isolated contexts.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use godel_protocol::{
	CreateBrowserContextParams, CreateBrowserContextResult, DownloadBehavior, LaunchOptions,
	SetDownloadBehaviorParams,
};
use godel_runtime::{BrowserProcess, Connection, WebSocketTransport, discover_ws_endpoint};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::page::Page;

/// A connected browser.
///
/// Owns the browser process when it was launched by [`Browser::launch`];
/// a browser attached with [`Browser::connect`] is left running on close.
pub struct Browser {
	connection: Arc<Connection>,
	process: Option<BrowserProcess>,
	dispatch: JoinHandle<()>,
}

impl Browser {
	/// Launches a new Chromium process and connects to it.
	pub async fn launch(options: &LaunchOptions) -> Result<Self> {
		let process = BrowserProcess::launch(options).await?;
		let mut browser = Self::attach(process.ws_endpoint(), options.timeout_ms()).await?;
		info!(target = "godel", pid = ?process.pid(), "browser launched");
		browser.process = Some(process);
		Ok(browser)
	}

	/// Connects to an already running browser (`ws://` or `http://host:port`).
	pub async fn connect(endpoint: &str) -> Result<Self> {
		let ws = discover_ws_endpoint(endpoint).await?;
		let browser = Self::attach(&ws, godel_protocol::DEFAULT_TIMEOUT_MS).await?;
		info!(target = "godel", endpoint = %ws, "connected to running browser");
		Ok(browser)
	}

	async fn attach(ws_endpoint: &str, timeout_ms: u64) -> Result<Self> {
		let parts = WebSocketTransport::connect(ws_endpoint).await?;
		let connection =
			Arc::new(Connection::new(parts).with_default_timeout(Duration::from_millis(timeout_ms)));
		let runner = Arc::clone(&connection);
		let dispatch = tokio::spawn(async move {
			if let Err(e) = runner.run().await {
				warn!(target = "godel", error = %e, "connection loop ended with error");
			}
		});
		Ok(Self {
			connection,
			process: None,
			dispatch,
		})
	}

	pub fn connection(&self) -> &Arc<Connection> {
		&self.connection
	}

	pub fn is_connected(&self) -> bool {
		!self.connection.is_closed()
	}

	/// Browser product string, e.g. `Chrome/126.0.6478.126`.
	pub async fn version(&self) -> Result<String> {
		let result = self.connection.send("Browser.getVersion", Value::Null, None).await?;
		Ok(result
			.get("product")
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_string())
	}

	/// Creates an isolated context with its own cookies and storage.
	pub async fn new_context(&self) -> Result<BrowserContext> {
		let params = CreateBrowserContextParams {
			dispose_on_detach: Some(true),
		};
		let created: CreateBrowserContextResult = serde_json::from_value(
			self.connection
				.send("Target.createBrowserContext", serde_json::to_value(params)?, None)
				.await?,
		)?;
		debug!(target = "godel", context_id = %created.browser_context_id, "context created");
		Ok(BrowserContext {
			id: created.browser_context_id,
			connection: Arc::clone(&self.connection),
		})
	}

	/// Closes the browser (or disconnects from a browser it did not launch).
	pub async fn close(mut self) -> Result<()> {
		if let Some(mut process) = self.process.take() {
			if let Err(e) = self.connection.send("Browser.close", Value::Null, None).await {
				debug!(target = "godel", error = %e, "Browser.close failed; killing process");
			}
			process.kill().await?;
		}
		self.dispatch.abort();
		Ok(())
	}
}

/// An isolated browser context (incognito-like profile).
#[derive(Clone)]
pub struct BrowserContext {
	id: String,
	connection: Arc<Connection>,
}

impl BrowserContext {
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Opens a new tab in this context.
	pub async fn new_page(&self) -> Result<Page> {
		Page::create(Arc::clone(&self.connection), Some(self.id.clone())).await
	}

	/// Routes downloads started in this context into `dir`.
	pub async fn set_download_dir(&self, dir: &Path) -> Result<()> {
		std::fs::create_dir_all(dir)?;
		let params = SetDownloadBehaviorParams {
			behavior: DownloadBehavior::Allow,
			browser_context_id: Some(self.id.clone()),
			download_path: Some(dir.to_string_lossy().into_owned()),
			events_enabled: Some(true),
		};
		self.connection
			.send("Browser.setDownloadBehavior", serde_json::to_value(params)?, None)
			.await?;
		Ok(())
	}

	/// Disposes the context and every page in it.
	pub async fn close(&self) -> Result<()> {
		self.connection
			.send(
				"Target.disposeBrowserContext",
				json!({ "browserContextId": self.id }),
				None,
			)
			.await?;
		Ok(())
	}
}
