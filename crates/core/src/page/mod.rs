//! [`Page`]: a browser tab attached through a flattened CDP session.

mod eval;
mod input;

use std::sync::Arc;
use std::time::Duration;

use godel_protocol::{AttachToTargetParams, AttachToTargetResult, CreateTargetParams, CreateTargetResult};
use godel_runtime::{Connection, EventFilter, Subscription};
use serde_json::{Value, json};

use crate::error::{Error, Result};

struct PageInner {
	connection: Arc<Connection>,
	target_id: String,
	session_id: String,
	context_id: Option<String>,
}

/// A browser tab.
///
/// Cheap to clone; all clones drive the same CDP session.
#[derive(Clone)]
pub struct Page {
	inner: Arc<PageInner>,
}

impl std::fmt::Debug for Page {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Page")
			.field("target_id", &self.inner.target_id)
			.field("session_id", &self.inner.session_id)
			.finish()
	}
}

impl Page {
	/// Opens a blank tab in `context_id` and attaches a flattened session to it.
	pub(crate) async fn create(connection: Arc<Connection>, context_id: Option<String>) -> Result<Self> {
		let params = CreateTargetParams {
			url: "about:blank".into(),
			browser_context_id: context_id.clone(),
			width: None,
			height: None,
		};
		let created: CreateTargetResult = serde_json::from_value(
			connection
				.send("Target.createTarget", serde_json::to_value(&params)?, None)
				.await?,
		)?;

		let attach = AttachToTargetParams {
			target_id: created.target_id.clone(),
			flatten: true,
		};
		let attached: AttachToTargetResult = serde_json::from_value(
			connection
				.send("Target.attachToTarget", serde_json::to_value(&attach)?, None)
				.await?,
		)?;

		let page = Self {
			inner: Arc::new(PageInner {
				connection,
				target_id: created.target_id,
				session_id: attached.session_id,
				context_id,
			}),
		};
		page.send("Page.enable", Value::Null).await?;
		page.send("Runtime.enable", Value::Null).await?;
		tracing::debug!(target = "godel", target_id = %page.target_id(), "page attached");
		Ok(page)
	}

	pub fn target_id(&self) -> &str {
		&self.inner.target_id
	}

	pub fn session_id(&self) -> &str {
		&self.inner.session_id
	}

	pub fn context_id(&self) -> Option<&str> {
		self.inner.context_id.as_deref()
	}

	/// Sends a CDP command on this page's session.
	pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
		Ok(self
			.inner
			.connection
			.send(method, params, Some(&self.inner.session_id))
			.await?)
	}

	/// Subscribes to this page's events whose method starts with `prefix`.
	pub fn subscribe(&self, prefix: &str) -> Subscription {
		self.inner
			.connection
			.subscribe(EventFilter::session(self.inner.session_id.clone()).method_prefix(prefix))
	}

	/// Navigates and waits for the `load` event.
	pub async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
		let mut load = self.subscribe("Page.loadEventFired");
		let result = self.send("Page.navigate", json!({ "url": url })).await?;
		if let Some(reason) = result.get("errorText").and_then(Value::as_str) {
			return Err(Error::Navigation {
				url: url.to_string(),
				reason: reason.to_string(),
			});
		}

		match tokio::time::timeout(timeout, load.recv()).await {
			Ok(Some(_)) => {
				tracing::debug!(target = "godel", url, "navigation complete");
				Ok(())
			}
			Ok(None) => Err(Error::Navigation {
				url: url.to_string(),
				reason: "connection closed before load".into(),
			}),
			Err(_) => Err(Error::Timeout {
				condition: format!("load event for {url}"),
				ms: timeout.as_millis() as u64,
			}),
		}
	}

	/// Current document URL.
	pub async fn url(&self) -> Result<String> {
		self.evaluate_typed("location.href").await
	}

	/// Closes the tab.
	pub async fn close(&self) -> Result<()> {
		self.inner
			.connection
			.send(
				"Target.closeTarget",
				json!({ "targetId": self.inner.target_id }),
				None,
			)
			.await?;
		Ok(())
	}
}
