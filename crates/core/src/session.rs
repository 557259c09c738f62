//! One logged-in terminal: a page inside its own browser context.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::browser::BrowserContext;
use crate::commands::{CommandOutput, Readiness, TerminalCommand, WindowContext};
use crate::config::{Credentials, TerminalConfig};
use crate::dom::{ElementState, PageLike, Scope};
use crate::error::{Error, Result};
use crate::page::Page;
use crate::window::WindowMonitor;
use godel_protocol::Key;

const LOGIN_BUTTON: &str = "//button[text()='Login']";
const USERNAME_INPUT: &str = "input[autocomplete='username']";
const PASSWORD_INPUT: &str = "input[autocomplete='current-password']";
const TERMINAL_INPUT: &str = "#terminal-input";
const CHAT_BUTTON: &str = "//button[contains(normalize-space(.),'CHAT')]";
const PUBLIC_CHANNELS: &str = "//*[text()='Public Channels']/..";

/// A terminal page plus the windows it has opened.
///
/// Generic over the page so the whole flow runs against
/// [`MockPage`](crate::testing::MockPage) in tests.
pub struct TerminalSession<P = Page> {
	id: String,
	page: P,
	context: Option<BrowserContext>,
	config: Arc<TerminalConfig>,
	monitor: WindowMonitor,
	downloads_dir: PathBuf,
}

impl<P> std::fmt::Debug for TerminalSession<P> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TerminalSession")
			.field("id", &self.id)
			.field("windows", &self.monitor.tracked())
			.finish_non_exhaustive()
	}
}

impl TerminalSession<Page> {
	/// Navigates to the configured terminal URL.
	pub async fn open(&self) -> Result<()> {
		let timeout = Duration::from_millis(self.config.timeouts.navigation_ms);
		self.page.goto(&self.config.url, timeout).await?;
		info!(target = "godel", session = %self.id, url = %self.config.url, "terminal opened");
		Ok(())
	}

	/// Closes the page and disposes of the session's browser context.
	pub async fn close(self) -> Result<()> {
		if let Err(e) = self.page.close().await {
			debug!(target = "godel", session = %self.id, error = %e, "page close failed");
		}
		if let Some(context) = &self.context {
			context.close().await?;
		}
		debug!(target = "godel", session = %self.id, "session closed");
		Ok(())
	}
}

impl<P: PageLike> TerminalSession<P> {
	pub fn new(id: impl Into<String>, page: P, config: Arc<TerminalConfig>) -> Self {
		let monitor = WindowMonitor::new(config.timeouts.poll());
		let downloads_dir = config.downloads_dir.clone();
		Self {
			id: id.into(),
			page,
			context: None,
			config,
			monitor,
			downloads_dir,
		}
	}

	pub fn with_context(mut self, context: BrowserContext) -> Self {
		self.context = Some(context);
		self
	}

	/// Directory the browser saves this session's downloads into.
	pub fn with_downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.downloads_dir = dir.into();
		self
	}

	pub fn downloads_dir(&self) -> &Path {
		&self.downloads_dir
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn page(&self) -> &P {
		&self.page
	}

	pub fn context(&self) -> Option<&BrowserContext> {
		self.context.as_ref()
	}

	pub fn config(&self) -> &TerminalConfig {
		&self.config
	}

	pub fn monitor(&self) -> &WindowMonitor {
		&self.monitor
	}

	fn document(&self) -> Scope<'_> {
		Scope::page(&self.page)
	}

	/// Logs in through the modal and waits for the terminal input.
	///
	/// Fails with [`Error::LoginFailed`] when the form never appears, stays
	/// open after submitting, or the terminal never renders.
	pub async fn login(&self, credentials: &Credentials) -> Result<()> {
		let t = &self.config.timeouts;
		let doc = self.document();
		let wait = t.wait(t.login_ms);
		let failed = |stage: &str, e: Error| -> Error {
			if e.is_timeout() {
				Error::LoginFailed(format!("{stage} after {}ms", t.login_ms))
			} else {
				e
			}
		};

		doc.wait_for(LOGIN_BUTTON, ElementState::Attached, &wait)
			.await
			.map_err(|e| failed("login button did not appear", e))?;
		doc.click(LOGIN_BUTTON).await?;
		doc.wait_for(USERNAME_INPUT, ElementState::Attached, &wait)
			.await
			.map_err(|e| failed("login form did not open", e))?;
		doc.fill(USERNAME_INPUT, &credentials.username).await?;
		doc.fill(PASSWORD_INPUT, &credentials.password).await?;
		doc.click(LOGIN_BUTTON).await?;
		debug!(target = "godel", session = %self.id, user = %credentials.username, "credentials submitted");

		doc.wait_for(LOGIN_BUTTON, ElementState::Hidden, &wait)
			.await
			.map_err(|e| failed("login modal still open", e))?;
		doc.wait_for(TERMINAL_INPUT, ElementState::Attached, &wait)
			.await
			.map_err(|e| failed("terminal input did not render", e))?;
		info!(target = "godel", session = %self.id, "logged in");
		Ok(())
	}

	/// Switches to the layout tab labelled `name`.
	pub async fn load_layout(&self, name: &str) -> Result<()> {
		let t = &self.config.timeouts;
		let tab = format!(
			"//span[@class='whitespace-nowrap' and text()={}]",
			xpath_literal(name)
		);
		let doc = self.document();
		match doc.wait_for(tab.as_str(), ElementState::Attached, &t.wait(t.window_ms)).await {
			Ok(()) => {}
			Err(e) if e.is_timeout() => return Err(Error::LayoutNotFound(name.to_string())),
			Err(e) => return Err(e),
		}
		doc.click(tab.as_str()).await?;
		info!(target = "godel", session = %self.id, layout = name, "layout loaded");
		Ok(())
	}

	/// Toggles the terminal prompt with the backtick key.
	pub async fn open_terminal(&self) -> Result<()> {
		let t = &self.config.timeouts;
		self.document()
			.eval("blur", "if (document.activeElement) document.activeElement.blur(); return true;")
			.await?;
		self.page.press(Key::Backquote).await?;
		self.document()
			.wait_for(TERMINAL_INPUT, ElementState::Attached, &t.wait(t.window_ms))
			.await
	}

	/// Replaces the terminal input's text with `text` and submits it.
	pub async fn send_command(&self, text: &str) -> Result<()> {
		self.document().fill(TERMINAL_INPUT, "").await?;
		self.page.insert_text(text).await?;
		self.page.press(Key::Enter).await?;
		debug!(target = "godel", session = %self.id, command = text, "command sent");
		Ok(())
	}

	/// Runs `command` through its window lifecycle: send, detect the new
	/// window, wait for it to render, prepare, extract.
	pub async fn execute(&self, command: &dyn TerminalCommand) -> Result<CommandOutput> {
		let t = &self.config.timeouts;
		let started = Instant::now();
		let name = command.name();
		let command_string = command.command_string();

		let before = self.monitor.snapshot(&self.page).await?;
		self.send_command(&command_string).await?;
		let window_id = self
			.monitor
			.wait_for_new_window(&self.page, &before, name, Duration::from_millis(t.window_ms))
			.await?;

		match command.readiness() {
			Readiness::Spinner => {
				self.monitor
					.wait_for_loading(&self.page, &window_id, Duration::from_millis(t.loading_ms))
					.await?
			}
			Readiness::Selector(selector) => {
				Scope::window(&self.page, &window_id)
					.wait_for(selector, ElementState::Attached, &t.wait(t.loading_ms))
					.await?
			}
			Readiness::Immediate => {}
		}

		let ctx = WindowContext {
			page: &self.page,
			window_id: &window_id,
			timeouts: t,
		};
		command.prepare(&ctx).await?;
		let extracted = command.extract(&ctx).await?;
		let elapsed_ms = started.elapsed().as_millis() as u64;
		info!(
			target = "godel",
			session = %self.id,
			command = name,
			window_id = %window_id,
			elapsed_ms,
			"command complete"
		);

		Ok(CommandOutput {
			command: command_string,
			window_id,
			data: extracted.data,
			artifacts: extracted.artifacts,
			elapsed_ms,
		})
	}

	pub async fn close_window(&self, window_id: &str) -> Result<bool> {
		self.monitor.close_window(&self.page, window_id).await
	}

	/// Closes every window this session opened. Returns how many closed.
	pub async fn close_all_windows(&self) -> Result<usize> {
		let mut closed = 0;
		for id in self.monitor.tracked() {
			if self.close_window(&id).await? {
				closed += 1;
			} else {
				warn!(target = "godel", session = %self.id, window_id = %id, "window has no close control");
				self.monitor.untrack(&id);
			}
		}
		Ok(closed)
	}

	/// Opens the chat panel and switches to `#channel`.
	pub async fn open_chat_channel(&self, channel: &str) -> Result<()> {
		let t = &self.config.timeouts;
		let channel = channel.trim_start_matches('#');
		let doc = self.document();

		for (label, selector) in [("chat panel", CHAT_BUTTON), ("public channels", PUBLIC_CHANNELS)] {
			if doc.exists(selector).await? {
				doc.click(selector).await?;
				debug!(target = "godel", session = %self.id, section = label, "opened");
			} else {
				debug!(target = "godel", session = %self.id, section = label, "not found, assuming open");
			}
		}

		let link = format!("text=#{channel}");
		doc.wait_for(link.as_str(), ElementState::Attached, &t.wait(t.window_ms))
			.await
			.map_err(|e| {
				if e.is_timeout() {
					Error::ElementNotFound { selector: link.clone() }
				} else {
					e
				}
			})?;
		doc.click(link.as_str()).await?;
		info!(target = "godel", session = %self.id, channel, "chat channel opened");
		Ok(())
	}
}

/// Quotes `text` as an XPath string literal. XPath 1.0 has no escapes, so
/// text holding both quote kinds is spliced together with `concat()`.
fn xpath_literal(text: &str) -> String {
	if !text.contains('\'') {
		return format!("'{text}'");
	}
	if !text.contains('"') {
		return format!("\"{text}\"");
	}
	let parts: Vec<String> = text.split('\'').map(|part| format!("'{part}'")).collect();
	format!("concat({})", parts.join(", \"'\", "))
}

#[cfg(test)]
mod tests;
