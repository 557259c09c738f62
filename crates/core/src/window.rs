//! Terminal window lifecycle: which windows are new, when they finish
//! loading, and closing them.
//!
//! Windows are absolutely positioned `div`s whose id ends in `-window`.
//! A command's window is identified by diffing the ids present before the
//! command was sent against the ids present afterwards, ignoring windows
//! this monitor already handed out.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::dom::{PageLike, Scope};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::wait::{self, WaitOptions};

pub const WINDOW_SELECTOR: &str = "div.resize.inline-block.absolute[id$='-window']";
pub const SPINNER_SELECTOR: &str = ".anticon-loading.anticon-spin";
pub const CLOSE_SELECTORS: [&str; 2] = ["span.anticon.anticon-close", "svg[data-icon='close']"];

/// How long a freshly opened window gets to show its spinner before
/// [`WindowMonitor::wait_for_loading`] treats it as loaded.
pub const SPINNER_GRACE: Duration = Duration::from_millis(500);

/// Window ids present at one instant, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSnapshot {
	ids: Vec<String>,
}

impl WindowSnapshot {
	pub fn new(ids: Vec<String>) -> Self {
		Self { ids }
	}

	pub fn ids(&self) -> &[String] {
		&self.ids
	}

	pub fn len(&self) -> usize {
		self.ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}

	pub fn contains(&self, id: &str) -> bool {
		self.ids.iter().any(|i| i == id)
	}
}

/// Picks the newest window in `current` that is neither in `before` nor
/// already tracked. Later ids in document order count as newer.
pub fn newest_untracked<'a>(
	current: &'a [String],
	before: &WindowSnapshot,
	tracked: &HashSet<String>,
) -> Option<&'a String> {
	current
		.iter()
		.rev()
		.find(|id| !before.contains(id) && !tracked.contains(*id))
}

/// Tracks windows opened through one page.
pub struct WindowMonitor {
	tracked: Mutex<HashSet<String>>,
	poll: Duration,
}

impl Default for WindowMonitor {
	fn default() -> Self {
		Self::new(wait::DEFAULT_POLL_INTERVAL)
	}
}

impl WindowMonitor {
	pub fn new(poll: Duration) -> Self {
		Self {
			tracked: Mutex::new(HashSet::new()),
			poll,
		}
	}

	/// Ids of every window currently in the document.
	pub async fn current_windows(&self, page: &dyn PageLike) -> Result<Vec<String>> {
		let ids: Option<Vec<String>> = Scope::page(page)
			.eval_typed(
				"windows",
				&format!(
					"return __all(root, {}).map((el) => el.id).filter(Boolean);",
					serde_json::Value::String(WINDOW_SELECTOR.to_string())
				),
			)
			.await?;
		Ok(ids.unwrap_or_default())
	}

	/// Records the windows present before a command is sent.
	pub async fn snapshot(&self, page: &dyn PageLike) -> Result<WindowSnapshot> {
		Ok(WindowSnapshot::new(self.current_windows(page).await?))
	}

	/// Waits for a window that was not in `before` and is not yet tracked,
	/// then tracks and returns its id.
	pub async fn wait_for_new_window(
		&self,
		page: &dyn PageLike,
		before: &WindowSnapshot,
		command: &str,
		timeout: Duration,
	) -> Result<String> {
		let options = WaitOptions::new(timeout).with_interval(self.poll);
		let monitor = self;
		let found = wait::wait_for(&options, "new window", move || async move {
			let current = monitor.current_windows(page).await?;
			let tracked = monitor.tracked.lock();
			Ok(newest_untracked(&current, before, &tracked).cloned())
		})
		.await;

		match found {
			Ok(id) => {
				self.track(&id);
				debug!(target = "godel", window_id = %id, command, "new window detected");
				Ok(id)
			}
			Err(Error::Timeout { ms, .. }) => Err(Error::NoNewWindow {
				command: command.to_string(),
				ms,
			}),
			Err(e) => Err(e),
		}
	}

	/// Waits for `window_id` to finish loading.
	///
	/// The spinner may take a moment to appear, so for up to
	/// [`SPINNER_GRACE`] a missing spinner is not yet taken as "loaded".
	/// Once the spinner has been seen, or the grace period is over, waits
	/// until no visible spinner remains.
	pub async fn wait_for_loading(&self, page: &dyn PageLike, window_id: &str, timeout: Duration) -> Result<()> {
		let scope = Scope::window(page, window_id);
		let grace = SPINNER_GRACE.min(timeout);
		let start = Instant::now();

		let mut seen = false;
		while start.elapsed() < grace {
			if scope.is_visible(SPINNER_SELECTOR).await? {
				seen = true;
				break;
			}
			tokio::time::sleep(self.poll).await;
		}
		if !seen {
			debug!(target = "godel", window_id, "no spinner within grace period");
		}

		let remaining = timeout.saturating_sub(start.elapsed());
		let options = WaitOptions::new(remaining).with_interval(self.poll);
		wait::wait_for(&options, &format!("window {window_id} to finish loading"), move || async move {
			Ok((!scope.is_visible(SPINNER_SELECTOR).await?).then_some(()))
		})
		.await
	}

	/// Closes `window_id` through its close icon and stops tracking it.
	///
	/// Returns `false` when no close control was found.
	pub async fn close_window(&self, page: &dyn PageLike, window_id: &str) -> Result<bool> {
		let scope = Scope::window(page, window_id);
		for selector in CLOSE_SELECTORS {
			if !scope.exists(selector).await? {
				continue;
			}
			match scope.click_with(selector, &RetryPolicy::once()).await {
				Ok(()) => {
					self.untrack(window_id);
					debug!(target = "godel", window_id, selector, "window closed");
					return Ok(true);
				}
				Err(e) => debug!(target = "godel", window_id, selector, error = %e, "close control failed"),
			}
		}
		Ok(false)
	}

	pub fn track(&self, window_id: &str) {
		self.tracked.lock().insert(window_id.to_string());
	}

	pub fn untrack(&self, window_id: &str) {
		self.tracked.lock().remove(window_id);
	}

	pub fn is_tracked(&self, window_id: &str) -> bool {
		self.tracked.lock().contains(window_id)
	}

	/// Tracked ids, sorted.
	pub fn tracked(&self) -> Vec<String> {
		let mut ids: Vec<_> = self.tracked.lock().iter().cloned().collect();
		ids.sort();
		ids
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::testing::MockPage;

	fn ids(list: &[&str]) -> Vec<String> {
		list.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn newest_untracked_prefers_last() {
		let before = WindowSnapshot::new(ids(&["a-window"]));
		let tracked: HashSet<String> = ["b-window".to_string()].into();
		let current = ids(&["a-window", "b-window", "c-window", "d-window"]);
		assert_eq!(
			newest_untracked(&current, &before, &tracked).map(String::as_str),
			Some("d-window")
		);
	}

	#[test]
	fn nothing_new_when_all_known() {
		let before = WindowSnapshot::new(ids(&["a-window"]));
		let tracked: HashSet<String> = ["b-window".to_string()].into();
		let current = ids(&["a-window", "b-window"]);
		assert_eq!(newest_untracked(&current, &before, &tracked), None);
	}

	#[tokio::test]
	async fn detects_window_after_it_renders() {
		let page = MockPage::new();
		page.on_sequence(
			"windows",
			None,
			vec![
				json!(["old-window"]),
				json!(["old-window"]),
				json!(["old-window", "new-window"]),
			],
		);
		let monitor = WindowMonitor::new(Duration::from_millis(1));
		let before = monitor.snapshot(&page).await.unwrap();
		assert_eq!(before.ids(), ["old-window"]);

		let id = monitor
			.wait_for_new_window(&page, &before, "AAPL EQ DES", Duration::from_secs(1))
			.await
			.unwrap();
		assert_eq!(id, "new-window");
		assert!(monitor.is_tracked("new-window"));
	}

	#[tokio::test]
	async fn tracked_window_is_not_reported_twice() {
		let page = MockPage::new();
		page.on("windows", json!(["x-window"]));
		let monitor = WindowMonitor::new(Duration::from_millis(1));
		monitor.track("x-window");
		let err = monitor
			.wait_for_new_window(&page, &WindowSnapshot::default(), "MOST", Duration::from_millis(20))
			.await
			.unwrap_err();
		assert!(matches!(err, Error::NoNewWindow { command, .. } if command == "MOST"));
	}

	#[tokio::test]
	async fn loading_waits_for_spinner_to_clear() {
		let page = MockPage::new();
		page.on_sequence(
			"visible",
			Some("anticon-loading"),
			vec![json!(true), json!(true), json!(false)],
		);
		let monitor = WindowMonitor::new(Duration::from_millis(1));
		monitor
			.wait_for_loading(&page, "w-window", Duration::from_secs(1))
			.await
			.unwrap();
		assert_eq!(page.evaluations_of("visible"), 3);
	}

	#[tokio::test]
	async fn loading_times_out_on_stuck_spinner() {
		let page = MockPage::new();
		page.on("visible", json!(true));
		let monitor = WindowMonitor::new(Duration::from_millis(1));
		let err = monitor
			.wait_for_loading(&page, "w-window", Duration::from_millis(30))
			.await
			.unwrap_err();
		assert!(err.is_timeout());
	}

	#[tokio::test]
	async fn close_falls_back_to_svg_icon() {
		let page = MockPage::new();
		page.on_matching("count", "span.anticon.anticon-close", json!(0));
		page.on_matching("count", "svg[data-icon='close']", json!(1));
		page.on("click.dom", json!(true));
		let monitor = WindowMonitor::default();
		monitor.track("w-window");

		assert!(monitor.close_window(&page, "w-window").await.unwrap());
		assert!(!monitor.is_tracked("w-window"));
		let clicks: Vec<_> = page
			.evaluations()
			.into_iter()
			.filter(|s| s.contains("/*godel:click.dom*/"))
			.collect();
		assert_eq!(clicks.len(), 1);
		assert!(clicks[0].contains("svg[data-icon='close']"));
	}

	#[tokio::test]
	async fn close_without_controls_reports_false() {
		let page = MockPage::new();
		let monitor = WindowMonitor::default();
		assert!(!monitor.close_window(&page, "w-window").await.unwrap());
	}
}
