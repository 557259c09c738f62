//! Deadline-bounded polling.
//!
//! Every wait in the crate reduces to [`wait_for`]: poll an async probe at a
//! fixed interval until it yields a value or the deadline passes.

use std::future::Future;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;

use crate::dom::{Scope, Selector};
use crate::error::{Error, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
	pub timeout: Duration,
	pub interval: Duration,
}

impl WaitOptions {
	pub fn new(timeout: Duration) -> Self {
		Self {
			timeout,
			interval: DEFAULT_POLL_INTERVAL,
		}
	}

	pub fn from_millis(timeout_ms: u64) -> Self {
		Self::new(Duration::from_millis(timeout_ms))
	}

	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}
}

impl Default for WaitOptions {
	fn default() -> Self {
		Self::from_millis(godel_protocol::DEFAULT_TIMEOUT_MS)
	}
}

/// Polls `probe` until it returns `Some`, failing with [`Error::Timeout`]
/// naming `condition` once `options.timeout` has elapsed.
///
/// The probe always runs at least once. Probe errors end the wait.
pub async fn wait_for<T, F, Fut>(options: &WaitOptions, condition: &str, mut probe: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<Option<T>>>,
{
	let start = Instant::now();
	loop {
		if let Some(value) = probe().await? {
			return Ok(value);
		}
		let elapsed = start.elapsed();
		if elapsed >= options.timeout {
			tracing::debug!(target = "godel", condition, ms = elapsed.as_millis() as u64, "wait timed out");
			return Err(Error::Timeout {
				condition: condition.to_string(),
				ms: elapsed.as_millis() as u64,
			});
		}
		let remaining = options.timeout - elapsed;
		tokio::time::sleep(options.interval.min(remaining)).await;
	}
}

/// Waits until `row_selector` matches at least `min_rows` elements and the
/// count has held steady across two consecutive polls. Returns the count.
pub async fn wait_for_rows(
	scope: &Scope<'_>,
	row_selector: impl Into<Selector>,
	min_rows: usize,
	options: &WaitOptions,
) -> Result<usize> {
	let sel = row_selector.into();
	let condition = format!("at least {min_rows} rows matching {sel}");
	let last = Mutex::new(None::<usize>);
	let last = &last;
	let scope = *scope;
	wait_for(options, &condition, move || {
		let sel = sel.clone();
		async move {
			let count = scope.count(sel).await?;
			let previous = last.lock().replace(count);
			Ok((count >= min_rows && previous == Some(count)).then_some(count))
		}
	})
	.await
}

/// `"done / total"` progress as rendered by batch windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
	pub completed: u64,
	pub total: u64,
}

impl Progress {
	pub fn is_complete(&self) -> bool {
		self.total > 0 && self.completed >= self.total
	}
}

static PROGRESS_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").expect("valid progress regex"));

/// Parses the first `N / M` pair in `text`.
pub fn parse_progress(text: &str) -> Option<Progress> {
	let caps = PROGRESS_RE.captures(text)?;
	Some(Progress {
		completed: caps[1].parse().ok()?,
		total: caps[2].parse().ok()?,
	})
}

/// True when an inline style sets `width: 100%`.
pub fn style_width_full(style: &str) -> bool {
	style
		.split(';')
		.filter_map(|decl| decl.split_once(':'))
		.any(|(prop, value)| prop.trim() == "width" && value.trim() == "100%")
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	fn fast(timeout_ms: u64) -> WaitOptions {
		WaitOptions::from_millis(timeout_ms).with_interval(Duration::from_millis(5))
	}

	#[tokio::test]
	async fn returns_first_value() {
		let calls = AtomicU32::new(0);
		let calls = &calls;
		let value = wait_for(&fast(1000), "third poll", move || async move {
			let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
			Ok((n == 3).then_some(n))
		})
		.await
		.unwrap();
		assert_eq!(value, 3);
	}

	#[tokio::test]
	async fn times_out_with_condition() {
		let err = wait_for(&fast(30), "never", || async { Ok(None::<()>) })
			.await
			.unwrap_err();
		match err {
			Error::Timeout { condition, ms } => {
				assert_eq!(condition, "never");
				assert!(ms >= 30);
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn probe_runs_once_with_zero_timeout() {
		let value = wait_for(&fast(0), "immediate", || async { Ok(Some(7)) })
			.await
			.unwrap();
		assert_eq!(value, 7);
	}

	#[tokio::test]
	async fn probe_error_stops_wait() {
		let err = wait_for(&fast(1000), "boom", || async {
			Err::<Option<()>, _>(Error::JsEval("boom".into()))
		})
		.await
		.unwrap_err();
		assert!(matches!(err, Error::JsEval(_)));
	}

	#[test]
	fn progress_parsing() {
		assert_eq!(
			parse_progress("20 / 20"),
			Some(Progress {
				completed: 20,
				total: 20
			})
		);
		assert!(parse_progress("20 / 20").unwrap().is_complete());
		assert!(!parse_progress("3/20").unwrap().is_complete());
		assert!(!parse_progress("0 / 0").unwrap().is_complete());
		assert_eq!(parse_progress("no progress"), None);
	}

	#[test]
	fn width_detection() {
		assert!(style_width_full("width: 100%;"));
		assert!(style_width_full("height: 4px; width:100%"));
		assert!(!style_width_full("width: 55%;"));
		assert!(!style_width_full("max-width: 100%"));
	}
}
