//! Retry policies and click fallback strategies for flaky UI interactions.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::dom::{Scope, Selector};
use crate::error::{Error, Result};

/// Longest pause [`RetryPolicy::delay_for`] will return.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// How many times to repeat an operation and how long to pause between tries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
	pub attempts: u32,
	pub delay: Duration,
	/// Multiplier applied to the delay after every failed attempt.
	pub backoff: f64,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			attempts: 3,
			delay: Duration::from_millis(250),
			backoff: 2.0,
		}
	}
}

impl RetryPolicy {
	pub fn new(attempts: u32, delay: Duration) -> Self {
		Self {
			attempts: attempts.max(1),
			delay,
			backoff: 1.0,
		}
	}

	pub fn with_backoff(mut self, backoff: f64) -> Self {
		self.backoff = backoff.max(1.0);
		self
	}

	/// A single attempt, no pause.
	pub fn once() -> Self {
		Self::new(1, Duration::ZERO)
	}

	/// Pause after the zero-based `attempt` failed, capped at
	/// [`MAX_RETRY_DELAY`]. A backoff that is not a finite number >= 1 is
	/// treated as 1.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let backoff = if self.backoff.is_finite() && self.backoff >= 1.0 {
			self.backoff
		} else {
			1.0
		};
		if self.delay.is_zero() {
			return Duration::ZERO;
		}
		let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
		let nanos = (self.delay.as_nanos() as f64 * backoff.powi(exponent)).round();
		if nanos < MAX_RETRY_DELAY.as_nanos() as f64 {
			Duration::from_nanos(nanos as u64)
		} else {
			MAX_RETRY_DELAY
		}
	}
}

/// Runs `f` until it succeeds or the policy is exhausted.
///
/// `f` receives the zero-based attempt number. Closed targets are never
/// retried.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, op: &str, mut f: F) -> Result<T>
where
	F: FnMut(u32) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let attempts = policy.attempts.max(1);
	let mut attempt = 0;
	loop {
		match f(attempt).await {
			Ok(value) => return Ok(value),
			Err(e) if e.is_target_closed() => return Err(e),
			Err(e) if attempt + 1 >= attempts => {
				debug!(target = "godel", op, attempts, error = %e, "giving up");
				return Err(e);
			}
			Err(e) => {
				let pause = policy.delay_for(attempt);
				debug!(target = "godel", op, attempt, error = %e, ?pause, "retrying");
				tokio::time::sleep(pause).await;
				attempt += 1;
			}
		}
	}
}

/// Ways to click an element, from most to least faithful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickStrategy {
	/// `element.click()` from script.
	Dom,
	/// Real mouse events at the element centre.
	Mouse,
	/// Bubbling `mousedown`/`mouseup`/`click` dispatched from script.
	Dispatch,
}

impl ClickStrategy {
	pub const ALL: [ClickStrategy; 3] = [Self::Dom, Self::Mouse, Self::Dispatch];
}

/// Clicks `selector`, trying each strategy in order on every attempt.
///
/// Fails with [`Error::ElementNotFound`] when no attempt found the element,
/// otherwise with the last strategy error.
pub async fn click_with_fallback(
	scope: &Scope<'_>,
	selector: &Selector,
	strategies: &[ClickStrategy],
	policy: &RetryPolicy,
) -> Result<()> {
	let scope = *scope;
	retry(policy, "click", move |attempt| async move {
		let mut last_error = None;
		for &strategy in strategies {
			match scope.click_once(selector, strategy).await {
				Ok(true) => {
					debug!(target = "godel", %selector, ?strategy, attempt, "clicked");
					return Ok(());
				}
				Ok(false) => {}
				Err(e) if e.is_target_closed() => return Err(e),
				Err(e) => {
					debug!(target = "godel", %selector, ?strategy, error = %e, "click strategy failed");
					last_error = Some(e);
				}
			}
		}
		Err(last_error.unwrap_or_else(|| Error::ElementNotFound {
			selector: selector.to_string(),
		}))
	})
	.await
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};

	use serde_json::json;

	use super::*;
	use crate::testing::{MockAction, MockPage};

	fn quick(attempts: u32) -> RetryPolicy {
		RetryPolicy::new(attempts, Duration::from_millis(1))
	}

	#[test]
	fn delay_grows_with_backoff() {
		let policy = RetryPolicy::new(4, Duration::from_millis(100)).with_backoff(2.0);
		assert_eq!(policy.delay_for(0), Duration::from_millis(100));
		assert_eq!(policy.delay_for(2), Duration::from_millis(400));
	}

	#[test]
	fn delay_is_capped_for_long_policies() {
		let policy = RetryPolicy {
			attempts: 80,
			..Default::default()
		};
		assert_eq!(policy.delay_for(70), MAX_RETRY_DELAY);
		assert_eq!(policy.delay_for(u32::MAX), MAX_RETRY_DELAY);
		assert_eq!(RetryPolicy::once().delay_for(u32::MAX), Duration::ZERO);
	}

	#[test]
	fn invalid_backoff_keeps_base_delay() {
		for backoff in [f64::NAN, -3.0, 0.5, f64::INFINITY] {
			let policy = RetryPolicy {
				attempts: 5,
				delay: Duration::from_millis(100),
				backoff,
			};
			assert_eq!(policy.delay_for(3), Duration::from_millis(100), "backoff {backoff}");
		}
	}

	#[tokio::test]
	async fn retry_stops_on_success() {
		let calls = AtomicU32::new(0);
		let calls = &calls;
		let value = retry(&quick(5), "flaky", move |attempt| async move {
			calls.fetch_add(1, Ordering::SeqCst);
			if attempt < 2 {
				Err(Error::JsEval("not yet".into()))
			} else {
				Ok(attempt)
			}
		})
		.await
		.unwrap();
		assert_eq!(value, 2);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn retry_returns_last_error() {
		let err = retry(&quick(2), "always", |attempt| async move {
			Err::<(), _>(Error::InvalidInput(format!("attempt {attempt}")))
		})
		.await
		.unwrap_err();
		assert_eq!(err.to_string(), "Invalid input: attempt 1");
	}

	#[tokio::test]
	async fn retry_never_repeats_closed_target() {
		let calls = AtomicU32::new(0);
		let calls = &calls;
		let _ = retry(&quick(5), "closed", move |_| async move {
			calls.fetch_add(1, Ordering::SeqCst);
			Err::<(), _>(Error::Runtime(godel_runtime::Error::ChannelClosed))
		})
		.await;
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn dom_click_succeeds_first() {
		let page = MockPage::new();
		page.on("click.dom", json!(true));
		let scope = Scope::page(&page);
		click_with_fallback(&scope, &Selector::css("#go"), &ClickStrategy::ALL, &quick(1))
			.await
			.unwrap();
		assert_eq!(page.evaluations_of("click.dom"), 1);
		assert_eq!(page.evaluations_of("box"), 0);
	}

	#[tokio::test]
	async fn falls_back_to_mouse_when_dom_click_throws() {
		let page = MockPage::new();
		page.fail("click.dom", "element is detached");
		page.on(
			"box",
			json!({ "x": 10.0, "y": 20.0, "width": 100.0, "height": 40.0 }),
		);
		let scope = Scope::page(&page);
		click_with_fallback(&scope, &Selector::css("#go"), &ClickStrategy::ALL, &quick(1))
			.await
			.unwrap();
		assert!(page.actions().contains(&MockAction::ClickAt(60.0, 40.0)));
		assert_eq!(page.evaluations_of("click.dispatch"), 0);
	}

	#[tokio::test]
	async fn missing_element_reports_selector() {
		let page = MockPage::new();
		page.on("click.dom", json!(false));
		page.on("box", json!(null));
		page.on("click.dispatch", json!(false));
		let scope = Scope::page(&page);
		let err = click_with_fallback(&scope, &Selector::css("#gone"), &ClickStrategy::ALL, &quick(2))
			.await
			.unwrap_err();
		assert!(matches!(err, Error::ElementNotFound { selector } if selector == "#gone"));
		assert_eq!(page.evaluations_of("click.dom"), 2);
	}
}
