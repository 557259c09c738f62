//! Scoped DOM queries over a [`PageLike`] page.
//!
//! A [`Scope`] binds queries either to the whole document or to a single
//! terminal window element, so command scrapers never match elements that
//! belong to another window.

pub mod js;
mod selector;

use async_trait::async_trait;
use godel_protocol::Key;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use self::selector::Selector;
use crate::error::{Error, Result};
use crate::page::Page;
use crate::retry::{self, ClickStrategy, RetryPolicy};
use crate::wait::{self, WaitOptions};

/// Page operations the automation layer depends on.
///
/// Implemented by [`Page`] and by [`MockPage`](crate::testing::MockPage).
#[async_trait]
pub trait PageLike: Send + Sync {
	/// Evaluates an expression and returns its JSON value.
	async fn evaluate(&self, expression: &str) -> Result<Value>;

	/// Types text into the focused element.
	async fn insert_text(&self, text: &str) -> Result<()>;

	async fn press(&self, key: Key) -> Result<()>;

	/// Left click at viewport coordinates.
	async fn click_at(&self, x: f64, y: f64) -> Result<()>;
}

#[async_trait]
impl PageLike for Page {
	async fn evaluate(&self, expression: &str) -> Result<Value> {
		Page::evaluate(self, expression).await
	}

	async fn insert_text(&self, text: &str) -> Result<()> {
		Page::insert_text(self, text).await
	}

	async fn press(&self, key: Key) -> Result<()> {
		Page::press(self, key).await
	}

	async fn click_at(&self, x: f64, y: f64) -> Result<()> {
		Page::click_at(self, x, y).await
	}
}

/// Element rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

impl BoundingBox {
	pub fn center(&self) -> (f64, f64) {
		(self.x + self.width / 2.0, self.y + self.height / 2.0)
	}
}

/// What [`Scope::wait_for`] waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
	/// At least one element matches.
	Attached,
	/// No element matches.
	Detached,
	/// At least one matching element is rendered and visible.
	Visible,
	/// No matching element is visible.
	Hidden,
}

impl ElementState {
	fn as_str(&self) -> &'static str {
		match self {
			Self::Attached => "attached",
			Self::Detached => "detached",
			Self::Visible => "visible",
			Self::Hidden => "hidden",
		}
	}
}

/// Query root: the document or one element by id.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
	page: &'a dyn PageLike,
	root: Option<&'a str>,
}

impl<'a> Scope<'a> {
	/// Whole-document scope.
	pub fn page(page: &'a dyn PageLike) -> Self {
		Self { page, root: None }
	}

	/// Scope rooted at the element with id `window_id`.
	pub fn window(page: &'a dyn PageLike, window_id: &'a str) -> Self {
		Self {
			page,
			root: Some(window_id),
		}
	}

	pub fn page_like(&self) -> &'a dyn PageLike {
		self.page
	}

	pub fn root(&self) -> Option<&'a str> {
		self.root
	}

	/// Runs `body` with `root` and the query helpers in scope.
	pub async fn eval(&self, marker: &str, body: &str) -> Result<Value> {
		self.page.evaluate(&js::scoped(marker, self.root, body)).await
	}

	pub async fn eval_typed<T: DeserializeOwned>(&self, marker: &str, body: &str) -> Result<T> {
		let value = self.eval(marker, body).await?;
		serde_json::from_value(value).map_err(|e| Error::JsEval(format!("{marker}: unexpected result: {e}")))
	}

	pub async fn count(&self, selector: impl Into<Selector>) -> Result<usize> {
		let sel = selector.into();
		let count: Option<usize> = self
			.eval_typed("count", &format!("return __all(root, {}).length;", sel.to_js()))
			.await?;
		Ok(count.unwrap_or(0))
	}

	pub async fn exists(&self, selector: impl Into<Selector>) -> Result<bool> {
		Ok(self.count(selector).await? > 0)
	}

	/// True when any matching element is visible.
	pub async fn is_visible(&self, selector: impl Into<Selector>) -> Result<bool> {
		let sel = selector.into();
		let visible: Option<bool> = self
			.eval_typed(
				"visible",
				&format!("return __all(root, {}).some(__visible);", sel.to_js()),
			)
			.await?;
		Ok(visible.unwrap_or(false))
	}

	/// Trimmed text of the first match.
	pub async fn text(&self, selector: impl Into<Selector>) -> Result<Option<String>> {
		let sel = selector.into();
		self.eval_typed("text", &format!("return __text(__first(root, {}));", sel.to_js()))
			.await
	}

	/// Trimmed text of every match.
	pub async fn texts(&self, selector: impl Into<Selector>) -> Result<Vec<String>> {
		let sel = selector.into();
		let texts: Option<Vec<String>> = self
			.eval_typed(
				"texts",
				&format!("return __all(root, {}).map(__text);", sel.to_js()),
			)
			.await?;
		Ok(texts.unwrap_or_default())
	}

	pub async fn attribute(&self, selector: impl Into<Selector>, name: &str) -> Result<Option<String>> {
		let sel = selector.into();
		self.eval_typed(
			"attr",
			&format!(
				"const el = __first(root, {}); return el ? el.getAttribute({}) : null;",
				sel.to_js(),
				serde_json::Value::String(name.to_string())
			),
		)
		.await
	}

	/// Rectangle of the first visible match, scrolled into view.
	pub async fn bounding_box(&self, selector: impl Into<Selector>) -> Result<Option<BoundingBox>> {
		let sel = selector.into();
		self.eval_typed(
			"box",
			&format!(
				r#"const el = __all(root, {}).find(__visible);
if (!el) return null;
el.scrollIntoView({{ block: 'center', inline: 'center' }});
const r = el.getBoundingClientRect();
return {{ x: r.x, y: r.y, width: r.width, height: r.height }};"#,
				sel.to_js()
			),
		)
		.await
	}

	/// Clicks the first match, walking the default fallback strategies.
	pub async fn click(&self, selector: impl Into<Selector>) -> Result<()> {
		self.click_with(selector, &RetryPolicy::default()).await
	}

	pub async fn click_with(&self, selector: impl Into<Selector>, policy: &RetryPolicy) -> Result<()> {
		retry::click_with_fallback(self, &selector.into(), &ClickStrategy::ALL, policy).await
	}

	/// One click attempt; `Ok(false)` when nothing matched.
	pub async fn click_once(&self, selector: &Selector, strategy: ClickStrategy) -> Result<bool> {
		match strategy {
			ClickStrategy::Dom => {
				let clicked: Option<bool> = self
					.eval_typed(
						"click.dom",
						&format!(
							r#"const el = __first(root, {});
if (!el) return false;
el.scrollIntoView({{ block: 'center' }});
el.click();
return true;"#,
							selector.to_js()
						),
					)
					.await?;
				Ok(clicked.unwrap_or(false))
			}
			ClickStrategy::Mouse => match self.bounding_box(selector.clone()).await? {
				Some(bbox) => {
					let (x, y) = bbox.center();
					self.page.click_at(x, y).await?;
					Ok(true)
				}
				None => Ok(false),
			},
			ClickStrategy::Dispatch => {
				let clicked: Option<bool> = self
					.eval_typed(
						"click.dispatch",
						&format!(
							r#"const el = __first(root, {});
if (!el) return false;
for (const type of ['mousedown', 'mouseup', 'click']) {{
  el.dispatchEvent(new MouseEvent(type, {{ bubbles: true, cancelable: true, view: window }}));
}}
return true;"#,
							selector.to_js()
						),
					)
					.await?;
				Ok(clicked.unwrap_or(false))
			}
		}
	}

	/// Sets an input or textarea value the way a framework-controlled field
	/// expects: native setter, then `input` and `change` events.
	pub async fn fill(&self, selector: impl Into<Selector>, value: &str) -> Result<()> {
		let sel = selector.into();
		let filled: Option<bool> = self
			.eval_typed(
				"fill",
				&format!(
					r#"const el = __first(root, {});
if (!el) return false;
const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
el.focus();
Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, {});
el.dispatchEvent(new Event('input', {{ bubbles: true }}));
el.dispatchEvent(new Event('change', {{ bubbles: true }}));
return true;"#,
					sel.to_js(),
					serde_json::Value::String(value.to_string())
				),
			)
			.await?;
		if filled.unwrap_or(false) {
			Ok(())
		} else {
			Err(Error::ElementNotFound {
				selector: sel.to_string(),
			})
		}
	}

	/// Selects `value` in the first matching `<select>`.
	pub async fn select_option(&self, selector: impl Into<Selector>, value: &str) -> Result<()> {
		let sel = selector.into();
		let selected: Option<bool> = self
			.eval_typed(
				"select",
				&format!(
					r#"const el = __first(root, {});
if (!el) return false;
Object.getOwnPropertyDescriptor(HTMLSelectElement.prototype, 'value').set.call(el, {});
el.dispatchEvent(new Event('change', {{ bubbles: true }}));
return true;"#,
					sel.to_js(),
					serde_json::Value::String(value.to_string())
				),
			)
			.await?;
		if selected.unwrap_or(false) {
			Ok(())
		} else {
			Err(Error::ElementNotFound {
				selector: sel.to_string(),
			})
		}
	}

	/// Polls until `selector` reaches `state`.
	pub async fn wait_for(
		&self,
		selector: impl Into<Selector>,
		state: ElementState,
		options: &WaitOptions,
	) -> Result<()> {
		let sel = selector.into();
		let condition = format!("{sel} to be {}", state.as_str());
		let scope = *self;
		wait::wait_for(options, &condition, move || {
			let sel = sel.clone();
			async move {
				let reached = match state {
					ElementState::Attached => scope.exists(sel).await?,
					ElementState::Detached => !scope.exists(sel).await?,
					ElementState::Visible => scope.is_visible(sel).await?,
					ElementState::Hidden => !scope.is_visible(sel).await?,
				};
				Ok(reached.then_some(()))
			}
		})
		.await
	}
}
