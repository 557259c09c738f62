//! Test doubles for code written against [`PageLike`].
//!
//! [`MockPage`] answers scripts by their `/*godel:<marker>*/` tag instead of
//! running them, and records every interaction so tests can assert on what
//! the automation did.
//!
//! ```ignore
//! let page = MockPage::new();
//! page.on("count", json!(2));
//! page.on_matching("text", "h1", json!("Apple Inc."));
//!
//! let scope = Scope::page(&page);
//! assert_eq!(scope.count("div").await?, 2);
//! ```

use std::collections::VecDeque;

use async_trait::async_trait;
use godel_protocol::Key;
use parking_lot::Mutex;
use serde_json::Value;

use crate::dom::PageLike;
use crate::dom::js::{marker_tag, script_body};
use crate::error::{Error, Result};

/// One recorded interaction with a [`MockPage`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockAction {
	Evaluate(String),
	InsertText(String),
	Press(Key),
	ClickAt(f64, f64),
}

type Reply = std::result::Result<Value, String>;

struct Rule {
	tag: String,
	contains: Option<String>,
	replies: VecDeque<Reply>,
}

impl Rule {
	/// `contains` is checked against the script body, never the helpers.
	fn matches(&self, script: &str) -> bool {
		script.contains(&self.tag)
			&& self
				.contains
				.as_ref()
				.is_none_or(|needle| script_body(script).contains(needle.as_str()))
	}

	/// Next reply; the last one repeats forever.
	fn next(&mut self) -> Reply {
		if self.replies.len() > 1 {
			self.replies.pop_front().unwrap_or(Ok(Value::Null))
		} else {
			self.replies.front().cloned().unwrap_or(Ok(Value::Null))
		}
	}
}

/// Scriptable [`PageLike`] implementation.
///
/// Rules registered later take precedence. Unmatched scripts evaluate to
/// `null`.
#[derive(Default)]
pub struct MockPage {
	rules: Mutex<Vec<Rule>>,
	actions: Mutex<Vec<MockAction>>,
}

impl MockPage {
	pub fn new() -> Self {
		Self::default()
	}

	fn push(&self, marker: &str, contains: Option<&str>, replies: Vec<Reply>) -> &Self {
		self.rules.lock().push(Rule {
			tag: marker_tag(marker),
			contains: contains.map(str::to_string),
			replies: replies.into(),
		});
		self
	}

	/// Answers every script tagged `marker` with `value`.
	pub fn on(&self, marker: &str, value: Value) -> &Self {
		self.push(marker, None, vec![Ok(value)])
	}

	/// Answers scripts tagged `marker` that also contain `contains`.
	pub fn on_matching(&self, marker: &str, contains: &str, value: Value) -> &Self {
		self.push(marker, Some(contains), vec![Ok(value)])
	}

	/// Answers successive matching scripts with `values` in order, then
	/// repeats the last one.
	pub fn on_sequence(&self, marker: &str, contains: Option<&str>, values: Vec<Value>) -> &Self {
		self.push(marker, contains, values.into_iter().map(Ok).collect())
	}

	/// Makes scripts tagged `marker` throw `message`.
	pub fn fail(&self, marker: &str, message: &str) -> &Self {
		self.push(marker, None, vec![Err(message.to_string())])
	}

	pub fn actions(&self) -> Vec<MockAction> {
		self.actions.lock().clone()
	}

	/// Every script evaluated so far.
	pub fn evaluations(&self) -> Vec<String> {
		self.actions
			.lock()
			.iter()
			.filter_map(|a| match a {
				MockAction::Evaluate(s) => Some(s.clone()),
				_ => None,
			})
			.collect()
	}

	/// Number of evaluated scripts tagged `marker`.
	pub fn evaluations_of(&self, marker: &str) -> usize {
		let tag = marker_tag(marker);
		self.evaluations().iter().filter(|s| s.contains(&tag)).count()
	}

	/// Text typed through [`PageLike::insert_text`], concatenated.
	pub fn typed_text(&self) -> String {
		self.actions
			.lock()
			.iter()
			.filter_map(|a| match a {
				MockAction::InsertText(s) => Some(s.as_str()),
				_ => None,
			})
			.collect()
	}

	pub fn pressed(&self) -> Vec<Key> {
		self.actions
			.lock()
			.iter()
			.filter_map(|a| match a {
				MockAction::Press(k) => Some(*k),
				_ => None,
			})
			.collect()
	}

	fn record(&self, action: MockAction) {
		self.actions.lock().push(action);
	}
}

#[async_trait]
impl PageLike for MockPage {
	async fn evaluate(&self, expression: &str) -> Result<Value> {
		self.record(MockAction::Evaluate(expression.to_string()));
		let reply = self
			.rules
			.lock()
			.iter_mut()
			.rev()
			.find(|rule| rule.matches(expression))
			.map(Rule::next);
		match reply {
			Some(Ok(value)) => Ok(value),
			Some(Err(message)) => Err(Error::JsEval(message)),
			None => Ok(Value::Null),
		}
	}

	async fn insert_text(&self, text: &str) -> Result<()> {
		self.record(MockAction::InsertText(text.to_string()));
		Ok(())
	}

	async fn press(&self, key: Key) -> Result<()> {
		self.record(MockAction::Press(key));
		Ok(())
	}

	async fn click_at(&self, x: f64, y: f64) -> Result<()> {
		self.record(MockAction::ClickAt(x, y));
		Ok(())
	}
}
