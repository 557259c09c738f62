//! Selector syntax accepted by [`Scope`](super::Scope).
//!
//! - CSS by default: `div.resize[id$='-window']`
//! - XPath with an `xpath=` prefix, or any expression starting with `//`,
//!   `.//` or `(`
//! - Text with a `text=` prefix: the innermost elements whose text contains
//!   the needle, case-insensitively

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
	Css(String),
	XPath(String),
	Text(String),
}

impl Selector {
	pub fn parse(raw: &str) -> Self {
		let raw = raw.trim();
		if let Some(rest) = raw.strip_prefix("xpath=") {
			Self::XPath(rest.to_string())
		} else if let Some(rest) = raw.strip_prefix("text=") {
			Self::Text(rest.to_string())
		} else if raw.starts_with("//") || raw.starts_with(".//") || raw.starts_with('(') {
			Self::XPath(raw.to_string())
		} else {
			Self::Css(raw.to_string())
		}
	}

	pub fn css(s: impl Into<String>) -> Self {
		Self::Css(s.into())
	}

	pub fn xpath(s: impl Into<String>) -> Self {
		Self::XPath(s.into())
	}

	pub fn text(s: impl Into<String>) -> Self {
		Self::Text(s.into())
	}

	/// The selector as a JavaScript string literal understood by the prelude.
	pub(crate) fn to_js(&self) -> String {
		serde_json::Value::String(self.to_string()).to_string()
	}
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Css(s) => f.write_str(s),
			Self::XPath(s) => write!(f, "xpath={s}"),
			Self::Text(s) => write!(f, "text={s}"),
		}
	}
}

impl From<&str> for Selector {
	fn from(s: &str) -> Self {
		Self::parse(s)
	}
}

impl From<String> for Selector {
	fn from(s: String) -> Self {
		Self::parse(&s)
	}
}

impl From<&Selector> for Selector {
	fn from(s: &Selector) -> Self {
		s.clone()
	}
}
