//! `QM`: quote monitor.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Extracted, TerminalCommand, WindowContext, now_timestamp, ticker_command};
use crate::error::Result;

/// Leaf rows rendered as exactly two text children: label then value.
const COLLECT_JS: &str = r#"
const input = __first(root, 'input[value]');
const pairs = [];
for (const el of root.querySelectorAll('div, tr, li')) {
  const kids = Array.from(el.children);
  if (kids.length !== 2 || kids.some((k) => k.children.length > 1)) continue;
  pairs.push(kids.map(__text));
}
return { ticker: input ? input.value : null, pairs };
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawQuote {
	ticker: Option<String>,
	pairs: Vec<Vec<String>>,
}

pub struct QuoteCommand {
	ticker: String,
	asset_class: String,
}

impl QuoteCommand {
	pub fn new(ticker: impl Into<String>, asset_class: impl Into<String>) -> Self {
		Self {
			ticker: ticker.into(),
			asset_class: asset_class.into(),
		}
	}
}

#[async_trait]
impl TerminalCommand for QuoteCommand {
	fn name(&self) -> &str {
		"QM"
	}

	fn command_string(&self) -> String {
		ticker_command(&self.ticker, &self.asset_class, "QM")
	}

	async fn extract(&self, ctx: &WindowContext<'_>) -> Result<Extracted> {
		let raw: RawQuote = ctx.scope().eval_typed("qm.collect", COLLECT_JS).await?;
		Ok(json!({
			"timestamp": now_timestamp(),
			"window_id": ctx.window_id,
			"ticker": raw.ticker.filter(|t| !t.is_empty()),
			"type": "quote_monitor",
			"fields": quote_fields(&raw.pairs),
		})
		.into())
	}
}

/// First occurrence of each label wins; labels must look like labels.
fn quote_fields(pairs: &[Vec<String>]) -> BTreeMap<String, String> {
	let mut fields = BTreeMap::new();
	for pair in pairs {
		let [label, value] = pair.as_slice() else {
			continue;
		};
		let (label, value) = (label.trim().trim_end_matches(':'), value.trim());
		if label.is_empty() || value.is_empty() || label.len() > 40 || label.contains('\n') {
			continue;
		}
		fields.entry(label.to_string()).or_insert_with(|| value.to_string());
	}
	fields
}
