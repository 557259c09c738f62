//! Text-heavy windows (`N`, `EM`, `FA`, `TRAN`) scraped from their
//! rendered text: a preview plus the lines that matter for each kind.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};

use super::{Extracted, TerminalCommand, WindowContext, now_timestamp, ticker_command};
use crate::error::Result;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b20\d{2}\b").expect("valid year regex"));

const MAX_HEADLINES: usize = 20;
const MAX_QUARTERS: usize = 10;
const METRIC_WORDS: [&str; 5] = ["Revenue", "Income", "EPS", "Margin", "Cash"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
	News,
	Earnings,
	Financials,
	Transcripts,
}

impl TextKind {
	pub fn mnemonic(&self) -> &'static str {
		match self {
			Self::News => "N",
			Self::Earnings => "EM",
			Self::Financials => "FA",
			Self::Transcripts => "TRAN",
		}
	}

	fn data_type(&self) -> &'static str {
		match self {
			Self::News => "news",
			Self::Earnings => "earnings_matrix",
			Self::Financials => "financials",
			Self::Transcripts => "transcripts",
		}
	}

	fn preview_chars(&self) -> usize {
		match self {
			Self::Financials => 2000,
			Self::Transcripts => 5000,
			Self::News | Self::Earnings => 3000,
		}
	}

	/// Key and value of the kind-specific section of the output.
	fn analyze(&self, content: &str) -> (&'static str, Value) {
		let lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
		match self {
			Self::News => ("headlines", json!(news_headlines(lines))),
			Self::Earnings => ("eps_lines", json!(eps_lines(lines))),
			Self::Financials => ("metrics", json!(financial_metrics(lines))),
			Self::Transcripts => ("available_quarters", json!(transcript_quarters(lines))),
		}
	}
}

pub struct TextCommand {
	ticker: Option<String>,
	asset_class: String,
	kind: TextKind,
}

impl TextCommand {
	/// `ticker` may be omitted only for `N`, which then shows general news.
	pub fn new(ticker: Option<String>, asset_class: impl Into<String>, kind: TextKind) -> Self {
		Self {
			ticker: ticker.filter(|t| !t.trim().is_empty()),
			asset_class: asset_class.into(),
			kind,
		}
	}
}

#[async_trait]
impl TerminalCommand for TextCommand {
	fn name(&self) -> &str {
		self.kind.mnemonic()
	}

	fn command_string(&self) -> String {
		match &self.ticker {
			Some(ticker) => ticker_command(ticker, &self.asset_class, self.kind.mnemonic()),
			None => self.kind.mnemonic().to_string(),
		}
	}

	async fn extract(&self, ctx: &WindowContext<'_>) -> Result<Extracted> {
		let content: Option<String> = ctx.scope().eval_typed("text.content", "return __text(root);").await?;
		let content = content.unwrap_or_default();
		let (key, section) = self.kind.analyze(&content);
		let mut data = json!({
			"timestamp": now_timestamp(),
			"window_id": ctx.window_id,
			"ticker": self.ticker,
			"asset_class": self.asset_class,
			"type": self.kind.data_type(),
			"content_preview": preview(&content, self.kind.preview_chars()),
		});
		data[key] = section;
		Ok(data.into())
	}
}

fn preview(content: &str, chars: usize) -> String {
	content.chars().take(chars).collect()
}

fn news_headlines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
	lines
		.filter(|l| {
			l.chars().count() > 20
				&& (YEAR_RE.is_match(l) || ["AM", "PM", "ET"].iter().any(|m| l.contains(m)))
		})
		.take(MAX_HEADLINES)
		.collect()
}

fn eps_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
	lines
		.filter(|l| l.contains("EPS") || l.contains("Earnings") || l.chars().take(2).any(|c| c == 'Q'))
		.collect()
}

/// `{"Revenue": ["94.9B", "89.5B"], ...}` keyed by each line's first word.
fn financial_metrics<'a>(lines: impl Iterator<Item = &'a str>) -> BTreeMap<&'a str, Vec<&'a str>> {
	let mut metrics = BTreeMap::new();
	for line in lines.filter(|l| METRIC_WORDS.iter().any(|w| l.contains(w))) {
		let mut words = line.split_whitespace();
		let Some(first) = words.next() else {
			continue;
		};
		let rest: Vec<&str> = words.collect();
		if !rest.is_empty() {
			metrics.insert(first, rest);
		}
	}
	metrics
}

fn transcript_quarters<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
	let mut quarters: Vec<&str> = Vec::new();
	for line in lines.filter(|l| l.contains('Q') && YEAR_RE.is_match(l)) {
		if !quarters.contains(&line) {
			quarters.push(line);
		}
		if quarters.len() == MAX_QUARTERS {
			break;
		}
	}
	quarters
}

#[cfg(test)]
mod tests {
	use super::*;

	const NEWS: &str = "News\nAAPL\nApple unveils new chips at spring event 2025\nshort 2025\n\
		Supplier outlook trimmed after call, 10:32 AM\nNo markers in this long line here\n";

	#[test]
	fn headlines_need_length_and_a_date_marker() {
		assert_eq!(
			news_headlines(NEWS.lines()),
			vec![
				"Apple unveils new chips at spring event 2025",
				"Supplier outlook trimmed after call, 10:32 AM"
			]
		);
	}

	#[test]
	fn eps_lines_match_labels_and_quarters() {
		let text = "Earnings Matrix\nQ1 2.10 2.18\nRevenue 90B\nEPS Surprise 3%\nAQ 1";
		assert_eq!(
			eps_lines(text.lines()),
			vec!["Earnings Matrix", "Q1 2.10 2.18", "EPS Surprise 3%", "AQ 1"]
		);
	}

	#[test]
	fn metrics_keyed_by_first_word() {
		let text = "Revenue 94.9B 89.5B\nGross Margin 46.2%\nCash\nDebt 100B";
		let metrics = financial_metrics(text.lines());
		assert_eq!(metrics.len(), 2);
		assert_eq!(metrics["Revenue"], vec!["94.9B", "89.5B"]);
		assert_eq!(metrics["Gross"], vec!["Margin", "46.2%"]);
	}

	#[test]
	fn quarters_are_deduplicated_in_order() {
		let text = "Q4 2024 Earnings Call\nQ3 2024 Earnings Call\nQ4 2024 Earnings Call\nQ 1999\nTranscript";
		assert_eq!(
			transcript_quarters(text.lines()),
			vec!["Q4 2024 Earnings Call", "Q3 2024 Earnings Call"]
		);
	}

	#[test]
	fn bare_news_has_no_ticker() {
		let general = TextCommand::new(None, "EQ", TextKind::News);
		assert_eq!(general.command_string(), "N");
		let blank = TextCommand::new(Some("  ".into()), "EQ", TextKind::News);
		assert_eq!(blank.command_string(), "N");
		let tran = TextCommand::new(Some("MSFT".into()), "EQ", TextKind::Transcripts);
		assert_eq!(tran.command_string(), "MSFT EQ TRAN");
	}

	#[test]
	fn preview_counts_characters() {
		assert_eq!(preview("héllo", 2), "hé");
	}
}
