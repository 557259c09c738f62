//! `RES`: research feed.
//!
//! Rows are read through a list of row selectors; when none yields dated
//! rows the window text is parsed instead. The feed renders each entry as
//! one run of text, `2025-01-02RCUS.USTruist SecuritiesTitle...`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{Extracted, TerminalCommand, WindowContext, js_str, now_timestamp};
use crate::downloads::DownloadWatcher;
use crate::error::Result;

pub const KNOWN_PROVIDERS: [&str; 10] = [
	"Truist Securities",
	"JPMorgan",
	"KeyBanc",
	"RBC",
	"Jefferies",
	"Goldman Sachs",
	"Morgan Stanley",
	"Bank of America",
	"UBS",
	"Deutsche Bank",
];

const ROW_SELECTORS: [&str; 4] = ["[class*='grid'] > div", "[class*='row']", "[role='row']", "tr"];
/// Fewer matches than this are headers or layout, not data rows.
const MIN_ROWS: usize = 6;
const MAX_ITEMS: usize = 100;
const TITLE_CHARS: usize = 200;
const RAW_CHARS: usize = 300;
const PDF_LINKS: &str = "a[href*='.pdf']";

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid date regex"));
static EXCHANGE_TICKER_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9]*\.[A-Z]{2}").expect("valid ticker regex"));
static TICKER_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z0-9.]+").expect("valid ticker regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchItem {
	pub date: String,
	pub ticker: String,
	pub provider: String,
	pub title: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub raw: Option<String>,
}

fn truncate(s: &str, chars: usize) -> String {
	s.chars().take(chars).collect()
}

fn clean_title(title: &str) -> String {
	let title = title.replace("INVITE:", "").replace("First Take:", "");
	truncate(title.trim(), TITLE_CHARS)
}

/// Earliest known provider in `text`, as `(byte offset, name)`.
fn find_provider(text: &str) -> Option<(usize, &'static str)> {
	KNOWN_PROVIDERS
		.iter()
		.filter_map(|p| text.find(p).map(|i| (i, *p)))
		.min_by_key(|(i, _)| *i)
}

/// Splits `TICKERProviderTitle`. Exchange-suffixed tickers (`RCUS.US`) are
/// unambiguous; otherwise the ticker runs up to the first known provider.
fn split_entry(entry: &str) -> (String, &'static str, &str) {
	let entry = entry.trim_start();
	let (ticker, rest) = if let Some(m) = EXCHANGE_TICKER_RE.find(entry) {
		(m.as_str().to_string(), &entry[m.end()..])
	} else if let Some((at, _)) = find_provider(entry).filter(|(at, _)| *at > 0) {
		(entry[..at].trim().to_string(), &entry[at..])
	} else if let Some(m) = TICKER_RE.find(entry) {
		(m.as_str().to_string(), &entry[m.end()..])
	} else {
		("N/A".to_string(), entry)
	};
	match find_provider(rest) {
		Some((at, provider)) => (ticker, provider, &rest[at + provider.len()..]),
		None => (ticker, "Unknown", rest),
	}
}

/// Parses research entries out of the feed's concatenated text.
///
/// Only text after the first `Title` column header is considered. Each
/// entry runs from one `YYYY-MM-DD` date to the next; entries whose title
/// is five characters or fewer are dropped.
pub fn parse_research_text(text: &str) -> Vec<ResearchItem> {
	let data = text.split_once("Title").map_or(text, |(_, rest)| rest);
	let dates: Vec<_> = DATE_RE.find_iter(data).collect();
	let mut items = Vec::new();
	for (i, date) in dates.iter().enumerate() {
		let end = dates.get(i + 1).map_or(data.len(), |next| next.start());
		let entry = &data[date.end()..end];
		let line = entry.lines().next().unwrap_or_default();
		let (ticker, provider, title) = split_entry(line);
		let title = clean_title(title);
		if title.chars().count() <= 5 {
			continue;
		}
		items.push(ResearchItem {
			date: date.as_str().to_string(),
			ticker,
			provider: provider.to_string(),
			title,
			raw: Some(truncate(&format!("{}{line}", date.as_str()), RAW_CHARS)),
		});
	}
	items
}

/// Items from the cells of rows matched by one selector: date, ticker,
/// provider, title.
fn items_from_rows(rows: &[Vec<String>]) -> Vec<ResearchItem> {
	rows.iter()
		.filter_map(|cells| {
			let cell = |i: usize| cells.get(i).map(|c| c.trim()).unwrap_or_default();
			let date = DATE_RE.find(cell(0))?.as_str().to_string();
			let ticker = cell(1);
			if ticker.is_empty() {
				return None;
			}
			Some(ResearchItem {
				date,
				ticker: ticker.to_string(),
				provider: Some(cell(2)).filter(|p| !p.is_empty()).unwrap_or("Unknown").to_string(),
				title: clean_title(cell(3)),
				raw: None,
			})
		})
		.collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFeed {
	/// Cells per row, per selector, in selector order.
	rows: Vec<Vec<Vec<String>>>,
	text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PdfLink {
	href: Option<String>,
	row: String,
}

/// A downloaded research PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchPdf {
	pub ticker: String,
	pub filename: String,
	pub filepath: PathBuf,
}

pub struct ResearchCommand {
	pdfs: Option<(PathBuf, usize)>,
}

impl Default for ResearchCommand {
	fn default() -> Self {
		Self::new()
	}
}

impl ResearchCommand {
	pub fn new() -> Self {
		Self { pdfs: None }
	}

	/// Also downloads up to `max` linked PDFs; the browser must be saving
	/// downloads into `downloads_dir`.
	pub fn download_pdfs(mut self, downloads_dir: impl Into<PathBuf>, max: usize) -> Self {
		self.pdfs = (max > 0).then(|| (downloads_dir.into(), max));
		self
	}

	fn collect_js() -> String {
		let selectors = serde_json::to_string(&ROW_SELECTORS).unwrap_or_else(|_| "[]".into());
		format!(
			r#"const sels = {selectors};
return {{
  rows: sels.map((sel) => __all(root, sel).map((row) => Array.from(row.children).slice(0, 4).map((c) => (c.textContent || '').trim()))),
  text: root.textContent || '',
}};"#
		)
	}

	async fn download(&self, ctx: &WindowContext<'_>, dir: &Path, max: usize) -> Result<Vec<ResearchPdf>> {
		let scope = ctx.scope();
		let links: Vec<PdfLink> = scope
			.eval_typed(
				"res.pdf.links",
				&format!(
					r#"return __all(root, {}).map((a) => ({{
  href: a.getAttribute('href'),
  row: ((a.closest("[role='row'], tr, [class*='row']") || a.parentElement || a).textContent || '').trim(),
}}));"#,
					js_str(PDF_LINKS)
				),
			)
			.await?;

		let timeout = std::time::Duration::from_millis(ctx.timeouts.download_ms);
		let mut pdfs = Vec::new();
		for (index, link) in links.iter().take(max).enumerate() {
			let watcher = DownloadWatcher::snapshot(dir, "pdf")?;
			let clicked: Option<bool> = scope
				.eval_typed(
					"res.pdf.click",
					&format!(
						"const a = __all(root, {})[{index}]; if (!a) return false; a.click(); return true;",
						js_str(PDF_LINKS)
					),
				)
				.await?;
			if clicked != Some(true) {
				continue;
			}
			match watcher.wait(timeout, ctx.timeouts.poll()).await {
				Ok(path) => {
					let ticker = split_entry(DATE_RE.splitn(&link.row, 2).last().unwrap_or_default()).0;
					let filename = path
						.file_name()
						.map(|n| n.to_string_lossy().into_owned())
						.unwrap_or_default();
					debug!(target = "godel", %ticker, file = %filename, "research pdf saved");
					pdfs.push(ResearchPdf {
						ticker,
						filename,
						filepath: path,
					});
				}
				Err(e) => warn!(target = "godel", href = ?link.href, error = %e, "research pdf download failed"),
			}
		}
		Ok(pdfs)
	}
}

#[async_trait]
impl TerminalCommand for ResearchCommand {
	fn name(&self) -> &str {
		"RES"
	}

	fn command_string(&self) -> String {
		"RES".to_string()
	}

	async fn extract(&self, ctx: &WindowContext<'_>) -> Result<Extracted> {
		let feed: RawFeed = ctx.scope().eval_typed("res.collect", &Self::collect_js()).await?;

		let from_rows = feed
			.rows
			.iter()
			.zip(ROW_SELECTORS)
			.filter(|(rows, _)| rows.len() >= MIN_ROWS)
			.map(|(rows, selector)| (selector, items_from_rows(rows)))
			.find(|(_, items)| !items.is_empty());
		let items = match from_rows {
			Some((selector, items)) => {
				debug!(target = "godel", selector, count = items.len(), "research rows");
				items
			}
			None => parse_research_text(&feed.text),
		};
		info!(target = "godel", count = items.len(), "research items extracted");

		let pdfs = match &self.pdfs {
			Some((dir, max)) => self.download(ctx, dir, *max).await?,
			None => Vec::new(),
		};
		let artifacts = pdfs.iter().map(|p| p.filepath.clone()).collect();

		let data = json!({
			"timestamp": now_timestamp(),
			"window_id": ctx.window_id,
			"research_items_found": items.len(),
			"items": &items[..items.len().min(MAX_ITEMS)],
			"pdfs": pdfs,
		});
		Ok(Extracted { data, artifacts })
	}
}
