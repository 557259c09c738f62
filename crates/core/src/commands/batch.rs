//! `PRT`: batch pattern analysis over a list of tickers.
//!
//! The window runs asynchronously after `Run` is clicked; completion shows
//! either as a full-width progress bar or as `N / N` progress text. Results
//! are taken from the window's CSV export, which the browser saves into the
//! session's downloads directory.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{Extracted, TerminalCommand, WindowContext, now_timestamp};
use crate::downloads::DownloadWatcher;
use crate::dom::Scope;
use crate::error::{Error, Result};
use crate::export;
use crate::retry::{self, RetryPolicy};
use crate::wait::{self, Progress, parse_progress, style_width_full};

const SYMBOLS: &str = "xpath=.//label[contains(., 'Symbols')]//textarea";
const RUN_BUTTON: &str = "xpath=.//button[contains(@class,'bg-emerald-600') and contains(text(),'Run')]";
const EXPORT_BUTTON: &str = "xpath=.//button[contains(text(),'Export CSV')]";
const RESULT_ROWS: &str = "xpath=.//div[contains(text(),'Top suggestions')]/..//table//tbody/tr";

const PROGRESS_JS: &str = r#"
const bar = __first(root, "div.h-full[class*='bg-[#10b981]']");
return {
  style: bar ? bar.getAttribute('style') : null,
  text: __text(__first(root, "xpath=.//div[contains(text(),'/')]")),
};
"#;

const SUMMARY_JS: &str = r#"
const table = __first(root, "xpath=.//div[contains(text(),'Performance Summary')]/..//table");
const rows = table ? Array.from(table.querySelectorAll('tbody tr')) : [];
return {
  performance: rows.map((tr) => Array.from(tr.querySelectorAll('td')).map(__text)),
  progress: __text(__first(root, "xpath=.//div[contains(text(),'/')]")),
  failures: __text(__first(root, "xpath=.//div[contains(text(),'Failures in last batch')]//strong")),
};
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProgress {
	style: Option<String>,
	text: Option<String>,
}

impl RawProgress {
	fn is_complete(&self) -> bool {
		self.style.as_deref().is_some_and(style_width_full)
			|| self
				.text
				.as_deref()
				.and_then(parse_progress)
				.is_some_and(|p| p.is_complete())
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSummary {
	performance: Vec<Vec<String>>,
	progress: Option<String>,
	failures: Option<String>,
}

/// One row of the window's performance summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerformanceRow {
	pub bucket: String,
	pub n: String,
	pub long: String,
	pub short: String,
	pub win_rate: String,
	pub mean_pl: String,
	pub median_pl: String,
}

impl PerformanceRow {
	fn from_cells(cells: &[String]) -> Option<Self> {
		let [bucket, n, long, short, win_rate, mean_pl, median_pl, ..] = cells else {
			return None;
		};
		let t = |s: &String| s.trim().to_string();
		Some(Self {
			bucket: t(bucket),
			n: t(n),
			long: t(long),
			short: t(short),
			win_rate: t(win_rate),
			mean_pl: t(mean_pl),
			median_pl: t(median_pl),
		})
	}
}

fn parse_failures(text: Option<&str>) -> u64 {
	text.and_then(|t| t.trim().parse().ok()).unwrap_or(0)
}

pub struct BatchAnalysisCommand {
	tickers: Vec<String>,
	downloads_dir: PathBuf,
	export_policy: RetryPolicy,
}

impl BatchAnalysisCommand {
	/// `downloads_dir` must be the directory the browser context saves
	/// downloads into.
	pub fn new(tickers: Vec<String>, downloads_dir: impl Into<PathBuf>) -> Self {
		Self {
			tickers: tickers
				.into_iter()
				.map(|t| t.trim().to_ascii_uppercase())
				.filter(|t| !t.is_empty())
				.collect(),
			downloads_dir: downloads_dir.into(),
			export_policy: RetryPolicy::default(),
		}
	}

	pub fn with_export_policy(mut self, policy: RetryPolicy) -> Self {
		self.export_policy = policy;
		self
	}

	pub fn tickers(&self) -> &[String] {
		&self.tickers
	}

	async fn wait_for_completion(&self, scope: Scope<'_>, ctx: &WindowContext<'_>) -> Result<()> {
		let options = ctx.timeouts.wait(ctx.timeouts.batch_ms);
		wait::wait_for(&options, "batch analysis to complete", move || async move {
			let progress: RawProgress = scope.eval_typed("prt.progress", PROGRESS_JS).await?;
			Ok(progress.is_complete().then_some(()))
		})
		.await
	}

	/// Clicks `Export CSV` and waits for the file; each retry clicks again.
	///
	/// The directory is snapshotted once, so a file from an earlier click
	/// that lands late still counts.
	async fn export_csv(&self, scope: Scope<'_>, ctx: &WindowContext<'_>) -> Result<PathBuf> {
		let dir = self.downloads_dir.as_path();
		let timeout = std::time::Duration::from_millis(ctx.timeouts.download_ms);
		let poll = ctx.timeouts.poll();
		let watcher = DownloadWatcher::snapshot(dir, "csv")?;
		let watcher = &watcher;
		retry::retry(&self.export_policy, "PRT csv export", move |attempt| async move {
			debug!(target = "godel", attempt, dir = %dir.display(), "exporting csv");
			scope.click(EXPORT_BUTTON).await?;
			watcher.wait(timeout, poll).await
		})
		.await
	}
}

#[async_trait]
impl TerminalCommand for BatchAnalysisCommand {
	fn name(&self) -> &str {
		"PRT"
	}

	fn command_string(&self) -> String {
		"PRT".to_string()
	}

	async fn prepare(&self, ctx: &WindowContext<'_>) -> Result<()> {
		let scope = ctx.scope();
		if !self.tickers.is_empty() {
			let symbols = self.tickers.join(" ");
			scope.fill(SYMBOLS, &symbols).await?;
			debug!(target = "godel", symbols = %symbols, "tickers entered");
		}
		scope.click(RUN_BUTTON).await?;
		info!(target = "godel", tickers = self.tickers.len(), "batch analysis started");

		self.wait_for_completion(scope, ctx).await?;
		info!(target = "godel", "batch analysis complete");

		let options = ctx.timeouts.wait(ctx.timeouts.loading_ms);
		match wait::wait_for_rows(&scope, RESULT_ROWS, 1, &options).await {
			Ok(rows) => debug!(target = "godel", rows, "results table populated"),
			Err(e) if e.is_timeout() => warn!(target = "godel", "results table may be empty"),
			Err(e) => return Err(e),
		}
		Ok(())
	}

	async fn extract(&self, ctx: &WindowContext<'_>) -> Result<Extracted> {
		let scope = ctx.scope();
		let csv_path = self
			.export_csv(scope, ctx)
			.await
			.map_err(|e| Error::extraction("PRT", format!("csv export failed: {e}")))?;
		let table = export::read_csv(&csv_path)?;
		info!(target = "godel", rows = table.len(), path = %csv_path.display(), "csv loaded");

		let summary: RawSummary = scope.eval_typed("prt.summary", SUMMARY_JS).await?;
		let performance: Vec<PerformanceRow> = summary
			.performance
			.iter()
			.filter_map(|cells| PerformanceRow::from_cells(cells))
			.collect();
		let progress: Option<Progress> = summary.progress.as_deref().and_then(parse_progress);

		let data = json!({
			"timestamp": now_timestamp(),
			"window_id": ctx.window_id,
			"tickers": self.tickers,
			"csv_file_path": csv_path,
			"row_count": table.len(),
			"columns": table.headers,
			"records": table.records(),
			"performance_summary": performance,
			"progress": progress,
			"failures": parse_failures(summary.failures.as_deref()),
		});
		Ok(Extracted {
			data,
			artifacts: vec![csv_path],
		})
	}
}
