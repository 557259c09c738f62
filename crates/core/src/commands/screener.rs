//! `MOST`: most-active screener with tabs and a row limit.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{Extracted, TerminalCommand, WindowContext, now_timestamp};
use crate::error::{Error, Result};
use crate::export;
use crate::table::{Table, parse_number};
use crate::wait::wait_for_rows;

pub const LIMITS: [u32; 5] = [10, 25, 50, 75, 100];
pub const DEFAULT_LIMIT: u32 = 75;

const ROW_SELECTOR: &str = "table tbody tr";
const SUFFIXED_COLUMNS: [&str; 3] = ["Vol", "Vol $", "M Cap"];

const TABLE_JS: &str = r#"
const table = __first(root, 'table');
if (!table) return null;
const headers = Array.from(table.querySelectorAll('thead th')).map(__text);
const rows = Array.from(table.querySelectorAll('tbody tr'))
  .map((tr) => Array.from(tr.querySelectorAll('td')).map((td) => __text(td.querySelector('span') || td)))
  .filter((cells) => cells.length > 0);
return { headers, rows };
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScreenerTab {
	#[default]
	Active,
	Gainers,
	Losers,
	Value,
}

impl ScreenerTab {
	pub const ALL: [ScreenerTab; 4] = [Self::Active, Self::Gainers, Self::Losers, Self::Value];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Active => "ACTIVE",
			Self::Gainers => "GAINERS",
			Self::Losers => "LOSERS",
			Self::Value => "VALUE",
		}
	}
}

impl fmt::Display for ScreenerTab {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ScreenerTab {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
			.ok_or_else(|| {
				Error::InvalidInput(format!(
					"unknown screener tab '{s}' (expected ACTIVE, GAINERS, LOSERS or VALUE)"
				))
			})
	}
}

/// Cleaned screener table: original columns plus numeric companions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenerRows {
	pub columns: Vec<String>,
	pub records: Vec<Map<String, Value>>,
}

impl ScreenerRows {
	/// String table for CSV export; nulls become empty cells.
	pub fn to_table(&self) -> Table {
		let rows = self
			.records
			.iter()
			.map(|record| {
				self.columns
					.iter()
					.map(|c| match record.get(c) {
						Some(Value::String(s)) => s.clone(),
						Some(Value::Null) | None => String::new(),
						Some(other) => other.to_string(),
					})
					.collect()
			})
			.collect();
		Table::new(self.columns.clone(), rows)
	}
}

fn number(value: Option<f64>) -> Value {
	value.and_then(serde_json::Number::from_f64).map_or(Value::Null, Value::Number)
}

/// Adds numeric companion columns to a scraped screener table.
///
/// `Chg %` loses its percent sign (empty becomes `0`) and gains
/// `Chg % Numeric`; `Vol`, `Vol $` and `M Cap` gain `Raw` and `Numeric`
/// columns with K/M/B/T suffixes expanded; `Last` and `Chg` gain `Numeric`.
/// Values that do not parse are `null`.
pub fn clean_screener_table(table: &Table) -> ScreenerRows {
	let has = |c: &str| table.column_index(c).is_some();
	let mut columns = table.headers.clone();
	if has("Chg %") {
		columns.push("Chg % Numeric".into());
	}
	for col in SUFFIXED_COLUMNS.into_iter().filter(|c| has(c)) {
		columns.push(format!("{col} Raw"));
		columns.push(format!("{col} Numeric"));
	}
	for col in ["Last", "Chg"].into_iter().filter(|c| has(c)) {
		columns.push(format!("{col} Numeric"));
	}

	let records = table
		.records()
		.into_iter()
		.map(|mut record| {
			let cell = |record: &Map<String, Value>, c: &str| {
				record.get(c).and_then(Value::as_str).unwrap_or_default().trim().to_string()
			};
			if has("Chg %") {
				let mut pct = cell(&record, "Chg %").replace('%', "");
				if pct.is_empty() {
					pct = "0".into();
				}
				let numeric = number(pct.parse().ok());
				record.insert("Chg %".into(), Value::String(pct));
				record.insert("Chg % Numeric".into(), numeric);
			}
			for col in SUFFIXED_COLUMNS.into_iter().filter(|c| has(c)) {
				let raw = cell(&record, col);
				record.insert(format!("{col} Numeric"), number(parse_number(&raw)));
				record.insert(format!("{col} Raw"), Value::String(raw));
			}
			for col in ["Last", "Chg"].into_iter().filter(|c| has(c)) {
				let numeric = number(cell(&record, col).replace(',', "").parse().ok());
				record.insert(format!("{col} Numeric"), numeric);
			}
			record
		})
		.collect();

	ScreenerRows { columns, records }
}

pub struct ScreenerCommand {
	tab: ScreenerTab,
	limit: u32,
	output_dir: Option<PathBuf>,
}

impl ScreenerCommand {
	/// `limit` must be one of [`LIMITS`].
	pub fn new(tab: ScreenerTab, limit: u32) -> Result<Self> {
		if !LIMITS.contains(&limit) {
			return Err(Error::InvalidInput(format!(
				"screener limit must be one of 10, 25, 50, 75, 100 (got {limit})"
			)));
		}
		Ok(Self {
			tab,
			limit,
			output_dir: None,
		})
	}

	/// Also writes the cleaned table as CSV and JSON under `dir`.
	pub fn save_to(mut self, dir: impl Into<PathBuf>) -> Self {
		self.output_dir = Some(dir.into());
		self
	}

	pub fn tab(&self) -> ScreenerTab {
		self.tab
	}

	pub fn limit(&self) -> u32 {
		self.limit
	}
}

#[async_trait]
impl TerminalCommand for ScreenerCommand {
	fn name(&self) -> &str {
		"MOST"
	}

	fn command_string(&self) -> String {
		"MOST".to_string()
	}

	/// Tab and limit failures leave the window on its current view.
	async fn prepare(&self, ctx: &WindowContext<'_>) -> Result<()> {
		let scope = ctx.scope();
		if self.tab != ScreenerTab::Active {
			let tab = format!(
				"xpath=.//div[contains(@class,'cursor-pointer') and contains(text(),{})]",
				xpath_literal(self.tab.as_str())
			);
			match scope.click(tab.as_str()).await {
				Ok(()) => debug!(target = "godel", tab = %self.tab, "screener tab selected"),
				Err(e) if e.is_target_closed() => return Err(e),
				Err(e) => warn!(target = "godel", tab = %self.tab, error = %e, "could not select tab"),
			}
		}
		match scope.select_option("select", &self.limit.to_string()).await {
			Ok(()) => debug!(target = "godel", limit = self.limit, "screener limit set"),
			Err(e) if e.is_target_closed() => return Err(e),
			Err(e) => warn!(target = "godel", limit = self.limit, error = %e, "could not set limit"),
		}
		Ok(())
	}

	async fn extract(&self, ctx: &WindowContext<'_>) -> Result<Extracted> {
		let scope = ctx.scope();
		let options = ctx.timeouts.wait(ctx.timeouts.loading_ms);
		wait_for_rows(&scope, ROW_SELECTOR, 1, &options).await?;

		let table: Option<Table> = scope.eval_typed("most.table", TABLE_JS).await?;
		let table = table
			.filter(|t| !t.is_empty())
			.ok_or_else(|| Error::extraction("MOST", "screener table is empty"))?;
		let cleaned = clean_screener_table(&table);
		let tickers: Vec<&str> = table.column("Ticker");

		let mut artifacts = Vec::new();
		if let Some(dir) = &self.output_dir {
			let now = Utc::now();
			let tag = self.tab.as_str();
			let csv_path = export::output_path(dir, "MOST", Some(tag), "csv", now);
			export::write_csv(&csv_path, &cleaned.to_table())?;
			let json_path = export::output_path(dir, "MOST", Some(tag), "json", now);
			export::write_json(&json_path, &cleaned.records)?;
			artifacts.extend([csv_path, json_path]);
		}

		let data = json!({
			"timestamp": now_timestamp(),
			"window_id": ctx.window_id,
			"tab": self.tab.as_str(),
			"limit": self.limit,
			"row_count": cleaned.records.len(),
			"columns": cleaned.columns,
			"records": cleaned.records,
			"tickers": tickers,
		});
		Ok(Extracted { data, artifacts })
	}
}

/// XPath string literal.
fn xpath_literal(s: &str) -> String {
	if s.contains('\'') {
		format!("\"{s}\"")
	} else {
		format!("'{s}'")
	}
}
