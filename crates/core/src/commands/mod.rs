//! Terminal command objects.
//!
//! A command knows the string typed into the terminal, how to tell that
//! its window has rendered, optional preparation inside the window (tab
//! selection, form input, expanding sections) and how to scrape the result.
//! [`TerminalSession::execute`](crate::TerminalSession::execute) drives the
//! lifecycle:
//!
//! ```text
//! snapshot windows ─► send command ─► wait for new window ─► readiness
//!                                                                 │
//!                          CommandOutput ◄── extract ◄── prepare ◄┘
//! ```

mod batch;
mod chart;
mod description;
mod quote;
mod research;
mod screener;
mod text;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

pub use self::batch::{BatchAnalysisCommand, PerformanceRow};
pub use self::chart::{ChartCommand, ChartKind};
pub use self::description::{AnalystRating, CompanyInfo, DescriptionCommand};
pub use self::quote::QuoteCommand;
pub use self::research::{ResearchCommand, ResearchItem, ResearchPdf, parse_research_text};
pub use self::screener::{ScreenerCommand, ScreenerRows, ScreenerTab, clean_screener_table};
pub use self::text::{TextCommand, TextKind};
use crate::config::Timeouts;
use crate::dom::{PageLike, Scope};
use crate::error::{Error, Result};

/// How a command's window signals that it has rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
	/// Loading spinner gone.
	Spinner,
	/// A selector inside the window exists.
	Selector(&'static str),
	/// Nothing to wait for.
	Immediate,
}

/// Everything a command may touch while its window is open.
#[derive(Clone, Copy)]
pub struct WindowContext<'a> {
	pub page: &'a dyn PageLike,
	pub window_id: &'a str,
	pub timeouts: &'a Timeouts,
}

impl<'a> WindowContext<'a> {
	/// Queries rooted at the command's window.
	pub fn scope(&self) -> Scope<'a> {
		Scope::window(self.page, self.window_id)
	}

	/// Queries over the whole document.
	pub fn document(&self) -> Scope<'a> {
		Scope::page(self.page)
	}
}

/// Scraped data plus files written along the way.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extracted {
	pub data: Value,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub artifacts: Vec<PathBuf>,
}

impl From<Value> for Extracted {
	fn from(data: Value) -> Self {
		Self {
			data,
			artifacts: Vec::new(),
		}
	}
}

/// Result of running one command through a session.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
	pub command: String,
	pub window_id: String,
	pub data: Value,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub artifacts: Vec<PathBuf>,
	pub elapsed_ms: u64,
}

#[async_trait]
pub trait TerminalCommand: Send + Sync {
	/// Short name used in logs and errors, e.g. `DES`.
	fn name(&self) -> &str;

	/// Text typed into the terminal input.
	fn command_string(&self) -> String;

	fn readiness(&self) -> Readiness {
		Readiness::Spinner
	}

	/// Interactions needed before the window holds the wanted data.
	async fn prepare(&self, _ctx: &WindowContext<'_>) -> Result<()> {
		Ok(())
	}

	async fn extract(&self, ctx: &WindowContext<'_>) -> Result<Extracted>;
}

/// Ticker commands selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
	Description,
	Quote,
	Chart,
	IntradayChart,
	News,
	Earnings,
	Financials,
	Transcripts,
}

impl CommandKind {
	pub const ALL: [CommandKind; 8] = [
		Self::Description,
		Self::Quote,
		Self::Chart,
		Self::IntradayChart,
		Self::News,
		Self::Earnings,
		Self::Financials,
		Self::Transcripts,
	];

	/// Terminal mnemonic.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Description => "DES",
			Self::Quote => "QM",
			Self::Chart => "G",
			Self::IntradayChart => "GIP",
			Self::News => "N",
			Self::Earnings => "EM",
			Self::Financials => "FA",
			Self::Transcripts => "TRAN",
		}
	}

	pub fn available() -> Vec<String> {
		Self::ALL.iter().map(|k| k.name().to_string()).collect()
	}

	/// Case-insensitive lookup by mnemonic.
	pub fn parse(name: &str) -> Result<Self> {
		let wanted = name.trim();
		Self::ALL
			.into_iter()
			.find(|k| k.name().eq_ignore_ascii_case(wanted))
			.ok_or_else(|| Error::UnknownCommand {
				name: wanted.to_string(),
				available: Self::available(),
			})
	}

	pub fn build(&self, ticker: &str, asset_class: &str) -> Box<dyn TerminalCommand> {
		let ticker = ticker.trim().to_ascii_uppercase();
		let asset = asset_class.trim().to_ascii_uppercase();
		match self {
			Self::Description => Box::new(DescriptionCommand::new(ticker, asset)),
			Self::Quote => Box::new(QuoteCommand::new(ticker, asset)),
			Self::Chart => Box::new(ChartCommand::new(ticker, asset, ChartKind::Daily)),
			Self::IntradayChart => Box::new(ChartCommand::new(ticker, asset, ChartKind::Intraday)),
			Self::News => Box::new(TextCommand::new(Some(ticker), asset, TextKind::News)),
			Self::Earnings => Box::new(TextCommand::new(Some(ticker), asset, TextKind::Earnings)),
			Self::Financials => Box::new(TextCommand::new(Some(ticker), asset, TextKind::Financials)),
			Self::Transcripts => Box::new(TextCommand::new(Some(ticker), asset, TextKind::Transcripts)),
		}
	}
}

/// `{TICKER} {ASSET} {MNEMONIC}`.
pub(crate) fn ticker_command(ticker: &str, asset_class: &str, mnemonic: &str) -> String {
	format!("{ticker} {asset_class} {mnemonic}")
}

/// RFC 3339 UTC timestamp with millisecond precision.
pub(crate) fn now_timestamp() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// JS string literal for `s`.
pub(crate) fn js_str(s: &str) -> String {
	Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests;
