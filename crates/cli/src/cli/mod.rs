#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

/// Root CLI for godel.
#[derive(Parser, Debug)]
#[command(name = "godel")]
#[command(about = "Godel Terminal automation - run terminal commands, capture chat and traffic")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: toon (default), json, ndjson, or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "toon")]
	pub format: OutputFormat,

	#[command(flatten)]
	pub global: GlobalArgs,

	#[command(subcommand)]
	pub command: Commands,
}

/// Settings layered over the config file and `GODEL_*` variables.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
	/// JSON config file
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Run the browser without a window
	#[arg(long, global = true)]
	pub headless: bool,

	/// Keep a visible browser but place its window off-screen
	#[arg(long, global = true, conflicts_with = "headless")]
	pub background: bool,

	/// Terminal URL
	#[arg(long, global = true, value_name = "URL")]
	pub url: Option<String>,

	/// Layout tab loaded after login
	#[arg(long, global = true, value_name = "NAME")]
	pub layout: Option<String>,

	/// SQLite database for chat messages and PDF records
	#[arg(long, global = true, value_name = "FILE")]
	pub db: Option<PathBuf>,

	/// Attach to a running browser instead of launching one
	#[arg(long, global = true, value_name = "URL")]
	pub cdp_endpoint: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run a ticker command (DES, QM, G, GIP, N, EM, FA, TRAN).
	Run(RunArgs),
	/// Scrape the MOST screener.
	Most(MostArgs),
	/// Run PRT batch analysis for a list of tickers.
	Prt(PrtArgs),
	/// Scrape the RES research list, optionally downloading PDFs.
	Res(ResArgs),
	/// Monitor chat channels and store messages.
	Chat(ChatArgs),
	/// Capture page network traffic for a while.
	Probe(ProbeArgs),
	/// List stored chat messages.
	Messages(MessagesArgs),
	/// List recorded PDF downloads.
	Pdfs(PdfsArgs),
}

impl Commands {
	/// Name used in result envelopes.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Run(_) => "run",
			Commands::Most(_) => "most",
			Commands::Prt(_) => "prt",
			Commands::Res(_) => "res",
			Commands::Chat(_) => "chat",
			Commands::Probe(_) => "probe",
			Commands::Messages(_) => "messages",
			Commands::Pdfs(_) => "pdfs",
		}
	}
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
	/// Terminal mnemonic, e.g. DES or QM
	#[arg(value_name = "COMMAND")]
	pub command: String,

	#[arg(value_name = "TICKER")]
	pub ticker: String,

	/// Asset class typed after the ticker
	#[arg(long, default_value = "EQ", value_name = "CLASS")]
	pub asset: String,

	/// Write the result as JSON into this directory
	#[arg(long, value_name = "DIR")]
	pub save: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct MostArgs {
	/// Screener tab: ACTIVE, GAINERS, LOSERS or VALUE
	#[arg(long, default_value = "ACTIVE", value_name = "TAB")]
	pub tab: String,

	/// Rows to show: 10, 25, 50, 75 or 100
	#[arg(long, default_value_t = 75, value_name = "N")]
	pub limit: u32,

	/// Write CSV and JSON into this directory
	#[arg(long, value_name = "DIR")]
	pub save: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PrtArgs {
	#[arg(value_name = "TICKER", required = true, num_args = 1..)]
	pub tickers: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ResArgs {
	/// Download linked research PDFs
	#[arg(long)]
	pub download_pdfs: bool,

	#[arg(long, default_value_t = 5, value_name = "N")]
	pub max_pdfs: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ChatMode {
	/// Decode messages from WebSocket frames
	#[default]
	Ws,
	/// Read the rendered chat panel
	Dom,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
	/// Channels to keep in ws mode (all when empty). In dom mode each
	/// channel gets its own logged-in session (#general when empty)
	#[arg(value_name = "CHANNEL")]
	pub channels: Vec<String>,

	#[arg(long, value_enum, default_value = "ws")]
	pub mode: ChatMode,

	/// Seconds to monitor; runs until Ctrl-C when unset
	#[arg(long, value_name = "SECS")]
	pub duration: Option<u64>,

	/// Poll interval in milliseconds
	#[arg(long, default_value_t = 200, value_name = "MS")]
	pub poll_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
	/// Seconds to capture
	#[arg(long, default_value_t = 30, value_name = "SECS")]
	pub duration: u64,

	/// Traffic kind: http, websocket or all
	#[arg(long, default_value = "all", value_name = "KIND")]
	pub filter: String,

	/// Only record URLs containing this text
	#[arg(long, value_name = "TEXT")]
	pub url_filter: Option<String>,

	/// Write the capture as JSON into this directory
	#[arg(long, value_name = "DIR")]
	pub save: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct MessagesArgs {
	#[arg(long, value_name = "NAME")]
	pub channel: Option<String>,

	/// Only messages at or after this time (RFC 3339 or YYYY-MM-DD)
	#[arg(long, value_name = "TIME")]
	pub since: Option<String>,

	#[arg(long, default_value_t = 100, value_name = "N")]
	pub limit: usize,
}

#[derive(Args, Debug, Clone)]
pub struct PdfsArgs {
	#[arg(long, value_name = "TICKER")]
	pub ticker: Option<String>,

	#[arg(long, default_value_t = 100, value_name = "N")]
	pub limit: usize,
}
