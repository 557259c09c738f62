use std::sync::Arc;
use std::time::{Duration, Instant};

use godel::chat::{
	DEFAULT_CHANNEL, DomChatMonitor, MonitorOptions, MonitorReport, StopHandle, WsChatMonitor, normalize_channel,
};
use godel::{NetworkInterceptor, Storage};
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cli::{ChatArgs, ChatMode};
use crate::context::{CliContext, Terminal};
use crate::error::Result;
use crate::output::{CommandInputs, DiagnosticLevel, OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatData {
	mode: &'static str,
	channels: Vec<String>,
	/// Totals across every session.
	report: MonitorReport,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	sessions: Vec<ChannelResult>,
}

/// Outcome of one per-channel session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResult {
	channel: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	report: Option<MonitorReport>,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<String>,
}

fn monitor_options(args: &ChatArgs) -> MonitorOptions {
	MonitorOptions {
		duration: args.duration.map(Duration::from_secs),
		poll: Duration::from_millis(args.poll_ms.max(10)),
		channels: (!args.channels.is_empty()).then(|| args.channels.clone()),
		..MonitorOptions::default()
	}
}

/// Normalized, deduplicated channels for dom mode; `general` when none given.
fn dom_channels(requested: &[String]) -> Vec<String> {
	let mut channels: Vec<String> = Vec::new();
	for channel in requested.iter().map(|c| normalize_channel(c)) {
		if !channel.is_empty() && !channels.contains(&channel) {
			channels.push(channel);
		}
	}
	if channels.is_empty() {
		channels.push(DEFAULT_CHANNEL.to_string());
	}
	channels
}

/// Stops the monitor on the first Ctrl-C.
fn stop_on_interrupt(stop: StopHandle) -> JoinHandle<()> {
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!(target = "godel", "interrupted, stopping chat monitor");
			stop.stop();
		}
	})
}

fn add_report(total: &mut MonitorReport, report: &MonitorReport) {
	total.seen += report.seen;
	total.stored += report.stored;
	total.duplicates += report.duplicates;
	total.filtered += report.filtered;
	total.errors += report.errors;
}

/// Sums the per-channel reports. Fails only when every session failed.
fn summarize(results: Vec<(String, godel::Result<MonitorReport>)>) -> Result<(MonitorReport, Vec<ChannelResult>)> {
	let mut total = MonitorReport::default();
	let mut sessions = Vec::with_capacity(results.len());
	let mut first_error = None;
	for (channel, result) in results {
		match result {
			Ok(report) => {
				add_report(&mut total, &report);
				sessions.push(ChannelResult {
					channel,
					report: Some(report),
					error: None,
				});
			}
			Err(e) => {
				sessions.push(ChannelResult {
					channel,
					report: None,
					error: Some(e.to_string()),
				});
				if first_error.is_none() {
					first_error = Some(e);
				}
			}
		}
	}
	match first_error {
		Some(e) if sessions.iter().all(|s| s.report.is_none()) => Err(e.into()),
		_ => Ok((total, sessions)),
	}
}

async fn run_ws(terminal: &Terminal, storage: Arc<dyn Storage>, options: MonitorOptions) -> Result<MonitorReport> {
	let session = terminal.session();
	let interceptor = Arc::new(NetworkInterceptor::new());
	interceptor.start(session.page(), None, true).await?;
	if let Some(channel) = options.channels.as_ref().and_then(|c| c.first()) {
		session.open_chat_channel(channel).await?;
	}

	let monitor = WsChatMonitor::new(Arc::clone(&interceptor), storage, options);
	let interrupt = stop_on_interrupt(monitor.stop_handle());
	let report = monitor.run().await;
	interrupt.abort();
	interceptor.stop();
	Ok(report?)
}

/// One logged-in session per channel, each named after its channel and
/// scraped concurrently until the shared stop fires or the duration ends.
async fn run_dom(
	ctx: &CliContext,
	channels: &[String],
	storage: Arc<dyn Storage>,
	options: MonitorOptions,
) -> Result<Vec<(String, godel::Result<MonitorReport>)>> {
	let ids: Vec<&str> = channels.iter().map(String::as_str).collect();
	let terminal = ctx.open_sessions(&ids).await?;

	let stop = StopHandle::new();
	let interrupt = stop_on_interrupt(stop.clone());
	let results = terminal
		.manager()
		.run_sessions(&ids, |session| {
			let storage = Arc::clone(&storage);
			let options = options.clone();
			let stop = stop.clone();
			async move {
				let channel = session.id();
				session.open_chat_channel(channel).await?;
				DomChatMonitor::new(session.page(), channel, storage, options)
					.with_stop(stop)
					.run()
					.await
			}
		})
		.await;
	interrupt.abort();
	terminal.close().await;
	Ok(results)
}

pub(super) async fn execute(ctx: &CliContext, args: ChatArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let storage: Arc<dyn Storage> = ctx.open_storage()?;
	let options = monitor_options(&args);

	let mut builder = ResultBuilder::new("chat").started_at(started);
	let (mode, channels, report, sessions) = match args.mode {
		ChatMode::Ws => {
			let terminal = ctx.open_terminal().await?;
			let report = run_ws(&terminal, storage, options).await;
			terminal.close().await;
			("ws", args.channels.clone(), report?, Vec::new())
		}
		ChatMode::Dom => {
			let channels = dom_channels(&args.channels);
			let results = run_dom(ctx, &channels, storage, options).await?;
			let (report, sessions) = summarize(results)?;
			("dom", channels, report, sessions)
		}
	};

	for failed in sessions.iter().filter(|s| s.error.is_some()) {
		builder = builder.diagnostic_with_source(
			DiagnosticLevel::Warning,
			format!(
				"#{} session failed: {}",
				failed.channel,
				failed.error.as_deref().unwrap_or_default()
			),
			"chat",
		);
	}
	if report.errors > 0 {
		builder = builder.diagnostic_with_source(
			DiagnosticLevel::Warning,
			format!("{} messages could not be stored", report.errors),
			"storage",
		);
	}

	let result = builder
		.inputs(CommandInputs {
			extra: Some(json!({
				"channels": args.channels,
				"mode": mode,
				"durationSecs": args.duration,
			})),
			..Default::default()
		})
		.data(ChatData {
			mode,
			channels,
			report,
			sessions,
		})
		.config(ctx.effective_config_with_db())
		.build();
	print_result(&result, format);
	Ok(())
}
