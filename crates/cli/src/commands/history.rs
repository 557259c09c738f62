//! Read-only queries over the message and PDF log. No browser needed.

use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use godel::Storage;
use godel::chat::normalize_channel;
use godel::storage::{StoredMessage, StoredPdf};
use serde::Serialize;
use serde_json::json;

use crate::cli::{MessagesArgs, PdfsArgs};
use crate::context::CliContext;
use crate::error::{CliError, Result};
use crate::output::{CommandInputs, OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
struct MessagesData {
	count: usize,
	messages: Vec<StoredMessage>,
}

#[derive(Debug, Serialize)]
struct PdfsData {
	count: usize,
	pdfs: Vec<StoredPdf>,
}

/// RFC 3339, or a bare date meaning midnight UTC.
fn parse_since(text: &str) -> Result<DateTime<Utc>> {
	let text = text.trim();
	if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
		return Ok(ts.with_timezone(&Utc));
	}
	NaiveDate::parse_from_str(text, "%Y-%m-%d")
		.ok()
		.and_then(|d| d.and_hms_opt(0, 0, 0))
		.map(|d| d.and_utc())
		.ok_or_else(|| CliError::InvalidInput(format!("--since: expected RFC 3339 or YYYY-MM-DD, got '{text}'")))
}

pub(super) async fn messages(ctx: &CliContext, args: MessagesArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let since = args.since.as_deref().map(parse_since).transpose()?;
	let channel = args.channel.as_deref().map(normalize_channel);

	let storage = ctx.open_storage()?;
	let messages = storage.query_messages(channel.as_deref(), since, args.limit).await?;

	let result = ResultBuilder::new("messages")
		.started_at(started)
		.inputs(CommandInputs {
			extra: Some(json!({
				"channel": channel,
				"since": since,
				"limit": args.limit,
			})),
			..Default::default()
		})
		.data(MessagesData {
			count: messages.len(),
			messages,
		})
		.config(ctx.effective_config_with_db())
		.build();
	print_result(&result, format);
	Ok(())
}

pub(super) async fn pdfs(ctx: &CliContext, args: PdfsArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let ticker = args.ticker.as_deref().map(|t| t.trim().to_ascii_uppercase());

	let storage = ctx.open_storage()?;
	let pdfs = storage.query_pdfs(ticker.as_deref(), args.limit).await?;

	let result = ResultBuilder::new("pdfs")
		.started_at(started)
		.inputs(CommandInputs {
			ticker: ticker.clone(),
			extra: Some(json!({ "limit": args.limit })),
			..Default::default()
		})
		.data(PdfsData {
			count: pdfs.len(),
			pdfs,
		})
		.config(ctx.effective_config_with_db())
		.build();
	print_result(&result, format);
	Ok(())
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;

	use super::*;

	#[test]
	fn since_accepts_dates_and_timestamps() {
		assert_eq!(
			parse_since("2025-03-01").unwrap(),
			Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
		);
		assert_eq!(
			parse_since("2025-03-01T09:30:00-05:00").unwrap(),
			Utc.with_ymd_and_hms(2025, 3, 1, 14, 30, 0).unwrap()
		);
		assert!(parse_since("last tuesday").is_err());
	}

	#[test]
	fn channel_names_match_stored_form() {
		assert_eq!(normalize_channel(" #BioTech "), "biotech");
		assert_eq!(normalize_channel("macro"), "macro");
	}
}
