//! Append-only log of chat messages and downloaded PDFs.
//!
//! [`Storage`] is the seam monitors and commands write through;
//! [`SqliteStorage`] is the only backend.

mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use sqlite::SqliteStorage;

/// A chat message about to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
	pub channel: String,
	pub sender: String,
	pub content: String,
	pub timestamp: DateTime<Utc>,
	/// Deduplication key; a second message with the same key in the same
	/// channel is ignored.
	pub message_id: Option<String>,
	pub raw_data: Option<String>,
}

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
	pub id: i64,
	pub channel: String,
	pub sender: Option<String>,
	pub content: Option<String>,
	pub timestamp: Option<String>,
	pub message_id: Option<String>,
	pub raw_data: Option<String>,
	pub created_at: Option<String>,
}

/// A downloaded PDF about to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPdf {
	pub ticker: String,
	pub command: String,
	pub filename: String,
	pub filepath: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPdf {
	pub id: i64,
	pub ticker: String,
	pub command: Option<String>,
	pub filename: Option<String>,
	pub filepath: Option<String>,
	pub timestamp: Option<String>,
}

#[async_trait]
pub trait Storage: Send + Sync {
	/// Stores `message`. Returns the new row id, or `None` when a message
	/// with the same channel and id already exists.
	async fn save_message(&self, message: &NewMessage) -> Result<Option<i64>>;

	/// Newest first.
	async fn query_messages(
		&self,
		channel: Option<&str>,
		since: Option<DateTime<Utc>>,
		limit: usize,
	) -> Result<Vec<StoredMessage>>;

	async fn save_pdf_record(&self, pdf: &NewPdf) -> Result<i64>;

	/// Newest first.
	async fn query_pdfs(&self, ticker: Option<&str>, limit: usize) -> Result<Vec<StoredPdf>>;
}

/// Timestamps are stored as RFC 3339 UTC with millisecond precision so they
/// compare correctly as text.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
