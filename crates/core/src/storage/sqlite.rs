use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};

use super::{NewMessage, NewPdf, Storage, StoredMessage, StoredPdf, format_timestamp};
use crate::error::{Error, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chat_messages (
	id INTEGER PRIMARY KEY AUTOINCREMENT,
	channel TEXT NOT NULL,
	sender TEXT,
	content TEXT,
	timestamp DATETIME,
	raw_data TEXT,
	created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
	message_id TEXT,
	UNIQUE(channel, message_id)
);

CREATE TABLE IF NOT EXISTS pdf_downloads (
	id INTEGER PRIMARY KEY AUTOINCREMENT,
	ticker TEXT NOT NULL,
	command TEXT,
	filename TEXT,
	filepath TEXT,
	timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
);
";

const INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_chat_channel ON chat_messages(channel);
CREATE INDEX IF NOT EXISTS idx_chat_ts ON chat_messages(timestamp);
CREATE INDEX IF NOT EXISTS idx_pdf_ticker ON pdf_downloads(ticker);
";

/// Columns of `chat_messages` carried over when an old table is rebuilt.
const MESSAGE_COLUMNS: [&str; 8] = [
	"id",
	"channel",
	"sender",
	"content",
	"timestamp",
	"raw_data",
	"created_at",
	"message_id",
];

/// SQLite-backed [`Storage`].
///
/// One connection shared behind a mutex; every call runs on the blocking
/// thread pool.
#[derive(Clone)]
pub struct SqliteStorage {
	conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStorage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SqliteStorage").finish_non_exhaustive()
	}
}

impl SqliteStorage {
	/// Opens (creating if needed) the database at `path`, in WAL mode.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent)?;
		}
		let conn = Connection::open(path)?;
		let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
		debug!(target = "godel", journal_mode = %mode, "journal mode set");
		let storage = Self::init(conn)?;
		info!(target = "godel", path = %path.display(), "database ready");
		Ok(storage)
	}

	pub fn open_in_memory() -> Result<Self> {
		let storage = Self::init(Connection::open_in_memory()?)?;
		debug!(target = "godel", "in-memory database ready");
		Ok(storage)
	}

	fn init(conn: Connection) -> Result<Self> {
		migrate_unique_constraint(&conn)?;
		conn.execute_batch(SCHEMA)?;
		conn.execute_batch(INDEXES)?;
		Ok(Self {
			conn: Arc::new(Mutex::new(conn)),
		})
	}

	async fn with_conn<T, F>(&self, f: F) -> Result<T>
	where
		T: Send + 'static,
		F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
	{
		let conn = Arc::clone(&self.conn);
		tokio::task::spawn_blocking(move || f(&conn.lock()))
			.await
			.map_err(|e| Error::Io(std::io::Error::other(e)))?
			.map_err(Error::from)
	}
}

/// Rebuilds a `chat_messages` table created without the
/// `UNIQUE(channel, message_id)` constraint, keeping its rows.
fn migrate_unique_constraint(conn: &Connection) -> rusqlite::Result<()> {
	let sql: Option<String> = conn
		.query_row(
			"SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'chat_messages'",
			[],
			|row| row.get(0),
		)
		.optional()?;
	let Some(sql) = sql else {
		return Ok(());
	};
	if sql.contains("UNIQUE") {
		return Ok(());
	}

	let existing: Vec<String> = conn
		.prepare("SELECT name FROM pragma_table_info('chat_messages')")?
		.query_map([], |row| row.get(0))?
		.collect::<rusqlite::Result<_>>()?;
	let carried: Vec<&str> = MESSAGE_COLUMNS
		.iter()
		.copied()
		.filter(|c| existing.iter().any(|e| e == c))
		.collect();
	let columns = carried.join(", ");

	info!(target = "godel", "adding UNIQUE(channel, message_id) to chat_messages");
	let tx = conn.unchecked_transaction()?;
	tx.execute_batch("ALTER TABLE chat_messages RENAME TO chat_messages_old;")?;
	tx.execute_batch("DROP INDEX IF EXISTS idx_chat_channel; DROP INDEX IF EXISTS idx_chat_ts;")?;
	tx.execute_batch(SCHEMA)?;
	tx.execute_batch(&format!(
		"INSERT OR IGNORE INTO chat_messages ({columns}) SELECT {columns} FROM chat_messages_old;
		DROP TABLE chat_messages_old;"
	))?;
	tx.commit()
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
	Ok(StoredMessage {
		id: row.get("id")?,
		channel: row.get("channel")?,
		sender: row.get("sender")?,
		content: row.get("content")?,
		timestamp: row.get("timestamp")?,
		message_id: row.get("message_id")?,
		raw_data: row.get("raw_data")?,
		created_at: row.get("created_at")?,
	})
}

fn pdf_from_row(row: &Row<'_>) -> rusqlite::Result<StoredPdf> {
	Ok(StoredPdf {
		id: row.get("id")?,
		ticker: row.get("ticker")?,
		command: row.get("command")?,
		filename: row.get("filename")?,
		filepath: row.get("filepath")?,
		timestamp: row.get("timestamp")?,
	})
}

#[async_trait]
impl Storage for SqliteStorage {
	async fn save_message(&self, message: &NewMessage) -> Result<Option<i64>> {
		let m = message.clone();
		let timestamp = format_timestamp(&m.timestamp);
		self.with_conn(move |conn| {
			let inserted = conn.execute(
				"INSERT OR IGNORE INTO chat_messages
				 (channel, sender, content, timestamp, raw_data, message_id)
				 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
				params![m.channel, m.sender, m.content, timestamp, m.raw_data, m.message_id],
			)?;
			Ok((inserted > 0).then(|| conn.last_insert_rowid()))
		})
		.await
	}

	async fn query_messages(
		&self,
		channel: Option<&str>,
		since: Option<DateTime<Utc>>,
		limit: usize,
	) -> Result<Vec<StoredMessage>> {
		let mut conditions = Vec::new();
		let mut values: Vec<String> = Vec::new();
		if let Some(channel) = channel {
			conditions.push("channel = ?");
			values.push(channel.to_string());
		}
		if let Some(since) = since {
			conditions.push("timestamp >= ?");
			values.push(format_timestamp(&since));
		}
		let filter = if conditions.is_empty() {
			String::new()
		} else {
			format!("WHERE {}", conditions.join(" AND "))
		};
		let sql = format!(
			"SELECT * FROM chat_messages {filter} ORDER BY timestamp DESC, id DESC LIMIT {}",
			limit as i64
		);
		self.with_conn(move |conn| {
			conn.prepare(&sql)?
				.query_map(params_from_iter(values.iter()), message_from_row)?
				.collect()
		})
		.await
	}

	async fn save_pdf_record(&self, pdf: &NewPdf) -> Result<i64> {
		let p = pdf.clone();
		self.with_conn(move |conn| {
			conn.execute(
				"INSERT INTO pdf_downloads (ticker, command, filename, filepath) VALUES (?1, ?2, ?3, ?4)",
				params![p.ticker, p.command, p.filename, p.filepath],
			)?;
			Ok(conn.last_insert_rowid())
		})
		.await
	}

	async fn query_pdfs(&self, ticker: Option<&str>, limit: usize) -> Result<Vec<StoredPdf>> {
		let ticker = ticker.map(str::to_string);
		let limit = limit as i64;
		self.with_conn(move |conn| match ticker {
			Some(ticker) => conn
				.prepare(
					"SELECT * FROM pdf_downloads WHERE ticker = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
				)?
				.query_map(params![ticker, limit], pdf_from_row)?
				.collect(),
			None => conn
				.prepare("SELECT * FROM pdf_downloads ORDER BY timestamp DESC, id DESC LIMIT ?1")?
				.query_map(params![limit], pdf_from_row)?
				.collect(),
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	use chrono::{Duration, TimeZone};

	use super::*;

	fn message(channel: &str, id: &str, content: &str, minute: u32) -> NewMessage {
		NewMessage {
			channel: channel.into(),
			sender: "alice".into(),
			content: content.into(),
			timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 14, minute, 0).unwrap(),
			message_id: Some(id.into()),
			raw_data: None,
		}
	}

	#[tokio::test]
	async fn duplicate_messages_are_ignored() {
		let db = SqliteStorage::open_in_memory().unwrap();
		let first = db.save_message(&message("general", "m1", "hello", 0)).await.unwrap();
		assert!(first.is_some());
		assert_eq!(db.save_message(&message("general", "m1", "hello", 0)).await.unwrap(), None);
		// Same id in another channel is a different message.
		assert!(db.save_message(&message("biotech", "m1", "hello", 0)).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn messages_filter_by_channel_and_since() {
		let db = SqliteStorage::open_in_memory().unwrap();
		for (i, channel) in ["general", "general", "biotech"].iter().enumerate() {
			db.save_message(&message(channel, &format!("m{i}"), &format!("msg {i}"), i as u32 * 10))
				.await
				.unwrap();
		}

		let general = db.query_messages(Some("general"), None, 10).await.unwrap();
		assert_eq!(general.len(), 2);
		assert_eq!(general[0].content.as_deref(), Some("msg 1"));

		let since = Utc.with_ymd_and_hms(2025, 3, 1, 14, 0, 0).unwrap() + Duration::minutes(5);
		let recent = db.query_messages(None, Some(since), 10).await.unwrap();
		assert_eq!(recent.len(), 2);
		assert!(recent.iter().all(|m| m.content.as_deref() != Some("msg 0")));

		assert_eq!(db.query_messages(None, None, 1).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn pdf_records_filter_by_ticker() {
		let db = SqliteStorage::open_in_memory().unwrap();
		for ticker in ["AAPL", "MSFT", "AAPL"] {
			db.save_pdf_record(&NewPdf {
				ticker: ticker.into(),
				command: "RES".into(),
				filename: format!("{ticker}.pdf"),
				filepath: format!("/tmp/{ticker}.pdf"),
			})
			.await
			.unwrap();
		}
		assert_eq!(db.query_pdfs(Some("AAPL"), 10).await.unwrap().len(), 2);
		let all = db.query_pdfs(None, 10).await.unwrap();
		assert_eq!(all.len(), 3);
		assert_eq!(all[0].ticker, "AAPL");
		assert_eq!(all[0].command.as_deref(), Some("RES"));
	}

	#[test]
	fn old_table_gains_unique_constraint() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("old.db");
		{
			let conn = Connection::open(&path).unwrap();
			conn.execute_batch(
				"CREATE TABLE chat_messages (
					id INTEGER PRIMARY KEY AUTOINCREMENT,
					channel TEXT NOT NULL,
					sender TEXT,
					content TEXT,
					timestamp DATETIME,
					raw_data TEXT,
					created_at DATETIME DEFAULT CURRENT_TIMESTAMP
				);
				CREATE INDEX idx_chat_channel ON chat_messages(channel);
				INSERT INTO chat_messages (channel, sender, content) VALUES ('general', 'bob', 'kept');",
			)
			.unwrap();
		}

		let db = SqliteStorage::open(&path).unwrap();
		let conn = db.conn.lock();
		let sql: String = conn
			.query_row(
				"SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'chat_messages'",
				[],
				|row| row.get(0),
			)
			.unwrap();
		assert!(sql.contains("UNIQUE"));
		let content: String = conn
			.query_row("SELECT content FROM chat_messages", [], |row| row.get(0))
			.unwrap();
		assert_eq!(content, "kept");
	}
}
