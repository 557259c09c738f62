//! Chat capture: messages read from WebSocket frames or from the rendered
//! chat panel, deduplicated and written through [`Storage`].

mod extract;
mod monitor;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::storage::{NewMessage, Storage};

pub use extract::{extract_message, parse_frame_json, parse_timestamp};
pub use monitor::{DomChatMonitor, MonitorOptions, MonitorReport, WsChatMonitor};

pub const DEFAULT_CHANNEL: &str = "general";

/// Characters of content used in a dedup key when a message has no id.
const KEY_PREFIX_CHARS: usize = 50;
const RAW_DATA_CHARS: usize = 5000;

/// A chat message recovered from a frame or the DOM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
	pub id: Option<String>,
	pub channel: String,
	pub sender: String,
	pub content: String,
	pub timestamp: DateTime<Utc>,
	/// Event name (`message`, ...).
	pub kind: String,
	pub raw: Value,
}

impl ChatMessage {
	/// The message id, or `sender:content-prefix` when there is none.
	pub fn dedup_key(&self) -> String {
		match &self.id {
			Some(id) => id.clone(),
			None => {
				let prefix: String = self.content.chars().take(KEY_PREFIX_CHARS).collect();
				format!("{}:{prefix}", self.sender)
			}
		}
	}

	pub fn to_record(&self) -> NewMessage {
		let raw = match &self.raw {
			Value::Null => None,
			v => Some(v.to_string().chars().take(RAW_DATA_CHARS).collect()),
		};
		NewMessage {
			channel: self.channel.clone(),
			sender: self.sender.clone(),
			content: self.content.clone(),
			timestamp: self.timestamp,
			message_id: Some(self.dedup_key()),
			raw_data: raw,
		}
	}
}

/// Set of seen keys that forgets the oldest once `capacity` is reached.
#[derive(Debug)]
pub(crate) struct Deduper {
	seen: HashSet<String>,
	order: VecDeque<String>,
	capacity: usize,
}

impl Deduper {
	pub(crate) fn new(capacity: usize) -> Self {
		Self {
			seen: HashSet::new(),
			order: VecDeque::new(),
			capacity: capacity.max(1),
		}
	}

	/// True the first time `key` is seen.
	pub(crate) fn insert(&mut self, key: String) -> bool {
		if self.seen.contains(&key) {
			return false;
		}
		if self.order.len() == self.capacity {
			if let Some(oldest) = self.order.pop_front() {
				self.seen.remove(&oldest);
			}
		}
		self.seen.insert(key.clone());
		self.order.push_back(key);
		true
	}
}

/// Cloneable handle that stops a running monitor.
#[derive(Debug, Clone)]
pub struct StopHandle {
	tx: Arc<watch::Sender<bool>>,
}

impl Default for StopHandle {
	fn default() -> Self {
		Self::new()
	}
}

impl StopHandle {
	pub fn new() -> Self {
		let (tx, _) = watch::channel(false);
		Self { tx: Arc::new(tx) }
	}

	pub fn stop(&self) {
		self.tx.send_replace(true);
	}

	pub fn is_stopped(&self) -> bool {
		*self.tx.borrow()
	}

	pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
		self.tx.subscribe()
	}
}

/// Dedup, channel filter and storage shared by both monitors.
pub(crate) struct Recorder {
	storage: Arc<dyn Storage>,
	channels: Option<HashSet<String>>,
	dedup: Deduper,
	pub(crate) report: MonitorReport,
}

impl Recorder {
	pub(crate) fn new(storage: Arc<dyn Storage>, channels: Option<&[String]>, dedup_capacity: usize) -> Self {
		Self {
			storage,
			channels: channels.map(|c| c.iter().map(|s| normalize_channel(s)).collect()),
			dedup: Deduper::new(dedup_capacity),
			report: MonitorReport::default(),
		}
	}

	/// Stores `message` unless it is a repeat or outside the channel
	/// filter. Returns whether a row was written.
	pub(crate) async fn record(&mut self, mut message: ChatMessage) -> bool {
		self.report.seen += 1;
		if !self.dedup.insert(message.dedup_key()) {
			self.report.duplicates += 1;
			return false;
		}
		message.channel = normalize_channel(&message.channel);
		if self
			.channels
			.as_ref()
			.is_some_and(|channels| !channels.contains(&message.channel))
		{
			self.report.filtered += 1;
			return false;
		}

		match self.storage.save_message(&message.to_record()).await {
			Ok(Some(_)) => {
				self.report.stored += 1;
				let preview: String = message.content.chars().take(60).collect();
				tracing::info!(
					target = "godel",
					channel = %message.channel,
					sender = %message.sender,
					"{preview}"
				);
				true
			}
			Ok(None) => {
				self.report.duplicates += 1;
				false
			}
			Err(e) => {
				self.report.errors += 1;
				tracing::error!(target = "godel", error = %e, "failed to store chat message");
				false
			}
		}
	}
}

/// Channels are stored lowercase without the leading `#`.
pub fn normalize_channel(channel: &str) -> String {
	channel.trim().trim_start_matches('#').to_lowercase()
}
