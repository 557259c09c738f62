//! Polling loops for the two chat sources.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{ChatMessage, Recorder, StopHandle, extract_message, normalize_channel, parse_frame_json};
use crate::dom::{PageLike, Scope};
use crate::error::Result;
use crate::interceptor::NetworkInterceptor;
use crate::storage::Storage;

const MESSAGE_SELECTORS: [&str; 6] = [
	"[class*='message']",
	".chat-message",
	".message",
	".msg",
	"[data-testid='message']",
	".message-content",
];
const SENDER_SELECTORS: [&str; 6] = [
	".username",
	".sender",
	".author",
	".user",
	"[class*='username']",
	"[class*='sender']",
];

/// Characters of DOM text used to identify a rendered message.
const DOM_KEY_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct MonitorOptions {
	/// Stop after this long; `None` runs until stopped.
	pub duration: Option<Duration>,
	pub poll: Duration,
	/// Only store messages from these channels. `None` stores all.
	pub channels: Option<Vec<String>>,
	/// Dedup keys remembered before the oldest are forgotten.
	pub dedup_capacity: usize,
}

impl Default for MonitorOptions {
	fn default() -> Self {
		Self {
			duration: None,
			poll: Duration::from_millis(200),
			channels: None,
			dedup_capacity: 10_000,
		}
	}
}

/// Message counts for one monitor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
	/// Messages decoded from the source.
	pub seen: usize,
	pub stored: usize,
	pub duplicates: usize,
	/// Dropped by the channel filter.
	pub filtered: usize,
	pub errors: usize,
}

/// Sleeps one poll interval. Returns `false` once stopped or past the
/// deadline.
async fn tick(stop: &mut watch::Receiver<bool>, poll: Duration, deadline: Option<Instant>) -> bool {
	let nap = match deadline {
		Some(deadline) => {
			let left = deadline.saturating_duration_since(Instant::now());
			if left.is_zero() {
				return false;
			}
			poll.min(left)
		}
		None => poll,
	};
	tokio::select! {
		_ = stop.wait_for(|stopped| *stopped) => false,
		_ = tokio::time::sleep(nap) => deadline.is_none_or(|d| Instant::now() < d),
	}
}

/// Stores chat messages decoded from captured WebSocket frames.
///
/// The interceptor must already be capturing with WebSocket frames
/// enabled; the monitor only reads its buffer.
pub struct WsChatMonitor {
	interceptor: Arc<NetworkInterceptor>,
	storage: Arc<dyn Storage>,
	options: MonitorOptions,
	stop: StopHandle,
}

impl WsChatMonitor {
	pub fn new(interceptor: Arc<NetworkInterceptor>, storage: Arc<dyn Storage>, options: MonitorOptions) -> Self {
		Self {
			interceptor,
			storage,
			options,
			stop: StopHandle::new(),
		}
	}

	pub fn stop_handle(&self) -> StopHandle {
		self.stop.clone()
	}

	/// Shares `stop` with other monitors so one signal ends them all.
	pub fn with_stop(mut self, stop: StopHandle) -> Self {
		self.stop = stop;
		self
	}

	/// Polls the frame buffer until the duration elapses or the monitor is
	/// stopped. Frames already buffered when the run starts are included.
	pub async fn run(&self) -> Result<MonitorReport> {
		let mut recorder = Recorder::new(
			Arc::clone(&self.storage),
			self.options.channels.as_deref(),
			self.options.dedup_capacity,
		);
		let mut stop = self.stop.subscribe();
		let deadline = self.options.duration.map(|d| Instant::now() + d);
		let mut cursor = 0;
		info!(target = "godel", channels = ?self.options.channels, "websocket chat monitor started");

		loop {
			let (frames, next) = self.interceptor.frames_since(cursor);
			cursor = next;
			for frame in frames {
				let Some(message) = parse_frame_json(&frame.payload).as_ref().and_then(extract_message) else {
					continue;
				};
				recorder.record(message).await;
			}
			if !tick(&mut stop, self.options.poll, deadline).await {
				break;
			}
		}

		// Frames that arrived during the last sleep.
		let (frames, _) = self.interceptor.frames_since(cursor);
		for frame in frames {
			if let Some(message) = parse_frame_json(&frame.payload).as_ref().and_then(extract_message) {
				recorder.record(message).await;
			}
		}
		info!(target = "godel", stored = recorder.report.stored, "websocket chat monitor stopped");
		Ok(recorder.report)
	}
}

/// One message element as scraped from the chat panel.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct DomEntry {
	pub(super) text: String,
	pub(super) sender: Option<String>,
}

/// Stores chat messages read from the rendered chat panel.
pub struct DomChatMonitor<'a> {
	page: &'a dyn PageLike,
	channel: String,
	storage: Arc<dyn Storage>,
	options: MonitorOptions,
	stop: StopHandle,
}

impl<'a> DomChatMonitor<'a> {
	pub fn new(page: &'a dyn PageLike, channel: &str, storage: Arc<dyn Storage>, options: MonitorOptions) -> Self {
		Self {
			page,
			channel: normalize_channel(channel),
			storage,
			options,
			stop: StopHandle::new(),
		}
	}

	pub fn stop_handle(&self) -> StopHandle {
		self.stop.clone()
	}

	/// Shares `stop` with other monitors so one signal ends them all.
	pub fn with_stop(mut self, stop: StopHandle) -> Self {
		self.stop = stop;
		self
	}

	async fn scrape(&self) -> Result<Vec<DomEntry>> {
		let script = format!(
			"const messages = {messages};
const senders = {senders};
for (const sel of messages) {{
  const out = [];
  for (const el of root.querySelectorAll(sel)) {{
    const text = (el.textContent || '').trim();
    if (!text) continue;
    let sender = null;
    for (const s of senders) {{
      const t = ((el.querySelector(s) || {{}}).textContent || '').trim();
      if (t) {{ sender = t; break; }}
    }}
    out.push({{ text, sender }});
  }}
  if (out.length) return out;
}}
return [];",
			messages = json!(MESSAGE_SELECTORS),
			senders = json!(SENDER_SELECTORS),
		);
		let entries: Option<Vec<DomEntry>> = Scope::page(self.page).eval_typed("chat.messages", &script).await?;
		Ok(entries.unwrap_or_default())
	}

	/// Polls the chat panel until the duration elapses or the monitor is
	/// stopped.
	pub async fn run(&self) -> Result<MonitorReport> {
		let mut recorder = Recorder::new(Arc::clone(&self.storage), None, self.options.dedup_capacity);
		let mut stop = self.stop.subscribe();
		let deadline = self.options.duration.map(|d| Instant::now() + d);
		info!(target = "godel", channel = %self.channel, "dom chat monitor started");

		loop {
			match self.scrape().await {
				Ok(entries) => {
					debug!(target = "godel", count = entries.len(), "chat elements");
					for entry in entries {
						if let Some(message) = dom_message(entry, &self.channel) {
							recorder.record(message).await;
						}
					}
				}
				Err(e) if e.is_target_closed() => return Err(e),
				Err(e) => warn!(target = "godel", error = %e, "chat scrape failed"),
			}
			if !tick(&mut stop, self.options.poll, deadline).await {
				break;
			}
		}
		info!(target = "godel", stored = recorder.report.stored, "dom chat monitor stopped");
		Ok(recorder.report)
	}
}

/// Turns a scraped element into a message, taking the sender from the
/// element or from an `@user: text` prefix.
pub(super) fn dom_message(entry: DomEntry, channel: &str) -> Option<ChatMessage> {
	let mut text = entry.text.trim().to_string();
	if text.is_empty() || (text.contains("(jump to message)") && text.chars().count() < 30) {
		return None;
	}

	let mut sender = entry
		.sender
		.map(|s| s.trim().replace('@', ""))
		.filter(|s| !s.is_empty());
	if sender.is_none() && text.starts_with('@') {
		if let Some((user, rest)) = text.split_once(':') {
			sender = Some(user.replace('@', "").trim().to_string());
			text = rest.trim().to_string();
		}
	}
	let sender = sender.unwrap_or_else(|| "unknown".into());
	let prefix: String = text.chars().take(DOM_KEY_CHARS).collect();
	let id = format!("{sender}:{prefix}");

	Some(ChatMessage {
		raw: json!({ "source": "dom", "id": id }),
		id: Some(id),
		channel: channel.to_string(),
		sender,
		content: text,
		timestamp: Utc::now(),
		kind: "message".into(),
	})
}
