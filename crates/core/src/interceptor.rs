//! [`NetworkInterceptor`]: records HTTP traffic and WebSocket frames of a
//! page through the CDP `Network` domain.
//!
//! Capture runs in a background task fed by a page event subscription. The
//! frame buffer is bounded: once it holds more than [`MAX_FRAMES`] it keeps
//! only the newest [`KEEP_FRAMES`]. Frames are addressed by a monotonic
//! cursor so readers ([`frames_since`](NetworkInterceptor::frames_since))
//! never see a frame twice even across trims.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use godel_protocol::{Event, RequestWillBeSent, ResponseReceived, WebSocketCreated, WebSocketFrameEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::commands::now_timestamp;
use crate::error::{Error, Result};
use crate::export::{output_path, write_json};
use crate::page::Page;

pub const MAX_FRAMES: usize = 1000;
pub const KEEP_FRAMES: usize = 500;

/// Which traffic a dump or probe covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
	Http,
	#[serde(rename = "websocket")]
	WebSocket,
	#[default]
	All,
}

impl CaptureKind {
	/// Filter name, `None` for [`CaptureKind::All`].
	pub fn filter_name(self) -> Option<&'static str> {
		match self {
			Self::Http => Some("http"),
			Self::WebSocket => Some("websocket"),
			Self::All => None,
		}
	}

	fn includes_http(self) -> bool {
		matches!(self, Self::Http | Self::All)
	}

	fn includes_ws(self) -> bool {
		matches!(self, Self::WebSocket | Self::All)
	}
}

impl FromStr for CaptureKind {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"http" => Ok(Self::Http),
			"websocket" | "ws" => Ok(Self::WebSocket),
			"all" | "" => Ok(Self::All),
			other => Err(Error::InvalidInput(format!(
				"unknown capture kind '{other}' (expected http, websocket or all)"
			))),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedRequest {
	pub url: String,
	pub method: String,
	pub headers: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub post_data: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resource_type: Option<String>,
	pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedResponse {
	pub url: String,
	pub status: i64,
	pub status_text: String,
	pub headers: Value,
	pub mime_type: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resource_type: Option<String>,
	pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameDirection {
	Sent,
	Received,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsFrame {
	pub direction: FrameDirection,
	pub url: String,
	pub opcode: u8,
	pub payload: String,
	pub timestamp: String,
}

/// Snapshot of captured traffic. Sections outside the requested
/// [`CaptureKind`] are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficDump {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub requests: Option<Vec<CapturedRequest>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub responses: Option<Vec<CapturedResponse>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub websocket_frames: Option<Vec<WsFrame>>,
}

impl TrafficDump {
	pub fn counts(&self) -> TrafficCounts {
		TrafficCounts {
			requests: self.requests.as_ref().map_or(0, Vec::len),
			responses: self.responses.as_ref().map_or(0, Vec::len),
			websocket_frames: self.websocket_frames.as_ref().map_or(0, Vec::len),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficCounts {
	pub requests: usize,
	pub responses: usize,
	pub websocket_frames: usize,
}

/// Capture buffers and the event handler that fills them.
#[derive(Debug, Default)]
pub struct CaptureState {
	url_filter: Option<String>,
	capture_ws: bool,
	requests: Vec<CapturedRequest>,
	responses: Vec<CapturedResponse>,
	frames: Vec<WsFrame>,
	/// Cursor of `frames[0]`.
	frame_offset: u64,
	/// WebSocket request id to URL.
	sockets: HashMap<String, String>,
}

impl CaptureState {
	pub fn new(url_filter: Option<String>, capture_ws: bool) -> Self {
		Self {
			url_filter,
			capture_ws,
			..Self::default()
		}
	}

	fn wanted(&self, url: &str) -> bool {
		self.url_filter.as_deref().is_none_or(|f| url.contains(f))
	}

	/// Records `event` if it is a `Network` event this capture cares
	/// about. Returns whether anything was stored.
	pub fn handle_event(&mut self, event: &Event) -> bool {
		match event.method.as_str() {
			"Network.requestWillBeSent" => match event.parse::<RequestWillBeSent>() {
				Ok(ev) if self.wanted(&ev.request.url) => {
					self.requests.push(CapturedRequest {
						url: ev.request.url,
						method: ev.request.method,
						headers: ev.request.headers,
						post_data: ev.request.post_data,
						resource_type: ev.resource_type,
						timestamp: now_timestamp(),
					});
					true
				}
				Ok(_) => false,
				Err(e) => {
					debug!(target = "godel", method = %event.method, error = %e, "unparsable event");
					false
				}
			},
			"Network.responseReceived" => match event.parse::<ResponseReceived>() {
				Ok(ev) if self.wanted(&ev.response.url) => {
					self.responses.push(CapturedResponse {
						url: ev.response.url,
						status: ev.response.status,
						status_text: ev.response.status_text,
						headers: ev.response.headers,
						mime_type: ev.response.mime_type,
						resource_type: ev.resource_type,
						timestamp: now_timestamp(),
					});
					true
				}
				Ok(_) => false,
				Err(e) => {
					debug!(target = "godel", method = %event.method, error = %e, "unparsable event");
					false
				}
			},
			"Network.webSocketCreated" if self.capture_ws => match event.parse::<WebSocketCreated>() {
				Ok(ev) => {
					debug!(target = "godel", url = %ev.url, "websocket opened");
					self.sockets.insert(ev.request_id, ev.url);
					false
				}
				Err(_) => false,
			},
			"Network.webSocketClosed" if self.capture_ws => {
				if let Some(id) = event.params.get("requestId").and_then(Value::as_str) {
					self.sockets.remove(id);
				}
				false
			}
			"Network.webSocketFrameSent" if self.capture_ws => self.record_frame(event, FrameDirection::Sent),
			"Network.webSocketFrameReceived" if self.capture_ws => {
				self.record_frame(event, FrameDirection::Received)
			}
			_ => false,
		}
	}

	fn record_frame(&mut self, event: &Event, direction: FrameDirection) -> bool {
		let Ok(ev) = event.parse::<WebSocketFrameEvent>() else {
			return false;
		};
		let url = self.sockets.get(&ev.request_id).cloned().unwrap_or_default();
		if !self.wanted(&url) {
			return false;
		}
		self.push_frame(WsFrame {
			direction,
			url,
			opcode: ev.response.opcode as u8,
			payload: ev.response.payload_data,
			timestamp: now_timestamp(),
		});
		true
	}

	pub fn push_frame(&mut self, frame: WsFrame) {
		self.frames.push(frame);
		if self.frames.len() > MAX_FRAMES {
			let dropped = self.frames.len() - KEEP_FRAMES;
			self.frames.drain(..dropped);
			self.frame_offset += dropped as u64;
		}
	}

	/// Cursor one past the newest frame.
	pub fn frame_cursor(&self) -> u64 {
		self.frame_offset + self.frames.len() as u64
	}

	/// Frames at or after `cursor` and the cursor to pass next time.
	/// Frames trimmed before they were read are skipped.
	pub fn frames_since(&self, cursor: u64) -> (Vec<WsFrame>, u64) {
		let start = cursor.saturating_sub(self.frame_offset) as usize;
		let frames = self.frames.get(start..).map(<[WsFrame]>::to_vec).unwrap_or_default();
		(frames, self.frame_cursor())
	}

	/// Empties the buffers. Cursors keep counting up.
	pub fn clear(&mut self) {
		self.requests.clear();
		self.responses.clear();
		self.frame_offset = self.frame_cursor();
		self.frames.clear();
	}

	pub fn dump(&self, kind: CaptureKind) -> TrafficDump {
		TrafficDump {
			requests: kind.includes_http().then(|| self.requests.clone()),
			responses: kind.includes_http().then(|| self.responses.clone()),
			websocket_frames: kind.includes_ws().then(|| self.frames.clone()),
		}
	}
}

/// Options for [`NetworkInterceptor::probe`].
#[derive(Debug, Clone)]
pub struct ProbeOptions {
	pub duration: Duration,
	pub kind: CaptureKind,
	pub url_filter: Option<String>,
	/// Directory for `probe_{timestamp}.json`; nothing is written when unset.
	pub save_dir: Option<PathBuf>,
}

impl Default for ProbeOptions {
	fn default() -> Self {
		Self {
			duration: Duration::from_secs(30),
			kind: CaptureKind::All,
			url_filter: None,
			save_dir: None,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
	pub success: bool,
	pub duration_seconds: f64,
	pub filter_type: Option<&'static str>,
	pub url_filter: Option<String>,
	pub counts: TrafficCounts,
	pub data: TrafficDump,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub output_file: Option<PathBuf>,
}

/// Page traffic recorder.
///
/// One capture runs at a time; starting again replaces the previous
/// filter without dropping what was already recorded.
#[derive(Default)]
pub struct NetworkInterceptor {
	state: Arc<Mutex<CaptureState>>,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for NetworkInterceptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NetworkInterceptor")
			.field("running", &self.is_running())
			.field("frame_cursor", &self.frame_cursor())
			.finish()
	}
}

impl NetworkInterceptor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Enables the `Network` domain on `page` and starts recording.
	pub async fn start(&self, page: &Page, url_filter: Option<&str>, capture_ws: bool) -> Result<()> {
		self.stop();
		{
			let mut state = self.state.lock();
			state.url_filter = url_filter.map(str::to_string);
			state.capture_ws = capture_ws;
		}

		let mut events = page.subscribe("Network.");
		page.send("Network.enable", json!({})).await?;
		let state = Arc::clone(&self.state);
		let task = tokio::spawn(async move {
			while let Some(event) = events.recv().await {
				state.lock().handle_event(&event);
			}
			debug!(target = "godel", "network event stream ended");
		});
		*self.task.lock() = Some(task);
		info!(target = "godel", url_filter = ?url_filter, capture_ws, "network capture started");
		Ok(())
	}

	pub fn is_running(&self) -> bool {
		self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
	}

	/// Stops recording. Captured data is kept until [`clear`](Self::clear).
	pub fn stop(&self) {
		if let Some(task) = self.task.lock().take() {
			task.abort();
			debug!(target = "godel", "network capture stopped");
		}
	}

	pub fn clear(&self) {
		self.state.lock().clear();
	}

	pub fn dump(&self, kind: CaptureKind) -> TrafficDump {
		self.state.lock().dump(kind)
	}

	pub fn frame_cursor(&self) -> u64 {
		self.state.lock().frame_cursor()
	}

	pub fn frames_since(&self, cursor: u64) -> (Vec<WsFrame>, u64) {
		self.state.lock().frames_since(cursor)
	}

	/// Appends a frame captured outside this interceptor's own task.
	pub fn push_frame(&self, frame: WsFrame) {
		self.state.lock().push_frame(frame);
	}

	/// Captures traffic for `options.duration`, then reports counts and
	/// the dump, saving it as JSON when `options.save_dir` is set.
	pub async fn probe(&self, page: &Page, options: &ProbeOptions) -> Result<ProbeReport> {
		self.clear();
		self.start(page, options.url_filter.as_deref(), options.kind.includes_ws())
			.await?;
		info!(
			target = "godel",
			seconds = options.duration.as_secs_f64(),
			filter = ?options.kind.filter_name(),
			"probe started"
		);
		tokio::time::sleep(options.duration).await;
		self.stop();

		let data = self.dump(options.kind);
		let counts = data.counts();
		info!(
			target = "godel",
			requests = counts.requests,
			responses = counts.responses,
			websocket_frames = counts.websocket_frames,
			"probe complete"
		);
		let mut report = ProbeReport {
			success: true,
			duration_seconds: options.duration.as_secs_f64(),
			filter_type: options.kind.filter_name(),
			url_filter: options.url_filter.clone(),
			counts,
			data,
			output_file: None,
		};
		if let Some(dir) = &options.save_dir {
			let path = output_path(dir, "probe", None, "json", Utc::now());
			write_json(&path, &report)?;
			info!(target = "godel", path = %path.display(), "probe saved");
			report.output_file = Some(path);
		}
		Ok(report)
	}
}

impl Drop for NetworkInterceptor {
	fn drop(&mut self) {
		if let Some(task) = self.task.get_mut().take() {
			task.abort();
		}
	}
}
