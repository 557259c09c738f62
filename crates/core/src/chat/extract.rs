//! Heuristic decoding of chat messages from WebSocket payloads.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use super::{ChatMessage, DEFAULT_CHANNEL};

const CONTENT_KEYS: [&str; 5] = ["text", "message", "content", "body", "msg"];
const SENDER_KEYS: [&str; 6] = ["user", "sender", "author", "from", "username", "name"];
const CHANNEL_KEYS: [&str; 4] = ["channel", "room", "chat", "group"];
const TIMESTAMP_KEYS: [&str; 5] = ["timestamp", "ts", "time", "created_at", "date"];
const ID_KEYS: [&str; 4] = ["id", "messageId", "msgId", "_id"];
const NESTED_KEYS: [&str; 5] = ["data", "payload", "body", "message", "event"];
const IGNORED_EVENTS: [&str; 4] = ["typing", "presence", "status", "read_receipt"];

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d %H:%M:%S"];

/// Parses a frame payload as JSON after stripping a Socket.IO packet-type
/// prefix such as `42`.
pub fn parse_frame_json(payload: &str) -> Option<Value> {
	let body = payload.trim_start_matches(|c: char| c.is_ascii_digit());
	if body.is_empty() {
		return None;
	}
	serde_json::from_str(body).ok()
}

/// Finds a chat message in a decoded frame.
///
/// Tried in order: the Socket.IO `{type, data: [event, payload]}` shape, the
/// object itself, objects nested under a common wrapper key, then arrays
/// (a bare `[event, payload]` pair or a list of candidates).
pub fn extract_message(data: &Value) -> Option<ChatMessage> {
	match data {
		Value::Object(map) => {
			if map.contains_key("type") {
				if let Some(Value::Array(items)) = map.get("data") {
					if let [event, Value::Object(payload), ..] = items.as_slice() {
						return parse_message(payload, event.as_str());
					}
				}
			}
			parse_message(map, None).or_else(|| {
				NESTED_KEYS
					.iter()
					.filter_map(|k| map.get(*k).and_then(Value::as_object))
					.find_map(|nested| parse_message(nested, None))
			})
		}
		Value::Array(items) => {
			if let [Value::String(event), Value::Object(payload), ..] = items.as_slice() {
				return parse_message(payload, Some(event.as_str()));
			}
			items
				.iter()
				.filter_map(Value::as_object)
				.find_map(|item| parse_message(item, None))
		}
		_ => None,
	}
}

/// First key from `keys` present in `map`.
fn first_key<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
	keys.iter().find_map(|k| map.get(*k))
}

fn named(value: &Value, keys: &[&str]) -> Option<String> {
	keys.iter()
		.find_map(|k| value.get(*k).and_then(Value::as_str))
		.map(str::to_string)
}

fn parse_message(map: &Map<String, Value>, event: Option<&str>) -> Option<ChatMessage> {
	let content = first_key(map, &CONTENT_KEYS)?.as_str().filter(|s| !s.is_empty())?;

	let kind = event
		.or_else(|| map.get("type").and_then(Value::as_str))
		.unwrap_or("message");
	if IGNORED_EVENTS.contains(&kind) {
		return None;
	}

	let sender = SENDER_KEYS
		.iter()
		.find_map(|k| match map.get(*k) {
			Some(Value::String(s)) => Some(s.clone()),
			Some(v @ Value::Object(_)) => Some(named(v, &["name", "username"]).unwrap_or_else(|| "unknown".into())),
			_ => None,
		})
		.unwrap_or_else(|| "unknown".into());

	let channel = CHANNEL_KEYS
		.iter()
		.find_map(|k| match map.get(*k) {
			Some(Value::String(s)) => Some(s.clone()),
			Some(v @ Value::Object(_)) => Some(named(v, &["name"]).unwrap_or_else(|| DEFAULT_CHANNEL.into())),
			_ => None,
		})
		.unwrap_or_else(|| DEFAULT_CHANNEL.into());

	let timestamp = first_key(map, &TIMESTAMP_KEYS).map_or_else(Utc::now, parse_timestamp);

	let id = first_key(map, &ID_KEYS).map(|v| match v {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	});

	Some(ChatMessage {
		id,
		channel,
		sender,
		content: content.to_string(),
		timestamp,
		kind: kind.to_string(),
		raw: Value::Object(map.clone()),
	})
}

/// Epoch seconds or milliseconds, or one of several date string formats.
/// Anything unparsable is "now".
pub fn parse_timestamp(value: &Value) -> DateTime<Utc> {
	match value {
		Value::Number(n) => n.as_f64().and_then(from_epoch).unwrap_or_else(Utc::now),
		Value::String(s) => parse_date_str(s).unwrap_or_else(Utc::now),
		_ => Utc::now(),
	}
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
	let secs = if value > 1e12 { value / 1000.0 } else { value };
	let whole = secs.trunc();
	let nanos = ((secs - whole) * 1e9).round() as u32;
	Utc.timestamp_opt(whole as i64, nanos.min(999_999_999)).single()
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
	let s = s.trim();
	for format in NAIVE_FORMATS {
		if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
			return Some(naive.and_utc());
		}
	}
	if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
		return date.and_hms_opt(0, 0, 0).map(|d| d.and_utc());
	}
	DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}
