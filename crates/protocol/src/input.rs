//! `Input` domain: synthesized keyboard and mouse events.

use serde::{Deserialize, Serialize};

/// Keys the terminal automation presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
	Enter,
	Escape,
	Tab,
	Backspace,
	/// The backtick that toggles the terminal prompt.
	Backquote,
	Char(char),
}

impl Key {
	pub fn key(&self) -> String {
		match self {
			Key::Enter => "Enter".into(),
			Key::Escape => "Escape".into(),
			Key::Tab => "Tab".into(),
			Key::Backspace => "Backspace".into(),
			Key::Backquote => "`".into(),
			Key::Char(c) => c.to_string(),
		}
	}

	pub fn code(&self) -> String {
		match self {
			Key::Enter => "Enter".into(),
			Key::Escape => "Escape".into(),
			Key::Tab => "Tab".into(),
			Key::Backspace => "Backspace".into(),
			Key::Backquote => "Backquote".into(),
			Key::Char(c) if c.is_ascii_alphabetic() => format!("Key{}", c.to_ascii_uppercase()),
			Key::Char(c) if c.is_ascii_digit() => format!("Digit{c}"),
			Key::Char(_) => String::new(),
		}
	}

	pub fn virtual_key_code(&self) -> i32 {
		match self {
			Key::Enter => 13,
			Key::Escape => 27,
			Key::Tab => 9,
			Key::Backspace => 8,
			Key::Backquote => 192,
			Key::Char(c) if c.is_ascii_alphanumeric() => c.to_ascii_uppercase() as i32,
			Key::Char(_) => 0,
		}
	}

	/// Text the key inserts, if any.
	pub fn text(&self) -> Option<String> {
		match self {
			Key::Enter => Some("\r".into()),
			Key::Backquote => Some("`".into()),
			Key::Char(c) => Some(c.to_string()),
			Key::Escape | Key::Tab | Key::Backspace => None,
		}
	}

	/// The `keyDown`/`keyUp` pair that presses this key.
	pub fn press_events(&self) -> [KeyEventParams; 2] {
		let down = KeyEventParams {
			event_type: if self.text().is_some() {
				KeyEventType::KeyDown
			} else {
				KeyEventType::RawKeyDown
			},
			key: self.key(),
			code: self.code(),
			text: self.text(),
			windows_virtual_key_code: self.virtual_key_code(),
			native_virtual_key_code: self.virtual_key_code(),
		};
		let up = KeyEventParams {
			event_type: KeyEventType::KeyUp,
			text: None,
			..down.clone()
		};
		[down, up]
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyEventType {
	KeyDown,
	KeyUp,
	RawKeyDown,
	Char,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEventParams {
	#[serde(rename = "type")]
	pub event_type: KeyEventType,
	pub key: String,
	pub code: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	pub windows_virtual_key_code: i32,
	pub native_virtual_key_code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseEventType {
	MousePressed,
	MouseReleased,
	MouseMoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
	None,
	Left,
	Middle,
	Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseEventParams {
	#[serde(rename = "type")]
	pub event_type: MouseEventType,
	pub x: f64,
	pub y: f64,
	pub button: MouseButton,
	pub click_count: u32,
}

impl MouseEventParams {
	/// Move, press and release at a point.
	pub fn click_sequence(x: f64, y: f64) -> [MouseEventParams; 3] {
		[
			MouseEventParams {
				event_type: MouseEventType::MouseMoved,
				x,
				y,
				button: MouseButton::None,
				click_count: 0,
			},
			MouseEventParams {
				event_type: MouseEventType::MousePressed,
				x,
				y,
				button: MouseButton::Left,
				click_count: 1,
			},
			MouseEventParams {
				event_type: MouseEventType::MouseReleased,
				x,
				y,
				button: MouseButton::Left,
				click_count: 1,
			},
		]
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertTextParams {
	pub text: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn enter_press_carries_carriage_return() {
		let [down, up] = Key::Enter.press_events();
		assert_eq!(down.event_type, KeyEventType::KeyDown);
		assert_eq!(down.text.as_deref(), Some("\r"));
		assert_eq!(down.windows_virtual_key_code, 13);
		assert_eq!(up.event_type, KeyEventType::KeyUp);
		assert!(up.text.is_none());
	}

	#[test]
	fn escape_uses_raw_key_down() {
		let [down, _] = Key::Escape.press_events();
		assert_eq!(down.event_type, KeyEventType::RawKeyDown);
	}

	#[test]
	fn backquote_matches_terminal_toggle() {
		assert_eq!(Key::Backquote.key(), "`");
		assert_eq!(Key::Backquote.code(), "Backquote");
		assert_eq!(Key::Backquote.virtual_key_code(), 192);
	}

	#[test]
	fn mouse_event_serializes_type_field() {
		let [_, press, _] = MouseEventParams::click_sequence(10.0, 20.0);
		let value = serde_json::to_value(press).unwrap();
		assert_eq!(value["type"], "mousePressed");
		assert_eq!(value["button"], "left");
		assert_eq!(value["clickCount"], 1);
	}
}
