//! Keyboard and mouse input for [`Page`].

use godel_protocol::{InsertTextParams, Key, MouseEventParams};

use super::Page;
use crate::error::Result;

impl Page {
	/// Inserts text at the focused element as if typed.
	pub async fn insert_text(&self, text: &str) -> Result<()> {
		let params = InsertTextParams { text: text.to_string() };
		self.send("Input.insertText", serde_json::to_value(params)?).await?;
		Ok(())
	}

	/// Presses and releases `key`.
	pub async fn press(&self, key: Key) -> Result<()> {
		for event in key.press_events() {
			self.send("Input.dispatchKeyEvent", serde_json::to_value(event)?)
				.await?;
		}
		Ok(())
	}

	/// Left click at viewport coordinates.
	pub async fn click_at(&self, x: f64, y: f64) -> Result<()> {
		for event in MouseEventParams::click_sequence(x, y) {
			self.send("Input.dispatchMouseEvent", serde_json::to_value(event)?)
				.await?;
		}
		Ok(())
	}
}
