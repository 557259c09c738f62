//! `G` and `GIP`: daily and intraday charts.
//!
//! Chart windows render to canvas, so only the ticker is read back.

use async_trait::async_trait;
use serde_json::json;

use super::{Extracted, TerminalCommand, WindowContext, now_timestamp, ticker_command};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
	Daily,
	Intraday,
}

impl ChartKind {
	pub fn mnemonic(&self) -> &'static str {
		match self {
			Self::Daily => "G",
			Self::Intraday => "GIP",
		}
	}

	fn data_type(&self) -> &'static str {
		match self {
			Self::Daily => "chart",
			Self::Intraday => "intraday_chart",
		}
	}
}

pub struct ChartCommand {
	ticker: String,
	asset_class: String,
	kind: ChartKind,
}

impl ChartCommand {
	pub fn new(ticker: impl Into<String>, asset_class: impl Into<String>, kind: ChartKind) -> Self {
		Self {
			ticker: ticker.into(),
			asset_class: asset_class.into(),
			kind,
		}
	}
}

#[async_trait]
impl TerminalCommand for ChartCommand {
	fn name(&self) -> &str {
		self.kind.mnemonic()
	}

	fn command_string(&self) -> String {
		ticker_command(&self.ticker, &self.asset_class, self.kind.mnemonic())
	}

	async fn extract(&self, ctx: &WindowContext<'_>) -> Result<Extracted> {
		let ticker = ctx.scope().attribute("input[value]", "value").await?;
		Ok(json!({
			"timestamp": now_timestamp(),
			"window_id": ctx.window_id,
			"ticker": ticker.filter(|t| !t.is_empty()),
			"type": self.kind.data_type(),
			"kind": self.kind.mnemonic(),
		})
		.into())
	}
}
