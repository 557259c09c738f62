//! Tabular data scraped from windows or loaded from exported CSV files.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
	pub headers: Vec<String>,
	pub rows: Vec<Vec<String>>,
}

impl Table {
	pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
		Self { headers, rows }
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	pub fn column_index(&self, name: &str) -> Option<usize> {
		self.headers.iter().position(|h| h == name)
	}

	/// Cells of column `name`; empty when the column is absent.
	pub fn column(&self, name: &str) -> Vec<&str> {
		match self.column_index(name) {
			Some(i) => self
				.rows
				.iter()
				.map(|row| row.get(i).map(String::as_str).unwrap_or(""))
				.collect(),
			None => Vec::new(),
		}
	}

	/// One JSON object per row keyed by header. Missing cells become `""`,
	/// surplus cells are dropped.
	pub fn records(&self) -> Vec<Map<String, Value>> {
		self.rows
			.iter()
			.map(|row| {
				self.headers
					.iter()
					.enumerate()
					.map(|(i, h)| (h.clone(), Value::String(row.get(i).cloned().unwrap_or_default())))
					.collect()
			})
			.collect()
	}
}

/// Parses terminal number formatting: `$1.2B`, `(3.4%)`, `-12.5`, `850K`,
/// `1,234`. Returns `None` for empty or non-numeric text.
pub fn parse_number(text: &str) -> Option<f64> {
	let mut s: String = text
		.trim()
		.chars()
		.filter(|c| !matches!(c, ',' | '$' | '%' | '+' | ' '))
		.collect();
	let negative = s.starts_with('(') && s.ends_with(')');
	if negative {
		s = s[1..s.len() - 1].to_string();
	}
	if s.is_empty() || s == "-" || s == "--" {
		return None;
	}

	let (digits, scale) = match s.chars().last()?.to_ascii_uppercase() {
		'K' => (&s[..s.len() - 1], 1e3),
		'M' => (&s[..s.len() - 1], 1e6),
		'B' => (&s[..s.len() - 1], 1e9),
		'T' => (&s[..s.len() - 1], 1e12),
		_ => (s.as_str(), 1.0),
	};
	let value = digits.parse::<f64>().ok()? * scale;
	Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_suffixes_and_signs() {
		assert_eq!(parse_number("1.5B"), Some(1.5e9));
		assert_eq!(parse_number("$850K"), Some(850_000.0));
		assert_eq!(parse_number("12.3m"), Some(12_300_000.0));
		assert_eq!(parse_number("-2.45%"), Some(-2.45));
		assert_eq!(parse_number("+0.8%"), Some(0.8));
		assert_eq!(parse_number("(3.5)"), Some(-3.5));
		assert_eq!(parse_number("1,234.5"), Some(1234.5));
	}

	#[test]
	fn rejects_non_numbers() {
		assert_eq!(parse_number(""), None);
		assert_eq!(parse_number("--"), None);
		assert_eq!(parse_number("N/A"), None);
		assert_eq!(parse_number("B"), None);
	}

	#[test]
	fn records_pad_and_truncate() {
		let table = Table::new(
			vec!["Ticker".into(), "Last".into()],
			vec![
				vec!["AAPL".into(), "190.1".into(), "extra".into()],
				vec!["MSFT".into()],
			],
		);
		let records = table.records();
		assert_eq!(records[0]["Last"], "190.1");
		assert_eq!(records[0].len(), 2);
		assert_eq!(records[1]["Last"], "");
		assert_eq!(table.column("Ticker"), ["AAPL", "MSFT"]);
		assert!(table.column("Nope").is_empty());
	}
}
