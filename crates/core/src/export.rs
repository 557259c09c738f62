//! CSV and JSON output files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::table::Table;

/// `{dir}/{command}_{ticker}_{YYYYmmdd_HHMMSS}.{ext}`, or
/// `{dir}/{command}_{YYYYmmdd_HHMMSS}.{ext}` without a ticker.
pub fn output_path(dir: &Path, command: &str, ticker: Option<&str>, ext: &str, at: DateTime<Utc>) -> PathBuf {
	let stamp = at.format("%Y%m%d_%H%M%S");
	let name = match ticker {
		Some(t) if !t.is_empty() => format!("{command}_{t}_{stamp}.{ext}"),
		_ => format!("{command}_{stamp}.{ext}"),
	};
	dir.join(sanitize(&name))
}

fn sanitize(name: &str) -> String {
	name.chars()
		.map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
		.collect()
}

fn create_parent(path: &Path) -> Result<()> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent)?;
	}
	Ok(())
}

/// Pretty-printed JSON, parent directories created as needed.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
	create_parent(path)?;
	let mut writer = BufWriter::new(File::create(path)?);
	serde_json::to_writer_pretty(&mut writer, value)?;
	writer.write_all(b"\n")?;
	writer.flush()?;
	Ok(())
}

pub fn write_csv(path: &Path, table: &Table) -> Result<()> {
	create_parent(path)?;
	let mut writer = csv::Writer::from_path(path)?;
	writer.write_record(&table.headers)?;
	for row in &table.rows {
		writer.write_record(row)?;
	}
	writer.flush()?;
	Ok(())
}

/// Reads a CSV with a header row. Ragged rows are accepted.
pub fn read_csv(path: &Path) -> Result<Table> {
	let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
	let headers = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
	let mut rows = Vec::new();
	for record in reader.records() {
		rows.push(record?.iter().map(str::to_string).collect());
	}
	Ok(Table::new(headers, rows))
}
