//! Integration tests for commands and failures that never start a browser.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{TimeZone, Utc};
use godel::Storage;
use godel::storage::{NewMessage, NewPdf};
use godel::SqliteStorage;
use serde_json::{Value, json};

const GODEL_VARS: [&str; 10] = [
	"GODEL_URL",
	"GODEL_USERNAME",
	"GODEL_PASSWORD",
	"GODEL_LAYOUT",
	"GODEL_HEADLESS",
	"GODEL_DB_PATH",
	"GODEL_OUTPUT_DIR",
	"GODEL_DOWNLOADS_DIR",
	"GODEL_CHROME",
	"GODEL_CDP_ENDPOINT",
];

fn godel_binary() -> PathBuf {
	let mut path = std::env::current_exe().unwrap();
	path.pop();
	path.pop();
	path.push("godel");
	path
}

/// Runs the binary in `dir` with a clean `GODEL_*` environment.
fn godel(dir: &Path, args: &[&str]) -> (Value, Output) {
	let mut cmd = Command::new(godel_binary());
	cmd.current_dir(dir).args(["-f", "json"]).args(args);
	for var in GODEL_VARS {
		cmd.env_remove(var);
	}
	let output = cmd.output().expect("failed to execute godel");
	let stdout = String::from_utf8_lossy(&output.stdout).to_string();
	let parsed = serde_json::from_str::<Value>(&stdout).unwrap_or_else(|_| json!({ "raw": stdout }));
	(parsed, output)
}

fn db_arg(dir: &Path) -> String {
	dir.join("godel.db").display().to_string()
}

#[test]
fn unknown_terminal_command_is_rejected_before_launch() {
	let dir = tempfile::tempdir().unwrap();
	let (json, output) = godel(dir.path(), &["run", "XYZ", "AAPL"]);

	assert!(!output.status.success());
	assert_eq!(json["ok"], false);
	assert_eq!(json["command"], "run");
	assert_eq!(json["error"]["code"], "UNKNOWN_COMMAND");
	let available = json["error"]["details"]["available"].as_array().unwrap();
	assert!(available.iter().any(|c| c.as_str() == Some("DES")));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("UNKNOWN_COMMAND"), "stderr: {stderr}");
}

#[test]
fn missing_credentials_is_a_config_error() {
	let dir = tempfile::tempdir().unwrap();
	let (json, output) = godel(dir.path(), &["run", "DES", "AAPL"]);

	assert!(!output.status.success());
	assert_eq!(json["error"]["code"], "CONFIG_ERROR");
	let msg = json["error"]["message"].as_str().unwrap_or_default();
	assert!(msg.contains("GODEL_USERNAME"), "message: {msg}");
}

#[test]
fn screener_arguments_are_validated() {
	let dir = tempfile::tempdir().unwrap();

	let (json, _) = godel(dir.path(), &["most", "--tab", "SIDEWAYS"]);
	assert_eq!(json["error"]["code"], "INVALID_INPUT");

	let (json, _) = godel(dir.path(), &["most", "--limit", "33"]);
	assert_eq!(json["error"]["code"], "INVALID_INPUT");
	assert!(json["error"]["message"].as_str().unwrap().contains("33"));
}

#[test]
fn probe_rejects_unknown_filter() {
	let dir = tempfile::tempdir().unwrap();
	let (json, _) = godel(dir.path(), &["probe", "--filter", "smoke-signals"]);
	assert_eq!(json["command"], "probe");
	assert_eq!(json["error"]["code"], "INVALID_INPUT");
}

#[test]
fn messages_on_empty_database() {
	let dir = tempfile::tempdir().unwrap();
	let db = db_arg(dir.path());
	let (json, output) = godel(dir.path(), &["messages", "--db", &db]);

	assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
	assert_eq!(json["ok"], true);
	assert_eq!(json["schemaVersion"], 1);
	assert_eq!(json["data"]["count"], 0);
	assert_eq!(json["config"]["database"], db);
}

#[test]
fn messages_rejects_bad_since() {
	let dir = tempfile::tempdir().unwrap();
	let db = db_arg(dir.path());
	let (json, output) = godel(dir.path(), &["messages", "--db", &db, "--since", "whenever"]);
	assert!(!output.status.success());
	assert_eq!(json["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn stored_history_is_queryable() {
	let dir = tempfile::tempdir().unwrap();
	let db = db_arg(dir.path());
	{
		let storage = SqliteStorage::open(&db).unwrap();
		for (i, (channel, content)) in [("biotech", "XBI ripping"), ("macro", "CPI tomorrow"), ("biotech", "MRNA halted")]
			.into_iter()
			.enumerate()
		{
			storage
				.save_message(&NewMessage {
					channel: channel.into(),
					sender: "trader".into(),
					content: content.into(),
					timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 12, i as u32, 0).unwrap(),
					message_id: Some(format!("m{i}")),
					raw_data: None,
				})
				.await
				.unwrap();
		}
		storage
			.save_pdf_record(&NewPdf {
				ticker: "NVDA".into(),
				command: "RES".into(),
				filename: "nvda.pdf".into(),
				filepath: "/dl/nvda.pdf".into(),
			})
			.await
			.unwrap();
	}

	let (json, _) = godel(dir.path(), &["messages", "--db", &db, "--channel", "#BioTech"]);
	assert_eq!(json["data"]["count"], 2);
	assert_eq!(json["data"]["messages"][0]["content"], "MRNA halted");

	let (json, _) = godel(dir.path(), &["messages", "--db", &db, "--since", "2025-01-01T12:01:00Z"]);
	assert_eq!(json["data"]["count"], 2);

	let (json, _) = godel(dir.path(), &["pdfs", "--db", &db, "--ticker", "nvda"]);
	assert_eq!(json["ok"], true);
	assert_eq!(json["inputs"]["ticker"], "NVDA");
	assert_eq!(json["data"]["pdfs"][0]["filename"], "nvda.pdf");
}

#[test]
fn text_format_prints_error_line() {
	let dir = tempfile::tempdir().unwrap();
	let output = Command::new(godel_binary())
		.current_dir(dir.path())
		.args(["-f", "text", "run", "XYZ", "AAPL"])
		.output()
		.expect("failed to execute godel");
	assert!(!output.status.success());
	assert!(output.stdout.is_empty());
	assert!(String::from_utf8_lossy(&output.stderr).contains("UNKNOWN_COMMAND"));
}
