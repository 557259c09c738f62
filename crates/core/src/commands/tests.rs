use serde_json::json;

use super::*;
use crate::retry::RetryPolicy;
use crate::testing::{MockAction, MockPage};

fn fast_timeouts() -> Timeouts {
	Timeouts {
		loading_ms: 200,
		batch_ms: 200,
		download_ms: 1_000,
		poll_ms: 1,
		..Timeouts::default()
	}
}

fn ctx<'a>(page: &'a MockPage, timeouts: &'a Timeouts) -> WindowContext<'a> {
	WindowContext {
		page,
		window_id: "w1-window",
		timeouts,
	}
}

#[test]
fn registry_is_case_insensitive() {
	assert_eq!(CommandKind::parse("des").unwrap(), CommandKind::Description);
	assert_eq!(CommandKind::parse(" GIP ").unwrap(), CommandKind::IntradayChart);
	assert_eq!(CommandKind::parse("tran").unwrap(), CommandKind::Transcripts);
}

#[test]
fn unknown_command_lists_known_ones() {
	let err = CommandKind::parse("XYZ").unwrap_err();
	match &err {
		Error::UnknownCommand { name, available } => {
			assert_eq!(name, "XYZ");
			assert_eq!(available, &["DES", "QM", "G", "GIP", "N", "EM", "FA", "TRAN"]);
		}
		other => panic!("unexpected error: {other:?}"),
	}
	assert!(err.to_string().contains("DES, QM, G, GIP"));
}

#[test]
fn built_commands_render_terminal_strings() {
	let cases = [
		(CommandKind::Description, "AAPL EQ DES"),
		(CommandKind::Quote, "AAPL EQ QM"),
		(CommandKind::Chart, "AAPL EQ G"),
		(CommandKind::IntradayChart, "AAPL EQ GIP"),
		(CommandKind::News, "AAPL EQ N"),
		(CommandKind::Earnings, "AAPL EQ EM"),
		(CommandKind::Financials, "AAPL EQ FA"),
		(CommandKind::Transcripts, "AAPL EQ TRAN"),
	];
	for (kind, expected) in cases {
		let cmd = kind.build(" aapl", "eq ");
		assert_eq!(cmd.command_string(), expected);
		assert_eq!(cmd.name(), kind.name());
	}
}

#[tokio::test]
async fn description_extract_assembles_sections() {
	let page = MockPage::new();
	page.on(
		"des.collect",
		json!({
			"ticker": "AAPL",
			"name": "Apple Inc. EQ",
			"badge": "EQ",
			"logoStyle": "background-image: url(\"https://cdn/aapl.png\")",
			"website": "https://apple.com",
			"info": "Cupertino, CA\nTim Cook",
			"descriptions": ["Apple designs phones, computers and services used around the world by a very large number of people. See less"],
			"epsHeaders": ["", "Q1"],
			"epsRows": [["Date", "Jan 25"], ["EPS", "2.35"]],
			"ratings": [
				{ "cells": ["Wedbush", "Dan Ives", "Outperform", "", "2025-01-02"], "targetSpans": ["$300", "→", "$325"] }
			],
			"snapshot": [["P/E", "31.2"]]
		}),
	);
	let timeouts = fast_timeouts();
	let out = DescriptionCommand::new("AAPL", "EQ")
		.extract(&ctx(&page, &timeouts))
		.await
		.unwrap();
	let data = out.data;
	assert_eq!(data["window_id"], "w1-window");
	assert_eq!(data["ticker"], "AAPL");
	assert_eq!(data["company_info"]["company_name"], "Apple Inc.");
	assert_eq!(data["company_info"]["logo_url"], "https://cdn/aapl.png");
	assert_eq!(data["company_info"]["ceo"], "Tim Cook");
	assert!(data["description"].as_str().unwrap().ends_with("people."));
	assert_eq!(data["eps_estimates"]["Q1, Jan 25"], "2.35");
	assert_eq!(data["analyst_ratings"][0]["Target"], "$300→$325");
	assert_eq!(data["snapshot"]["P/E"], "31.2");
	assert!(out.artifacts.is_empty());

	let script = &page.evaluations()[0];
	assert!(script.contains(r#"document.getElementById("w1-window")"#));
}

#[tokio::test]
async fn description_prepare_skips_missing_expanders() {
	let page = MockPage::new();
	let timeouts = fast_timeouts();
	DescriptionCommand::new("AAPL", "EQ")
		.prepare(&ctx(&page, &timeouts))
		.await
		.unwrap();
	assert_eq!(page.evaluations_of("count"), 2);
	assert_eq!(page.evaluations_of("click.dom"), 0);
}

#[tokio::test]
async fn quote_extract_reads_pairs() {
	let page = MockPage::new();
	page.on(
		"qm.collect",
		json!({ "ticker": "MSFT", "pairs": [["Last", "410.2"], ["Bid", "410.1"]] }),
	);
	let timeouts = fast_timeouts();
	let out = QuoteCommand::new("MSFT", "EQ")
		.extract(&ctx(&page, &timeouts))
		.await
		.unwrap();
	assert_eq!(out.data["type"], "quote_monitor");
	assert_eq!(out.data["fields"]["Last"], "410.2");
}

#[tokio::test]
async fn screener_prepare_selects_tab_and_limit() {
	let page = MockPage::new();
	page.on("click.dom", json!(true));
	page.on("select", json!(true));
	let timeouts = fast_timeouts();
	let cmd = ScreenerCommand::new(ScreenerTab::Gainers, 25).unwrap();
	cmd.prepare(&ctx(&page, &timeouts)).await.unwrap();

	let scripts = page.evaluations();
	assert!(scripts.iter().any(|s| s.contains("contains(text(),'GAINERS')")));
	assert!(scripts.iter().any(|s| s.contains("/*godel:select*/") && s.contains(r#""25""#)));
}

#[tokio::test]
async fn screener_extract_waits_for_rows_and_saves() {
	let page = MockPage::new();
	page.on_sequence("count", Some("tbody tr"), vec![json!(0), json!(2)]);
	page.on(
		"most.table",
		json!({
			"headers": ["Ticker", "Last", "Vol"],
			"rows": [["NVDA", "120.5", "45M"], ["AMD", "160", "12K"]]
		}),
	);
	let dir = tempfile::tempdir().unwrap();
	let timeouts = fast_timeouts();
	let cmd = ScreenerCommand::new(ScreenerTab::Active, 75)
		.unwrap()
		.save_to(dir.path());
	let out = cmd.extract(&ctx(&page, &timeouts)).await.unwrap();

	assert_eq!(out.data["row_count"], 2);
	assert_eq!(out.data["tickers"], json!(["NVDA", "AMD"]));
	assert_eq!(out.data["records"][1]["Vol Numeric"], json!(12_000.0));
	assert_eq!(out.artifacts.len(), 2);
	assert!(out.artifacts.iter().all(|p| p.exists()));
	assert!(page.evaluations_of("count") >= 3);
}

#[tokio::test]
async fn screener_empty_table_is_an_extraction_error() {
	let page = MockPage::new();
	page.on("count", json!(1));
	page.on("most.table", json!({ "headers": ["Ticker"], "rows": [] }));
	let timeouts = fast_timeouts();
	let err = ScreenerCommand::new(ScreenerTab::Active, 10)
		.unwrap()
		.extract(&ctx(&page, &timeouts))
		.await
		.unwrap_err();
	assert!(matches!(err, Error::Extraction { .. }));
}

#[tokio::test]
async fn batch_prepare_fills_runs_and_waits() {
	let page = MockPage::new();
	page.on("fill", json!(true));
	page.on("click.dom", json!(true));
	page.on_sequence(
		"prt.progress",
		None,
		vec![
			json!({ "style": "width: 30%", "text": "3 / 10" }),
			json!({ "style": "width: 100%", "text": "10 / 10" }),
		],
	);
	page.on("count", json!(4));
	let timeouts = fast_timeouts();
	let cmd = BatchAnalysisCommand::new(vec!["aapl".into(), "msft".into()], "/tmp/unused");
	cmd.prepare(&ctx(&page, &timeouts)).await.unwrap();

	let fill = page
		.evaluations()
		.into_iter()
		.find(|s| s.contains("/*godel:fill*/"))
		.unwrap();
	assert!(fill.contains(r#""AAPL MSFT""#));
	assert_eq!(page.evaluations_of("prt.progress"), 2);
}

#[tokio::test]
async fn batch_stalled_progress_times_out() {
	let page = MockPage::new();
	page.on("click.dom", json!(true));
	page.on("prt.progress", json!({ "style": "width: 50%", "text": "5 / 10" }));
	let timeouts = Timeouts {
		batch_ms: 20,
		..fast_timeouts()
	};
	let err = BatchAnalysisCommand::new(vec![], "/tmp/unused")
		.prepare(&ctx(&page, &timeouts))
		.await
		.unwrap_err();
	assert!(err.is_timeout());
	assert_eq!(page.evaluations_of("fill"), 0);
}

#[tokio::test]
async fn batch_extract_loads_exported_csv() {
	let dir = tempfile::tempdir().unwrap();
	let page = MockPage::new();
	page.on("click.dom", json!(true));
	page.on(
		"prt.summary",
		json!({
			"performance": [["Top 10", "10", "6", "4", "60%", "1.2%", "0.8%"], ["bad"]],
			"progress": "2 / 2",
			"failures": "1"
		}),
	);
	let timeouts = fast_timeouts();
	let cmd = BatchAnalysisCommand::new(vec!["AAPL".into(), "MSFT".into()], dir.path());

	let export = dir.path().join("prt_export.csv");
	let writer = {
		let export = export.clone();
		tokio::spawn(async move {
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;
			std::fs::write(&export, "Ticker,Score\nAAPL,0.8\nMSFT,0.6\n").unwrap();
		})
	};
	let out = cmd.extract(&ctx(&page, &timeouts)).await.unwrap();
	writer.await.unwrap();

	assert_eq!(out.artifacts, vec![export]);
	assert_eq!(out.data["row_count"], 2);
	assert_eq!(out.data["columns"], json!(["Ticker", "Score"]));
	assert_eq!(out.data["records"][0]["Score"], "0.8");
	assert_eq!(out.data["performance_summary"].as_array().unwrap().len(), 1);
	assert_eq!(out.data["progress"], json!({ "completed": 2, "total": 2 }));
	assert_eq!(out.data["failures"], 1);
}

#[tokio::test]
async fn batch_export_accepts_late_file_from_earlier_click() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("old.csv"), "Ticker\nOLD\n").unwrap();
	let page = MockPage::new();
	page.on("click.dom", json!(true));
	page.on("prt.summary", json!({}));
	let timeouts = Timeouts {
		download_ms: 50,
		..fast_timeouts()
	};
	// The first wait gives up at 50ms, the file lands at 150ms and the
	// second attempt starts at 350ms.
	let cmd = BatchAnalysisCommand::new(vec!["AAPL".into()], dir.path())
		.with_export_policy(RetryPolicy::new(2, std::time::Duration::from_millis(300)));

	let late = dir.path().join("late.csv");
	let writer = {
		let late = late.clone();
		tokio::spawn(async move {
			tokio::time::sleep(std::time::Duration::from_millis(150)).await;
			std::fs::write(&late, "Ticker\nAAPL\n").unwrap();
		})
	};
	let out = cmd.extract(&ctx(&page, &timeouts)).await.unwrap();
	writer.await.unwrap();

	assert_eq!(out.artifacts, vec![late]);
	assert_eq!(out.data["records"][0]["Ticker"], "AAPL");
	assert_eq!(page.evaluations_of("click.dom"), 2);
}

#[tokio::test]
async fn research_prefers_rows_then_falls_back_to_text() {
	let page = MockPage::new();
	page.on(
		"res.collect",
		json!({
			"rows": [[], [["x"]], [], []],
			"text": "Date TickerProviderTitle2025-01-02AAPL.USJPMorganServices revenue beat"
		}),
	);
	let timeouts = fast_timeouts();
	let out = ResearchCommand::new().extract(&ctx(&page, &timeouts)).await.unwrap();
	assert_eq!(out.data["research_items_found"], 1);
	assert_eq!(out.data["items"][0]["provider"], "JPMorgan");

	let rows: Vec<_> = (0..6)
		.map(|i| json!([format!("2025-01-0{}", i + 1), "TSLA.US", "UBS", "Delivery note"]))
		.collect();
	page.on("res.collect", json!({ "rows": [rows, [], [], []], "text": "" }));
	let out = ResearchCommand::new().extract(&ctx(&page, &timeouts)).await.unwrap();
	assert_eq!(out.data["research_items_found"], 6);
	assert_eq!(out.data["items"][5]["date"], "2025-01-06");
}

#[tokio::test]
async fn text_command_reads_window_text() {
	let page = MockPage::new();
	page.on(
		"text.content",
		json!("Transcripts\nQ4 2024 Earnings Call\nQ3 2024 Earnings Call"),
	);
	let timeouts = fast_timeouts();
	let out = TextCommand::new(Some("AAPL".into()), "EQ", TextKind::Transcripts)
		.extract(&ctx(&page, &timeouts))
		.await
		.unwrap();
	assert_eq!(out.data["type"], "transcripts");
	assert_eq!(out.data["available_quarters"].as_array().unwrap().len(), 2);
	assert!(!page.actions().iter().any(|a| matches!(a, MockAction::Press(_))));
}
