//! Commands that type into the terminal: `run`, `most`, `prt`, `res`.

use std::time::Instant;

use anyhow::Context as _;
use chrono::Utc;
use godel::commands::{
	BatchAnalysisCommand, CommandKind, CommandOutput, ResearchCommand, ResearchPdf, ScreenerCommand, ScreenerTab,
	TerminalCommand,
};
use godel::export;
use godel::storage::NewPdf;
use godel::Storage;
use serde_json::{Value, json};
use tracing::info;

use crate::cli::{MostArgs, PrtArgs, ResArgs, RunArgs};
use crate::context::CliContext;
use crate::error::Result;
use crate::output::{CommandInputs, DiagnosticLevel, OutputFormat, ResultBuilder, print_result};

/// Opens a session, runs `command`, and always closes the browser.
async fn execute_once(ctx: &CliContext, command: &dyn TerminalCommand) -> Result<CommandOutput> {
	let terminal = ctx.open_terminal().await?;
	let result = terminal.session().execute(command).await;
	terminal.close().await;
	Ok(result?)
}

fn window_data(output: &CommandOutput) -> Value {
	json!({ "windowId": output.window_id, "result": output.data })
}

pub(super) async fn run(ctx: &CliContext, args: RunArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let kind = CommandKind::parse(&args.command)?;
	let ticker = args.ticker.trim().to_ascii_uppercase();
	let command = kind.build(&ticker, &args.asset);

	let output = execute_once(ctx, command.as_ref()).await?;

	let mut artifacts = output.artifacts.clone();
	if let Some(dir) = &args.save {
		let path = export::output_path(dir, kind.name(), Some(&ticker), "json", Utc::now());
		export::write_json(&path, &output)?;
		info!(target = "godel", path = %path.display(), "result saved");
		artifacts.push(path);
	}

	let result = ResultBuilder::new("run")
		.started_at(started)
		.inputs(CommandInputs {
			command: Some(kind.name().to_string()),
			ticker: Some(ticker),
			output_path: args.save,
			extra: Some(json!({ "asset": args.asset.trim().to_ascii_uppercase() })),
			..Default::default()
		})
		.data(window_data(&output))
		.artifacts(artifacts)
		.command_ms(output.elapsed_ms)
		.config(ctx.effective_config())
		.build();
	print_result(&result, format);
	Ok(())
}

pub(super) async fn most(ctx: &CliContext, args: MostArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let tab: ScreenerTab = args.tab.parse()?;
	let mut command = ScreenerCommand::new(tab, args.limit)?;
	if let Some(dir) = &args.save {
		command = command.save_to(dir);
	}

	let output = execute_once(ctx, &command).await?;

	let result = ResultBuilder::new("most")
		.started_at(started)
		.inputs(CommandInputs {
			command: Some("MOST".into()),
			output_path: args.save,
			extra: Some(json!({ "tab": tab.as_str(), "limit": args.limit })),
			..Default::default()
		})
		.data(window_data(&output))
		.artifacts(output.artifacts.clone())
		.command_ms(output.elapsed_ms)
		.config(ctx.effective_config())
		.build();
	print_result(&result, format);
	Ok(())
}

pub(super) async fn prt(ctx: &CliContext, args: PrtArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let terminal = ctx.open_terminal().await?;
	let command = BatchAnalysisCommand::new(args.tickers, terminal.session().downloads_dir());
	let tickers = command.tickers().to_vec();
	let result = terminal.session().execute(&command).await;
	terminal.close().await;
	let output = result?;

	let result = ResultBuilder::new("prt")
		.started_at(started)
		.inputs(CommandInputs {
			command: Some("PRT".into()),
			tickers: Some(tickers),
			..Default::default()
		})
		.data(window_data(&output))
		.artifacts(output.artifacts.clone())
		.command_ms(output.elapsed_ms)
		.config(ctx.effective_config())
		.build();
	print_result(&result, format);
	Ok(())
}

/// PDFs listed in a `RES` result.
fn downloaded_pdfs(data: &Value) -> anyhow::Result<Vec<ResearchPdf>> {
	match data.get("pdfs") {
		None | Some(Value::Null) => Ok(Vec::new()),
		Some(list) => serde_json::from_value(list.clone()).context("malformed pdf list in RES result"),
	}
}

pub(super) async fn res(ctx: &CliContext, args: ResArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	// Opened first so a bad database path fails before the browser starts.
	let storage = if args.download_pdfs {
		Some(ctx.open_storage()?)
	} else {
		None
	};

	let terminal = ctx.open_terminal().await?;
	let mut command = ResearchCommand::new();
	if args.download_pdfs {
		command = command.download_pdfs(terminal.session().downloads_dir(), args.max_pdfs);
	}
	let result = terminal.session().execute(&command).await;
	terminal.close().await;
	let output = result?;

	let mut builder = ResultBuilder::new("res")
		.started_at(started)
		.inputs(CommandInputs {
			command: Some("RES".into()),
			extra: Some(json!({ "downloadPdfs": args.download_pdfs, "maxPdfs": args.max_pdfs })),
			..Default::default()
		})
		.artifacts(output.artifacts.clone())
		.command_ms(output.elapsed_ms)
		.config(ctx.effective_config_with_db());

	if let Some(storage) = storage {
		let pdfs = downloaded_pdfs(&output.data)?;
		let mut recorded = 0;
		for pdf in &pdfs {
			let record = NewPdf {
				ticker: pdf.ticker.clone(),
				command: "RES".into(),
				filename: pdf.filename.clone(),
				filepath: pdf.filepath.display().to_string(),
			};
			match storage.save_pdf_record(&record).await {
				Ok(_) => recorded += 1,
				Err(e) => {
					builder = builder.diagnostic_with_source(
						DiagnosticLevel::Warning,
						format!("could not record {}: {e}", pdf.filename),
						"storage",
					);
				}
			}
		}
		builder = builder.diagnostic(DiagnosticLevel::Info, format!("recorded {recorded} of {} pdfs", pdfs.len()));
	}

	print_result(&builder.data(window_data(&output)).build(), format);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pdf_list_is_optional() {
		assert!(downloaded_pdfs(&json!({ "items": [] })).unwrap().is_empty());
		assert!(downloaded_pdfs(&json!({ "pdfs": null })).unwrap().is_empty());
	}

	#[test]
	fn pdf_list_parses_paths() {
		let data = json!({
			"pdfs": [{ "ticker": "NVDA", "filename": "nvda_note.pdf", "filepath": "/dl/main/nvda_note.pdf" }]
		});
		let pdfs = downloaded_pdfs(&data).unwrap();
		assert_eq!(pdfs.len(), 1);
		assert_eq!(pdfs[0].ticker, "NVDA");
		assert_eq!(pdfs[0].filepath, std::path::PathBuf::from("/dl/main/nvda_note.pdf"));
	}

	#[test]
	fn malformed_pdf_list_is_an_error() {
		let err = downloaded_pdfs(&json!({ "pdfs": "nope" })).unwrap_err();
		assert!(format!("{err:#}").contains("malformed pdf list"));
	}
}
