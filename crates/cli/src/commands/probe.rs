use std::time::{Duration, Instant};

use godel::interceptor::ProbeOptions;
use godel::{CaptureKind, NetworkInterceptor};
use serde_json::json;

use crate::cli::ProbeArgs;
use crate::context::CliContext;
use crate::error::{CliError, Result};
use crate::output::{CommandInputs, OutputFormat, ResultBuilder, print_result};

pub(super) async fn execute(ctx: &CliContext, args: ProbeArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let kind: CaptureKind = args.filter.parse()?;
	if args.duration == 0 {
		return Err(CliError::InvalidInput("probe duration must be at least one second".into()));
	}
	let options = ProbeOptions {
		duration: Duration::from_secs(args.duration),
		kind,
		url_filter: args.url_filter.clone(),
		save_dir: args.save.clone(),
	};

	let terminal = ctx.open_terminal().await?;
	let interceptor = NetworkInterceptor::new();
	let report = interceptor.probe(terminal.session().page(), &options).await;
	terminal.close().await;
	let report = report?;

	let result = ResultBuilder::new("probe")
		.started_at(started)
		.inputs(CommandInputs {
			output_path: args.save,
			extra: Some(json!({
				"durationSecs": args.duration,
				"filter": kind,
				"urlFilter": args.url_filter,
			})),
			..Default::default()
		})
		.artifacts(report.output_file.clone())
		.data(report)
		.config(ctx.effective_config())
		.build();
	print_result(&result, format);
	Ok(())
}
