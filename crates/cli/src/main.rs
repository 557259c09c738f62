use clap::Parser;
use godel_cli::{
	cli::Cli,
	commands,
	error::CliError,
	logging,
	output::{self, OutputFormat, ResultBuilder},
};

#[tokio::main]
async fn main() {
	// Credentials usually live in a local .env next to the working directory.
	dotenvy::dotenv().ok();

	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let command = cli.command.name();

	if let Err(err) = commands::dispatch(cli).await {
		handle_error(command, err, format);
		std::process::exit(1);
	}
}

fn handle_error(command: &str, err: CliError, format: OutputFormat) {
	let cmd_error = err.to_command_error();

	output::print_error_stderr(&cmd_error);

	if format != OutputFormat::Text {
		let mut builder: ResultBuilder<()> = ResultBuilder::new(command);
		builder = match cmd_error.details {
			Some(details) => builder.error_with_details(cmd_error.code, cmd_error.message, details),
			None => builder.error(cmd_error.code, cmd_error.message),
		};
		output::print_result(&builder.build(), format);
	}
}
