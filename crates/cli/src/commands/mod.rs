//! Subcommand handlers. Each one prints its own envelope on success and
//! returns errors for `main` to report.

mod chat;
mod history;
mod probe;
mod terminal;

use crate::cli::{Cli, Commands};
use crate::context::CliContext;
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let ctx = CliContext::resolve(&cli.global)?;
	let format = cli.format;

	match cli.command {
		Commands::Run(args) => terminal::run(&ctx, args, format).await,
		Commands::Most(args) => terminal::most(&ctx, args, format).await,
		Commands::Prt(args) => terminal::prt(&ctx, args, format).await,
		Commands::Res(args) => terminal::res(&ctx, args, format).await,
		Commands::Chat(args) => chat::execute(&ctx, args, format).await,
		Commands::Probe(args) => probe::execute(&ctx, args, format).await,
		Commands::Messages(args) => history::messages(&ctx, args, format).await,
		Commands::Pdfs(args) => history::pdfs(&ctx, args, format).await,
	}
}
