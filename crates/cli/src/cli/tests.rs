use clap::Parser;

use super::*;

#[test]
fn parse_run_with_defaults() {
	let cli = Cli::try_parse_from(["godel", "run", "des", "aapl"]).unwrap();
	assert_eq!(cli.format, OutputFormat::Toon);
	assert_eq!(cli.verbose, 0);
	match cli.command {
		Commands::Run(args) => {
			assert_eq!(args.command, "des");
			assert_eq!(args.ticker, "aapl");
			assert_eq!(args.asset, "EQ");
			assert!(args.save.is_none());
		}
		other => panic!("expected run, got {other:?}"),
	}
}

#[test]
fn global_flags_after_subcommand() {
	let cli = Cli::try_parse_from([
		"godel", "most", "--tab", "gainers", "-vv", "-f", "json", "--headless", "--db", "/tmp/g.db",
	])
	.unwrap();
	assert_eq!(cli.verbose, 2);
	assert_eq!(cli.format, OutputFormat::Json);
	assert!(cli.global.headless);
	assert_eq!(cli.global.db.as_deref(), Some(std::path::Path::new("/tmp/g.db")));
	match cli.command {
		Commands::Most(args) => {
			assert_eq!(args.tab, "gainers");
			assert_eq!(args.limit, 75);
		}
		other => panic!("expected most, got {other:?}"),
	}
}

#[test]
fn headless_and_background_conflict() {
	assert!(Cli::try_parse_from(["godel", "--headless", "--background", "messages"]).is_err());
}

#[test]
fn prt_requires_tickers() {
	assert!(Cli::try_parse_from(["godel", "prt"]).is_err());
	let cli = Cli::try_parse_from(["godel", "prt", "AAPL", "MSFT"]).unwrap();
	match cli.command {
		Commands::Prt(args) => assert_eq!(args.tickers, vec!["AAPL", "MSFT"]),
		other => panic!("expected prt, got {other:?}"),
	}
}

#[test]
fn chat_mode_and_channels() {
	let cli = Cli::try_parse_from(["godel", "chat", "biotech", "macro", "--mode", "dom", "--duration", "60"]).unwrap();
	assert_eq!(cli.command.name(), "chat");
	match cli.command {
		Commands::Chat(args) => {
			assert_eq!(args.mode, ChatMode::Dom);
			assert_eq!(args.channels, vec!["biotech", "macro"]);
			assert_eq!(args.duration, Some(60));
			assert_eq!(args.poll_ms, 200);
		}
		other => panic!("expected chat, got {other:?}"),
	}
	assert!(Cli::try_parse_from(["godel", "chat", "--mode", "carrier-pigeon"]).is_err());
}

#[test]
fn res_and_probe_defaults() {
	let cli = Cli::try_parse_from(["godel", "res", "--download-pdfs"]).unwrap();
	match cli.command {
		Commands::Res(args) => {
			assert!(args.download_pdfs);
			assert_eq!(args.max_pdfs, 5);
		}
		other => panic!("expected res, got {other:?}"),
	}

	let cli = Cli::try_parse_from(["godel", "probe", "--filter", "websocket"]).unwrap();
	match cli.command {
		Commands::Probe(args) => {
			assert_eq!(args.duration, 30);
			assert_eq!(args.filter, "websocket");
			assert!(args.url_filter.is_none());
		}
		other => panic!("expected probe, got {other:?}"),
	}
}
