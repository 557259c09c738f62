//! Help output colors.

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;

/// Cargo-like help colors: green bold headers and usage, cyan literals,
/// yellow placeholders so ticker and channel arguments stand out.
pub fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Yellow.on_default())
		.valid(AnsiColor::Cyan.on_default())
		.invalid(AnsiColor::Red.on_default().bold())
}
