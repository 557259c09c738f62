//! Command-line front end for Godel Terminal automation.
//!
//! Every subcommand prints one result envelope (see [`output`]) so scripts
//! and agents can consume the same output humans read.

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod logging;
pub mod output;
pub mod styles;
