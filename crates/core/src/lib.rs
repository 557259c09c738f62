//! godel: automation of the Godel web terminal over the Chrome DevTools Protocol.
//!
//! The crate is organised around the lifecycle of a terminal *window*: a
//! command typed into the terminal input opens a floating window, the window
//! renders asynchronously, and its DOM is scraped into structured data.
//!
//! - [`Browser`], [`BrowserContext`] and [`Page`]: thin CDP wrappers
//! - [`WindowMonitor`]: detects which windows are new after a command
//! - [`wait`] and [`retry`]: polling waits and click fallbacks
//! - [`commands`]: one object per terminal command (`DES`, `QM`, `MOST`, `PRT`, ...)
//! - [`TerminalSession`] and [`TerminalManager`]: logged-in sessions, one
//!   browser context each
//! - [`NetworkInterceptor`] and [`chat`]: traffic capture and chat monitoring
//! - [`storage`] and [`export`]: SQLite log and CSV/JSON output
//!
//! # Example
//!
//! ```ignore
//! use godel::{TerminalConfig, TerminalManager, commands::CommandKind};
//!
//! #[tokio::main]
//! async fn main() -> godel::Result<()> {
//!     let config = TerminalConfig::default().with_env()?;
//!     let manager = TerminalManager::start(config).await?;
//!     let session = manager.create_session("main").await?;
//!
//!     let command = CommandKind::parse("DES")?.build("AAPL", "EQ");
//!     let output = session.execute(command.as_ref()).await?;
//!     println!("{}", output.data);
//!
//!     manager.shutdown().await
//! }
//! ```

pub mod browser;
pub mod chat;
pub mod commands;
pub mod config;
pub mod dom;
pub mod downloads;
pub mod error;
pub mod export;
pub mod interceptor;
pub mod manager;
pub mod page;
pub mod retry;
pub mod session;
pub mod storage;
pub mod table;
pub mod testing;
pub mod wait;
pub mod window;

pub use browser::{Browser, BrowserContext};
pub use config::{Credentials, TerminalConfig, Timeouts};
pub use dom::{BoundingBox, PageLike, Scope, Selector};
pub use error::{Error, Result};
pub use godel_protocol::{Key, LaunchOptions};
pub use interceptor::{CaptureKind, NetworkInterceptor};
pub use manager::TerminalManager;
pub use page::Page;
pub use retry::{ClickStrategy, RetryPolicy};
pub use session::TerminalSession;
pub use storage::{SqliteStorage, Storage};
pub use table::Table;
pub use wait::WaitOptions;
pub use window::WindowMonitor;
