//! Effective configuration and browser/storage setup shared by commands.

use std::sync::Arc;

use godel::{SqliteStorage, TerminalConfig, TerminalManager, TerminalSession};
use tracing::{debug, warn};

use crate::cli::GlobalArgs;
use crate::error::{CliError, Result};
use crate::output::EffectiveConfig;

/// Id of the single session the CLI opens.
pub const SESSION_ID: &str = "main";

/// Resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct CliContext {
	pub config: TerminalConfig,
}

impl CliContext {
	/// Defaults, then the config file, then `GODEL_*` variables, then flags.
	pub fn resolve(args: &GlobalArgs) -> Result<Self> {
		Self::resolve_with(args, |key| std::env::var(key).ok())
	}

	pub fn resolve_with(args: &GlobalArgs, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let base = match &args.config {
			Some(path) => TerminalConfig::load(path)?,
			None => TerminalConfig::default(),
		};
		let mut config = base.apply_env_from(env)?;

		if args.headless {
			config.launch.headless = true;
			config.launch.background = false;
		}
		if args.background {
			config.launch.background = true;
			config.launch.headless = false;
		}
		if let Some(url) = &args.url {
			config.url = url.clone();
		}
		if let Some(layout) = &args.layout {
			config.layout = layout.clone();
		}
		if let Some(db) = &args.db {
			config.database_path = db.clone();
		}
		if let Some(endpoint) = &args.cdp_endpoint {
			config.cdp_endpoint = Some(endpoint.clone());
		}
		debug!(target = "godel", url = %config.url, layout = %config.layout, "resolved config");
		Ok(Self { config })
	}

	pub fn effective_config(&self) -> EffectiveConfig {
		EffectiveConfig {
			url: self.config.url.clone(),
			layout: self.config.layout.clone(),
			headless: self.config.launch.headless,
			background: self.config.launch.background,
			endpoint: self.config.cdp_endpoint.clone(),
			database: None,
		}
	}

	/// Effective config that also names the database, for commands that
	/// touch it.
	pub fn effective_config_with_db(&self) -> EffectiveConfig {
		EffectiveConfig {
			database: Some(self.config.database_path.clone()),
			..self.effective_config()
		}
	}

	pub fn open_storage(&self) -> Result<Arc<SqliteStorage>> {
		Ok(Arc::new(SqliteStorage::open(&self.config.database_path)?))
	}

	/// Launches (or attaches to) the browser and opens a logged-in session.
	///
	/// Credentials are checked before anything is launched.
	pub async fn open_terminal(&self) -> Result<Terminal> {
		self.open_sessions(&[SESSION_ID]).await
	}

	/// Like [`open_terminal`](Self::open_terminal), with one session per id.
	/// Logins are staggered; the browser is shut down if any of them fails.
	pub async fn open_sessions(&self, ids: &[&str]) -> Result<Terminal> {
		self.config.require_credentials()?;
		let manager = TerminalManager::start(self.config.clone()).await?;
		match manager.create_sessions(ids).await {
			Ok(sessions) if !sessions.is_empty() => Ok(Terminal { manager, sessions }),
			Ok(_) => {
				shutdown(manager).await;
				Err(CliError::InvalidInput("no sessions requested".into()))
			}
			Err(e) => {
				shutdown(manager).await;
				Err(e.into())
			}
		}
	}
}

async fn shutdown(manager: TerminalManager) {
	if let Err(e) = manager.shutdown().await {
		warn!(target = "godel", error = %e, "browser shutdown failed");
	}
}

/// A running browser with one or more logged-in sessions.
pub struct Terminal {
	manager: TerminalManager,
	sessions: Vec<Arc<TerminalSession>>,
}

impl Terminal {
	/// The first session opened.
	pub fn session(&self) -> &TerminalSession {
		&self.sessions[0]
	}

	pub fn manager(&self) -> &TerminalManager {
		&self.manager
	}

	/// Closes the sessions and the browser. Failures are logged, not
	/// returned, so they never mask the command's own result.
	pub async fn close(self) {
		let Terminal { manager, sessions } = self;
		drop(sessions);
		shutdown(manager).await;
	}
}
