//! [`TerminalManager`]: one browser, many logged-in sessions.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::browser::Browser;
use crate::config::TerminalConfig;
use crate::error::{Error, Result};
use crate::session::TerminalSession;

/// Owns the browser and the sessions opened in it.
///
/// Each session gets its own browser context, so cookies, storage and
/// downloads never leak between logins.
pub struct TerminalManager {
	browser: Browser,
	config: Arc<TerminalConfig>,
	sessions: Mutex<HashMap<String, Arc<TerminalSession>>>,
}

impl TerminalManager {
	/// Launches a browser, or attaches to `config.cdp_endpoint` when set.
	pub async fn start(config: TerminalConfig) -> Result<Self> {
		let browser = match &config.cdp_endpoint {
			Some(endpoint) => Browser::connect(endpoint).await?,
			None => Browser::launch(&config.launch).await?,
		};
		Ok(Self::with_browser(browser, config))
	}

	pub fn with_browser(browser: Browser, config: TerminalConfig) -> Self {
		Self {
			browser,
			config: Arc::new(config),
			sessions: Mutex::new(HashMap::new()),
		}
	}

	pub fn browser(&self) -> &Browser {
		&self.browser
	}

	pub fn config(&self) -> &TerminalConfig {
		&self.config
	}

	/// Opens, logs in and loads the configured layout for a new session.
	///
	/// Downloads land in `{downloads_dir}/{id}`.
	pub async fn create_session(&self, id: &str) -> Result<Arc<TerminalSession>> {
		if self.sessions.lock().contains_key(id) {
			return Err(Error::InvalidInput(format!("session '{id}' already exists")));
		}
		let credentials = self.config.require_credentials()?.clone();

		let context = self.browser.new_context().await?;
		let downloads = self.config.downloads_dir.join(id);
		context.set_download_dir(&downloads).await?;
		let page = context.new_page().await?;
		let session = TerminalSession::new(id, page, Arc::clone(&self.config))
			.with_context(context)
			.with_downloads_dir(downloads);

		let ready = async {
			session.open().await?;
			session.login(&credentials).await?;
			session.load_layout(&self.config.layout).await
		};
		if let Err(e) = ready.await {
			if let Err(close_err) = session.close().await {
				warn!(target = "godel", session = id, error = %close_err, "cleanup after failed start");
			}
			return Err(e);
		}

		let session = Arc::new(session);
		self.sessions.lock().insert(id.to_string(), Arc::clone(&session));
		info!(target = "godel", session = id, "session ready");
		Ok(session)
	}

	/// Creates sessions one after another, pausing
	/// [`TerminalConfig::login_stagger`] between logins.
	///
	/// Stops at the first failure; sessions created before it stay open.
	pub async fn create_sessions(&self, ids: &[&str]) -> Result<Vec<Arc<TerminalSession>>> {
		let mut sessions = Vec::with_capacity(ids.len());
		for (i, id) in ids.iter().enumerate() {
			if i > 0 {
				tokio::time::sleep(self.config.login_stagger()).await;
			}
			sessions.push(self.create_session(id).await?);
		}
		Ok(sessions)
	}

	pub fn session(&self, id: &str) -> Result<Arc<TerminalSession>> {
		self.sessions
			.lock()
			.get(id)
			.cloned()
			.ok_or_else(|| Error::SessionNotFound(id.to_string()))
	}

	/// Ids of open sessions, sorted.
	pub fn session_ids(&self) -> Vec<String> {
		let mut ids: Vec<_> = self.sessions.lock().keys().cloned().collect();
		ids.sort();
		ids
	}

	/// Runs `f` once per session concurrently and waits for all of them.
	///
	/// A failing or unknown session does not cancel the others; results come
	/// back in `ids` order.
	pub async fn run_sessions<T, F, Fut>(&self, ids: &[&str], f: F) -> Vec<(String, Result<T>)>
	where
		F: Fn(Arc<TerminalSession>) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		run_each(ids, |id| self.session(id), f).await
	}

	/// Closes one session and its browser context.
	pub async fn close_session(&self, id: &str) -> Result<()> {
		let session = self
			.sessions
			.lock()
			.remove(id)
			.ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
		match Arc::try_unwrap(session) {
			Ok(session) => session.close().await,
			Err(shared) => {
				if let Some(context) = shared.context() {
					context.close().await?;
				}
				Ok(())
			}
		}
	}

	/// Closes every session, then the browser.
	pub async fn shutdown(self) -> Result<()> {
		for id in self.session_ids() {
			if let Err(e) = self.close_session(&id).await {
				warn!(target = "godel", session = %id, error = %e, "session close failed");
			}
		}
		self.browser.close().await?;
		info!(target = "godel", "manager shut down");
		Ok(())
	}
}

/// Resolves every id with `lookup` and drives `f` for all of them at once.
async fn run_each<S, T, L, F, Fut>(ids: &[&str], lookup: L, f: F) -> Vec<(String, Result<T>)>
where
	L: Fn(&str) -> Result<S>,
	F: Fn(S) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let runs = ids.iter().map(|id| {
		let target = lookup(*id);
		let f = &f;
		async move {
			let result = match target {
				Ok(target) => f(target).await,
				Err(e) => Err(e),
			};
			if let Err(e) = &result {
				warn!(target = "godel", session = %id, error = %e, "session run failed");
			}
			(id.to_string(), result)
		}
	});
	join_all(runs).await
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tokio::time::Instant;

	use super::*;

	fn lookup(id: &str) -> Result<u64> {
		match id {
			"slow" => Ok(60),
			"fast" => Ok(5),
			"broken" => Ok(0),
			other => Err(Error::SessionNotFound(other.to_string())),
		}
	}

	async fn nap(ms: u64) -> Result<u64> {
		if ms == 0 {
			return Err(Error::LoginFailed("bad password".into()));
		}
		tokio::time::sleep(Duration::from_millis(ms)).await;
		Ok(ms)
	}

	#[tokio::test]
	async fn results_follow_id_order() {
		let results = run_each(&["slow", "fast"], lookup, nap).await;
		let ids: Vec<_> = results.iter().map(|(id, _)| id.as_str()).collect();
		assert_eq!(ids, ["slow", "fast"]);
		assert_eq!(*results[0].1.as_ref().unwrap(), 60);
		assert_eq!(*results[1].1.as_ref().unwrap(), 5);
	}

	#[tokio::test]
	async fn failures_do_not_cancel_other_sessions() {
		let results = run_each(&["broken", "ghost", "slow"], lookup, nap).await;
		assert!(matches!(results[0].1, Err(Error::LoginFailed(_))));
		assert!(matches!(&results[1].1, Err(Error::SessionNotFound(id)) if id == "ghost"));
		assert_eq!(*results[2].1.as_ref().unwrap(), 60);
	}

	#[tokio::test]
	async fn sessions_run_concurrently() {
		let started = Instant::now();
		let results = run_each(&["slow", "slow", "slow"], lookup, nap).await;
		assert!(results.iter().all(|(_, r)| r.is_ok()));
		assert!(started.elapsed() < Duration::from_millis(170));
	}
}
