//! Watching a directory for a browser download to complete.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::wait::{self, WaitOptions};

const PARTIAL_SUFFIXES: [&str; 2] = [".crdownload", ".tmp"];

/// Remembers the files present in a directory so a later call can tell
/// which file a download produced.
#[derive(Debug, Clone)]
pub struct DownloadWatcher {
	dir: PathBuf,
	extension: String,
	before: HashSet<PathBuf>,
}

impl DownloadWatcher {
	/// Snapshots `dir` (created if missing) for files ending in `.{extension}`.
	pub fn snapshot(dir: &Path, extension: &str) -> Result<Self> {
		fs::create_dir_all(dir)?;
		let extension = extension.trim_start_matches('.').to_ascii_lowercase();
		let before = matching_files(dir, &extension)?.into_iter().collect();
		Ok(Self {
			dir: dir.to_path_buf(),
			extension,
			before,
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Completed files that were not present at snapshot time.
	pub fn new_files(&self) -> Result<Vec<PathBuf>> {
		Ok(matching_files(&self.dir, &self.extension)?
			.into_iter()
			.filter(|p| !self.before.contains(p))
			.collect())
	}

	/// Waits for a new file whose size is non-zero and unchanged between two
	/// polls.
	pub async fn wait(&self, timeout: Duration, poll: Duration) -> Result<PathBuf> {
		let options = WaitOptions::new(timeout).with_interval(poll);
		let mut sizes: Vec<(PathBuf, u64)> = Vec::new();
		let condition = format!("new .{} file in {}", self.extension, self.dir.display());
		let found = wait::wait_for(&options, &condition, || {
			let result = self.new_files().map(|files| {
				let current: Vec<(PathBuf, u64)> = files
					.into_iter()
					.filter_map(|p| fs::metadata(&p).ok().map(|m| (p, m.len())))
					.collect();
				let stable = current
					.iter()
					.find(|(path, len)| *len > 0 && sizes.iter().any(|(p, l)| p == path && l == len))
					.map(|(path, _)| path.clone());
				sizes = current;
				stable
			});
			std::future::ready(result)
		})
		.await;

		match found {
			Ok(path) => {
				debug!(target = "godel", path = %path.display(), "download complete");
				Ok(path)
			}
			Err(Error::Timeout { ms, .. }) => Err(Error::Download(format!(
				"no new .{} file in {} after {ms}ms",
				self.extension,
				self.dir.display()
			))),
			Err(e) => Err(e),
		}
	}
}

fn matching_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
	let mut files = Vec::new();
	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if !path.is_file() {
			continue;
		}
		let name = path
			.file_name()
			.map(|n| n.to_string_lossy().to_ascii_lowercase())
			.unwrap_or_default();
		if PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
			continue;
		}
		if name.ends_with(&format!(".{extension}")) {
			files.push(path);
		}
	}
	files.sort();
	Ok(files)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ignores_existing_and_partial_files() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("old.csv"), "a\n1\n").unwrap();
		let watcher = DownloadWatcher::snapshot(dir.path(), ".CSV").unwrap();

		fs::write(dir.path().join("new.csv.crdownload"), "a\n").unwrap();
		fs::write(dir.path().join("notes.txt"), "x").unwrap();
		assert!(watcher.new_files().unwrap().is_empty());

		fs::write(dir.path().join("Export.CSV"), "a\n1\n").unwrap();
		assert_eq!(watcher.new_files().unwrap(), vec![dir.path().join("Export.CSV")]);
	}

	#[tokio::test]
	async fn waits_for_stable_file() {
		let dir = tempfile::tempdir().unwrap();
		let watcher = DownloadWatcher::snapshot(dir.path(), "csv").unwrap();
		let target = dir.path().join("prt.csv");
		let writer = {
			let target = target.clone();
			tokio::spawn(async move {
				tokio::time::sleep(Duration::from_millis(20)).await;
				fs::write(&target, "Ticker\nAAPL\n").unwrap();
			})
		};
		let path = watcher
			.wait(Duration::from_secs(2), Duration::from_millis(5))
			.await
			.unwrap();
		writer.await.unwrap();
		assert_eq!(path, target);
	}

	#[tokio::test]
	async fn timeout_is_a_download_error() {
		let dir = tempfile::tempdir().unwrap();
		let watcher = DownloadWatcher::snapshot(dir.path(), "csv").unwrap();
		let err = watcher
			.wait(Duration::from_millis(20), Duration::from_millis(5))
			.await
			.unwrap_err();
		assert!(matches!(err, Error::Download(_)));
	}
}
