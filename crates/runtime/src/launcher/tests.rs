use std::path::Path;

use godel_protocol::LaunchOptions;

use super::*;

#[test]
fn parses_devtools_line() {
	let line = "DevTools listening on ws://127.0.0.1:41235/devtools/browser/3f2a-11";
	assert_eq!(
		parse_devtools_line(line).as_deref(),
		Some("ws://127.0.0.1:41235/devtools/browser/3f2a-11")
	);
}

#[test]
fn ignores_unrelated_stderr_lines() {
	assert!(parse_devtools_line("[1234:5678:ERROR:gpu_init.cc(523)] Passthrough is not supported").is_none());
	assert!(parse_devtools_line("DevTools listening on http://oops").is_none());
}

#[test]
fn headless_args() {
	let options = LaunchOptions::new().headless(true).background(true);
	let args = browser_args(&options, Path::new("/tmp/profile"));

	assert!(args.contains(&"--remote-debugging-port=0".to_string()));
	assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
	assert!(args.contains(&"--headless=new".to_string()));
	assert!(args.contains(&"--window-size=1920,1080".to_string()));
	// Headless wins over background: there is no window to hide.
	assert!(!args.iter().any(|a| a.starts_with("--window-position")));
	assert_eq!(args.last().map(String::as_str), Some("about:blank"));
}

#[test]
fn background_args_move_window_offscreen() {
	let options = LaunchOptions::new()
		.background(true)
		.window_size(1280, 800)
		.arg("--lang=en-US");
	let args = browser_args(&options, Path::new("/tmp/p"));

	assert!(args.contains(&"--window-position=-2400,-2400".to_string()));
	assert!(args.contains(&"--window-size=1280,800".to_string()));
	assert!(args.contains(&"--lang=en-US".to_string()));
	assert!(!args.contains(&"--headless=new".to_string()));
}

#[test]
fn explicit_missing_executable_is_reported() {
	let err = find_browser_executable(Some(Path::new("/definitely/not/chrome"))).unwrap_err();
	assert!(err.to_string().contains("/definitely/not/chrome"));
}

#[test]
fn explicit_executable_is_used_verbatim() {
	let dir = tempfile::tempdir().unwrap();
	let fake = dir.path().join("chrome");
	std::fs::write(&fake, b"").unwrap();
	assert_eq!(find_browser_executable(Some(&fake)).unwrap(), fake);
}

#[tokio::test]
async fn ws_endpoints_skip_discovery() {
	let endpoint = "ws://127.0.0.1:9222/devtools/browser/abc";
	assert_eq!(discover_ws_endpoint(endpoint).await.unwrap(), endpoint);
}

#[test]
fn tail_keeps_last_lines() {
	let lines: Vec<String> = (0..8).map(|i| format!("l{i}")).collect();
	assert_eq!(tail(&lines), "l3 | l4 | l5 | l6 | l7");
	assert_eq!(tail(&[]), "no output");
}
