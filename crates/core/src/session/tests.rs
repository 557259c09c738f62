use async_trait::async_trait;
use serde_json::json;

use super::*;
use crate::commands::Extracted;
use crate::config::Timeouts;
use crate::testing::{MockAction, MockPage};

fn config() -> Arc<TerminalConfig> {
	Arc::new(TerminalConfig {
		timeouts: Timeouts {
			window_ms: 100,
			loading_ms: 50,
			login_ms: 50,
			poll_ms: 1,
			..Timeouts::default()
		},
		..TerminalConfig::default()
	})
}

fn session(page: MockPage) -> TerminalSession<MockPage> {
	TerminalSession::new("test", page, config())
}

#[tokio::test]
async fn login_fills_form_and_waits_for_terminal() {
	let page = MockPage::new();
	page.on("count", json!(1));
	page.on("click.dom", json!(true));
	page.on("fill", json!(true));
	page.on_matching("visible", "Login", json!(false));
	let session = session(page);

	session
		.login(&Credentials::new("trader@example.com", "s3cret"))
		.await
		.unwrap();

	let page = session.page();
	let fills: Vec<String> = page
		.evaluations()
		.into_iter()
		.filter(|s| s.contains("/*godel:fill*/"))
		.collect();
	assert_eq!(fills.len(), 2);
	assert!(fills[0].contains("autocomplete='username'") && fills[0].contains("trader@example.com"));
	assert!(fills[1].contains("current-password") && fills[1].contains("s3cret"));
	assert_eq!(page.evaluations_of("click.dom"), 2);
}

#[tokio::test]
async fn login_modal_that_stays_open_fails() {
	let page = MockPage::new();
	page.on("count", json!(1));
	page.on("click.dom", json!(true));
	page.on("fill", json!(true));
	page.on_matching("visible", "Login", json!(true));
	let err = session(page)
		.login(&Credentials::new("me", "wrong"))
		.await
		.unwrap_err();
	assert!(matches!(err, Error::LoginFailed(m) if m.contains("still open")));
}

#[tokio::test]
async fn missing_layout_is_reported_by_name() {
	let err = session(MockPage::new()).load_layout("research").await.unwrap_err();
	assert!(matches!(err, Error::LayoutNotFound(name) if name == "research"));
}

#[test]
fn layout_names_are_quoted_for_xpath() {
	assert_eq!(xpath_literal("research"), "'research'");
	assert_eq!(xpath_literal("Bob's desk"), "\"Bob's desk\"");
	assert_eq!(
		xpath_literal(r#"Bob's "main""#),
		r#"concat('Bob', "'", 's "main"')"#
	);
}

#[tokio::test]
async fn layout_with_quotes_is_found_and_clicked() {
	let page = MockPage::new();
	page.on("count", json!(1));
	page.on("click.dom", json!(true));
	let session = session(page);
	session.load_layout(r#"Bob's "main""#).await.unwrap();
	assert!(
		session
			.page()
			.evaluations()
			.iter()
			.any(|s| s.contains("concat('Bob'"))
	);
}

#[tokio::test]
async fn send_command_clears_types_and_submits() {
	let page = MockPage::new();
	page.on("fill", json!(true));
	let session = session(page);
	session.send_command("AAPL EQ DES").await.unwrap();

	let actions = session.page().actions();
	let fill = actions
		.iter()
		.position(|a| matches!(a, MockAction::Evaluate(s) if s.contains("#terminal-input")))
		.unwrap();
	let typed = actions
		.iter()
		.position(|a| *a == MockAction::InsertText("AAPL EQ DES".into()))
		.unwrap();
	assert!(fill < typed);
	assert_eq!(actions.last(), Some(&MockAction::Press(Key::Enter)));
}

#[tokio::test]
async fn open_terminal_presses_backquote() {
	let page = MockPage::new();
	page.on("count", json!(1));
	let session = session(page);
	session.open_terminal().await.unwrap();
	assert_eq!(session.page().pressed(), vec![Key::Backquote]);
}

struct Probe;

#[async_trait]
impl TerminalCommand for Probe {
	fn name(&self) -> &str {
		"PROBE"
	}

	fn command_string(&self) -> String {
		"AAPL EQ PROBE".into()
	}

	async fn prepare(&self, ctx: &WindowContext<'_>) -> Result<()> {
		ctx.scope().eval("probe.prepare", "return true;").await?;
		Ok(())
	}

	async fn extract(&self, ctx: &WindowContext<'_>) -> Result<Extracted> {
		Ok(json!({ "window": ctx.window_id }).into())
	}
}

#[tokio::test]
async fn execute_runs_window_lifecycle() {
	let page = MockPage::new();
	page.on("fill", json!(true));
	page.on_sequence(
		"windows",
		None,
		vec![json!(["old-window"]), json!(["old-window"]), json!(["old-window", "new-window"])],
	);
	let session = session(page);

	let output = session.execute(&Probe).await.unwrap();
	assert_eq!(output.command, "AAPL EQ PROBE");
	assert_eq!(output.window_id, "new-window");
	assert_eq!(output.data["window"], "new-window");
	assert!(session.monitor().is_tracked("new-window"));

	let scripts = session.page().evaluations();
	let prepare = scripts.iter().position(|s| s.contains("/*godel:probe.prepare*/")).unwrap();
	assert!(scripts[prepare].contains(r#"document.getElementById("new-window")"#));
	assert!(session.page().evaluations_of("visible") >= 1);
}

#[tokio::test]
async fn execute_without_new_window_fails() {
	let page = MockPage::new();
	page.on("fill", json!(true));
	page.on("windows", json!(["old-window"]));
	let err = session(page).execute(&Probe).await.unwrap_err();
	assert!(matches!(err, Error::NoNewWindow { command, .. } if command == "PROBE"));
}

#[tokio::test]
async fn close_all_windows_untracks_everything() {
	let page = MockPage::new();
	page.on_matching("count", "anticon-close", json!(1));
	page.on("click.dom", json!(true));
	let session = session(page);
	session.monitor().track("a-window");
	session.monitor().track("b-window");

	assert_eq!(session.close_all_windows().await.unwrap(), 2);
	assert!(session.monitor().tracked().is_empty());
}

#[tokio::test]
async fn chat_channel_requires_channel_link() {
	let page = MockPage::new();
	let err = session(page).open_chat_channel("#biotech").await.unwrap_err();
	assert!(matches!(err, Error::ElementNotFound { selector } if selector == "text=#biotech"));
}

#[tokio::test]
async fn chat_channel_clicks_through_panel() {
	let page = MockPage::new();
	page.on("count", json!(1));
	page.on("click.dom", json!(true));
	let session = session(page);
	session.open_chat_channel("general").await.unwrap();

	let clicks: Vec<String> = session
		.page()
		.evaluations()
		.into_iter()
		.filter(|s| s.contains("/*godel:click.dom*/"))
		.collect();
	assert_eq!(clicks.len(), 3);
	assert!(clicks[0].contains("CHAT"));
	assert!(clicks[1].contains("Public Channels"));
	assert!(clicks[2].contains("text=#general"));
}
