//! End-to-end integration tests for the actloop turn orchestrator.
//!
//! These tests drive full turns from user input to observations with a
//! scripted model and the real built-in tools, inside a temporary workspace.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use actloop_agent::{CollectingSink, TurnEvent, TurnOrchestrator, TurnStatus, VerificationRunner};
use actloop_config::{ApprovalLevel, ToolsConfig, VerifyMode};
use actloop_core::{
    AutoConfirm, Completion, Provider, ProviderError, ProviderRequest, ProviderResponse,
    RecordKind, Role, Usage,
};
use actloop_security::{ApprovalPolicy, AuditLog};
use actloop_tools::{ProjectDiscovery, default_registry};
use serde_json::json;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence and keeps
/// every request it saw.
struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<Completion, ProviderError> {
        let call = self.calls();
        self.requests.lock().unwrap().push(request);
        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider exhausted at call #{call}"));
        Ok(Completion::Full(ProviderResponse {
            text,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            reasoning: None,
        }))
    }
}

fn contract(actions: serde_json::Value) -> String {
    format!(
        "Here is my plan.\n```json\n{}\n```",
        json!({ "plan": ["do it"], "actions": actions })
    )
}

fn done(message: &str) -> String {
    json!({ "actions": [], "message": message }).to_string()
}

fn orchestrator(
    provider: Arc<ScriptedProvider>,
    root: &Path,
    level: ApprovalLevel,
) -> TurnOrchestrator {
    TurnOrchestrator::new(provider, default_registry(root, &ToolsConfig::default()), "mock")
        .with_policy(ApprovalPolicy::new(level))
        .with_max_passes(4)
}

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn git(dir: &Path, args: &[&str]) -> std::process::Output {
    std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    git(dir, &["config", "user.email", "dev@example.com"]);
    git(dir, &["config", "user.name", "Dev"]);
}

// ── E2E: files ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_write_then_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        contract(json!([{"type": "write_file", "path": "src/hello.txt", "content": "hello world\n"}])),
        contract(json!([{"type": "open_file", "path": "src/hello.txt"}])),
        done("Created src/hello.txt."),
    ]);
    let mut orch = orchestrator(provider.clone(), dir.path(), ApprovalLevel::Auto);

    let outcome = orch.run_turn("create a hello file").await;

    assert_eq!(outcome.status, TurnStatus::Answered);
    assert_eq!(outcome.passes, 3);
    assert_eq!(outcome.reply.as_deref(), Some("Created src/hello.txt."));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/hello.txt")).unwrap(),
        "hello world\n"
    );

    // The third request carries both passes' feedback, the read back included.
    let third = provider.request(2);
    let observations: Vec<_> = third
        .messages
        .iter()
        .filter(|m| m.role == Role::Assistant && m.content.starts_with("Observations:"))
        .collect();
    assert_eq!(observations.len(), 2);
    assert!(observations[1].content.contains("hello world"));
}

#[tokio::test]
async fn e2e_path_escape_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = dir.path().join("ws");
    std::fs::create_dir(&workspace).unwrap();
    let provider = ScriptedProvider::new(vec![
        contract(json!([{"type": "write_file", "path": "../outside.txt", "content": "x"}])),
        done("Could not write there."),
    ]);
    let mut orch = orchestrator(provider.clone(), &workspace, ApprovalLevel::Auto);

    orch.run_turn("write outside").await;

    assert!(!dir.path().join("outside.txt").exists());
    let feedback = &provider.request(1).messages;
    assert!(
        feedback
            .last()
            .unwrap()
            .content
            .contains("write_file ../outside.txt (1 bytes): permission denied")
    );
}

#[tokio::test]
async fn e2e_safe_mode_declines_without_a_human() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        contract(json!([{"type": "write_file", "path": "a.txt", "content": "a"}])),
        done("Skipped."),
    ]);
    let sink = Arc::new(CollectingSink::new());
    let mut orch = orchestrator(provider, dir.path(), ApprovalLevel::Safe)
        .with_confirm(Arc::new(AutoConfirm(false)))
        .with_sink(sink.clone());

    orch.run_turn("write a").await;

    assert!(!dir.path().join("a.txt").exists());
    assert!(sink.events().iter().any(|e| matches!(
        e,
        TurnEvent::ActionFinished { outcome, .. } if outcome == "skipped"
    )));
}

// ── E2E: commands ────────────────────────────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn e2e_failed_command_does_not_stop_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        contract(json!([
            {"type": "run", "cmd": "echo first > one.txt"},
            {"type": "run", "cmd": "echo broken >&2; exit 3"},
            {"type": "run", "cmd": "echo third > three.txt"}
        ])),
        done("Two of three worked."),
    ]);
    let mut orch = orchestrator(provider.clone(), dir.path(), ApprovalLevel::Auto);

    let outcome = orch.run_turn("run three commands").await;

    assert_eq!(outcome.status, TurnStatus::Answered);
    assert!(dir.path().join("one.txt").exists());
    assert!(dir.path().join("three.txt").exists());
    let block = provider.request(1).messages.last().unwrap().content.clone();
    assert!(block.contains("### 2. run `echo broken >&2; exit 3`: non-zero exit"));
    assert!(block.contains("broken"));
    assert!(block.contains("### 3. run `echo third > three.txt`: ok"));
}

#[cfg(unix)]
#[tokio::test]
async fn e2e_declined_destructive_command_never_runs() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("keep.txt"), "keep").unwrap();
    let provider = ScriptedProvider::new(vec![
        contract(json!([{"type": "run", "cmd": "rm -rf keep.txt"}])),
        done("Left it alone."),
    ]);
    let mut orch = orchestrator(provider, dir.path(), ApprovalLevel::Balanced)
        .with_confirm(Arc::new(AutoConfirm(false)));

    orch.run_turn("clean up").await;

    assert!(dir.path().join("keep.txt").exists());
}

// ── E2E: git and patches ─────────────────────────────────────────────────

#[tokio::test]
async fn e2e_patch_then_diff_in_repo() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    std::fs::write(dir.path().join("greet.txt"), "hello\nworld\n").unwrap();
    git(dir.path(), &["add", "greet.txt"]);
    git(dir.path(), &["commit", "-q", "-m", "init"]);

    let patch = "--- a/greet.txt\n+++ b/greet.txt\n@@ -1,2 +1,2 @@\n hello\n-world\n+there\n";
    let provider = ScriptedProvider::new(vec![
        contract(json!([
            {"type": "apply_patch", "path": "greet.txt", "patch": patch},
            {"type": "git", "subtool": "diff", "args": {"staged": true}}
        ])),
        done("Patched."),
    ]);
    let mut orch = orchestrator(provider.clone(), dir.path(), ApprovalLevel::Auto);

    let outcome = orch.run_turn("say hello there").await;

    assert_eq!(outcome.status, TurnStatus::Answered);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("greet.txt")).unwrap(),
        "hello\nthere\n"
    );
    let block = provider.request(1).messages.last().unwrap().content.clone();
    assert!(block.contains("apply_patch greet.txt"));
    assert!(block.contains("+there"));
}

#[tokio::test]
async fn e2e_commit_flow_with_approval() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let provider = ScriptedProvider::new(vec![
        contract(json!([
            {"type": "write_file", "path": "notes.md", "content": "# Notes\n"},
            {"type": "git", "subtool": "add", "args": {"paths": ["notes.md"]}},
            {"type": "git", "subtool": "commit", "args": {"message": "Add notes"}}
        ])),
        done("Committed."),
    ]);
    let mut orch = orchestrator(provider, dir.path(), ApprovalLevel::Safe)
        .with_confirm(Arc::new(AutoConfirm(true)));

    orch.run_turn("add and commit notes").await;

    let log = git(dir.path(), &["log", "--oneline"]);
    assert!(String::from_utf8_lossy(&log.stdout).contains("Add notes"));
}

// ── E2E: verification, logging, bounds ───────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn e2e_verification_reports_configured_check() {
    let dir = tempfile::tempdir().unwrap();
    let discovery =
        ProjectDiscovery::new(dir.path()).with_overrides(None, Some("test -f ready.txt".into()));
    let runner = VerificationRunner::new(Arc::new(discovery), dir.path(), 30);
    let provider = ScriptedProvider::new(vec![
        contract(json!([{"type": "write_file", "path": "ready.txt", "content": "ok"}])),
        done("Ready."),
    ]);
    let sink = Arc::new(CollectingSink::new());
    let mut orch = orchestrator(provider.clone(), dir.path(), ApprovalLevel::Auto)
        .with_verifier(runner, VerifyMode::Test)
        .with_sink(sink.clone());

    orch.run_turn("make it ready").await;

    assert!(sink.events().contains(&TurnEvent::Verification {
        ok: true,
        summary: "test: `test -f ready.txt` passed".into(),
    }));
    let block = provider.request(1).messages.last().unwrap().content.clone();
    assert!(block.contains("verification: passed"));
}

#[tokio::test]
async fn e2e_session_log_records_the_turn() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(AuditLog::new());
    let provider = ScriptedProvider::new(vec![
        contract(json!([
            {"type": "write_file", "path": "a.txt", "content": "a"},
            {"type": "open_file", "path": "a.txt"}
        ])),
        done("Done."),
    ]);
    let mut orch =
        orchestrator(provider, dir.path(), ApprovalLevel::Auto).with_session_log(log.clone());

    orch.run_turn("touch a").await;

    assert_eq!(log.entries_of(RecordKind::UserInput).len(), 1);
    assert_eq!(log.entries_of(RecordKind::AssistantOutput).len(), 2);
    assert_eq!(log.entries_of(RecordKind::ToolExecution).len(), 2);
    assert_eq!(log.entries_of(RecordKind::Observation).len(), 1);
    assert_eq!(orch.context().usage().total_tokens, 30);
    assert_eq!(orch.context().passes(), 2);
}

#[tokio::test]
async fn e2e_pass_limit_stops_a_chatty_model() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "a").unwrap();
    let read = contract(json!([{"type": "open_file", "path": "a.txt"}]));
    let provider = ScriptedProvider::new(vec![read.clone(), read.clone(), read]);
    let mut orch = orchestrator(provider.clone(), dir.path(), ApprovalLevel::Auto)
        .with_max_passes(2);

    let outcome = orch.run_turn("keep reading").await;

    assert_eq!(outcome.status, TurnStatus::PassLimitReached);
    assert_eq!(provider.calls(), 2);
}
