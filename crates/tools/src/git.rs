//! `git` — version-control subtools.
//!
//! Every subtool maps to a fixed `git` argument vector; nothing is passed
//! through a shell. Commit messages and branch names are checked against a
//! restrictive character set before `git` is spawned.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use actloop_core::action::GIT;
use actloop_core::{Action, Tool, ToolError, ToolOutput};
use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::process::run_process;
use crate::{confine, wrong_action};

pub const SUBTOOLS: &[&str] = &["status", "diff", "log", "add", "commit", "branch"];

const MAX_MESSAGE_LEN: usize = 2000;
const DEFAULT_LOG_LIMIT: u64 = 10;

static MESSAGE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9 \t\n.,:;!?'()\[\]{}#/@+=_*%-]+$").expect("message pattern is valid")
});

static BRANCH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._/-]{0,99}$").expect("branch pattern is valid")
});

/// Validate a commit message.
pub fn validate_commit_message(message: &str) -> Result<(), String> {
    if message.trim().is_empty() {
        return Err("commit message is empty".into());
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(format!("commit message exceeds {MAX_MESSAGE_LEN} bytes"));
    }
    if !MESSAGE_CHARS.is_match(message) {
        return Err("commit message contains disallowed characters".into());
    }
    Ok(())
}

/// Validate a branch name.
pub fn validate_branch_name(name: &str) -> Result<(), String> {
    if !BRANCH_NAME.is_match(name)
        || name.contains("..")
        || name.contains("//")
        || name.ends_with('/')
        || name.ends_with(".lock")
    {
        return Err(format!("invalid branch name '{name}'"));
    }
    Ok(())
}

pub struct GitTool {
    root: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl GitTool {
    pub fn new(root: impl Into<PathBuf>, timeout_secs: u64, output_limit_bytes: usize) -> Self {
        Self {
            root: root.into(),
            timeout: Duration::from_secs(timeout_secs),
            output_limit_bytes,
        }
    }

    fn invalid(reason: impl Into<String>) -> ToolError {
        ToolError::InvalidArguments {
            tool_name: GIT.into(),
            reason: reason.into(),
        }
    }

    /// Paths from `args.paths`, `args.path`, or a bare array, confined to the workspace.
    fn paths(&self, args: &Value) -> Result<Vec<String>, ToolError> {
        let raw: Vec<&Value> = match args {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => match (map.get("paths"), map.get("path")) {
                (Some(Value::Array(items)), _) => items.iter().collect(),
                (_, Some(single)) => vec![single],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(|v| -> Result<String, ToolError> {
                let path = v
                    .as_str()
                    .ok_or_else(|| Self::invalid("paths must be strings"))?;
                confine(&self.root, GIT, path)?;
                Ok(path.to_string())
            })
            .collect()
    }

    fn build_args(&self, subtool: &str, args: &Value) -> Result<Vec<String>, ToolError> {
        let mut argv: Vec<String> = Vec::new();
        match subtool {
            "status" => argv.extend(["status", "--short", "--branch"].map(String::from)),
            "diff" => {
                argv.push("diff".into());
                if args.get("staged").and_then(Value::as_bool).unwrap_or(false) {
                    argv.push("--staged".into());
                }
                let paths = self.paths(args)?;
                if !paths.is_empty() {
                    argv.push("--".into());
                    argv.extend(paths);
                }
            }
            "log" => {
                let limit = args
                    .get("limit")
                    .and_then(Value::as_u64)
                    .unwrap_or(DEFAULT_LOG_LIMIT)
                    .clamp(1, 200);
                argv.extend([
                    "log".to_string(),
                    "--oneline".into(),
                    "-n".into(),
                    limit.to_string(),
                ]);
            }
            "add" => {
                let paths = self.paths(args)?;
                if paths.is_empty() {
                    return Err(Self::invalid("add requires \"paths\""));
                }
                argv.extend(["add".to_string(), "--".into()]);
                argv.extend(paths);
            }
            "commit" => {
                let message = args
                    .get("message")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Self::invalid("commit requires \"message\""))?;
                validate_commit_message(message).map_err(Self::invalid)?;
                argv.extend(["commit".to_string(), "-m".into(), message.into()]);
            }
            "branch" => match args.get("name").and_then(Value::as_str) {
                None => argv.extend(["branch", "--list"].map(String::from)),
                Some(name) => {
                    validate_branch_name(name).map_err(Self::invalid)?;
                    if args.get("checkout").and_then(Value::as_bool).unwrap_or(false) {
                        argv.extend(["switch".to_string(), "-c".into(), name.into()]);
                    } else {
                        argv.extend(["branch".to_string(), name.into()]);
                    }
                }
            },
            other => return Err(ToolError::UnknownTool(format!("{GIT}.{other}"))),
        }
        Ok(argv)
    }
}

#[async_trait]
impl Tool for GitTool {
    fn name(&self) -> &str {
        GIT
    }

    fn description(&self) -> &str {
        "Version control. Subtools: status, diff {staged?, paths?}, log {limit?}, add {paths}, \
         commit {message}, branch {name?, checkout?}. \
         {\"type\":\"git\",\"subtool\":\"commit\",\"args\":{\"message\":\"Fix parser\"}}"
    }

    async fn execute(&self, action: &Action) -> Result<ToolOutput, ToolError> {
        let Action::Git { subtool, args } = action else {
            return Err(wrong_action(GIT, action));
        };
        let argv = self.build_args(subtool, args)?;
        let shown = format!("git {}", argv.join(" "));
        debug!(cmd = %shown, "Running git");

        let mut command = Command::new("git");
        command.args(&argv).current_dir(&self.root);
        let output = run_process(command, None, self.timeout, self.output_limit_bytes)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: GIT.into(),
                reason: format!("failed to spawn git: {e}"),
            })?;

        if output.timed_out {
            return Err(ToolError::Timeout {
                tool_name: GIT.into(),
                command: shown,
                timeout_secs: self.timeout.as_secs(),
            });
        }
        let rendered = output.render();
        if !output.success() {
            let exit_code = output.exit_code.unwrap_or(-1);
            warn!(cmd = %shown, exit_code, "git failed");
            return Err(ToolError::NonZeroExit {
                tool_name: GIT.into(),
                command: shown,
                exit_code,
                output: rendered,
            });
        }
        Ok(ToolOutput::new(
            format!("`{shown}` ok"),
            serde_json::json!({ "subtool": subtool, "output": rendered }),
        ))
    }
}
