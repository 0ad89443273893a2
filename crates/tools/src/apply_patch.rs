//! `apply_patch` — apply a unified diff with `git apply`, falling back
//! through progressively looser strategies.

use std::path::PathBuf;
use std::time::Duration;

use actloop_core::action::APPLY_PATCH;
use actloop_core::{Action, Tool, ToolError, ToolOutput};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::process::{ProcessOutput, run_process};
use crate::{confine, wrong_action};

/// `(label, git apply flags)` in the order they are tried.
const STRATEGIES: &[(&str, &[&str])] = &[
    ("3way+index", &["--3way", "--index"]),
    ("3way", &["--3way"]),
    ("reject", &["--reject", "--whitespace=nowarn"]),
];

pub struct ApplyPatchTool {
    root: PathBuf,
    timeout: Duration,
}

impl ApplyPatchTool {
    pub fn new(root: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            root: root.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Every file the diff touches must stay inside the workspace.
    fn check_targets(&self, patch: &str) -> Result<(), ToolError> {
        for line in patch.lines() {
            let Some(target) = line
                .strip_prefix("--- ")
                .or_else(|| line.strip_prefix("+++ "))
            else {
                continue;
            };
            let target = target.split('\t').next().unwrap_or(target).trim();
            if target == "/dev/null" {
                continue;
            }
            let target = target
                .strip_prefix("a/")
                .or_else(|| target.strip_prefix("b/"))
                .unwrap_or(target);
            confine(&self.root, APPLY_PATCH, target)?;
        }
        Ok(())
    }

    /// A strategy that ran out of time is a timeout, not a rejected patch.
    fn check_timeout(&self, output: &ProcessOutput, flags: &[&str]) -> Result<(), ToolError> {
        if output.timed_out {
            return Err(ToolError::Timeout {
                tool_name: APPLY_PATCH.into(),
                command: format!("git apply {} -", flags.join(" ")),
                timeout_secs: self.timeout.as_secs(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &str {
        APPLY_PATCH
    }

    fn description(&self) -> &str {
        "Apply a unified diff (paths relative to the workspace root). \
         {\"type\":\"apply_patch\",\"path\":\"src/lib.rs\",\"patch\":\"--- a/src/lib.rs\\n+++ b/src/lib.rs\\n@@ ...\"}"
    }

    async fn execute(&self, action: &Action) -> Result<ToolOutput, ToolError> {
        let Action::ApplyPatch { path, patch } = action else {
            return Err(wrong_action(APPLY_PATCH, action));
        };
        confine(&self.root, APPLY_PATCH, path)?;
        self.check_targets(patch)?;

        let mut input = patch.clone();
        if !input.ends_with('\n') {
            input.push('\n');
        }

        let mut attempted = Vec::new();
        let mut detail = String::new();
        for (label, flags) in STRATEGIES {
            attempted.push(label.to_string());
            let mut command = Command::new("git");
            command.arg("apply").args(*flags).arg("-").current_dir(&self.root);

            let output = run_process(command, Some(input.as_bytes()), self.timeout, 16 * 1024)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: APPLY_PATCH.into(),
                    reason: format!("failed to spawn git: {e}"),
                })?;

            self.check_timeout(&output, flags)?;
            if output.success() {
                info!(path = %path, strategy = label, "Patch applied");
                return Ok(ToolOutput::new(
                    format!("patched {path} ({label})"),
                    serde_json::json!({ "path": path, "strategy": label }),
                ));
            }
            detail = output.render();
            debug!(path = %path, strategy = label, "Patch strategy failed");
        }

        Err(ToolError::PatchRejected {
            path: path.clone(),
            attempted,
            detail,
        })
    }
}
