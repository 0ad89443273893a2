//! `run` — execute a shell command in the workspace.

use std::path::PathBuf;
use std::time::Duration;

use actloop_core::action::RUN;
use actloop_core::{Action, Tool, ToolError, ToolOutput};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::process::{run_process, shell_command};
use crate::wrong_action;

pub struct RunTool {
    root: PathBuf,
    default_timeout_secs: u64,
    output_limit_bytes: usize,
}

impl RunTool {
    pub fn new(
        root: impl Into<PathBuf>,
        default_timeout_secs: u64,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            root: root.into(),
            default_timeout_secs,
            output_limit_bytes,
        }
    }
}

#[async_trait]
impl Tool for RunTool {
    fn name(&self) -> &str {
        RUN
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace; output is tail-truncated. \
         {\"type\":\"run\",\"cmd\":\"cargo test\",\"timeoutSeconds\":120}"
    }

    async fn execute(&self, action: &Action) -> Result<ToolOutput, ToolError> {
        let Action::Run { cmd, timeout_secs } = action else {
            return Err(wrong_action(RUN, action));
        };
        let timeout_secs = timeout_secs.unwrap_or(self.default_timeout_secs);

        debug!(cmd = %cmd, timeout_secs, "Executing command");
        let mut command = shell_command(cmd);
        command.current_dir(&self.root);

        let output = run_process(
            command,
            None,
            Duration::from_secs(timeout_secs),
            self.output_limit_bytes,
        )
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: RUN.into(),
            reason: format!("failed to spawn `{cmd}`: {e}"),
        })?;

        if output.timed_out {
            return Err(ToolError::Timeout {
                tool_name: RUN.into(),
                command: cmd.clone(),
                timeout_secs,
            });
        }

        let rendered = output.render();
        match output.exit_code {
            Some(0) => Ok(ToolOutput::new(
                format!("`{cmd}` exited 0"),
                serde_json::json!({
                    "exit_code": 0,
                    "output": rendered,
                    "truncated": output.truncated(),
                }),
            )),
            code => {
                let exit_code = code.unwrap_or(-1);
                warn!(cmd = %cmd, exit_code, "Command failed");
                Err(ToolError::NonZeroExit {
                    tool_name: RUN.into(),
                    command: cmd.clone(),
                    exit_code,
                    output: rendered,
                })
            }
        }
    }
}
