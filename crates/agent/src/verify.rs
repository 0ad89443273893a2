//! Verification runner — optional lint/test after successful edits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actloop_config::VerifyMode;
use actloop_core::{CheckKind, EntryPointDiscovery, Observation};
use actloop_tools::{run_process, shell_command};
use tracing::{debug, info, warn};

use crate::observation::tail_truncate;

/// Output kept per failing check.
const CHECK_OUTPUT_LIMIT: usize = 4000;

/// Outcome of a verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// AND of every check that actually ran. Skipped checks do not fail.
    pub ok: bool,
    pub summary: String,
}

impl VerificationResult {
    pub fn to_observation(&self) -> Observation {
        let title = if self.ok {
            "verification: passed"
        } else {
            "verification: failed"
        };
        Observation::new(title, self.summary.clone())
    }
}

/// The checks a mode asks for, in execution order.
pub fn checks_for(mode: VerifyMode) -> &'static [CheckKind] {
    match mode {
        VerifyMode::None => &[],
        VerifyMode::Lint => &[CheckKind::Lint],
        VerifyMode::Test => &[CheckKind::Test],
        VerifyMode::Both => &[CheckKind::Lint, CheckKind::Test],
    }
}

pub struct VerificationRunner {
    discovery: Arc<dyn EntryPointDiscovery>,
    root: PathBuf,
    timeout: Duration,
}

impl VerificationRunner {
    pub fn new(
        discovery: Arc<dyn EntryPointDiscovery>,
        root: impl Into<PathBuf>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            discovery,
            root: root.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Run the requested checks sequentially. Never fails; problems are
    /// reported in the summary.
    pub async fn run(&self, mode: VerifyMode) -> VerificationResult {
        let mut ok = true;
        let mut lines = Vec::new();

        for &check in checks_for(mode) {
            let Some(cmd) = self.discovery.discover(check) else {
                debug!(check = %check, "No entry point, skipping");
                lines.push(format!(
                    "{check}: skipped (no {check} script). \
                     Add one to the project or set verify.{check}_command in the config."
                ));
                continue;
            };

            info!(check = %check, cmd = %cmd, "Running verification");
            let mut command = shell_command(&cmd);
            command.current_dir(&self.root);
            match run_process(command, None, self.timeout, CHECK_OUTPUT_LIMIT).await {
                Ok(output) if output.success() => {
                    lines.push(format!("{check}: `{cmd}` passed"));
                }
                Ok(output) if output.timed_out => {
                    ok = false;
                    lines.push(format!(
                        "{check}: `{cmd}` timed out after {}s",
                        self.timeout.as_secs()
                    ));
                }
                Ok(output) => {
                    ok = false;
                    let code = output.exit_code.unwrap_or(-1);
                    warn!(check = %check, cmd = %cmd, exit_code = code, "Verification failed");
                    lines.push(format!(
                        "{check}: `{cmd}` failed (exit {code})\n{}",
                        tail_truncate(&output.render(), CHECK_OUTPUT_LIMIT)
                    ));
                }
                Err(e) => {
                    ok = false;
                    lines.push(format!("{check}: could not start `{cmd}`: {e}"));
                }
            }
        }

        VerificationResult {
            ok,
            summary: lines.join("\n"),
        }
    }
}
