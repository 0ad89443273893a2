//! Helpers for running child processes with timeouts and bounded output.

use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// How long to keep draining pipes after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Captured child process output. Only the tail of each stream is kept.
#[derive(Debug, Default)]
pub struct ProcessOutput {
    /// `None` when the process was killed or terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub stdout_dropped: usize,
    pub stderr_dropped: usize,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn truncated(&self) -> bool {
        self.stdout_dropped > 0 || self.stderr_dropped > 0
    }

    /// stdout and stderr as one block, with omission notices.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.stdout_dropped > 0 {
            out.push_str(&format!(
                "[... {} earlier bytes of stdout omitted]\n",
                self.stdout_dropped
            ));
        }
        out.push_str(self.stdout.trim_end());
        if !self.stderr.trim().is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("[stderr]\n");
            if self.stderr_dropped > 0 {
                out.push_str(&format!(
                    "[... {} earlier bytes of stderr omitted]\n",
                    self.stderr_dropped
                ));
            }
            out.push_str(self.stderr.trim_end());
        }
        out
    }
}

/// Bytes kept from the end of a stream.
#[derive(Debug, Default)]
struct Tail {
    buf: Vec<u8>,
    total: usize,
}

impl Tail {
    fn push(&mut self, chunk: &[u8], limit: usize) {
        self.total += chunk.len();
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > limit.saturating_mul(2).max(8192) {
            let excess = self.buf.len() - limit;
            self.buf.drain(..excess);
        }
    }

    fn finish(&self, limit: usize) -> (String, usize) {
        let start = self.buf.len().saturating_sub(limit);
        let kept = &self.buf[start..];
        (
            String::from_utf8_lossy(kept).into_owned(),
            self.total - kept.len(),
        )
    }
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R, tail: Arc<Mutex<Tail>>, limit: usize) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Ok(mut tail) = tail.lock() {
                    tail.push(&chunk[..n], limit);
                }
            }
        }
    }
}

/// Run a command with a timeout, keeping the last `output_limit_bytes` of
/// stdout and stderr.
///
/// Pipes are read concurrently while the child runs. The child is spawned
/// with `kill_on_drop`, so cancelling the returned future kills it.
pub async fn run_process(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> io::Result<ProcessOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    debug!(timeout_secs = timeout.as_secs(), "spawning child process");
    let mut child = cmd.spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr was not piped"))?;

    let out_tail = Arc::new(Mutex::new(Tail::default()));
    let err_tail = Arc::new(Mutex::new(Tail::default()));
    let out_task = tokio::spawn(drain(stdout, out_tail.clone(), output_limit_bytes));
    let err_task = tokio::spawn(drain(stderr, err_tail.clone(), output_limit_bytes));

    if let Some(input) = stdin
        && let Some(mut pipe) = child.stdin.take()
    {
        // A child that exits without reading stdin closes the pipe; not an error.
        if let Err(e) = pipe.write_all(input).await
            && e.kind() != io::ErrorKind::BrokenPipe
        {
            return Err(e);
        }
        drop(pipe);
    }

    let mut timed_out = false;
    let exit_code = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => status?.code(),
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill timed-out command");
            }
            None
        }
    };

    // Grandchildren can hold the pipes open after the child exits.
    for task in [out_task, err_task] {
        let abort = task.abort_handle();
        if tokio::time::timeout(DRAIN_GRACE, task).await.is_err() {
            abort.abort();
        }
    }

    let (stdout, stdout_dropped) = out_tail
        .lock()
        .map(|t| t.finish(output_limit_bytes))
        .unwrap_or_default();
    let (stderr, stderr_dropped) = err_tail
        .lock()
        .map(|t| t.finish(output_limit_bytes))
        .unwrap_or_default();

    if stdout_dropped > 0 || stderr_dropped > 0 {
        debug!(stdout_dropped, stderr_dropped, "output truncated to tail");
    }
    debug!(exit_code = ?exit_code, timed_out, "command finished");

    Ok(ProcessOutput {
        exit_code,
        stdout,
        stderr,
        stdout_dropped,
        stderr_dropped,
        timed_out,
    })
}

/// A platform shell invocation of `cmd`.
pub fn shell_command(cmd: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", cmd]);
        command
    } else {
        let mut command = Command::new("sh");
        command.args(["-c", cmd]);
        command
    }
}
