//! Terminal plumbing for `actloop agent`: one stdin reader shared by the
//! REPL and approval prompts, and a renderer for turn events.

use std::io::Write;
use std::sync::Arc;

use actloop_agent::{TurnEvent, TurnSink, TurnStatus};
use actloop_core::Confirm;
use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};

/// Lines read from stdin. Whoever holds the lock owns the next line.
pub type SharedLines = Arc<Mutex<mpsc::Receiver<String>>>;

/// Spawn the single stdin reader. The channel closes on EOF.
pub fn spawn_stdin_lines() -> SharedLines {
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF (Ctrl+D)
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    Arc::new(Mutex::new(rx))
}

/// `y`/`yes` approve, `n`/`no` decline, anything else takes the default.
pub fn parse_answer(line: &str, default_answer: bool) -> bool {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default_answer,
    }
}

/// Asks the human on the terminal.
pub struct TerminalConfirm {
    lines: SharedLines,
}

impl TerminalConfirm {
    pub fn new(lines: SharedLines) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, prompt: &str, default_answer: bool) -> bool {
        let hint = if default_answer { "[Y/n]" } else { "[y/N]" };
        eprint!("  ? {prompt} {hint} ");
        let _ = std::io::stderr().flush();
        let mut lines = self.lines.lock().await;
        match lines.recv().await {
            Some(line) => parse_answer(&line, default_answer),
            // No more input: nobody can approve.
            None => false,
        }
    }
}

/// Renders turn events. Replies go to stdout, progress to stderr.
pub struct TerminalSink {
    show_stream: bool,
}

impl TerminalSink {
    pub fn new(show_stream: bool) -> Self {
        Self { show_stream }
    }
}

impl TurnSink for TerminalSink {
    fn emit(&self, event: TurnEvent) {
        match event {
            TurnEvent::ContentDelta { content } | TurnEvent::ReasoningDelta { content } => {
                if self.show_stream {
                    eprint!("{content}");
                    let _ = std::io::stderr().flush();
                }
            }
            TurnEvent::RawText { text } => print_reply(&text),
            TurnEvent::Plan {
                steps,
                rationale,
                message,
            } => {
                if self.show_stream {
                    eprintln!();
                }
                if !steps.is_empty() {
                    eprintln!("  Plan:");
                    for (i, step) in steps.iter().enumerate() {
                        eprintln!("    {}. {step}", i + 1);
                    }
                }
                if let Some(rationale) = rationale {
                    eprintln!("  Why:  {rationale}");
                }
                if let Some(message) = message {
                    print_reply(&message);
                }
            }
            TurnEvent::ActionStarted { description, .. } => eprintln!("  → {description}"),
            TurnEvent::Approval { approved, .. } => {
                if !approved {
                    eprintln!("    declined");
                }
            }
            TurnEvent::ActionFinished {
                outcome, summary, ..
            } => {
                let mark = match outcome.as_str() {
                    "executed" => "✓",
                    "skipped" => "–",
                    _ => "✗",
                };
                let first = summary.lines().next().unwrap_or_default();
                eprintln!("    {mark} {first}");
            }
            TurnEvent::Verification { ok, summary } => {
                eprintln!("  Verification {}", if ok { "passed" } else { "failed" });
                for line in summary.lines().take(20) {
                    eprintln!("    {line}");
                }
            }
            TurnEvent::PassEnded { pass, observations } => {
                tracing::debug!(pass, observations, "pass ended");
            }
            TurnEvent::TurnEnded { status, passes } => match status {
                TurnStatus::PassLimitReached => eprintln!(
                    "  [pass limit reached after {passes} passes; reply to continue]"
                ),
                TurnStatus::Interrupted => eprintln!("  [interrupted]"),
                _ => {}
            },
            TurnEvent::Error { message } => eprintln!("  [Error] {message}"),
        }
    }
}

fn print_reply(text: &str) {
    println!();
    for line in text.lines() {
        println!("  Assistant > {line}");
    }
    println!();
}
