//! `actloop agent` — Interactive or single-message mode.

use std::sync::Arc;

use actloop_agent::{InterruptHandle, TurnOrchestrator, TurnStatus, VerificationRunner};
use actloop_config::{AppConfig, ApprovalLevel, VerifyMode};
use actloop_core::{ProviderError, SessionLog};
use actloop_providers::OpenAiCompatProvider;
use actloop_security::{AuditLog, AuditSink, JsonlFileSink, TracingSink};
use actloop_tools::ProjectDiscovery;
use clap::Args;

use crate::terminal::{SharedLines, TerminalConfirm, TerminalSink, spawn_stdin_lines};

#[derive(Args, Debug, Default)]
pub struct AgentArgs {
    /// Send a single message instead of entering interactive mode
    #[arg(short, long)]
    pub message: Option<String>,

    /// Approval level for this session: safe, balanced, or auto
    #[arg(long)]
    pub approval: Option<ApprovalLevel>,

    /// Checks after successful edits: none, lint, test, or both
    #[arg(long)]
    pub verify: Option<VerifyMode>,

    /// Model calls allowed per turn
    #[arg(long)]
    pub max_passes: Option<u32>,

    /// Override the configured model
    #[arg(long)]
    pub model: Option<String>,

    /// Wait for whole responses instead of streaming
    #[arg(long)]
    pub no_stream: bool,
}

impl AgentArgs {
    /// Flags win over file and environment settings.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = self.approval {
            config.agent.approval_level = level;
        }
        if let Some(mode) = self.verify {
            config.agent.verify_mode = mode;
        }
        if let Some(max) = self.max_passes {
            config.agent.max_passes = max;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if self.no_stream {
            config.stream = false;
        }
    }
}

pub async fn run(args: AgentArgs, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    args.apply(&mut config);
    config.validate()?;

    let provider = match OpenAiCompatProvider::from_config(&config) {
        Ok(provider) => provider,
        Err(ProviderError::NotConfigured(reason)) => {
            print_key_help();
            return Err(reason.into());
        }
        Err(e) => return Err(e.into()),
    };

    let root = config.tools.resolved_workspace_root();
    let registry = actloop_tools::default_registry(&root, &config.tools);
    let discovery = ProjectDiscovery::new(&root).with_overrides(
        config.verify.lint_command.clone(),
        config.verify.test_command.clone(),
    );
    let verifier = VerificationRunner::new(Arc::new(discovery), &root, config.verify.timeout_secs);

    let lines = spawn_stdin_lines();
    let interrupt = InterruptHandle::new();
    spawn_ctrl_c_handler(interrupt.clone());

    let mut orchestrator = TurnOrchestrator::new(Arc::new(provider), registry, &config.model)
        .with_config(&config)
        .with_verifier(verifier, config.agent.verify_mode)
        .with_confirm(Arc::new(TerminalConfirm::new(lines.clone())))
        .with_sink(Arc::new(TerminalSink::new(verbose && config.stream)))
        .with_session_log(session_log(&config)?)
        .with_interrupt(interrupt);

    if let Some(msg) = args.message {
        let outcome = orchestrator.run_turn(&msg).await;
        if outcome.status == TurnStatus::TransportFailed {
            return Err("model request failed".into());
        }
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        actloop Agent — Interactive Mode       ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Workspace: {}", root.display());
    println!("  Model:     {}", config.model);
    println!("  Approval:  {}", config.agent.approval_level);
    println!("  Verify:    {}", config.agent.verify_mode);
    println!("  Passes:    {} per turn", config.agent.max_passes);
    println!();
    println!("  Type your request and press Enter.");
    println!("  Type 'exit' or press Ctrl+D to quit; Ctrl+C stops the current turn.");
    println!();

    while let Some(line) = next_input(&lines).await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
            break;
        }
        orchestrator.run_turn(line).await;
    }

    let context = orchestrator.context();
    let usage = context.usage();
    println!();
    println!(
        "  Session: {} turns, {} model calls, {} tokens reported (~{} estimated)",
        context.turns(),
        context.passes(),
        usage.total_tokens,
        context.estimated_tokens()
    );
    println!("  Goodbye!");
    println!();
    Ok(())
}

async fn next_input(lines: &SharedLines) -> Option<String> {
    use std::io::Write;
    print!("  You > ");
    let _ = std::io::stdout().flush();
    lines.lock().await.recv().await
}

/// First Ctrl+C interrupts the running turn; a second one exits.
fn spawn_ctrl_c_handler(interrupt: InterruptHandle) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt.is_interrupted() {
                eprintln!();
                std::process::exit(130);
            }
            interrupt.interrupt();
            eprintln!("\n  [Ctrl+C] stopping the current turn (press again to quit)");
        }
    });
}

fn session_log(config: &AppConfig) -> Result<Arc<dyn SessionLog>, Box<dyn std::error::Error>> {
    let mut sinks: Vec<Box<dyn AuditSink>> = vec![Box::new(TracingSink)];
    if let Some(path) = &config.session_log.path {
        let sink = JsonlFileSink::open(path)
            .map_err(|e| format!("Failed to open session log {}: {e}", path.display()))?;
        sinks.push(Box::new(sink));
    }
    Ok(Arc::new(AuditLog::with_sinks(sinks)))
}

fn print_key_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    ACTLOOP_API_KEY=sk-...   (preferred)");
    eprintln!("    OPENAI_API_KEY=sk-...");
    eprintln!();
    eprintln!("  Or add api_key to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    eprintln!("  Local OpenAI-compatible servers need no key: set base_url instead.");
    eprintln!();
}
