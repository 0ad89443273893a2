//! Approval policy — decides which actions need a human "yes" first.
//!
//! Everything here is pure: no I/O, no environment reads. The only switch
//! that bypasses the policy (the disable-approval override) is a field on
//! [`ApprovalPolicy`] and is consulted in [`ApprovalPolicy::needs_approval`]
//! alone.

use std::sync::LazyLock;

use actloop_config::{AgentConfig, ApprovalLevel};
use actloop_core::Action;
use regex_lite::Regex;

/// Writes larger than this need approval under [`ApprovalLevel::Balanced`].
pub const WRITE_APPROVAL_THRESHOLD_BYTES: u64 = 8 * 1024;

/// Git subtools that never touch the working tree or history.
const READ_ONLY_GIT: &[&str] = &["status", "diff", "log", "show"];

static DESTRUCTIVE: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("recursive delete", r"\brm\b[^|;&\n]*\s(-[a-zA-Z]*[rR][a-zA-Z]*|--recursive)\b"),
        ("recursive delete", r"(?i)\b(rmdir|rd|del)\s+/s\b"),
        ("recursive delete", r"\bfind\b.*\s-delete\b"),
        ("filesystem format", r"\bmkfs(\.\w+)?\b"),
        ("filesystem format", r"(?i)\bformat\s+[a-z]:"),
        ("filesystem format", r"\b(wipefs|fdisk|parted)\b"),
        ("raw device write", r"\bdd\b.*\bof=/dev/"),
        ("force push", r"\bgit\s+push\b.*(\s--force(-with-lease)?\b|\s-f\b|\s\+\S)"),
        ("history rewrite", r"\bgit\s+(rebase|filter-branch|filter-repo)\b"),
        ("history rewrite", r"\bgit\s+reset\b.*\s--hard\b"),
        ("history rewrite", r"\bgit\s+commit\b.*\s--amend\b"),
        ("history rewrite", r"\bgit\s+clean\b.*\s-[a-zA-Z]*f"),
        ("history rewrite", r"\bgit\s+branch\s+-D\b"),
        ("registry publish", r"\b(npm|yarn|pnpm|cargo|poetry)\s+publish\b"),
        ("registry publish", r"\b(twine\s+upload|gem\s+push|docker\s+push)\b"),
        ("remote script piped to shell", r"\b(curl|wget)\b[^|]*\|\s*(sudo\s+)?\w*sh\b"),
    ]
    .into_iter()
    .filter_map(|(label, pattern)| Regex::new(pattern).ok().map(|re| (label, re)))
    .collect()
});

/// A lone `&` backgrounds a job; `>&` and `&>` are redirections.
static CHAINING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&&|\|\||;|\||`|\$\(|\r|\n|(^|[^&>])&([^&>]|$)")
        .expect("chaining pattern is valid")
});

/// The destructive category `cmd` falls into, if any.
pub fn destructive_category(cmd: &str) -> Option<&'static str> {
    DESTRUCTIVE
        .iter()
        .find(|(_, re)| re.is_match(cmd))
        .map(|(label, _)| *label)
}

/// Whether `cmd` chains or pipes several commands together.
pub fn has_chaining(cmd: &str) -> bool {
    CHAINING.is_match(cmd)
}

/// Approval rule for shell commands.
pub fn requires_approval_for_run(cmd: &str, level: ApprovalLevel) -> bool {
    match level {
        ApprovalLevel::Auto => false,
        ApprovalLevel::Safe => true,
        ApprovalLevel::Balanced => destructive_category(cmd).is_some() || has_chaining(cmd),
    }
}

/// Approval rule for file writes; `size_bytes` is `None` when unknown.
pub fn requires_approval_for_write(level: ApprovalLevel, size_bytes: Option<u64>) -> bool {
    match level {
        ApprovalLevel::Auto => false,
        ApprovalLevel::Safe => true,
        ApprovalLevel::Balanced => size_bytes.is_none_or(|n| n > WRITE_APPROVAL_THRESHOLD_BYTES),
    }
}

/// Session-scoped approval policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalPolicy {
    level: ApprovalLevel,
    disabled: bool,
}

impl ApprovalPolicy {
    pub fn new(level: ApprovalLevel) -> Self {
        Self {
            level,
            disabled: false,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.approval_level).with_override(config.disable_approval)
    }

    /// Set the disable-all override.
    pub fn with_override(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn level(&self) -> ApprovalLevel {
        self.level
    }

    /// Whether `action` must be confirmed before dispatch.
    pub fn needs_approval(&self, action: &Action) -> bool {
        if self.disabled {
            return false;
        }
        match action {
            Action::OpenFile { .. } => false,
            Action::WriteFile { content, .. } => {
                requires_approval_for_write(self.level, Some(content.len() as u64))
            }
            Action::ApplyPatch { patch, .. } => {
                requires_approval_for_write(self.level, Some(patch.len() as u64))
            }
            Action::Run { cmd, .. } => requires_approval_for_run(cmd, self.level),
            Action::Git { subtool, .. } if READ_ONLY_GIT.contains(&subtool.as_str()) => false,
            Action::Git { subtool, .. } => {
                requires_approval_for_run(&format!("git {subtool}"), self.level)
            }
            Action::Namespaced { .. } => requires_approval_for_write(self.level, None),
        }
    }

    /// The question put to the human.
    pub fn prompt_for(&self, action: &Action) -> String {
        let reason = match action {
            Action::Run { cmd, .. } => destructive_category(cmd)
                .or_else(|| has_chaining(cmd).then_some("chained command")),
            Action::WriteFile { content, .. }
                if content.len() as u64 > WRITE_APPROVAL_THRESHOLD_BYTES =>
            {
                Some("large write")
            }
            _ => None,
        };
        match reason {
            Some(reason) => format!("Allow {} [{reason}]?", action.describe()),
            None => format!("Allow {}?", action.describe()),
        }
    }
}
