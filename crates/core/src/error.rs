//! Error types for the actloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// Failures talking to the model collaborator. These abort the current pass
/// but never the session.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// A handler failure. Always carries the tool name plus whatever context
/// (path, command, exit code) a human needs to understand it.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{tool_name}: file not found: {path}")]
    NotFound { tool_name: String, path: String },

    #[error("{tool_name}: permission denied: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("{tool_name}: invalid arguments: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("{tool_name}: `{command}` exited with code {exit_code}\n{output}")]
    NonZeroExit {
        tool_name: String,
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("{tool_name}: `{command}` timed out after {timeout_secs}s")]
    Timeout {
        tool_name: String,
        command: String,
        timeout_secs: u64,
    },

    #[error("apply_patch: patch for {path} rejected (tried: {})\n{detail}", attempted.join(", "))]
    PatchRejected {
        path: String,
        attempted: Vec<String>,
        detail: String,
    },

    #[error("{tool_name}: execution failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    /// The tool this error came from.
    pub fn tool_name(&self) -> &str {
        match self {
            Self::UnknownTool(name) => name,
            Self::NotFound { tool_name, .. }
            | Self::PermissionDenied { tool_name, .. }
            | Self::InvalidArguments { tool_name, .. }
            | Self::NonZeroExit { tool_name, .. }
            | Self::Timeout { tool_name, .. }
            | Self::ExecutionFailed { tool_name, .. } => tool_name,
            Self::PatchRejected { .. } => "apply_patch",
        }
    }

    /// Short, stable label shown to users and folded into observation titles.
    pub fn classification(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown tool",
            Self::NotFound { .. } => "not found",
            Self::PermissionDenied { .. } => "permission denied",
            Self::InvalidArguments { .. } => "invalid arguments",
            Self::NonZeroExit { .. } => "non-zero exit",
            Self::Timeout { .. } => "timeout",
            Self::PatchRejected { .. } => "patch rejected",
            Self::ExecutionFailed { .. } => "execution failed",
        }
    }
}
