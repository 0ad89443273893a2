//! Built-in tool handlers for actloop.
//!
//! Handlers give the model its hands in the workspace: read and write files,
//! apply patches, run commands, and drive git. All I/O lives here; the
//! orchestrator only sees [`ToolOutput`](actloop_core::ToolOutput) or a typed
//! [`ToolError`].

pub mod apply_patch;
pub mod discovery;
pub mod git;
pub mod open_file;
pub mod process;
pub mod run;
pub mod write_file;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use actloop_config::ToolsConfig;
use actloop_core::{Action, ToolError, ToolRegistry};
use actloop_security::{PathValidationError, resolve_in_workspace};

pub use apply_patch::ApplyPatchTool;
pub use discovery::ProjectDiscovery;
pub use git::GitTool;
pub use open_file::OpenFileTool;
pub use process::{ProcessOutput, run_process, shell_command};
pub use run::RunTool;
pub use write_file::WriteFileTool;

/// Create a registry with every built-in handler rooted at `root`.
pub fn default_registry(root: &Path, config: &ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(OpenFileTool::new(
        root,
        config.open_file_max_bytes as u64,
    )));
    registry.register(Arc::new(WriteFileTool::new(root)));
    registry.register(Arc::new(ApplyPatchTool::new(root, config.run_timeout_secs)));
    registry.register(Arc::new(RunTool::new(
        root,
        config.run_timeout_secs,
        config.output_limit_bytes,
    )));
    registry.register(Arc::new(GitTool::new(
        root,
        config.run_timeout_secs,
        config.output_limit_bytes,
    )));
    registry
}

/// Resolve `path` inside the workspace, mapping violations to `PermissionDenied`.
pub(crate) fn confine(root: &Path, tool: &str, path: &str) -> Result<PathBuf, ToolError> {
    resolve_in_workspace(root, path).map_err(|e| match e {
        PathValidationError::Empty => ToolError::InvalidArguments {
            tool_name: tool.into(),
            reason: "path is empty".into(),
        },
        other => ToolError::PermissionDenied {
            tool_name: tool.into(),
            reason: other.to_string(),
        },
    })
}

pub(crate) fn io_error(tool: &str, path: &str, e: io::Error) -> ToolError {
    match e.kind() {
        io::ErrorKind::NotFound => ToolError::NotFound {
            tool_name: tool.into(),
            path: path.into(),
        },
        io::ErrorKind::PermissionDenied => ToolError::PermissionDenied {
            tool_name: tool.into(),
            reason: format!("{path}: {e}"),
        },
        _ => ToolError::ExecutionFailed {
            tool_name: tool.into(),
            reason: format!("{path}: {e}"),
        },
    }
}

/// A handler was handed an action it does not serve.
pub(crate) fn wrong_action(tool: &str, action: &Action) -> ToolError {
    ToolError::InvalidArguments {
        tool_name: tool.into(),
        reason: format!("cannot handle {}", action.describe()),
    }
}
