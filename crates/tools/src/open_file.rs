//! `open_file` — read file contents from inside the workspace.

use std::path::PathBuf;

use actloop_core::action::OPEN_FILE;
use actloop_core::{Action, Tool, ToolError, ToolOutput};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::{confine, io_error, wrong_action};

pub struct OpenFileTool {
    root: PathBuf,
    /// Files larger than this are cut to their first `max_bytes`.
    max_bytes: u64,
}

impl OpenFileTool {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }
}

#[async_trait]
impl Tool for OpenFileTool {
    fn name(&self) -> &str {
        OPEN_FILE
    }

    fn description(&self) -> &str {
        "Read a file. {\"type\":\"open_file\",\"path\":\"src/lib.rs\"}"
    }

    async fn execute(&self, action: &Action) -> Result<ToolOutput, ToolError> {
        let Action::OpenFile { path } = action else {
            return Err(wrong_action(OPEN_FILE, action));
        };
        let resolved = confine(&self.root, OPEN_FILE, path)?;

        let file = tokio::fs::File::open(&resolved)
            .await
            .map_err(|e| io_error(OPEN_FILE, path, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| io_error(OPEN_FILE, path, e))?
            .len();

        let mut bytes = Vec::with_capacity(size.min(self.max_bytes) as usize);
        file.take(self.max_bytes)
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| io_error(OPEN_FILE, path, e))?;
        let truncated = size > self.max_bytes;
        let content = String::from_utf8_lossy(&bytes).into_owned();

        debug!(path = %path, size, truncated, "Read file");
        let summary = if truncated {
            format!("read {path} (first {} of {size} bytes)", bytes.len())
        } else {
            format!("read {path} ({size} bytes)")
        };
        Ok(ToolOutput::new(
            summary,
            serde_json::json!({
                "path": path,
                "content": content,
                "truncated": truncated,
                "bytes": size,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(path: &str) -> Action {
        Action::OpenFile { path: path.into() }
    }

    #[tokio::test]
    async fn reads_small_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let tool = OpenFileTool::new(dir.path(), 1024);

        let out = tool.execute(&open("a.txt")).await.unwrap();
        assert_eq!(out.data["content"], "hello");
        assert_eq!(out.data["truncated"], false);
    }

    #[tokio::test]
    async fn oversized_file_is_truncated_and_stable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "x".repeat(100)).unwrap();
        let tool = OpenFileTool::new(dir.path(), 10);

        let first = tool.execute(&open("big.txt")).await.unwrap();
        let second = tool.execute(&open("big.txt")).await.unwrap();
        assert_eq!(first.data["content"], "x".repeat(10));
        assert_eq!(first.data["truncated"], true);
        assert_eq!(first.data, second.data);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let tool = OpenFileTool::new(dir.path(), 1024);
        let err = tool.execute(&open("nope.txt")).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[tokio::test]
    async fn escaping_the_workspace_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let tool = OpenFileTool::new(dir.path(), 1024);
        let err = tool.execute(&open("../../etc/passwd")).await.unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }
}
