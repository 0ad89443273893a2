//! `write_file` — create or overwrite a file inside the workspace.

use std::path::PathBuf;

use actloop_core::action::WRITE_FILE;
use actloop_core::{Action, Tool, ToolError, ToolOutput};
use async_trait::async_trait;
use tracing::debug;

use crate::{confine, io_error, wrong_action};

pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        WRITE_FILE
    }

    fn description(&self) -> &str {
        "Create or overwrite a file; parent directories are created. \
         {\"type\":\"write_file\",\"path\":\"notes.txt\",\"content\":\"...\"}"
    }

    async fn execute(&self, action: &Action) -> Result<ToolOutput, ToolError> {
        let Action::WriteFile { path, content } = action else {
            return Err(wrong_action(WRITE_FILE, action));
        };
        let resolved = confine(&self.root, WRITE_FILE, path)?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(WRITE_FILE, path, e))?;
        }
        tokio::fs::write(&resolved, content.as_bytes())
            .await
            .map_err(|e| io_error(WRITE_FILE, path, e))?;

        let bytes = content.len();
        debug!(path = %path, bytes, "Wrote file");
        Ok(ToolOutput::new(
            format!("wrote {bytes} bytes to {path}"),
            serde_json::json!({ "bytes": bytes }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_and_reports_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path());
        let out = tool
            .execute(&Action::WriteFile {
                path: "notes.txt".into(),
                content: "hello".into(),
            })
            .await
            .unwrap();
        assert_eq!(out.data, serde_json::json!({"bytes": 5}));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
            "hello"
        );
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path());
        tool.execute(&Action::WriteFile {
            path: "deep/nested/file.rs".into(),
            content: "fn main() {}".into(),
        })
        .await
        .unwrap();
        assert!(dir.path().join("deep/nested/file.rs").exists());
    }

    #[tokio::test]
    async fn refuses_paths_outside_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path());
        let err = tool
            .execute(&Action::WriteFile {
                path: "../escape.txt".into(),
                content: "x".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn refuses_to_write_through_a_dangling_link() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("pwned.txt");
        std::os::unix::fs::symlink(&target, dir.path().join("link.txt")).unwrap();

        let tool = WriteFileTool::new(dir.path());
        let result = tool
            .execute(&Action::WriteFile {
                path: "link.txt".into(),
                content: "x".into(),
            })
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
        assert!(!target.exists());
    }
}
