//! The action contract — what the model is allowed to ask for.
//!
//! [`Action`] is a closed sum type for the built-in operations plus one
//! namespaced variant that routes to plugin handlers by `tool`/`subtool`.
//! Anything the registry doesn't know is rejected at dispatch time.

use serde::Serialize;

/// The wire tag for each built-in action.
pub const OPEN_FILE: &str = "open_file";
pub const WRITE_FILE: &str = "write_file";
pub const APPLY_PATCH: &str = "apply_patch";
pub const RUN: &str = "run";
pub const GIT: &str = "git";

/// One operation proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Read a workspace file.
    OpenFile { path: String },

    /// Create or overwrite a workspace file.
    WriteFile { path: String, content: String },

    /// Apply a unified diff.
    ApplyPatch { path: String, patch: String },

    /// Run a shell command.
    Run {
        cmd: String,
        #[serde(rename = "timeoutSeconds", skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },

    /// A version-control operation (`status`, `commit`, `branch`, ...).
    Git {
        subtool: String,
        args: serde_json::Value,
    },

    /// A plugin operation addressed as `tool` / `subtool`.
    Namespaced {
        tool: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        subtool: Option<String>,
        args: serde_json::Value,
    },
}

impl Action {
    /// The action's tag as it appears on the wire.
    pub fn tag(&self) -> &str {
        match self {
            Self::OpenFile { .. } => OPEN_FILE,
            Self::WriteFile { .. } => WRITE_FILE,
            Self::ApplyPatch { .. } => APPLY_PATCH,
            Self::Run { .. } => RUN,
            Self::Git { .. } => GIT,
            Self::Namespaced { tool, .. } => tool,
        }
    }

    /// Registry lookup key: tool name plus optional subtool.
    pub fn dispatch_key(&self) -> (&str, Option<&str>) {
        match self {
            Self::Git { subtool, .. } => (GIT, Some(subtool.as_str())),
            Self::Namespaced { tool, subtool, .. } => (tool.as_str(), subtool.as_deref()),
            other => (other.tag(), None),
        }
    }

    /// Whether a successful dispatch of this action changed workspace files.
    pub fn is_edit(&self) -> bool {
        matches!(self, Self::WriteFile { .. } | Self::ApplyPatch { .. })
    }

    /// One-line human description used in prompts and observation titles.
    pub fn describe(&self) -> String {
        match self {
            Self::OpenFile { path } => format!("open_file {path}"),
            Self::WriteFile { path, content } => {
                format!("write_file {path} ({} bytes)", content.len())
            }
            Self::ApplyPatch { path, patch } => {
                format!("apply_patch {path} ({} lines)", patch.lines().count())
            }
            Self::Run { cmd, .. } => format!("run `{cmd}`"),
            Self::Git { subtool, .. } => format!("git {subtool}"),
            Self::Namespaced { tool, subtool, .. } => match subtool {
                Some(sub) => format!("{tool}.{sub}"),
                None => tool.clone(),
            },
        }
    }
}

/// The structured envelope parsed from one model response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelContract {
    /// Ordered plan steps
    pub plan: Vec<String>,

    /// Why the model chose this plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    /// Actions, in the order they must be dispatched
    pub actions: Vec<Action>,

    /// Message addressed to the human
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ModelContract {
    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_key_for_builtin_and_namespaced() {
        let run = Action::Run {
            cmd: "ls".into(),
            timeout_secs: None,
        };
        assert_eq!(run.dispatch_key(), ("run", None));

        let git = Action::Git {
            subtool: "commit".into(),
            args: serde_json::json!({"message": "wip"}),
        };
        assert_eq!(git.dispatch_key(), ("git", Some("commit")));

        let plugin = Action::Namespaced {
            tool: "issues".into(),
            subtool: Some("create".into()),
            args: serde_json::Value::Null,
        };
        assert_eq!(plugin.dispatch_key(), ("issues", Some("create")));
        assert_eq!(plugin.describe(), "issues.create");
    }

    #[test]
    fn only_writes_and_patches_are_edits() {
        assert!(
            Action::WriteFile {
                path: "a".into(),
                content: String::new()
            }
            .is_edit()
        );
        assert!(
            Action::ApplyPatch {
                path: "a".into(),
                patch: String::new()
            }
            .is_edit()
        );
        assert!(!Action::OpenFile { path: "a".into() }.is_edit());
    }

    #[test]
    fn run_serializes_with_wire_names() {
        let json = serde_json::to_value(Action::Run {
            cmd: "sleep 1".into(),
            timeout_secs: Some(3),
        })
        .unwrap();
        assert_eq!(json["type"], "run");
        assert_eq!(json["timeoutSeconds"], 3);
    }
}
