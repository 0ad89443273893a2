//! Tool trait and the dispatcher registry.
//!
//! Tools are what let the model act on the workspace: read and write files,
//! apply patches, run commands, drive git. Each handler owns its I/O and
//! returns either a normalized [`ToolOutput`] or a typed [`ToolError`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::Action;
use crate::error::ToolError;

/// The normalized result of a successful handler call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Short human/model-readable summary
    pub summary: String,

    /// Structured result (e.g. `{"bytes": 5}`)
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ToolOutput {
    pub fn new(summary: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            summary: summary.into(),
            data,
        }
    }
}

/// How one action fared. Approval denial is its own case, never an error.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Executed(ToolOutput),
    Skipped(String),
    Failed(ToolError),
}

impl DispatchOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed(_))
    }
}

/// The core Tool trait.
///
/// A handler receives the whole validated [`Action`] so that one handler can
/// serve several subtools (e.g. `git.commit`, `git.status`).
#[async_trait]
pub trait Tool: Send + Sync {
    /// The registry key of this tool (e.g. "run", "git").
    fn name(&self) -> &str;

    /// A description of what this tool does (listed in the system prompt).
    fn description(&self) -> &str;

    /// Execute the action.
    async fn execute(&self, action: &Action) -> Result<ToolOutput, ToolError>;
}

/// A registry of available tools.
///
/// Lookup is a pure key match: `tool.subtool` first, then `tool`. There is no
/// fallback handler, so an unrecognized key always becomes
/// [`ToolError::UnknownTool`].
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name. Replaces any existing entry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Register a handler for one `tool.subtool` pair.
    pub fn register_subtool(&mut self, tool: &str, subtool: &str, handler: Arc<dyn Tool>) {
        self.tools.insert(format!("{tool}.{subtool}"), handler);
    }

    /// Resolve the handler for an action.
    pub fn resolve(&self, action: &Action) -> Result<&Arc<dyn Tool>, ToolError> {
        let (tool, subtool) = action.dispatch_key();
        if let Some(sub) = subtool
            && let Some(handler) = self.tools.get(&format!("{tool}.{sub}"))
        {
            return Ok(handler);
        }
        self.tools.get(tool).ok_or_else(|| {
            ToolError::UnknownTool(match subtool {
                Some(sub) => format!("{tool}.{sub}"),
                None => tool.to_string(),
            })
        })
    }

    /// Dispatch an action to exactly one handler.
    pub async fn dispatch(&self, action: &Action) -> Result<ToolOutput, ToolError> {
        let handler = self.resolve(action)?;
        debug!(tool = handler.name(), action = %action.describe(), "Dispatching action");
        handler.execute(action).await
    }

    /// `(key, description)` pairs in stable order.
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        self.tools
            .iter()
            .map(|(key, tool)| (key.as_str(), tool.description()))
            .collect()
    }

    /// List all registered keys.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}
