//! Session-log collaborator.
//!
//! The orchestrator reports what happened; the collaborator decides how (or
//! whether) to store it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which part of a turn a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    UserInput,
    AssistantOutput,
    ToolExecution,
    Observation,
}

/// One append-only session log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "role")]
    pub kind: RecordKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl SessionRecord {
    pub fn new(kind: RecordKind, content: impl Into<String>, meta: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            content: content.into(),
            meta,
        }
    }
}

/// Receives session records. Implementations must not fail the caller.
pub trait SessionLog: Send + Sync {
    fn record(&self, record: SessionRecord);
}
