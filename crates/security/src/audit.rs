//! Session audit log — append-only record of what happened in a session.
//!
//! [`AuditLog`] implements the core [`SessionLog`] collaborator: every
//! record is forwarded to each configured [`AuditSink`], and the most
//! recent ones are kept in memory.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use actloop_core::{RecordKind, SessionLog, SessionRecord};

/// Trait for audit log sinks (where records are written).
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &SessionRecord);
}

/// Records kept in memory unless [`AuditLog::with_retention`] says otherwise.
pub const DEFAULT_RETAINED: usize = 500;

/// In-memory session log that fans records out to its sinks.
///
/// Memory holds at most `retain` records; older ones are dropped once the
/// sinks have seen them.
pub struct AuditLog {
    entries: Mutex<VecDeque<SessionRecord>>,
    retain: usize,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("entry_count", &self.count())
            .field("retain", &self.retain)
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    /// Create a log with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            retain: DEFAULT_RETAINED,
            sinks,
        }
    }

    /// Keep at most `retain` records in memory (at least one).
    pub fn with_retention(mut self, retain: usize) -> Self {
        self.retain = retain.max(1);
        self
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<SessionRecord> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entries_of(&self, kind: RecordKind) -> Vec<SessionRecord> {
        self.entries()
            .into_iter()
            .filter(|record| record.kind == kind)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }
}

impl SessionLog for AuditLog {
    fn record(&self, record: SessionRecord) {
        for sink in &self.sinks {
            sink.record(&record);
        }
        if let Ok(mut entries) = self.entries.lock() {
            while entries.len() >= self.retain {
                entries.pop_front();
            }
            entries.push_back(record);
        }
    }
}

/// Logs each record via `tracing::debug!`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, record: &SessionRecord) {
        tracing::debug!(
            kind = ?record.kind,
            meta = %record.meta,
            chars = record.content.len(),
            "session record"
        );
    }
}

/// Appends each record as one JSON line to a file.
pub struct JsonlFileSink {
    file: Mutex<File>,
}

impl JsonlFileSink {
    /// Open (creating parents) `path` in append mode.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for JsonlFileSink {
    fn record(&self, record: &SessionRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize session record");
                return;
            }
        };
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        if let Err(e) = writeln!(file, "{line}") {
            tracing::warn!(error = %e, "Failed to append session record");
        }
    }
}
