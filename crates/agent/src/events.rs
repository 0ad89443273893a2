//! Turn-level events.
//!
//! The orchestrator never renders anything itself. It emits `TurnEvent`s to a
//! [`TurnSink`], and the host (terminal, test harness) decides what to show.

use std::sync::Mutex;

use serde::Serialize;

use crate::orchestrator::TurnStatus;

/// Events emitted while a turn runs.
///
/// - `content_delta` / `reasoning_delta` — incremental model output
/// - `raw_text`        — the model answered without a contract
/// - `plan`            — the contract's plan, rationale, and message
/// - `action_started` / `action_finished` — one dispatch
/// - `approval`        — the human's answer to an approval prompt
/// - `verification`    — lint/test result after edits
/// - `pass_ended` / `turn_ended`
/// - `error`           — transport failure or interrupt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    ContentDelta {
        content: String,
    },

    ReasoningDelta {
        content: String,
    },

    RawText {
        text: String,
    },

    Plan {
        steps: Vec<String>,
        rationale: Option<String>,
        message: Option<String>,
    },

    ActionStarted {
        index: usize,
        description: String,
    },

    Approval {
        description: String,
        approved: bool,
    },

    ActionFinished {
        index: usize,
        description: String,
        /// "executed", "skipped" or "failed"
        outcome: String,
        summary: String,
    },

    Verification {
        ok: bool,
        summary: String,
    },

    PassEnded {
        pass: u32,
        observations: usize,
    },

    TurnEnded {
        status: TurnStatus,
        passes: u32,
    },

    Error {
        message: String,
    },
}

impl TurnEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ContentDelta { .. } => "content_delta",
            Self::ReasoningDelta { .. } => "reasoning_delta",
            Self::RawText { .. } => "raw_text",
            Self::Plan { .. } => "plan",
            Self::ActionStarted { .. } => "action_started",
            Self::Approval { .. } => "approval",
            Self::ActionFinished { .. } => "action_finished",
            Self::Verification { .. } => "verification",
            Self::PassEnded { .. } => "pass_ended",
            Self::TurnEnded { .. } => "turn_ended",
            Self::Error { .. } => "error",
        }
    }
}

/// Receives turn events. Must not block for long; it is called inline.
pub trait TurnSink: Send + Sync {
    fn emit(&self, event: TurnEvent);
}

/// Discards everything.
pub struct NullSink;

impl TurnSink for NullSink {
    fn emit(&self, _event: TurnEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<TurnEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TurnEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Event type names in emission order.
    pub fn types(&self) -> Vec<&'static str> {
        self.events().iter().map(TurnEvent::event_type).collect()
    }
}

impl TurnSink for CollectingSink {
    fn emit(&self, event: TurnEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_action_finished() {
        let event = TurnEvent::ActionFinished {
            index: 0,
            description: "run `ls`".into(),
            outcome: "executed".into(),
            summary: "`ls` exited 0".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"action_finished""#));
        assert!(json.contains(r#""outcome":"executed""#));
    }

    #[test]
    fn event_serialization_turn_ended() {
        let event = TurnEvent::TurnEnded {
            status: TurnStatus::PassLimitReached,
            passes: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""status":"pass_limit_reached""#));
        assert_eq!(event.event_type(), "turn_ended");
    }

    #[test]
    fn collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.emit(TurnEvent::RawText { text: "a".into() });
        sink.emit(TurnEvent::Error {
            message: "b".into(),
        });
        assert_eq!(sink.types(), vec!["raw_text", "error"]);
    }
}
