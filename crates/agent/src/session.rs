//! Session context — display-only counters owned by the orchestrator.

use actloop_core::Usage;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    turns: u32,
    passes: u32,
    usage: Usage,
    /// Usage-less responses are counted from the message estimate instead.
    estimated_tokens: usize,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            turns: 0,
            passes: 0,
            usage: Usage::default(),
            estimated_tokens: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn estimated_tokens(&self) -> usize {
        self.estimated_tokens
    }

    pub(crate) fn begin_turn(&mut self) {
        self.turns += 1;
    }

    pub(crate) fn record_pass(&mut self, usage: Option<Usage>, estimate: usize) {
        self.passes += 1;
        match usage {
            Some(u) => {
                self.usage.prompt_tokens += u.prompt_tokens;
                self.usage.completion_tokens += u.completion_tokens;
                self.usage.total_tokens += u.total_tokens;
            }
            None => self.estimated_tokens += estimate,
        }
    }
}
