//! Observations — short feedback notes folded back into the conversation.

use serde::{Deserialize, Serialize};

/// What happened when an action was (or was not) dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub title: String,
    pub body: String,
}

impl Observation {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}
