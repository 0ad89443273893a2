//! Observation accumulator — turns one pass's dispatch results into the
//! feedback block the model sees next.

use actloop_core::{Action, DispatchOutcome, Observation, ToolOutput};
use serde_json::Value;

/// Keep the last `limit` bytes of `text`, on a char boundary, with a notice.
pub fn tail_truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("[... {start} earlier bytes omitted]\n{}", &text[start..])
}

/// Ordered observations for a single pass.
#[derive(Debug, Clone)]
pub struct ObservationAccumulator {
    body_limit: usize,
    items: Vec<Observation>,
}

impl ObservationAccumulator {
    pub fn new(body_limit: usize) -> Self {
        Self {
            body_limit,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, observation: Observation) {
        let body = tail_truncate(&observation.body, self.body_limit);
        self.items.push(Observation::new(observation.title, body));
    }

    /// Record how one action fared.
    pub fn record(&mut self, action: &Action, outcome: &DispatchOutcome) {
        let description = action.describe();
        let observation = match outcome {
            DispatchOutcome::Executed(output) => {
                Observation::new(format!("{description}: ok"), executed_body(output))
            }
            DispatchOutcome::Skipped(reason) => {
                Observation::new(format!("{description}: skipped"), reason.clone())
            }
            DispatchOutcome::Failed(error) => Observation::new(
                format!("{description}: {}", error.classification()),
                error.to_string(),
            ),
        };
        self.push(observation);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[Observation] {
        &self.items
    }

    /// The single block folded into the next assistant message.
    pub fn render(&self) -> String {
        let mut out = String::from("Observations:\n");
        for (i, item) in self.items.iter().enumerate() {
            out.push_str(&format!("\n### {}. {}\n", i + 1, item.title));
            if !item.body.is_empty() {
                out.push_str(&item.body);
                out.push('\n');
            }
        }
        out
    }
}

fn executed_body(output: &ToolOutput) -> String {
    let detail = match &output.data {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        data => data
            .get("content")
            .or_else(|| data.get("output"))
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| Some(data.to_string())),
    };
    match detail {
        Some(detail) if !detail.is_empty() => format!("{}\n{detail}", output.summary),
        _ => output.summary.clone(),
    }
}
