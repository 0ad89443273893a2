//! Contract extraction from raw model text.
//!
//! Accepted shapes, in priority order:
//!
//! ```text
//! 1. fenced blocks      ```json { ... } ```   (last block that parses wins)
//! 2. bare JSON          { ... }                (the whole response)
//! 3. embedded JSON      prose { ... } prose    (outermost brace span)
//! ```
//!
//! Parsing never fails: when nothing parses the result is an empty contract
//! whose [`ContractSource`] is `None`, so callers can show the raw text.

use std::sync::LazyLock;

use actloop_core::{ModelContract, Observation};
use regex_lite::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::validate::validate_action;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[^\n`]*\n(.*?)```").expect("fence pattern is valid")
});

/// Where the contract was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractSource {
    Fenced,
    Bare,
    Embedded,
    /// No JSON object could be extracted.
    None,
}

/// The parser's output: a contract plus what was dropped along the way.
#[derive(Debug, Clone)]
pub struct ParsedContract {
    pub contract: ModelContract,
    pub source: ContractSource,
    /// Number of entries in the `actions` array before validation.
    pub declared_actions: usize,
    /// One observation per dropped action or malformed envelope field.
    pub rejected: Vec<Observation>,
}

impl ParsedContract {
    fn absent() -> Self {
        Self {
            contract: ModelContract::default(),
            source: ContractSource::None,
            declared_actions: 0,
            rejected: Vec::new(),
        }
    }

    /// Whether a JSON contract was found at all.
    pub fn is_present(&self) -> bool {
        self.source != ContractSource::None
    }
}

/// Extract the action contract from raw model text.
pub fn parse_contract(text: &str) -> ParsedContract {
    let Some((source, object)) = locate(text) else {
        debug!("No contract found in model output");
        return ParsedContract::absent();
    };
    let parsed = build(source, &object);
    debug!(
        source = ?parsed.source,
        actions = parsed.contract.actions.len(),
        rejected = parsed.rejected.len(),
        "Parsed contract"
    );
    parsed
}

fn locate(text: &str) -> Option<(ContractSource, Map<String, Value>)> {
    let fenced = FENCE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|body| as_object(body.as_str()))
        .last();
    if let Some(object) = fenced {
        return Some((ContractSource::Fenced, object));
    }

    if let Some(object) = as_object(text) {
        return Some((ContractSource::Bare, object));
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    as_object(&text[start..=end]).map(|object| (ContractSource::Embedded, object))
}

fn as_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn build(source: ContractSource, object: &Map<String, Value>) -> ParsedContract {
    let mut rejected = Vec::new();
    let mut contract = ModelContract {
        plan: plan_steps(object.get("plan")),
        rationale: text_field(object.get("rationale")),
        actions: Vec::new(),
        message: text_field(object.get("message")),
    };

    let raw_actions: &[Value] = match object.get("actions") {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!("Contract field \"actions\" is not an array");
            rejected.push(Observation::new(
                "invalid contract: actions",
                "\"actions\" must be an array of action objects; no actions were run",
            ));
            &[]
        }
    };

    for (index, raw) in raw_actions.iter().enumerate() {
        match validate_action(raw) {
            Ok(action) => contract.actions.push(action),
            Err(e) => {
                warn!(index, error = %e, "Dropping invalid action");
                rejected.push(Observation::new(
                    format!("invalid action #{}", index + 1),
                    format!("{e}. Action dropped: {raw}"),
                ));
            }
        }
    }

    ParsedContract {
        contract,
        source,
        declared_actions: raw_actions.len(),
        rejected,
    }
}

fn plan_steps(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(step)) if !step.trim().is_empty() => vec![step.clone()],
        Some(Value::Array(steps)) => steps
            .iter()
            .filter_map(|s| match s {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn text_field(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actloop_core::Action;

    #[test]
    fn bare_json_contract() {
        let text = r#"{"plan": ["read it"], "rationale": "need context",
            "actions": [{"type": "open_file", "path": "README.md"}], "message": "looking"}"#;
        let parsed = parse_contract(text);
        assert_eq!(parsed.source, ContractSource::Bare);
        assert_eq!(parsed.contract.plan, vec!["read it".to_string()]);
        assert_eq!(parsed.contract.rationale.as_deref(), Some("need context"));
        assert_eq!(parsed.contract.message.as_deref(), Some("looking"));
        assert_eq!(
            parsed.contract.actions,
            vec![Action::OpenFile {
                path: "README.md".into()
            }]
        );
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn fenced_json_contract() {
        let text = "Sure, here you go:\n```json\n{\"actions\": [{\"type\": \"run\", \"cmd\": \"ls\"}]}\n```\nDone.";
        let parsed = parse_contract(text);
        assert_eq!(parsed.source, ContractSource::Fenced);
        assert_eq!(parsed.contract.actions.len(), 1);
    }

    #[test]
    fn last_parseable_fence_wins() {
        let text = "First try:\n```json\n{\"actions\": [{\"type\": \"run\", \"cmd\": \"ls\"}]}\n```\n\
                    Correction:\n```json\n{\"actions\": [{\"type\": \"run\", \"cmd\": \"pwd\"}]}\n```\n";
        let parsed = parse_contract(text);
        assert_eq!(
            parsed.contract.actions,
            vec![Action::Run {
                cmd: "pwd".into(),
                timeout_secs: None
            }]
        );
    }

    #[test]
    fn malformed_later_fence_does_not_override() {
        let text = "```json\n{\"message\": \"first\"}\n```\n```json\n{\"message\": oops}\n```";
        let parsed = parse_contract(text);
        assert_eq!(parsed.contract.message.as_deref(), Some("first"));
    }

    #[test]
    fn only_last_fence_well_formed() {
        let text = "```json\n{ broken\n```\n```\n{\"plan\": \"a\", }\n```\n```json\n{\"plan\": [\"ok\"]}\n```";
        let parsed = parse_contract(text);
        assert_eq!(parsed.source, ContractSource::Fenced);
        assert_eq!(parsed.contract.plan, vec!["ok".to_string()]);
    }

    #[test]
    fn embedded_json_with_trailing_prose() {
        let text = "I'll read the file. {\"actions\": [{\"type\": \"open_file\", \"path\": \"a.rs\"}]} Let me know.";
        let parsed = parse_contract(text);
        assert_eq!(parsed.source, ContractSource::Embedded);
        assert_eq!(parsed.contract.actions.len(), 1);
    }

    #[test]
    fn plain_prose_yields_absent_contract() {
        let parsed = parse_contract("The answer is 42.");
        assert!(!parsed.is_present());
        assert!(parsed.contract.actions.is_empty());
    }

    #[test]
    fn present_but_actionless() {
        let parsed = parse_contract(r#"{"message": "All done."}"#);
        assert!(parsed.is_present());
        assert!(!parsed.contract.has_actions());
    }

    #[test]
    fn invalid_action_is_dropped_siblings_survive() {
        let text = r#"{"actions": [
            {"type": "open_file", "path": "a.txt"},
            {"type": "write_file", "path": "b.txt"},
            {"type": "run", "cmd": "ls"}
        ]}"#;
        let parsed = parse_contract(text);
        assert_eq!(parsed.declared_actions, 3);
        assert_eq!(parsed.contract.actions.len(), 2);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].title, "invalid action #2");
        assert!(parsed.rejected[0].body.contains("content"));
    }

    #[test]
    fn non_array_actions_recorded() {
        let parsed = parse_contract(r#"{"actions": {"type": "run", "cmd": "ls"}}"#);
        assert!(parsed.is_present());
        assert!(parsed.contract.actions.is_empty());
        assert_eq!(parsed.rejected.len(), 1);
    }

    #[test]
    fn json_array_is_not_a_contract() {
        assert!(!parse_contract(r#"[{"type": "run", "cmd": "ls"}]"#).is_present());
    }
}
