//! Per-action validation.
//!
//! Turns one JSON object from the contract's `actions` array into a typed
//! [`Action`]. A recognized tag with a missing or mistyped required field is
//! a [`ValidationError`]; an unrecognized tag is *not* — it becomes a
//! namespaced action so the dispatcher can reject it explicitly.

use actloop_core::action::{APPLY_PATCH, GIT, OPEN_FILE, RUN, WRITE_FILE};
use actloop_core::Action;
use serde_json::{Map, Value};

/// Why a single action was dropped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("action is not a JSON object")]
    NotAnObject,

    #[error("action has neither a \"type\" nor a \"tool\" field")]
    MissingTag,

    #[error("{tag}: missing required field \"{field}\"")]
    MissingField { tag: String, field: &'static str },

    #[error("{tag}: field \"{field}\" must be {expected}")]
    WrongType {
        tag: String,
        field: &'static str,
        expected: &'static str,
    },
}

/// Validate one raw action object.
pub fn validate_action(value: &Value) -> Result<Action, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

    if let Some(tag) = obj.get("type") {
        let tag = tag.as_str().ok_or_else(|| ValidationError::WrongType {
            tag: "action".into(),
            field: "type",
            expected: "a string",
        })?;
        return validate_tagged(tag, obj);
    }

    match obj.get("tool") {
        Some(Value::String(tool)) if tool == GIT => validate_tagged(GIT, obj),
        Some(Value::String(tool)) => Ok(Action::Namespaced {
            tool: tool.clone(),
            subtool: optional_str(tool, obj, "subtool")?,
            args: obj.get("args").cloned().unwrap_or(Value::Object(Map::new())),
        }),
        Some(_) => Err(ValidationError::WrongType {
            tag: "action".into(),
            field: "tool",
            expected: "a string",
        }),
        None => Err(ValidationError::MissingTag),
    }
}

fn validate_tagged(tag: &str, obj: &Map<String, Value>) -> Result<Action, ValidationError> {
    match tag {
        OPEN_FILE => Ok(Action::OpenFile {
            path: required_str(tag, obj, "path")?,
        }),
        WRITE_FILE => Ok(Action::WriteFile {
            path: required_str(tag, obj, "path")?,
            // Empty content is a legitimate write (truncate), so only the type is checked.
            content: match obj.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(_) => return Err(wrong_type(tag, "content", "a string")),
                None => {
                    return Err(ValidationError::MissingField {
                        tag: tag.into(),
                        field: "content",
                    });
                }
            },
        }),
        APPLY_PATCH => Ok(Action::ApplyPatch {
            path: required_str(tag, obj, "path")?,
            patch: required_str(tag, obj, "patch")?,
        }),
        RUN => Ok(Action::Run {
            cmd: required_str(tag, obj, "cmd")?,
            timeout_secs: timeout(tag, obj)?,
        }),
        GIT => {
            let args = match obj.get("args") {
                None | Some(Value::Null) => Value::Object(Map::new()),
                Some(v @ (Value::Object(_) | Value::Array(_))) => v.clone(),
                Some(_) => return Err(wrong_type(tag, "args", "an object or array")),
            };
            Ok(Action::Git {
                subtool: required_str(tag, obj, "subtool")?,
                args,
            })
        }
        other => Ok(Action::Namespaced {
            tool: other.to_string(),
            subtool: optional_str(other, obj, "subtool")?,
            args: obj.get("args").cloned().unwrap_or(Value::Object(Map::new())),
        }),
    }
}

fn wrong_type(tag: &str, field: &'static str, expected: &'static str) -> ValidationError {
    ValidationError::WrongType {
        tag: tag.into(),
        field,
        expected,
    }
}

fn required_str(
    tag: &str,
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ValidationError> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(wrong_type(tag, field, "a non-empty string")),
        Some(_) => Err(wrong_type(tag, field, "a string")),
        None => Err(ValidationError::MissingField {
            tag: tag.into(),
            field,
        }),
    }
}

fn optional_str(
    tag: &str,
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(wrong_type(tag, field, "a string")),
    }
}

fn timeout(tag: &str, obj: &Map<String, Value>) -> Result<Option<u64>, ValidationError> {
    let raw = obj.get("timeoutSeconds").or_else(|| obj.get("timeout_seconds"));
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(secs) if secs > 0 => Ok(Some(secs)),
            _ => Err(wrong_type(tag, "timeoutSeconds", "a positive integer")),
        },
    }
}
