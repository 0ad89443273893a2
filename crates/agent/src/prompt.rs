//! System prompt construction.

use actloop_config::{ApprovalLevel, VerifyMode};
use actloop_core::ToolRegistry;

const CONTRACT_FORMAT: &str = r#"Reply with a single JSON object (optionally inside a ```json fence):

{
  "plan": ["short ordered steps"],
  "rationale": "why these actions",
  "actions": [ ... ],
  "message": "what to tell the user"
}

Actions run strictly in the order given. Results come back to you as an
"Observations" block; use them to decide the next step. When the task is done,
reply with an empty "actions" list and a final "message". Plain prose without
JSON is shown to the user as-is and ends the turn."#;

/// Build the system prompt from the registered tools and session settings.
pub fn system_prompt(registry: &ToolRegistry, level: ApprovalLevel, verify: VerifyMode) -> String {
    let mut prompt = String::from(
        "You are a coding agent working inside the user's project directory. \
         You act only through the actions listed below.\n\n",
    );
    prompt.push_str(CONTRACT_FORMAT);
    prompt.push_str("\n\nAvailable actions:\n");
    for (name, description) in registry.descriptions() {
        prompt.push_str(&format!("- {name}: {description}\n"));
    }

    prompt.push_str(&format!("\nApproval level: {level}. "));
    prompt.push_str(match level {
        ApprovalLevel::Safe => "Every write and command is confirmed by the user.",
        ApprovalLevel::Balanced => {
            "Large writes and risky or chained commands are confirmed by the user."
        }
        ApprovalLevel::Auto => "Actions run without confirmation; be careful.",
    });
    prompt.push_str(" A declined action comes back as \"skipped\"; do not retry it unchanged.\n");

    if verify != VerifyMode::None {
        prompt.push_str(&format!(
            "After successful edits the project's {verify} check runs once and its result is \
             reported as an observation.\n"
        ));
    }
    prompt
}
