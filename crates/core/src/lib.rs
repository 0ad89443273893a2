//! # actloop Core
//!
//! Domain types, traits, and error definitions for the actloop turn orchestrator.
//! This crate has **no I/O of its own** — it defines the vocabulary every other
//! crate implements against: actions and contracts, messages, observations,
//! and the collaborator traits (model provider, tool handlers, confirmation,
//! session log, verification entry-point discovery).

pub mod action;
pub mod confirm;
pub mod error;
pub mod message;
pub mod observation;
pub mod provider;
pub mod session;
pub mod tool;
pub mod verify;

// Re-export key types at crate root for ergonomics
pub use action::{Action, ModelContract};
pub use confirm::{AutoConfirm, Confirm};
pub use error::{ProviderError, ToolError};
pub use message::{Message, Role};
pub use observation::Observation;
pub use provider::{Completion, Provider, ProviderRequest, ProviderResponse, StreamDelta, Usage};
pub use session::{RecordKind, SessionLog, SessionRecord};
pub use tool::{DispatchOutcome, Tool, ToolOutput, ToolRegistry};
pub use verify::{CheckKind, EntryPointDiscovery};
