//! Safety layer for actloop: approval policy, workspace path confinement, and
//! the session audit log.
//!
//! Provides:
//! - **Approval**: which actions need a human "yes" at each approval level
//! - **Path validation**: file tools stay inside the workspace directory
//! - **Audit logging**: append-only session records with pluggable sinks

pub mod approval;
pub mod audit;
pub mod path;

pub use approval::{
    ApprovalPolicy, WRITE_APPROVAL_THRESHOLD_BYTES, destructive_category, has_chaining,
    requires_approval_for_run, requires_approval_for_write,
};
pub use audit::{AuditLog, AuditSink, DEFAULT_RETAINED, JsonlFileSink, TracingSink};
pub use path::{PathValidationError, resolve_in_workspace};
