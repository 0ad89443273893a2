//! The turn orchestrator — the heart of actloop.
//!
//! Each user turn follows a bounded **Submit → Parse → Dispatch → Observe** cycle:
//!
//! 1. **Submit** the system prompt and user message to the model
//! 2. **Parse** the reply into a JSON contract (plan, rationale, actions, message)
//! 3. **Dispatch** each action in order, asking for approval where policy says so
//! 4. **Verify** once per turn after the first successful edit (optional)
//! 5. **Observe**: fold the results back into the messages and loop to step 1
//!
//! The loop ends when the model stops asking for actions, answers in prose,
//! the pass budget runs out, the transport fails, or the user interrupts.

pub mod events;
pub mod interrupt;
pub mod observation;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod verify;

pub use events::{CollectingSink, NullSink, TurnEvent, TurnSink};
pub use interrupt::InterruptHandle;
pub use observation::{ObservationAccumulator, tail_truncate};
pub use orchestrator::{PassBudget, TurnOrchestrator, TurnOutcome, TurnState, TurnStatus};
pub use prompt::system_prompt;
pub use session::SessionContext;
pub use verify::{VerificationResult, VerificationRunner, checks_for};
