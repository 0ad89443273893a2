//! Human confirmation collaborator.

use async_trait::async_trait;

/// Asks the human to approve an action. May suspend indefinitely while the
/// terminal waits for input.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str, default_answer: bool) -> bool;
}

/// Answers every prompt with a fixed value. Used for non-interactive runs
/// and tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, _prompt: &str, _default_answer: bool) -> bool {
        self.0
    }
}
