//! User interrupt signalling.

use std::sync::Arc;

use tokio::sync::watch;

/// A clonable interrupt flag. Every clone observes the same state.
///
/// The host (e.g. a Ctrl-C handler) calls [`interrupt`](Self::interrupt);
/// the orchestrator races each suspension point against
/// [`interrupted`](Self::interrupted) and resets the flag at turn start.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for InterruptHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn interrupt(&self) {
        self.tx.send_replace(true);
    }

    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the flag is set (immediately if it already is).
    pub async fn interrupted(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only errors on drop.
        let _ = rx.wait_for(|set| *set).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn clones_share_state() {
        let handle = InterruptHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_interrupted());
        handle.interrupt();
        assert!(clone.is_interrupted());
        clone.reset();
        assert!(!handle.is_interrupted());
    }

    #[tokio::test]
    async fn interrupted_wakes_waiters() {
        let handle = InterruptHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.interrupted().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.interrupt();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn already_set_resolves_immediately() {
        let handle = InterruptHandle::new();
        handle.interrupt();
        tokio::time::timeout(Duration::from_millis(100), handle.interrupted())
            .await
            .unwrap();
    }
}
