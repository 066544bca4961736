//! Cooperative cancellation of a running plot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A flag an interrupt handler sets and the driver polls between
/// positions. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` if it had already been
    /// requested.
    pub fn cancel(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let handler = token.clone();
        assert!(!token.is_cancelled());
        assert!(!handler.cancel());
        assert!(token.is_cancelled());
        assert!(handler.cancel());
    }

    #[test]
    fn cancel_from_another_thread() {
        let token = CancellationToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel())
            .join()
            .ok();
        assert!(token.is_cancelled());
    }
}
