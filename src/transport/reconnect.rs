//! Single-slot reconnect timer.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

// ============================================================================
// ReconnectTimer
// ============================================================================

/// Holds at most one scheduled reconnect attempt.
#[derive(Debug, Default)]
pub struct ReconnectTimer {
    handle: Option<JoinHandle<()>>,
}

impl ReconnectTimer {
    /// Returns `true` while a scheduled attempt has not yet run.
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Runs `attempt` after `delay`.
    ///
    /// Returns `false` and drops `attempt` if one is already pending.
    /// Must be called within a Tokio runtime.
    pub fn schedule<F>(&mut self, delay: Duration, attempt: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_pending() {
            return false;
        }

        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            attempt.await;
        }));
        true
    }

    /// Aborts the pending attempt, if any.
    ///
    /// Returns `true` if an attempt was cancelled.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Forgets the handle without aborting it.
    ///
    /// Called from inside the attempt itself once it starts running.
    #[inline]
    pub fn clear(&mut self) {
        self.handle = None;
    }
}

// ============================================================================
// Tests
// ============================================================================
