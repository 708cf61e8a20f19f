//! Controlled response resolution.
//!
//! A single-fire gate the dispatch engine waits on and test code completes,
//! used to hold a matched response back until the test releases it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// One-shot, externally-completable signal.
///
/// Completion is sticky: waiters that subscribe after [`complete`] has been
/// called return immediately, and completing twice is a no-op.
///
/// [`complete`]: ResolutionGate::complete
#[derive(Clone, Default)]
pub struct ResolutionGate {
    inner: Arc<GateInner>,
}

#[derive(Default)]
struct GateInner {
    completed: AtomicBool,
    notify: Notify,
}

impl ResolutionGate {
    /// Create a new, uncompleted gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the gate has been completed.
    pub fn is_complete(&self) -> bool {
        self.inner.completed.load(Ordering::SeqCst)
    }

    /// Complete the gate, releasing current and future waiters.
    pub fn complete(&self) {
        self.inner.completed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Wait until the gate is completed.
    ///
    /// There is no timeout: a gate nobody completes leaves the waiter
    /// pending forever.
    pub async fn wait(&self) {
        loop {
            // Subscribe before re-checking the flag so a completion racing
            // with this call is not missed.
            let notified = self.inner.notify.notified();
            if self.is_complete() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for ResolutionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionGate")
            .field("completed", &self.is_complete())
            .finish()
    }
}

/// Handle returned by controlled-resolution registration.
///
/// Invoking [`resolve`](MockResolver::resolve) releases the response held
/// by the associated mock.
#[derive(Debug, Clone)]
pub struct MockResolver {
    gate: ResolutionGate,
}

impl MockResolver {
    pub(crate) fn new(gate: ResolutionGate) -> Self {
        Self { gate }
    }

    /// Complete the underlying gate, letting the response be delivered.
    pub fn resolve(&self) {
        self.gate.complete();
    }
}
