//! Completion tracker — counts outstanding units of pipeline work.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Shared counter of outstanding work that callers can wait on.
///
/// Every unit registered with [`add`](Self::add) must be matched by exactly one
/// [`done`](Self::done). A unit that is still running must register any work it
/// spawns before it calls `done`, so the count never reaches zero early.
#[derive(Clone, Default)]
pub struct CompletionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Default)]
struct TrackerInner {
    outstanding: AtomicUsize,
    drains: AtomicUsize,
    drained: Notify,
}

impl CompletionTracker {
    /// Create a tracker with no outstanding work
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `n` new units of work.
    pub fn add(&self, n: usize) {
        if n > 0 {
            self.inner.outstanding.fetch_add(n, Ordering::SeqCst);
        }
    }

    /// Mark one unit as finished, waking waiters when the last one completes.
    ///
    /// A `done` without a matching `add` is logged and ignored; the count
    /// never goes below zero.
    pub fn done(&self) {
        let previous = self
            .inner
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            });

        match previous {
            Ok(1) => {
                self.inner.drains.fetch_add(1, Ordering::SeqCst);
                self.inner.drained.notify_waiters();
            }
            Ok(_) => {}
            Err(_) => {
                tracing::error!("Completion tracker received done() with no outstanding work");
            }
        }
    }

    /// Number of units currently outstanding
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// How many times the count has dropped to zero
    pub fn drains(&self) -> usize {
        self.inner.drains.load(Ordering::SeqCst)
    }

    /// Wait until no work is outstanding.
    ///
    /// Returns immediately if nothing is outstanding.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            // register before checking so a concurrent final done() is not missed
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CompletionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionTracker")
            .field("outstanding", &self.outstanding())
            .field("drains", &self.drains())
            .finish()
    }
}
