//! Progress reporting and cooperative cancellation.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use tracing::debug;

/// Receives progress notifications and answers cancellation polls.
///
/// The engine calls [`ProgressTracker::log_progress`] once per finished
/// partition with the number of nodes it covered, and polls
/// [`ProgressTracker::is_cancelled`] between stages, partitions and nodes.
/// Calls may arrive concurrently from worker threads.
pub trait ProgressTracker: Sync {
    /// Records that `nodes` more nodes finished the current stage.
    fn log_progress(&self, nodes: u64) {
        let _ = nodes;
    }

    /// Returns `true` once the computation should stop.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Ignores progress and never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProgress;

impl ProgressTracker for NoopProgress {}

/// A cloneable cancellation flag.
///
/// # Examples
/// ```
/// use nndescent_core::{CancellationToken, ProgressTracker};
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// assert!(!token.is_cancelled());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Every clone observes the request.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl ProgressTracker for CancellationToken {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Emits a `debug` event for every progress notification.
///
/// An optional [`CancellationToken`] lets the tracker double as the
/// cancellation source.
#[derive(Debug, Default)]
pub struct TracingProgress {
    processed: AtomicU64,
    token: Option<CancellationToken>,
}

impl TracingProgress {
    /// Creates a tracker that logs progress and never cancels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Returns the number of nodes reported so far.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

impl ProgressTracker for TracingProgress {
    fn log_progress(&self, nodes: u64) {
        let processed = self.processed.fetch_add(nodes, Ordering::Relaxed) + nodes;
        debug!(nodes, processed, "knn progress");
    }

    fn is_cancelled(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
