//! Progress reporting and cooperative cancellation.
//!
//! Progress events are only ever emitted from the thread that called
//! [`crate::generate`], never from workers, so a sink does not have to be
//! re-entrant. The usual sink is a [`crossbeam_channel::Sender`] drained by a
//! UI or logging thread.

use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A progress update: completion percentage and a human-readable status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    /// 0 to 100.
    pub percent: u8,
    pub message: String,
}

impl ProgressEvent {
    /// Build an event, clamping `percent` to 100.
    #[must_use]
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }

    /// `floor(100 * done / total)`, clamped to 100.
    #[must_use]
    pub fn percent_of(done: usize, total: usize) -> u8 {
        if total == 0 {
            return 100;
        }
        u8::try_from((done.saturating_mul(100) / total).min(100)).unwrap_or(100)
    }
}

/// Receiver of progress events.
///
/// [`crate::generate`] calls `report` from the thread that called it, never
/// from a worker.
///
/// # Example
/// ```
/// use docbatch::{ProgressEvent, ProgressSink};
///
/// let (tx, rx) = crossbeam_channel::unbounded();
/// tx.report(ProgressEvent::new(40, "generating document 10/25..."));
/// assert_eq!(rx.recv().unwrap().percent, 40);
/// ```
pub trait ProgressSink {
    fn report(&self, event: ProgressEvent);
}

impl ProgressSink for Sender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.send(event);
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Shared cancellation flag.
///
/// Clones observe the same flag. Checking never blocks; workers look at it
/// between rows and the orchestrator between chunk completions.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this token to stop. Idempotent.
    ///
    /// # Example
    /// ```
    /// use docbatch::CancelToken;
    ///
    /// let token = CancelToken::new();
    /// let worker_view = token.clone();
    /// token.cancel();
    /// assert!(worker_view.is_cancelled());
    /// ```
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
