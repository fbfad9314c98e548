use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cheap, cloneable cancellation handle. Checked between AND/OR/ANDNOT
/// stages and every K positions during materialization (§5).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been signaled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A query deadline, checked alongside cancellation at the same
/// checkpoints (§5).
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    /// A deadline `duration` from now.
    pub fn after(duration: Duration) -> Self {
        Deadline(Instant::now() + duration)
    }

    /// A deadline that has already passed — useful for testing
    /// `DeadlineExceeded` propagation deterministically.
    pub fn already_passed() -> Self {
        Deadline(Instant::now() - Duration::from_secs(1))
    }

    /// Whether `Instant::now()` is at or past this deadline.
    pub fn is_exceeded(&self) -> bool {
        Instant::now() >= self.0
    }
}
