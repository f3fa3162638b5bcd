//! Execution scope: the cancellable, deadline-bearing context for one run.
//!
//! A [`Scope`] is created per execution and passed to every adapter call.
//! Adapters are expected to observe cancellation promptly; the engine bounds
//! the whole execution with a timeout but does not forcibly terminate adapter
//! code that ignores the scope (such an execution holds its worker slot until
//! the deadline drops the pipeline future).

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::Stage;

/// Cancellation + deadline context for a single job execution.
///
/// The scope also tracks the pipeline stage currently in flight (an atomic
/// u8, updated lock-free by the pipeline) so the driver can tag timeouts with
/// the stage that exceeded the deadline.
#[derive(Debug)]
pub struct Scope {
    cancel: CancellationToken,
    deadline: Instant,
    stage: AtomicU8,
}

impl Scope {
    /// Creates a scope whose deadline is `now + timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Instant::now() + timeout,
            stage: AtomicU8::new(Stage::Load as u8),
        }
    }

    /// Signals cancellation to every adapter holding this scope.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the scope has been cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the scope is cancelled.
    ///
    /// Adapters with long-running waits should `select!` on this.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// The absolute deadline of this execution.
    #[inline]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time remaining until the deadline (zero if already past).
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Returns true once the deadline has passed.
    #[inline]
    pub fn deadline_exceeded(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Records the stage now in flight.
    pub(crate) fn enter_stage(&self, stage: Stage) {
        self.stage.store(stage as u8, Ordering::Relaxed);
    }

    /// The stage currently (or most recently) in flight.
    pub fn stage(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::Relaxed)).unwrap_or(Stage::Load)
    }
}
