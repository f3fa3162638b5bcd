//! Bounded FIFO handoff between job producers and the worker pool.
//!
//! Producers (the scheduler's triggers and ad-hoc `Engine::enqueue`) submit
//! with a non-blocking `try_send`; a full queue is the producer's problem to
//! surface, never a reason to block a timer. The single receiver is shared
//! by all workers behind an async mutex, so dequeueing through one receiver
//! preserves FIFO order across the whole pool.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::error::EngineError;
use crate::job::ReportJob;

/// Shared consumer side of the job queue.
pub(crate) type JobReceiver = Arc<Mutex<mpsc::Receiver<ReportJob>>>;

/// Producer handle for the job queue.
#[derive(Clone)]
pub(crate) struct JobQueue {
    tx: mpsc::Sender<ReportJob>,
}

impl JobQueue {
    /// Creates a bounded queue with the given capacity.
    pub(crate) fn bounded(capacity: usize) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, Arc::new(Mutex::new(rx)))
    }

    /// Non-blocking submit.
    ///
    /// Returns [`EngineError::QueueFull`] when the queue is at capacity and
    /// [`EngineError::EngineStopped`] once the consumer side is gone.
    pub(crate) fn try_send(&self, job: ReportJob) -> Result<(), EngineError> {
        self.tx.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => EngineError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => EngineError::EngineStopped,
        })
    }
}
