//! Time-triggered dispatch: one trigger task per scheduled job.
//!
//! Each registered job gets a tokio task that sleeps until the schedule's
//! next fire time and then attempts a *non-blocking* enqueue. A full queue
//! never stalls a trigger: the firing is dropped, counted as a missed run
//! and logged. Jobs registered before [`CronScheduler::start`] are parked
//! and never fire early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::job::ReportJob;
use crate::metrics::MetricsHub;
use crate::queue::JobQueue;
use crate::schedule::ScheduleSpec;

/// Upper bound on the shutdown grace period for in-flight triggers.
pub(crate) const STOP_GRACE_CAP: Duration = Duration::from_secs(2);

/// The engine's scheduler: owns the trigger tasks.
pub(crate) struct CronScheduler {
    queue: JobQueue,
    metrics: MetricsHub,
    cancel: CancellationToken,
    parked: Mutex<Vec<(ReportJob, ScheduleSpec)>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl CronScheduler {
    pub(crate) fn new(queue: JobQueue, metrics: MetricsHub) -> Self {
        Self {
            queue,
            metrics,
            cancel: CancellationToken::new(),
            parked: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Registers a job's schedule.
    ///
    /// Fails with [`EngineError::InvalidSchedule`] when the expression is
    /// empty or unparseable. Before `start`, the trigger is parked; after,
    /// it is spawned immediately (requires a tokio runtime).
    pub(crate) fn add_job(&self, job: ReportJob) -> Result<(), EngineError> {
        let spec = ScheduleSpec::parse(&job.schedule)?;
        debug!(job_id = %job.id, schedule = %job.schedule, "cron job registered");

        if self.started.load(Ordering::Acquire) {
            self.spawn_trigger(job, spec);
        } else if let Ok(mut parked) = self.parked.lock() {
            parked.push((job, spec));
        }
        Ok(())
    }

    /// Starts firing: spawns every parked trigger.
    pub(crate) fn start(&self) {
        self.started.store(true, Ordering::Release);
        let parked = match self.parked.lock() {
            Ok(mut parked) => parked.drain(..).collect::<Vec<_>>(),
            Err(_) => Vec::new(),
        };
        let count = parked.len();
        for (job, spec) in parked {
            self.spawn_trigger(job, spec);
        }
        info!(triggers = count, "scheduler started");
    }

    /// Stops future firings and waits (up to `grace`, capped at two seconds)
    /// for in-flight triggers to return. Stragglers are aborted.
    pub(crate) async fn stop(&self, grace: Duration) {
        self.cancel.cancel();

        let handles = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect::<Vec<_>>(),
            Err(_) => Vec::new(),
        };

        let deadline = tokio::time::Instant::now() + grace.min(STOP_GRACE_CAP);
        for mut handle in handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
            }
        }
        info!("scheduler stopped");
    }

    fn spawn_trigger(&self, job: ReportJob, spec: ScheduleSpec) {
        let queue = self.queue.clone();
        let metrics = self.metrics.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(run_trigger(job, spec, queue, metrics, cancel));
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(handle);
        }
    }
}

/// Trigger loop for one scheduled job.
async fn run_trigger(
    job: ReportJob,
    spec: ScheduleSpec,
    queue: JobQueue,
    metrics: MetricsHub,
    cancel: CancellationToken,
) {
    loop {
        let now = Utc::now();
        let Some(next) = spec.next_after(now) else {
            debug!(job_id = %job.id, "schedule exhausted");
            return;
        };
        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        match queue.try_send(job.clone()) {
            Ok(()) => debug!(job_id = %job.id, "schedule fired"),
            Err(EngineError::QueueFull) => {
                metrics.run_missed();
                warn!(job_id = %job.id, "queue full, firing dropped as missed run");
            }
            Err(_) => {
                // Queue consumer is gone; the engine is shutting down.
                return;
            }
        }
    }
}
