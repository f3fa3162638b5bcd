//! Execution records: the per-run data captured for the execution log.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Stage;

/// Global counter for minting run ids.
static RUN_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for one execution of a job.
///
/// Run ids are monotonically increasing and unique within a process
/// lifetime; the same job id can accumulate many run ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

impl RunId {
    /// Mints a fresh run id.
    pub fn new() -> Self {
        Self(RUN_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value, useful for logging.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Terminal and in-flight states of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Accepted but not yet started.
    Pending,
    /// The pipeline is running.
    Running,
    /// All stages completed.
    Success,
    /// A stage failed or an adapter was missing.
    Failed,
    /// The deadline fired before the pipeline finished.
    Timeout,
}

impl ExecutionStatus {
    /// Returns true for states the execution cannot leave.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Timeout)
    }

    /// Status name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wall-clock time spent in each pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimings {
    pub load: Duration,
    pub render: Duration,
    pub generate: Duration,
    pub deliver: Duration,
}

impl StageTimings {
    /// Records the duration of one stage.
    pub fn record(&mut self, stage: Stage, duration: Duration) {
        match stage {
            Stage::Load => self.load += duration,
            Stage::Render => self.render += duration,
            Stage::Generate => self.generate += duration,
            Stage::Deliver => self.deliver += duration,
        }
    }

    /// Time spent in one stage.
    pub fn get(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Load => self.load,
            Stage::Render => self.render,
            Stage::Generate => self.generate,
            Stage::Deliver => self.deliver,
        }
    }

    /// Sum across all stages.
    pub fn total(&self) -> Duration {
        self.load + self.render + self.generate + self.deliver
    }
}

/// One row of the execution log.
#[derive(Debug, Clone)]
pub struct JobExecution {
    /// Id of the job that ran.
    pub job_id: String,
    /// Name of the job that ran.
    pub job_name: String,
    /// Unique id of this run.
    pub run_id: RunId,
    /// Current state; terminal records never change again.
    pub status: ExecutionStatus,
    /// When the execution started.
    pub started_at: DateTime<Utc>,
    /// When the execution reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Per-stage durations.
    pub timings: StageTimings,
    /// Rows loaded in the load stage.
    pub rows: u64,
    /// Total bytes across generated output files.
    pub bytes: u64,
    /// Error kind and short detail for failed/timed-out runs.
    pub error: Option<String>,
}

impl JobExecution {
    /// Creates a running record for a job, stamped with the current time.
    pub fn started(job_id: impl Into<String>, job_name: impl Into<String>, run_id: RunId) -> Self {
        Self {
            job_id: job_id.into(),
            job_name: job_name.into(),
            run_id,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            timings: StageTimings::default(),
            rows: 0,
            bytes: 0,
            error: None,
        }
    }

    /// Wall-clock duration, up to now for in-flight records.
    pub fn duration(&self) -> Duration {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_unique_and_monotonic() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_run_id_display() {
        let id = RunId(7);
        assert_eq!(id.to_string(), "run-7");
    }

    #[test]
    fn test_status_terminal() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Timeout.is_terminal());
    }

    #[test]
    fn test_stage_timings_accumulate() {
        let mut timings = StageTimings::default();
        timings.record(Stage::Load, Duration::from_millis(10));
        timings.record(Stage::Load, Duration::from_millis(5));
        timings.record(Stage::Deliver, Duration::from_millis(3));

        assert_eq!(timings.get(Stage::Load), Duration::from_millis(15));
        assert_eq!(timings.get(Stage::Render), Duration::ZERO);
        assert_eq!(timings.total(), Duration::from_millis(18));
    }

    #[test]
    fn test_started_record_shape() {
        let exec = JobExecution::started("j1", "sample", RunId::new());
        assert_eq!(exec.status, ExecutionStatus::Running);
        assert!(exec.finished_at.is_none());
        assert!(exec.error.is_none());
        assert_eq!(exec.rows, 0);
    }
}
